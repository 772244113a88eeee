use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// bcrypt work factor for stored passwords.
pub const HASH_COST: u32 = 10;

const TOKEN_ALGORITHM: &str = "HS256";
const TOKEN_TYPE: &str = "JWT";

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token secret must not be empty")]
    EmptySecret,

    #[error("invalid token format")]
    InvalidFormat,

    #[error("unsupported token algorithm")]
    UnsupportedAlgorithm,

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token is expired")]
    Expired,

    #[error("failed to decode token payload")]
    PayloadDecode,

    #[error("failed to parse token payload")]
    PayloadParse,
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Password hashing error: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Credential task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenHeader {
    alg: String,
    typ: String,
}

/// Signed claims carried by a bearer token. Times are unix seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub iat: i64,
    pub exp: i64,
}

impl TokenClaims {
    pub fn is_expired(&self, reference_secs: i64) -> bool {
        reference_secs >= self.exp
    }
}

/// Password hashing and HS256 bearer tokens under one shared secret.
#[derive(Clone)]
pub struct CredentialService {
    secret: Arc<[u8]>,
    ttl: Duration,
    cost: u32,
}

impl CredentialService {
    pub fn new(secret: impl Into<Vec<u8>>, ttl: Duration) -> Result<Self, TokenError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }

        Ok(Self {
            secret: Arc::<[u8]>::from(secret),
            ttl,
            cost: HASH_COST,
        })
    }

    /// Overrides the bcrypt cost. Tests use `bcrypt::MIN_COST` to stay fast.
    pub fn with_cost(mut self, cost: u32) -> Self {
        self.cost = cost;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Salted hash of `plaintext`; a fresh salt makes every call differ.
    pub async fn hash_password(&self, plaintext: &str) -> Result<String, CredentialError> {
        let plaintext = plaintext.to_owned();
        let cost = self.cost;
        Ok(tokio::task::spawn_blocking(move || bcrypt::hash(plaintext, cost)).await??)
    }

    pub async fn verify_password(
        &self,
        plaintext: &str,
        hash: &str,
    ) -> Result<bool, CredentialError> {
        let plaintext = plaintext.to_owned();
        let hash = hash.to_owned();
        Ok(tokio::task::spawn_blocking(move || bcrypt::verify(plaintext, &hash)).await??)
    }

    pub fn issue_token(&self, user_id: &str) -> Result<String, TokenError> {
        self.issue_token_at(user_id, Utc::now().timestamp())
    }

    pub fn issue_token_at(&self, user_id: &str, issued_at_secs: i64) -> Result<String, TokenError> {
        let ttl_secs = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = TokenClaims {
            user_id: user_id.to_string(),
            iat: issued_at_secs,
            exp: issued_at_secs.saturating_add(ttl_secs),
        };
        self.issue(&claims)
    }

    pub fn issue(&self, claims: &TokenClaims) -> Result<String, TokenError> {
        let header = TokenHeader {
            alg: TOKEN_ALGORITHM.to_string(),
            typ: TOKEN_TYPE.to_string(),
        };
        let header = serde_json::to_vec(&header).map_err(|_| TokenError::PayloadParse)?;
        let payload = serde_json::to_vec(claims).map_err(|_| TokenError::PayloadParse)?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(payload)
        );
        let signature = URL_SAFE_NO_PAD.encode(self.sign(signing_input.as_bytes())?);
        Ok(format!("{signing_input}.{signature}"))
    }

    pub fn verify_token(&self, token: &str, reference_secs: i64) -> Result<TokenClaims, TokenError> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::InvalidFormat);
        };

        let header = URL_SAFE_NO_PAD
            .decode(header_b64)
            .map_err(|_| TokenError::InvalidFormat)?;
        let header: TokenHeader =
            serde_json::from_slice(&header).map_err(|_| TokenError::InvalidFormat)?;
        if header.alg != TOKEN_ALGORITHM {
            return Err(TokenError::UnsupportedAlgorithm);
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| TokenError::InvalidFormat)?;

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| TokenError::InvalidSignature)?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(payload_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| TokenError::PayloadDecode)?;
        let claims: TokenClaims =
            serde_json::from_slice(&payload).map_err(|_| TokenError::PayloadParse)?;

        if claims.is_expired(reference_secs) {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    fn sign(&self, bytes: &[u8]) -> Result<Vec<u8>, TokenError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| TokenError::InvalidSignature)?;
        mac.update(bytes);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_service() -> CredentialService {
        CredentialService::new("JUSB098", Duration::from_secs(3600))
            .expect("valid service")
            .with_cost(4) // bcrypt minimum cost (bcrypt::MIN_COST is private)
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert!(matches!(
            CredentialService::new(Vec::<u8>::new(), Duration::from_secs(1)),
            Err(TokenError::EmptySecret)
        ));
    }

    #[tokio::test]
    async fn hashing_is_salted_and_verifiable() {
        let service = test_service();
        let first = service.hash_password("hunter2").await.unwrap();
        let second = service.hash_password("hunter2").await.unwrap();

        assert_ne!(first, "hunter2");
        assert_ne!(first, second);
        assert!(service.verify_password("hunter2", &first).await.unwrap());
        assert!(service.verify_password("hunter2", &second).await.unwrap());
        assert!(!service.verify_password("hunter3", &first).await.unwrap());
    }

    #[tokio::test]
    async fn default_cost_is_ten_rounds() {
        let service = CredentialService::new("secret", Duration::from_secs(60)).unwrap();
        let hash = service.hash_password("pw").await.unwrap();
        assert!(hash.starts_with("$2b$10$"), "unexpected hash prefix: {hash}");
    }

    #[tokio::test]
    async fn malformed_hash_is_an_error() {
        let service = test_service();
        assert!(matches!(
            service.verify_password("pw", "not-a-bcrypt-hash").await,
            Err(CredentialError::Hash(_))
        ));
    }

    #[test]
    fn issue_and_verify_roundtrip() {
        let service = test_service();
        let token = service.issue_token_at("65f0c0ffee", 1_000).expect("issue token");

        assert_eq!(token.split('.').count(), 3);
        let claims = service.verify_token(&token, 1_500).expect("verify token");
        assert_eq!(claims.user_id, "65f0c0ffee");
        assert_eq!(claims.iat, 1_000);
        assert_eq!(claims.exp, 1_000 + 3600);
    }

    #[test]
    fn token_header_is_standard_hs256() {
        let service = test_service();
        let token = service.issue_token_at("u", 0).unwrap();
        let header = token.split('.').next().unwrap();
        let header: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(header).unwrap()).unwrap();

        assert_eq!(header, serde_json::json!({ "alg": "HS256", "typ": "JWT" }));
    }

    #[test]
    fn rejects_tampered_token() {
        let service = test_service();
        let token = service.issue_token_at("u", 10).expect("issue token");
        let parts: Vec<&str> = token.split('.').collect();
        let forged_claims = URL_SAFE_NO_PAD.encode(br#"{"userId":"admin","iat":10,"exp":99999}"#);
        let tampered = format!("{}.{}.{}", parts[0], forged_claims, parts[2]);

        assert!(matches!(
            service.verify_token(&tampered, 20),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn rejects_token_signed_with_other_secret() {
        let other = CredentialService::new("another-secret", Duration::from_secs(3600)).unwrap();
        let token = other.issue_token_at("u", 10).unwrap();

        assert!(matches!(
            test_service().verify_token(&token, 20),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn rejects_expired_token() {
        let service = test_service();
        let token = service.issue_token_at("u", 1_000).expect("issue token");

        assert!(matches!(
            service.verify_token(&token, 1_000 + 3600),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn rejects_malformed_tokens() {
        let service = test_service();
        for token in ["", "abc", "a.b", "a.b.c.d"] {
            assert!(matches!(
                service.verify_token(token, 0),
                Err(TokenError::InvalidFormat)
            ));
        }
    }
}
