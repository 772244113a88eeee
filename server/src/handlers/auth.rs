use actix_web::{post, web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::{
    credentials::{CredentialError, CredentialService},
    db::{Storage, User},
    error::{ApiError, Context, Result},
};

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub pwd: Option<String>,
}

impl CredentialsRequest {
    /// Both fields must be present and non-empty.
    fn required(&self) -> Result<(&str, &str)> {
        match (self.email.as_deref(), self.pwd.as_deref()) {
            (Some(email), Some(pwd)) if !email.is_empty() && !pwd.is_empty() => Ok((email, pwd)),
            _ => Err(ApiError::Validation("Email and password are required")),
        }
    }
}

/// The stored user minus its password hash.
#[derive(Debug, Serialize)]
pub struct SignupResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

#[post("/signup")]
pub async fn signup(
    req: web::Json<CredentialsRequest>,
    storage: web::Data<dyn Storage>,
    credentials: web::Data<CredentialService>,
) -> Result<HttpResponse> {
    let (email, pwd) = req.required()?;

    let password_hash = credentials
        .hash_password(pwd)
        .await
        .context("Error creating user")?;

    let user = storage
        .insert_user(User::new(email.to_string(), password_hash))
        .await
        .context("Error creating user")?;

    log::info!("Created user: {}", user.email);

    let response = SignupResponse {
        id: user.id.to_hex(),
        email: user.email,
    };

    Ok(HttpResponse::Created().json(response))
}

#[post("/login")]
pub async fn login(
    req: web::Json<CredentialsRequest>,
    storage: web::Data<dyn Storage>,
    credentials: web::Data<CredentialService>,
) -> Result<HttpResponse> {
    let (email, pwd) = req.required()?;

    log::info!("Login attempt for user: {}", email);

    // Unknown email and wrong password answer identically
    let user = storage
        .find_user_by_email(email)
        .await
        .context("Error logging in")?
        .ok_or(ApiError::InvalidCredentials)?;

    if !credentials
        .verify_password(pwd, &user.password_hash)
        .await
        .context("Error logging in")?
    {
        log::warn!("Failed login attempt for user: {}", email);
        return Err(ApiError::InvalidCredentials);
    }

    let token = credentials
        .issue_token(&user.id.to_hex())
        .map_err(CredentialError::from)
        .context("Error logging in")?;

    log::info!("Successful login for user: {}", email);

    Ok(HttpResponse::Ok().json(LoginResponse { token }))
}
