use actix_web::{
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    http::header,
    middleware::Next,
    web, HttpMessage,
};
use chrono::Utc;

use crate::{
    credentials::{CredentialService, TokenClaims},
    error::ApiError,
};

/// Whether guarded routes demand a bearer token. Without this in app data
/// they stay open.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthPolicy {
    pub require_token: bool,
}

/// When [`AuthPolicy::require_token`] is set, rejects requests without a
/// valid `Authorization: Bearer <token>` header. Verified claims are stored
/// in the request extensions.
pub async fn bearer_auth_middleware(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<impl MessageBody>, actix_web::Error> {
    let required = req
        .app_data::<web::Data<AuthPolicy>>()
        .is_some_and(|policy| policy.require_token);
    if !required {
        return Ok(next.call(req).await?.map_into_left_body());
    }

    match authenticate(&req) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            Ok(next.call(req).await?.map_into_left_body())
        }
        Err(err) => Ok(req.error_response(err).map_into_right_body()),
    }
}

fn authenticate(req: &ServiceRequest) -> Result<TokenClaims, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(ApiError::Unauthorized)?;

    let credentials = req
        .app_data::<web::Data<CredentialService>>()
        .ok_or(ApiError::Unauthorized)?;

    credentials
        .verify_token(token, Utc::now().timestamp())
        .map_err(|err| {
            log::warn!("Rejected bearer token for {}: {}", req.path(), err);
            ApiError::Unauthorized
        })
}
