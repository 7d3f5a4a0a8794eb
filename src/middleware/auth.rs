use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::AppState;

pub const ADMIN_ROLES: &[&str] = &["admin", "reviewer"];

/// Identity issued by the external identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub org: Uuid,
    pub role: String,
    pub exp: usize,
}

impl Claims {
    pub fn has_any_role(&self, allowed: &[&str]) -> bool {
        allowed.iter().any(|r| r.eq_ignore_ascii_case(&self.role))
    }

    pub fn is_admin(&self) -> bool {
        self.has_any_role(ADMIN_ROLES)
    }
}

fn decode_bearer(req: &Request, secret: &str) -> Result<Claims> {
    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| Error::Unauthorized("Missing Authorization header".to_string()))?;
    let auth_str = auth_header
        .to_str()
        .map_err(|_| Error::Unauthorized("Malformed Authorization header".to_string()))?;
    let token = auth_str
        .strip_prefix("Bearer ")
        .ok_or_else(|| Error::Unauthorized("Expected a Bearer token".to_string()))?;

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!(error = ?e, "Rejected bearer token");
        Error::Unauthorized("Invalid or expired token".to_string())
    })
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    match decode_bearer(&req, &state.config.jwt_secret) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(e) => e.into_response(),
    }
}

pub async fn require_admin(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let claims = match decode_bearer(&req, &state.config.jwt_secret) {
        Ok(claims) => claims,
        Err(e) => return e.into_response(),
    };
    if !claims.is_admin() {
        return Error::Forbidden("Admin or reviewer role required".to_string()).into_response();
    }
    req.extensions_mut().insert(claims);
    next.run(req).await
}
