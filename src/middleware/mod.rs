use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use base64::{engine::general_purpose, Engine as _};
use std::sync::Arc;

use crate::error::CinemaError;
use crate::models::UserRole;
use crate::AppState;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub mail: String,
    pub role: UserRole,
}

/// An authenticated user holding the ADMIN role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

/// Splits a `Basic` authorization header into mail and password.
fn basic_credentials(value: &str) -> Option<(String, String)> {
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = general_purpose::STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;
    let (mail, password) = credentials.split_once(':')?;
    Some((mail.to_string(), password.to_string()))
}

// Basic Auth extractor
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = CinemaError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let (mail, password) = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(basic_credentials)
            .ok_or(CinemaError::InvalidCredentials)?;

        let user = state.users.authenticate(&mail, &password).await?;
        Ok(AuthUser {
            user_id: user.id,
            mail: user.mail,
            role: user.role,
        })
    }
}

impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = CinemaError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role != UserRole::Admin {
            return Err(CinemaError::Forbidden);
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_basic_credentials() {
        let header = format!("Basic {}", general_purpose::STANDARD.encode("ann@example.com:pa:ss"));
        assert_eq!(
            basic_credentials(&header),
            Some(("ann@example.com".into(), "pa:ss".into()))
        );
    }

    #[test]
    fn rejects_malformed_headers() {
        assert_eq!(basic_credentials("Bearer abc"), None);
        assert_eq!(basic_credentials("Basic !!!"), None);
        let no_colon = format!("Basic {}", general_purpose::STANDARD.encode("nocolon"));
        assert_eq!(basic_credentials(&no_colon), None);
    }
}
