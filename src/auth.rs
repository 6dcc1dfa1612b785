use axum::http::{header, HeaderMap};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::models::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: usize,
}

/// The authenticated caller, inserted into request extensions by the role
/// gate middleware.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

/// Pull the token from the `token` cookie, falling back to a bearer header.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    cookie_value(headers, "token").or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned)
    })
}

pub fn authenticate(config: &AppConfig, headers: &HeaderMap) -> AppResult<AuthUser> {
    let token = extract_token(headers)
        .ok_or_else(|| AppError::Unauthorized("Authentication token not provided.".to_string()))?;

    let decoded = decode::<Claims>(
        &token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthorized("Invalid or expired token.".to_string()))?;

    let id = Uuid::parse_str(&decoded.claims.sub)
        .map_err(|_| AppError::Unauthorized("Invalid or expired token.".to_string()))?;

    Ok(AuthUser {
        id,
        role: decoded.claims.role,
    })
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn test_config(secret: &str) -> AppConfig {
        let mut config = AppConfig::from_env();
        config.jwt_secret = secret.to_string();
        config
    }

    fn token_for(secret: &str, role: Role) -> String {
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            role,
            exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("token encodes")
    }

    #[test]
    fn reads_token_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; token=abc123; lang=en"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn falls_back_to_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer xyz789"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("xyz789"));

        let empty = HeaderMap::new();
        assert!(extract_token(&empty).is_none());
    }

    #[test]
    fn authenticates_a_valid_token() {
        let config = test_config("unit-test-secret");
        let mut headers = HeaderMap::new();
        let token = token_for("unit-test-secret", Role::Manager);
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("token={token}")).expect("header"),
        );

        let user = authenticate(&config, &headers).expect("authenticates");
        assert_eq!(user.role, Role::Manager);
    }

    #[test]
    fn rejects_a_token_signed_with_another_secret() {
        let config = test_config("unit-test-secret");
        let mut headers = HeaderMap::new();
        let token = token_for("some-other-secret", Role::Admin);
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).expect("header"),
        );

        assert!(matches!(
            authenticate(&config, &headers),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn rejects_a_missing_token() {
        let config = test_config("unit-test-secret");
        assert!(matches!(
            authenticate(&config, &HeaderMap::new()),
            Err(AppError::Unauthorized(_))
        ));
    }
}
