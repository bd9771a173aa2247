//! Login and access tokens
//!
//! A successful `POST /api/login` yields an HS256 JWT carrying the user name
//! and an expiry. Protected routes accept `Authorization: Bearer <jwt>`.
//! Without a configured signing secret a random one is generated per process,
//! so tokens do not survive a restart.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use labeler_common::config::AuthConfig;
use labeler_common::models::LoginResponse;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

const GENERATED_SECRET_LENGTH: usize = 48;

/// Token claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User name
    pub sub: String,
    /// Expiration time (Unix seconds)
    pub exp: u64,
    /// Issued at (Unix seconds)
    #[serde(default)]
    pub iat: u64,
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Failed to sign token: {0}")]
    Signing(String),
}

/// Checks credentials, issues tokens and validates them
#[derive(Clone)]
pub struct Authenticator {
    username: String,
    password: String,
    token_ttl_secs: u64,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authenticator")
            .field("username", &self.username)
            .field("token_ttl_secs", &self.token_ttl_secs)
            .finish_non_exhaustive()
    }
}

impl Authenticator {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = match &config.jwt_secret {
            Some(secret) => secret.clone(),
            None => {
                warn!("No JWT secret configured; tokens are valid until restart only");
                generate_secret()
            }
        };
        Self::with_secret(&config.username, &config.password, &secret, config.token_ttl_secs)
    }

    pub fn with_secret(username: &str, password: &str, secret: &str, token_ttl_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        Self {
            username: username.to_string(),
            password: password.to_string(),
            token_ttl_secs,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Check credentials and issue a token
    pub fn login(&self, username: &str, password: &str) -> Result<LoginResponse, AuthError> {
        // Both comparisons always run
        let user_ok = constant_time_eq(username.as_bytes(), self.username.as_bytes());
        let pass_ok = constant_time_eq(password.as_bytes(), self.password.as_bytes());
        if !(user_ok & pass_ok) {
            warn!("Failed login for user '{}'", username);
            return Err(AuthError::InvalidCredentials);
        }

        let access_token = self.issue(username)?;
        info!("User '{}' logged in", username);

        Ok(LoginResponse {
            access_token,
            token_type: "bearer".to_string(),
            expires_in: self.token_ttl_secs,
        })
    }

    /// Sign a token for `subject` expiring after the configured lifetime
    pub fn issue(&self, subject: &str) -> Result<String, AuthError> {
        let now = Utc::now().timestamp().max(0) as u64;
        let claims = Claims {
            sub: subject.to_string(),
            exp: now + self.token_ttl_secs,
            iat: now,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Validate a token (without the `Bearer ` prefix)
    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        debug!("Token validated for {}", data.claims.sub);
        Ok(data.claims)
    }
}

fn generate_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_SECRET_LENGTH)
        .map(char::from)
        .collect()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "a-test-signing-key-that-is-long-enough-0123";

    fn authenticator() -> Authenticator {
        Authenticator::with_secret("user", "hunter2", SECRET, 3600)
    }

    #[test]
    fn test_login_issues_valid_token() {
        let auth = authenticator();
        let response = auth.login("user", "hunter2").unwrap();

        assert_eq!(response.token_type, "bearer");
        assert_eq!(response.expires_in, 3600);

        let claims = auth.validate(&response.access_token).unwrap();
        assert_eq!(claims.sub, "user");
        assert_eq!(claims.exp, claims.iat + 3600);
    }

    #[test]
    fn test_login_rejects_bad_credentials() {
        let auth = authenticator();
        assert!(matches!(
            auth.login("user", "wrong"),
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("admin", "hunter2"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_token_from_other_secret_rejected() {
        let other = Authenticator::with_secret("user", "hunter2", "another-signing-key-that-is-long-enough", 3600);
        let token = other.issue("user").unwrap();

        assert!(matches!(
            authenticator().validate(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let auth = authenticator();
        let now = Utc::now().timestamp() as u64;
        let claims = Claims {
            sub: "user".to_string(),
            exp: now - 7200,
            iat: now - 10800,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(auth.validate(&token).is_err());
    }

    #[test]
    fn test_garbage_token_rejected() {
        assert!(authenticator().validate("not.a.jwt").is_err());
    }

    #[test]
    fn test_generated_secrets_differ() {
        let a = generate_secret();
        let b = generate_secret();
        assert_eq!(a.len(), GENERATED_SECRET_LENGTH);
        assert_ne!(a, b);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secreT"));
        assert!(!constant_time_eq(b"secret", b"secrets"));
    }
}
