//! Bearer tokens carrying `(subject_id, role)`
//!
//! HS256-signed JWTs. Verification yields an [`Identity`]; the ledger never
//! looks at tokens itself.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::ledger::{Identity, Role};

/// Minimum accepted secret length
pub const MIN_SECRET_LEN: usize = 32;

/// Payload stored in the token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub role: Role,
    pub iat: u64,
    pub exp: u64,
}

/// Issues and verifies bearer tokens
#[derive(Clone)]
pub struct TokenIssuer {
    secret: String,
    ttl_secs: u64,
}

impl TokenIssuer {
    pub fn new(secret: String, ttl_secs: u64) -> Result<Self, LedgerError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(LedgerError::Config(format!(
                "jwt secret must be at least {} characters",
                MIN_SECRET_LEN
            )));
        }
        Ok(Self { secret, ttl_secs })
    }

    /// Issuer with a fixed local-development secret
    pub fn new_dev(ttl_secs: u64) -> Self {
        Self {
            secret: "harvest-ledger-dev-secret-not-for-production".into(),
            ttl_secs,
        }
    }

    pub fn issue(&self, identity: &Identity) -> Result<String, LedgerError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| LedgerError::Auth(format!("System time error: {}", e)))?
            .as_secs();

        let claims = Claims {
            user_id: identity.subject_id.clone(),
            role: identity.role,
            iat: now,
            exp: now + self.ttl_secs,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| LedgerError::Auth(format!("Failed to generate token: {}", e)))
    }

    pub fn verify(&self, token: &str) -> Result<Identity, LedgerError> {
        match decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        ) {
            Ok(data) => Ok(Identity::new(data.claims.user_id, data.claims.role)),
            Err(err) => {
                use jsonwebtoken::errors::ErrorKind;
                let msg = match err.kind() {
                    ErrorKind::ExpiredSignature => "Token expired",
                    ErrorKind::InvalidSignature => "Invalid signature",
                    _ => "Invalid token",
                };
                Err(LedgerError::Unauthorized(msg.into()))
            }
        }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header
pub fn extract_bearer(header: Option<&str>) -> Option<&str> {
    let token = header?.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_verify() {
        let issuer = TokenIssuer::new_dev(3600);
        let token = issuer.issue(&Identity::collector("C1")).unwrap();
        assert_eq!(issuer.verify(&token).unwrap(), Identity::collector("C1"));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let a = TokenIssuer::new("a".repeat(40), 3600).unwrap();
        let b = TokenIssuer::new("b".repeat(40), 3600).unwrap();
        let token = a.issue(&Identity::admin("A1")).unwrap();
        assert!(matches!(b.verify(&token), Err(LedgerError::Unauthorized(_))));
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(TokenIssuer::new("short".into(), 3600).is_err());
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer(Some("Bearer abc")), Some("abc"));
        assert_eq!(extract_bearer(Some("Bearer ")), None);
        assert_eq!(extract_bearer(Some("Basic abc")), None);
        assert_eq!(extract_bearer(None), None);
    }
}
