//! Credentials for the ledger
//!
//! Provides:
//! - Bearer token issuance and verification (JWT, HS256)
//! - Password hashing with Argon2

pub mod password;
pub mod token;

pub use password::{hash_password, validate_password, verify_password};
pub use token::{extract_bearer, Claims, TokenIssuer};
