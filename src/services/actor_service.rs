//! Actor service - signup, login and profiles for farmers and collectors

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::auth::{hash_password, validate_password, verify_password, TokenIssuer};
use crate::db::{actors, ActorKind, ActorRow, LedgerDb, NewActor};
use crate::error::LedgerError;
use crate::ledger::{Identity, Role};

use super::events::{EventBus, LedgerEvent};

/// Signup body
#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub phone: String,
    pub password: String,
}

/// Login body
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub phone: String,
    pub password: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    pub role: Role,
}

const INVALID_CREDENTIALS: &str = "Invalid phone or password";

pub struct ActorService {
    db: Arc<LedgerDb>,
    tokens: Arc<TokenIssuer>,
    events: Arc<EventBus>,
}

impl ActorService {
    pub fn new(db: Arc<LedgerDb>, tokens: Arc<TokenIssuer>, events: Arc<EventBus>) -> Self {
        Self { db, tokens, events }
    }

    /// Register a farmer or collector
    pub fn register(
        &self,
        kind: ActorKind,
        request: SignupRequest,
    ) -> Result<ActorRow, LedgerError> {
        if request.name.trim().is_empty() {
            return Err(LedgerError::InvalidInput("name is required".into()));
        }
        if request.phone.trim().is_empty() {
            return Err(LedgerError::InvalidInput("phone is required".into()));
        }
        validate_password(&request.password)?;

        let password_hash = hash_password(&request.password)?;
        let row = self.db.with_conn_mut(|conn| {
            actors::create_actor(conn, kind, NewActor {
                id: request.id,
                name: request.name.trim().to_string(),
                phone: request.phone.trim().to_string(),
                password_hash,
            })
        })?;

        info!(id = %row.id, role = kind.label(), "Actor registered");
        self.events.emit(LedgerEvent::ActorRegistered {
            id: row.id.clone(),
            role: kind.label(),
        });

        Ok(row)
    }

    /// Check credentials and issue a bearer token
    pub fn login(&self, request: LoginRequest) -> Result<LoginResponse, LedgerError> {
        let role: Role = request.role.parse().map_err(LedgerError::InvalidInput)?;
        let kind = match role {
            Role::Farmer => ActorKind::Farmer,
            Role::Collector => ActorKind::Collector,
            Role::Admin => {
                return Err(LedgerError::Forbidden(
                    "admin login is not available; use an issued admin token".into(),
                ));
            }
        };

        let actor = self
            .db
            .with_conn(|conn| actors::get_actor_by_phone(conn, kind, request.phone.trim()))?
            .ok_or_else(|| {
                debug!(role = %role, "Login for unknown phone");
                LedgerError::Unauthorized(INVALID_CREDENTIALS.into())
            })?;

        if !verify_password(&request.password, &actor.password_hash)? {
            debug!(id = %actor.id, "Login with wrong password");
            return Err(LedgerError::Unauthorized(INVALID_CREDENTIALS.into()));
        }

        let token = self.tokens.issue(&Identity::new(actor.id.clone(), role))?;
        Ok(LoginResponse {
            token,
            user_id: actor.id,
            role,
        })
    }

    /// Profile of a farmer or collector
    ///
    /// Farmer profiles are visible only to the farmer themselves; collector
    /// profiles to any authenticated caller.
    pub fn profile(
        &self,
        identity: &Identity,
        kind: ActorKind,
        id: &str,
    ) -> Result<ActorRow, LedgerError> {
        let is_self = identity.role == Role::Farmer && identity.subject_id == id;
        if kind == ActorKind::Farmer && !is_self {
            return Err(LedgerError::Forbidden("You can only view your own profile".into()));
        }

        self.db
            .with_conn(|conn| actors::get_actor(conn, kind, id))?
            .ok_or_else(|| LedgerError::NotFound(format!("{} {} not found", kind.label(), id)))
    }
}
