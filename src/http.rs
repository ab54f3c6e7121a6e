//! HTTP API for the ledger
//!
//! ## Public
//! - `GET /health` - Health check with row counts
//! - `POST /farmers`, `POST /collectors` - Signup
//! - `POST /auth/login` - Exchange phone and password for a bearer token
//!
//! ## Collections (bearer token)
//! - `POST /collections` - Record a hand-off (collector, admin)
//! - `GET /collections` - List (farmers see their own)
//! - `GET /collections/{id}` - Read one
//! - `PATCH /collections/{id}/status` - Versioned status change `{status, version}`
//! - `DELETE /collections/{id}` - Admin delete
//!
//! ## Farmer views (bearer token, farmer role)
//! - `GET /farmer/history`
//! - `GET /farmer/wallet`
//!
//! ## Profiles and transactions (bearer token)
//! - `GET /farmers/{id}`, `GET /collectors/{id}`
//! - `POST /transactions`, `GET /transactions`, `GET /transactions/{id}`
//! - `PATCH /transactions/{id}/status` - Admin, unversioned
//!
//! ## Example Usage
//!
//! ```bash
//! # Verify a collection the caller last saw at version 1
//! curl -X PATCH -H "Authorization: Bearer $TOKEN" \
//!      -d '{"status":"verified","version":1}' \
//!      http://localhost:8080/collections/R1/status
//! ```

use crate::auth::extract_bearer;
use crate::auth::TokenIssuer;
use crate::db::{ActorKind, NewTransaction};
use crate::error::LedgerError;
use crate::ledger::{Collection, Identity};
use crate::services::actor_service::{LoginRequest, SignupRequest};
use crate::services::collection_service::{CreateCollectionInput, StatusUpdateRequest};
use crate::services::response::{self, HandlerResult};
use crate::services::transaction_service::TransactionStatusRequest;
use crate::services::Services;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{header, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// HTTP server state
pub struct HttpServer {
    services: Arc<Services>,
    tokens: Arc<TokenIssuer>,
    bind_addr: SocketAddr,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new(services: Arc<Services>, tokens: Arc<TokenIssuer>, bind_addr: SocketAddr) -> Self {
        Self {
            services,
            tokens,
            bind_addr,
        }
    }

    /// Run the HTTP server
    pub async fn run(self: Arc<Self>) -> Result<(), LedgerError> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        info!(addr = %self.bind_addr, "HTTP server listening");

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let server = self.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let server = server.clone();
                    async move { Ok::<_, Infallible>(server.handle_request(req).await) }
                });

                if let Err(err) = http1::Builder::new()
                    .serve_connection(io, service)
                    .await
                {
                    warn!(addr = %remote_addr, error = %err, "Connection error");
                }
            });
        }
    }

    /// Entry point for every request; never fails, errors become JSON bodies
    pub async fn handle_request<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body,
        B::Error: std::fmt::Display,
    {
        let path = req.uri().path().to_string();
        let method = req.method().clone();

        debug!(method = %method, path = %path, "Incoming request");

        if method == Method::OPTIONS {
            return response::no_content();
        }

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let identity = self.authenticate(&req);

        match self.route(&method, &segments, req, identity).await {
            Ok(response) => response,
            Err(e) => {
                match &e {
                    LedgerError::StorageUnavailable(_)
                    | LedgerError::Io(_)
                    | LedgerError::Database(_)
                    | LedgerError::Internal(_) => {
                        error!(method = %method, path = %path, error = %e, "Request error")
                    }
                    _ => debug!(method = %method, path = %path, error = %e, "Request rejected"),
                }
                response::error_response(e)
            }
        }
    }

    /// Route requests to handlers
    ///
    /// Protected routes resolve `identity` with `?`, so a missing or bad token
    /// answers 401 before any body is read.
    async fn route<B>(
        &self,
        method: &Method,
        segments: &[&str],
        req: Request<B>,
        identity: Result<Identity, LedgerError>,
    ) -> HandlerResult
    where
        B: Body,
        B::Error: std::fmt::Display,
    {
        match (method, segments) {
            (&Method::GET, ["health"]) => self.handle_health().await,

            // Accounts
            (&Method::POST, ["farmers"]) => self.handle_signup(req, ActorKind::Farmer).await,
            (&Method::POST, ["collectors"]) => self.handle_signup(req, ActorKind::Collector).await,
            (&Method::POST, ["auth", "login"]) => self.handle_login(req).await,
            (&Method::GET, ["farmers", id]) => {
                self.handle_profile(identity?, ActorKind::Farmer, id).await
            }
            (&Method::GET, ["collectors", id]) => {
                self.handle_profile(identity?, ActorKind::Collector, id).await
            }

            // Collections
            (&Method::POST, ["collections"]) => self.handle_create_collection(identity?, req).await,
            (&Method::GET, ["collections"]) => self.handle_list_collections(identity?).await,
            (&Method::GET, ["collections", id]) => self.handle_get_collection(identity?, id).await,
            (&Method::PATCH, ["collections", id, "status"]) => {
                self.handle_update_collection_status(identity?, req, id).await
            }
            (&Method::DELETE, ["collections", id]) => {
                self.handle_delete_collection(identity?, id).await
            }

            // Farmer views
            (&Method::GET, ["farmer", "history"]) => self.handle_history(identity?).await,
            (&Method::GET, ["farmer", "wallet"]) => self.handle_wallet(identity?).await,

            // Transactions
            (&Method::POST, ["transactions"]) => {
                self.handle_create_transaction(identity?, req).await
            }
            (&Method::GET, ["transactions"]) => self.handle_list_transactions(identity?).await,
            (&Method::GET, ["transactions", id]) => {
                self.handle_get_transaction(identity?, id).await
            }
            (&Method::PATCH, ["transactions", id, "status"]) => {
                self.handle_update_transaction_status(identity?, req, id).await
            }

            (_, ["health"] | ["farmers"] | ["collectors"] | ["collections"] | ["transactions"]) => {
                Ok(response::method_not_allowed())
            }
            _ => Ok(response::not_found("Not Found")),
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Resolve the caller from the bearer token
    fn authenticate<B>(&self, req: &Request<B>) -> Result<Identity, LedgerError> {
        let header = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        let token = extract_bearer(header)
            .ok_or_else(|| LedgerError::Unauthorized("Missing bearer token".into()))?;

        self.tokens.verify(token)
    }

    // =========================================================================
    // Handlers
    // =========================================================================

    /// Health check endpoint
    async fn handle_health(&self) -> HandlerResult {
        let db = Arc::clone(self.services.db());
        let stats = blocking(move || db.stats()).await?;

        Ok(response::ok(&serde_json::json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "db": stats,
        })))
    }

    /// POST /farmers, POST /collectors
    async fn handle_signup<B>(&self, req: Request<B>, kind: ActorKind) -> HandlerResult
    where
        B: Body,
        B::Error: std::fmt::Display,
    {
        let request: SignupRequest = read_json(req).await?;
        let actors = Arc::clone(&self.services.actors);
        let row = blocking(move || actors.register(kind, request)).await?;
        Ok(response::created(&row))
    }

    /// POST /auth/login
    async fn handle_login<B>(&self, req: Request<B>) -> HandlerResult
    where
        B: Body,
        B::Error: std::fmt::Display,
    {
        let request: LoginRequest = read_json(req).await?;
        let actors = Arc::clone(&self.services.actors);
        let login = blocking(move || actors.login(request)).await?;
        Ok(response::ok(&login))
    }

    /// GET /farmers/{id}, GET /collectors/{id}
    async fn handle_profile(&self, identity: Identity, kind: ActorKind, id: &str) -> HandlerResult {
        let actors = Arc::clone(&self.services.actors);
        let id = id.to_string();
        let row = blocking(move || actors.profile(&identity, kind, &id)).await?;
        Ok(response::ok(&row))
    }

    /// POST /collections
    async fn handle_create_collection<B>(
        &self,
        identity: Identity,
        req: Request<B>,
    ) -> HandlerResult
    where
        B: Body,
        B::Error: std::fmt::Display,
    {
        let input: CreateCollectionInput = read_json(req).await?;
        let collections = Arc::clone(&self.services.collections);
        let created = blocking(move || collections.create(&identity, input)).await?;

        info!(id = %created.id, farmer_id = %created.farmer_id, "Collection recorded");
        Ok(response::created(&created.view()))
    }

    /// GET /collections
    async fn handle_list_collections(&self, identity: Identity) -> HandlerResult {
        let collections = Arc::clone(&self.services.collections);
        let list = blocking(move || collections.list(&identity)).await?;

        Ok(response::ok(&serde_json::json!({
            "collections": views(&list),
            "count": list.len(),
        })))
    }

    /// GET /collections/{id}
    async fn handle_get_collection(&self, identity: Identity, id: &str) -> HandlerResult {
        let collections = Arc::clone(&self.services.collections);
        let id = id.to_string();
        let collection = blocking(move || collections.get(&identity, &id)).await?;
        Ok(response::ok(&collection.view()))
    }

    /// PATCH /collections/{id}/status
    async fn handle_update_collection_status<B>(
        &self,
        identity: Identity,
        req: Request<B>,
        id: &str,
    ) -> HandlerResult
    where
        B: Body,
        B::Error: std::fmt::Display,
    {
        let request: StatusUpdateRequest = read_json(req).await?;
        let collections = Arc::clone(&self.services.collections);
        let id = id.to_string();
        let updated = blocking(move || collections.update_status(&identity, &id, &request)).await?;
        Ok(response::ok(&updated.view()))
    }

    /// DELETE /collections/{id}
    async fn handle_delete_collection(&self, identity: Identity, id: &str) -> HandlerResult {
        let collections = Arc::clone(&self.services.collections);
        let id = id.to_string();
        let result = blocking(move || collections.delete(&identity, &id)).await;
        Ok(response::from_delete_bool_result(result, "Collection not found"))
    }

    /// GET /farmer/history
    async fn handle_history(&self, identity: Identity) -> HandlerResult {
        let collections = Arc::clone(&self.services.collections);
        let history = blocking(move || collections.history(&identity)).await?;

        Ok(response::ok(&serde_json::json!({
            "farmer_id": history.farmer_id,
            "collections": views(&history.collections),
            "count": history.count,
            "retrieved_at": history.retrieved_at,
        })))
    }

    /// GET /farmer/wallet
    async fn handle_wallet(&self, identity: Identity) -> HandlerResult {
        let farmer_id = identity.subject_id.clone();
        let collections = Arc::clone(&self.services.collections);
        let wallet = blocking(move || collections.wallet(&identity)).await?;

        Ok(response::ok(&serde_json::json!({
            "farmer_id": farmer_id,
            "wallet": wallet,
        })))
    }

    /// POST /transactions
    async fn handle_create_transaction<B>(
        &self,
        identity: Identity,
        req: Request<B>,
    ) -> HandlerResult
    where
        B: Body,
        B::Error: std::fmt::Display,
    {
        let input: NewTransaction = read_json(req).await?;
        let transactions = Arc::clone(&self.services.transactions);
        let tx = blocking(move || transactions.create(&identity, input)).await?;
        Ok(response::created(&tx))
    }

    /// GET /transactions
    async fn handle_list_transactions(&self, identity: Identity) -> HandlerResult {
        let transactions = Arc::clone(&self.services.transactions);
        let list = blocking(move || transactions.list(&identity)).await?;

        Ok(response::ok(&serde_json::json!({
            "transactions": list,
            "count": list.len(),
        })))
    }

    /// GET /transactions/{id}
    async fn handle_get_transaction(&self, identity: Identity, id: &str) -> HandlerResult {
        let transactions = Arc::clone(&self.services.transactions);
        let id = id.to_string();
        let result = blocking(move || transactions.get(&identity, &id)).await;
        Ok(response::from_result(result))
    }

    /// PATCH /transactions/{id}/status
    async fn handle_update_transaction_status<B>(
        &self,
        identity: Identity,
        req: Request<B>,
        id: &str,
    ) -> HandlerResult
    where
        B: Body,
        B::Error: std::fmt::Display,
    {
        let request: TransactionStatusRequest = read_json(req).await?;
        let transactions = Arc::clone(&self.services.transactions);
        let id = id.to_string();
        let result = blocking(move || transactions.update_status(&identity, &id, &request)).await;
        Ok(response::from_result(result))
    }
}

/// Run a synchronous store call off the async workers
async fn blocking<T, F>(f: F) -> Result<T, LedgerError>
where
    F: FnOnce() -> Result<T, LedgerError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| LedgerError::Internal(format!("Blocking task failed: {}", e)))?
}

/// Read and parse a JSON request body
async fn read_json<T, B>(req: Request<B>) -> Result<T, LedgerError>
where
    T: DeserializeOwned,
    B: Body,
    B::Error: std::fmt::Display,
{
    let body = req
        .into_body()
        .collect()
        .await
        .map_err(|e| LedgerError::InvalidInput(format!("Failed to read body: {}", e)))?
        .to_bytes();

    if body.is_empty() {
        return Err(LedgerError::InvalidInput("Request body is required".into()));
    }

    Ok(serde_json::from_slice(&body)?)
}

fn views(collections: &[Collection]) -> Vec<serde_json::Value> {
    collections
        .iter()
        .filter_map(|c| serde_json::to_value(c.view()).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::LedgerDb;

    fn server() -> HttpServer {
        let tokens = Arc::new(TokenIssuer::new_dev(3600));
        let db = Arc::new(LedgerDb::open_in_memory().unwrap());
        let services = Arc::new(Services::new(db, Arc::clone(&tokens), &Config::default()));
        HttpServer::new(services, tokens, "127.0.0.1:0".parse().unwrap())
    }

    fn request(
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: serde_json::Value,
    ) -> Request<Full<Bytes>> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = if body.is_null() {
            Bytes::new()
        } else {
            Bytes::from(body.to_string())
        };
        builder.body(Full::new(body)).unwrap()
    }

    async fn send(
        server: &HttpServer,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let resp = server.handle_request(request(method, uri, token, body)).await;
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn call(
        server: &HttpServer,
        method: Method,
        uri: &str,
        token: Option<&str>,
    ) -> (StatusCode, serde_json::Value) {
        send(server, method, uri, token, serde_json::Value::Null).await
    }

    async fn signup_and_login(server: &HttpServer, role: &str, phone: &str) -> (String, String) {
        let path = format!("/{}s", role);
        let (status, actor) = send(
            server,
            Method::POST,
            &path,
            None,
            serde_json::json!({"name": "Amina", "phone": phone, "password": "harvest-pass"}),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, login) = send(
            server,
            Method::POST,
            "/auth/login",
            None,
            serde_json::json!({"phone": phone, "password": "harvest-pass", "role": role}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        (
            actor["id"].as_str().unwrap().to_string(),
            login["token"].as_str().unwrap().to_string(),
        )
    }

    #[tokio::test]
    async fn test_health() {
        let server = server();
        let (status, body) = call(&server, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["db"]["collection_count"], 0);
    }

    #[tokio::test]
    async fn test_options_and_unknown_routes() {
        let server = server();
        let (status, _) = call(&server, Method::OPTIONS, "/collections", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = call(&server, Method::GET, "/nowhere", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&server, Method::PUT, "/collections", None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_protected_routes_need_token() {
        let server = server();
        let (status, _) = call(&server, Method::GET, "/collections", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call(&server, Method::GET, "/collections", Some("garbage")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_status_update_flow() {
        let server = server();
        let (farmer_id, farmer_token) = signup_and_login(&server, "farmer", "0711000001").await;
        let (collector_id, collector_token) =
            signup_and_login(&server, "collector", "0722000001").await;

        let (status, created) = send(
            &server,
            Method::POST,
            "/collections",
            Some(&collector_token),
            serde_json::json!({
                "id": "R1",
                "farmer_id": farmer_id,
                "crop_type": "Tea",
                "weight_kg": 12.5,
                "price_per_kg": 2.0,
            }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["version"], 1);
        assert_eq!(created["status"], "pending");
        assert_eq!(created["collector_id"], collector_id.as_str());
        assert_eq!(created["value"], 25.0);

        let verify = serde_json::json!({"status": "verified", "version": 1});
        let (status, updated) = send(
            &server,
            Method::PATCH,
            "/collections/R1/status",
            Some(&collector_token),
            verify.clone(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["version"], 2);

        // Replaying the same request is stale
        let (status, conflict) = send(
            &server,
            Method::PATCH,
            "/collections/R1/status",
            Some(&collector_token),
            verify,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(conflict["current"]["version"], 2);
        assert_eq!(conflict["current"]["status"], "verified");

        // Farmers are read-only
        let (status, _) = send(
            &server,
            Method::PATCH,
            "/collections/R1/status",
            Some(&farmer_token),
            serde_json::json!({"status": "paid", "version": 2}),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(
            &server,
            Method::PATCH,
            "/collections/R1/status",
            Some(&collector_token),
            serde_json::json!({"status": "shipped", "version": 2}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &server,
            Method::PATCH,
            "/collections/missing/status",
            Some(&collector_token),
            serde_json::json!({"status": "paid", "version": 1}),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, history) =
            call(&server, Method::GET, "/farmer/history", Some(&farmer_token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history["count"], 1);

        let (status, wallet) =
            call(&server, Method::GET, "/farmer/wallet", Some(&farmer_token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(wallet["wallet"]["total_pending"], 25.0);
        assert_eq!(wallet["wallet"]["currency"], "USD");
    }

    #[tokio::test]
    async fn test_farmer_profile_only_for_self() {
        let server = server();
        let (farmer_id, farmer_token) = signup_and_login(&server, "farmer", "0711000003").await;
        let (collector_id, collector_token) =
            signup_and_login(&server, "collector", "0722000003").await;
        let farmer_path = format!("/farmers/{}", farmer_id);

        let (status, profile) = call(&server, Method::GET, &farmer_path, Some(&farmer_token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["phone"], "0711000003");
        assert!(profile.get("password_hash").is_none());

        let (status, _) = call(&server, Method::GET, &farmer_path, Some(&collector_token)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let collector_path = format!("/collectors/{}", collector_id);
        let (status, _) = call(&server, Method::GET, &collector_path, Some(&farmer_token)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_admin_delete() {
        let server = server();
        let admin_token = server.tokens.issue(&Identity::admin("A1")).unwrap();
        let (farmer_id, _) = signup_and_login(&server, "farmer", "0711000002").await;
        let (collector_id, collector_token) =
            signup_and_login(&server, "collector", "0722000002").await;

        let (status, _) = send(
            &server,
            Method::POST,
            "/collections",
            Some(&admin_token),
            serde_json::json!({
                "id": "R2",
                "farmer_id": farmer_id,
                "collector_id": collector_id,
                "crop_type": "Coffee",
                "weight_kg": 3.0,
                "price_per_kg": 4.0,
            }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) =
            call(&server, Method::DELETE, "/collections/R2", Some(&collector_token)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) =
            call(&server, Method::DELETE, "/collections/R2", Some(&admin_token)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) =
            call(&server, Method::DELETE, "/collections/R2", Some(&admin_token)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_transactions() {
        let server = server();
        let admin_token = server.tokens.issue(&Identity::admin("A1")).unwrap();
        let collector_token = server.tokens.issue(&Identity::collector("C9")).unwrap();

        let (status, tx) = send(
            &server,
            Method::POST,
            "/transactions",
            Some(&collector_token),
            serde_json::json!({
                "farmerId": "F9",
                "crop": "Milk",
                "weightKg": 10.0,
                "unitPrice": 0.5
            }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(tx["totalValue"], 5.0);
        assert_eq!(tx["collectorId"], "C9");

        let path = format!("/transactions/{}/status", tx["id"].as_str().unwrap());
        let (status, paid) = send(
            &server,
            Method::PATCH,
            &path,
            Some(&admin_token),
            serde_json::json!({"status": "paid"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(paid["status"], "paid");

        let (status, list) =
            call(&server, Method::GET, "/transactions", Some(&collector_token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list["count"], 1);
    }
}
