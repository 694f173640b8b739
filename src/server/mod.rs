pub mod admin;
pub mod handlers;

use std::{net::SocketAddr, sync::Arc};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    config::Config,
    error::{ErrorKind, MintError, Result},
    identity::IdentityClient,
    mint::MintService,
    telegram::AutoNotifier,
};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MintService>,
    pub identity: Arc<IdentityClient>,
    pub notifier: Option<Arc<AutoNotifier>>,
    pub admin_token: String,
    pub oracle_token: Option<String>,
}

impl AppState {
    pub fn new(config: &Config, service: Arc<MintService>, identity: Arc<IdentityClient>) -> Self {
        Self {
            service,
            identity,
            notifier: AutoNotifier::new(config).map(Arc::new),
            admin_token: config.server.admin_token.clone(),
            oracle_token: config.server.oracle_token.clone(),
        }
    }
}

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub code: u32,
    pub message: String,
    pub data: T,
}

#[derive(Serialize)]
pub struct ApiError {
    pub code: u32,
    pub message: String,
    pub trace_id: String,
}

pub fn ok<T: Serialize>(data: T) -> Response {
    Json(ApiResponse {
        code: 0,
        message: "ok".to_string(),
        data,
    })
    .into_response()
}

pub fn api_error(status: StatusCode, code: u32, message: &str) -> Response {
    (
        status,
        Json(ApiError {
            code,
            message: message.to_string(),
            trace_id: Uuid::new_v4().to_string(),
        }),
    )
        .into_response()
}

pub fn status_for(err: &MintError) -> StatusCode {
    match err.kind() {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Eligibility => StatusCode::CONFLICT,
        ErrorKind::Payment => StatusCode::PAYMENT_REQUIRED,
        ErrorKind::Authorization => StatusCode::FORBIDDEN,
        ErrorKind::Invariant => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Infrastructure => match err {
            MintError::Identity(_) | MintError::Http(_) => StatusCode::BAD_GATEWAY,
            MintError::ConcurrentUpdate { .. } => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

pub fn error_response(err: &MintError) -> Response {
    let status = status_for(err);
    if status.is_server_error() {
        error!("Request failed: {}", err);
    }
    api_error(status, err.code(), &err.to_string())
}

pub fn build_router(state: AppState, cors_allow_any: bool) -> Router {
    let router = Router::new()
        .route("/", get(handlers::root))
        .route("/api/v1/health", get(handlers::health))
        .route("/api/v1/params", get(handlers::params))
        .route("/api/v1/stats", get(handlers::stats))
        .route("/api/v1/user/:fid", get(handlers::user))
        .route("/api/v1/eligibility/:fid", get(handlers::eligibility))
        .route("/api/v1/mint", post(handlers::mint))
        .merge(admin::router());

    let router = if cors_allow_any {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.with_state(state)
}

pub async fn serve(config: &Config, service: Arc<MintService>) -> Result<()> {
    let identity = Arc::new(IdentityClient::new(&config.identity)?);
    let state = AppState::new(config, service, identity);
    let app = build_router(state, config.server.cors_allow_any);

    let addr: SocketAddr = config
        .server
        .bind_address
        .parse()
        .map_err(|e| MintError::Config(format!("Invalid bind_address: {}", e)))?;
    info!("fid-mint listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| MintError::Other(e.into()))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| MintError::Other(e.into()))?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::{sync::Arc, time::Duration};

    use axum::{body::to_bytes, response::Response};

    use super::AppState;
    use crate::{
        config::IdentityConfig,
        identity::IdentityClient,
        mint::{MintLedger, MintService, MintedMirror, MintingParameters},
        storage::Database,
    };

    pub const ADMIN_TOKEN: &str = "admin-secret";
    pub const ORACLE_TOKEN: &str = "oracle-secret";

    pub fn state() -> AppState {
        let params = MintingParameters::new(1, 100, 10, 5, None).unwrap();
        let ledger = MintLedger::new(params, "owner", Some("oracle".to_string())).unwrap();
        let db = Database::in_memory().unwrap();
        db.save_ledger(&ledger).unwrap();
        let service = MintService::new(ledger, db, MintedMirror::new(Duration::from_secs(60), 100));

        AppState {
            service: Arc::new(service),
            identity: Arc::new(IdentityClient::new(&IdentityConfig::default()).unwrap()),
            notifier: None,
            admin_token: ADMIN_TOKEN.to_string(),
            oracle_token: Some(ORACLE_TOKEN.to_string()),
        }
    }

    pub async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}
