use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::{
    error::{MintError, Result},
    mint::AdminChange,
    server::{api_error, error_response, handlers::parse_wei, ok, AppState},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/admin/fid-range", post(set_fid_range))
        .route("/api/v1/admin/prices", post(set_prices))
        .route("/api/v1/admin/paused", post(set_paused))
        .route("/api/v1/admin/pro-status", post(set_pro_status))
        .route("/api/v1/admin/max-supply", post(set_max_supply))
        .route("/api/v1/admin/pro-discount", post(set_pro_discount))
        .route("/api/v1/admin/history", get(history))
}

#[derive(Deserialize)]
pub struct FidRangeInput {
    pub min_fid: u64,
    pub max_fid: u64,
}

#[derive(Deserialize)]
pub struct PricesInput {
    pub base_price_wei: String,
    pub pro_price_wei: String,
}

#[derive(Deserialize)]
pub struct PausedInput {
    pub paused: bool,
}

#[derive(Deserialize)]
pub struct ProStatusInput {
    pub fid: u64,
    pub is_pro: bool,
}

#[derive(Deserialize)]
pub struct MaxSupplyInput {
    pub max_supply: Option<u64>,
}

#[derive(Deserialize)]
pub struct ProDiscountInput {
    pub required: bool,
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

fn header(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .trim()
        .to_string()
}

/// Compare a presented token with the configured one without an early exit.
///
/// An empty side never matches.
fn tokens_match(presented: &str, expected: &str) -> bool {
    if presented.is_empty() || expected.is_empty() {
        return false;
    }
    let (a, b) = (presented.as_bytes(), expected.as_bytes());
    let mut diff = a.len() ^ b.len();
    for i in 0..a.len().max(b.len()) {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        diff |= usize::from(x ^ y);
    }
    diff == 0
}

/// Map request headers to the ledger identity they act as.
///
/// `x-admin-token` acts as the owner. `x-oracle-token` acts as the oracle
/// and only when `allow_oracle` is set.
async fn caller(state: &AppState, headers: &HeaderMap, allow_oracle: bool) -> std::result::Result<String, Response> {
    let admin = header(headers, "x-admin-token");
    let oracle = header(headers, "x-oracle-token");

    if admin.is_empty() && oracle.is_empty() {
        return Err(api_error(StatusCode::UNAUTHORIZED, 4001, "admin auth required"));
    }

    if tokens_match(&admin, &state.admin_token) {
        return Ok(state.service.owner().await);
    }

    if allow_oracle && tokens_match(&oracle, state.oracle_token.as_deref().unwrap_or("")) {
        if let Some(actor) = state.service.oracle().await {
            return Ok(actor);
        }
    }

    Err(error_response(&MintError::Unauthorized("invalid admin credentials".to_string())))
}

async fn respond(state: &AppState, result: Result<AdminChange>) -> Response {
    match result {
        Ok(change) => {
            if let Some(notifier) = &state.notifier {
                notifier.notify_parameter_change(&change).await;
            }
            ok(change)
        }
        Err(e) => error_response(&e),
    }
}

pub async fn set_fid_range(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<FidRangeInput>,
) -> Response {
    let actor = match caller(&state, &headers, false).await {
        Ok(a) => a,
        Err(r) => return r,
    };
    let result = state.service.set_fid_range(&actor, input.min_fid, input.max_fid).await;
    respond(&state, result).await
}

pub async fn set_prices(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<PricesInput>,
) -> Response {
    let actor = match caller(&state, &headers, false).await {
        Ok(a) => a,
        Err(r) => return r,
    };
    let (base, pro) = match (parse_wei(&input.base_price_wei), parse_wei(&input.pro_price_wei)) {
        (Ok(b), Ok(p)) => (b, p),
        (Err(e), _) | (_, Err(e)) => return error_response(&e),
    };
    let result = state.service.set_prices(&actor, base, pro).await;
    respond(&state, result).await
}

pub async fn set_paused(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<PausedInput>,
) -> Response {
    let actor = match caller(&state, &headers, false).await {
        Ok(a) => a,
        Err(r) => return r,
    };
    let result = state.service.set_paused(&actor, input.paused).await;
    respond(&state, result).await
}

pub async fn set_pro_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<ProStatusInput>,
) -> Response {
    let actor = match caller(&state, &headers, true).await {
        Ok(a) => a,
        Err(r) => return r,
    };
    let result = state.service.set_pro_status(&actor, input.fid, input.is_pro).await;
    respond(&state, result).await
}

pub async fn set_max_supply(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<MaxSupplyInput>,
) -> Response {
    let actor = match caller(&state, &headers, false).await {
        Ok(a) => a,
        Err(r) => return r,
    };
    let result = state.service.set_max_supply(&actor, input.max_supply).await;
    respond(&state, result).await
}

pub async fn set_pro_discount(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<ProDiscountInput>,
) -> Response {
    let actor = match caller(&state, &headers, false).await {
        Ok(a) => a,
        Err(r) => return r,
    };
    let result = state.service.set_require_pro_for_discount(&actor, input.required).await;
    respond(&state, result).await
}

pub async fn history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HistoryQuery>,
) -> Response {
    if let Err(r) = caller(&state, &headers, false).await {
        return r;
    }
    match state.service.change_history(query.limit.or(Some(50))).await {
        Ok(changes) => ok(changes),
        Err(e) => error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::test_support::{body_json, state, ADMIN_TOKEN, ORACLE_TOKEN};
    use axum::http::HeaderValue;

    fn headers(name: &'static str, value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(name, HeaderValue::from_str(value).unwrap());
        h
    }

    #[tokio::test]
    async fn test_missing_and_wrong_credentials() {
        let s = state();
        let response = set_paused(State(s.clone()), HeaderMap::new(), Json(PausedInput { paused: true })).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = set_paused(
            State(s.clone()),
            headers("x-admin-token", "guess"),
            Json(PausedInput { paused: true }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(!s.service.params().await.paused);
    }

    #[tokio::test]
    async fn test_oracle_limited_to_pro_status() {
        let s = state();
        let response = set_paused(
            State(s.clone()),
            headers("x-oracle-token", ORACLE_TOKEN),
            Json(PausedInput { paused: true }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = set_pro_status(
            State(s.clone()),
            headers("x-oracle-token", ORACLE_TOKEN),
            Json(ProStatusInput { fid: 12, is_pro: true }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["role"], "Oracle");
        assert!(s.service.record(12).await.unwrap().is_pro);
    }

    #[tokio::test]
    async fn test_oracle_token_follows_rotated_oracle() {
        let s = state();
        s.service.set_oracle("owner", Some("oracle-v2".to_string())).await.unwrap();

        let response = set_pro_status(
            State(s.clone()),
            headers("x-oracle-token", ORACLE_TOKEN),
            Json(ProStatusInput { fid: 30, is_pro: true }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["actor"], "oracle-v2");
        assert_eq!(body["data"]["role"], "Oracle");

        s.service.set_oracle("owner", None).await.unwrap();
        let response = set_pro_status(
            State(s),
            headers("x-oracle-token", ORACLE_TOKEN),
            Json(ProStatusInput { fid: 30, is_pro: false }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_tokens_match() {
        assert!(tokens_match("admin-secret", "admin-secret"));
        assert!(!tokens_match("admin-secreT", "admin-secret"));
        assert!(!tokens_match("admin", "admin-secret"));
        assert!(!tokens_match("admin-secret-x", "admin-secret"));
        assert!(!tokens_match("", ""));
    }

    #[tokio::test]
    async fn test_invalid_prices_rejected() {
        let s = state();
        let response = set_prices(
            State(s.clone()),
            headers("x-admin-token", ADMIN_TOKEN),
            Json(PricesInput {
                base_price_wei: "5".to_string(),
                pro_price_wei: "10".to_string(),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(s.service.params().await.base_mint_price, 10);
    }

    #[tokio::test]
    async fn test_owner_updates_and_history() {
        let s = state();
        let response = set_fid_range(
            State(s.clone()),
            headers("x-admin-token", ADMIN_TOKEN),
            Json(FidRangeInput { min_fid: 10, max_fid: 20 }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = set_max_supply(
            State(s.clone()),
            headers("x-admin-token", ADMIN_TOKEN),
            Json(MaxSupplyInput { max_supply: Some(3) }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = set_pro_discount(
            State(s.clone()),
            headers("x-admin-token", ADMIN_TOKEN),
            Json(ProDiscountInput { required: false }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let params = s.service.params().await;
        assert_eq!((params.min_fid, params.max_fid), (10, 20));
        assert_eq!(params.max_supply, Some(3));
        assert!(!params.require_pro_for_discount);

        let response = history(
            State(s),
            headers("x-admin-token", ADMIN_TOKEN),
            Query(HistoryQuery { limit: None }),
        )
        .await;
        let body = body_json(response).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 3);
        assert_eq!(body["data"][0]["action"], "set_require_pro_for_discount");
    }
}
