use axum::{
    extract::{Path, State},
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    error::MintError,
    mint::{MintReceipt, MintingParameters},
    server::{error_response, ok, AppState},
    storage::models::wei_string,
};

#[derive(Serialize)]
pub struct HealthData {
    pub service: &'static str,
    pub version: &'static str,
    pub status: &'static str,
    pub minted: u64,
    pub paused: bool,
}

#[derive(Serialize)]
pub struct ParamsData {
    pub min_fid: u64,
    pub max_fid: u64,
    #[serde(with = "wei_string")]
    pub base_mint_price: u128,
    #[serde(with = "wei_string")]
    pub pro_mint_price: u128,
    pub max_supply: Option<u64>,
    pub current_supply: u64,
    pub paused: bool,
    pub require_pro_for_discount: bool,
}

impl From<MintingParameters> for ParamsData {
    fn from(p: MintingParameters) -> Self {
        Self {
            min_fid: p.min_fid,
            max_fid: p.max_fid,
            base_mint_price: p.base_mint_price,
            pro_mint_price: p.pro_mint_price,
            max_supply: p.max_supply,
            current_supply: p.current_supply,
            paused: p.paused,
            require_pro_for_discount: p.require_pro_for_discount,
        }
    }
}

#[derive(Deserialize)]
pub struct MintRequest {
    pub fid: u64,
    /// Payment in wei, as a decimal string.
    pub payment_wei: String,
}

#[derive(Serialize)]
pub struct MintData {
    pub fid: u64,
    pub token_id: u64,
    #[serde(with = "wei_string")]
    pub price: u128,
    pub is_pro: bool,
    pub current_supply: u64,
}

impl From<MintReceipt> for MintData {
    fn from(r: MintReceipt) -> Self {
        Self {
            fid: r.fid,
            token_id: r.token_id,
            price: r.price,
            is_pro: r.is_pro,
            current_supply: r.current_supply,
        }
    }
}

pub fn parse_wei(value: &str) -> Result<u128, MintError> {
    value
        .trim()
        .parse::<u128>()
        .map_err(|_| MintError::InvalidAmount(format!("not a wei amount: {}", value)))
}

pub async fn root() -> Response {
    ok("fid-mint backend is running")
}

pub async fn health(State(state): State<AppState>) -> Response {
    let params = state.service.params().await;
    ok(HealthData {
        service: "fid-mint",
        version: env!("CARGO_PKG_VERSION"),
        status: "UP",
        minted: params.current_supply,
        paused: params.paused,
    })
}

pub async fn params(State(state): State<AppState>) -> Response {
    ok(ParamsData::from(state.service.params().await))
}

pub async fn stats(State(state): State<AppState>) -> Response {
    match state.service.stats().await {
        Ok(stats) => ok(stats),
        Err(e) => error_response(&e),
    }
}

pub async fn user(State(state): State<AppState>, Path(fid): Path<u64>) -> Response {
    match state.identity.lookup(fid).await {
        Ok(identity) => ok(identity),
        Err(e) => {
            warn!("User lookup for FID {} failed: {}", fid, e);
            error_response(&e)
        }
    }
}

pub async fn eligibility(State(state): State<AppState>, Path(fid): Path<u64>) -> Response {
    if fid == 0 {
        return error_response(&MintError::InvalidFid("FID must be positive".to_string()));
    }
    ok(state.service.quote(fid).await)
}

/// Refresh Pro status from the identity provider, then mint.
///
/// The refresh is skipped when no provider key or oracle identity is
/// configured; the stored flag is used instead.
pub async fn mint(State(state): State<AppState>, Json(req): Json<MintRequest>) -> Response {
    let payment = match parse_wei(&req.payment_wei) {
        Ok(p) => p,
        Err(e) => return error_response(&e),
    };

    if let Err(e) = state.service.precheck(req.fid).await {
        return error_response(&e);
    }

    let oracle = match state.identity.is_configured() {
        true => state.service.oracle().await,
        false => None,
    };
    if let Some(oracle) = oracle.as_deref() {
        let identity = match state.identity.lookup(req.fid).await {
            Ok(identity) => identity,
            Err(e) => {
                warn!("Identity lookup for FID {} failed: {}", req.fid, e);
                return error_response(&e);
            }
        };
        let known_pro = state.service.record(req.fid).await.map(|r| r.is_pro).unwrap_or(false);
        if identity.is_pro != known_pro {
            if let Err(e) = state.service.set_pro_status(oracle, req.fid, identity.is_pro).await {
                return error_response(&e);
            }
        }
    }

    match state.service.attempt_mint(req.fid, payment).await {
        Ok(receipt) => {
            info!("Mint succeeded for FID {} (token {})", receipt.fid, receipt.token_id);
            if let Some(notifier) = &state.notifier {
                notifier.notify_mint(&receipt).await;
            }
            ok(MintData::from(receipt))
        }
        Err(e) => error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::test_support::{body_json, state};
    use axum::http::StatusCode;

    fn mint_req(fid: u64, payment: &str) -> Json<MintRequest> {
        Json(MintRequest {
            fid,
            payment_wei: payment.to_string(),
        })
    }

    #[tokio::test]
    async fn test_health_and_params() {
        let s = state();
        let body = body_json(health(State(s.clone())).await).await;
        assert_eq!(body["data"]["status"], "UP");

        let body = body_json(params(State(s)).await).await;
        assert_eq!(body["data"]["base_mint_price"], "10");
        assert_eq!(body["data"]["max_fid"], 100);
    }

    #[tokio::test]
    async fn test_mint_scenarios() {
        let s = state();

        let response = mint(State(s.clone()), mint_req(50, "10")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["token_id"], 0);
        assert_eq!(body["data"]["current_supply"], 1);

        let response = mint(State(s.clone()), mint_req(50, "10")).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["code"], 2002);

        let response = mint(State(s.clone()), mint_req(200, "10")).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["code"], 2001);

        let response = mint(State(s.clone()), mint_req(60, "4")).await;
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);

        let response = mint(State(s.clone()), mint_req(60, "ten")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        s.service.set_paused("owner", true).await.unwrap();
        let response = mint(State(s), mint_req(50, "10")).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["code"], 2004);
    }

    #[tokio::test]
    async fn test_eligibility_quote() {
        let s = state();
        s.service.set_pro_status("oracle", 60, true).await.unwrap();

        let body = body_json(eligibility(State(s.clone()), Path(60)).await).await;
        assert_eq!(body["data"]["eligible"], true);
        assert_eq!(body["data"]["price"], "5");

        let response = eligibility(State(s), Path(0)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_parse_wei() {
        assert_eq!(parse_wei(" 1000 ").unwrap(), 1000);
        assert!(matches!(parse_wei("-1"), Err(MintError::InvalidAmount(_))));
        assert!(parse_wei("1.5").is_err());
    }
}
