use axum::{
    Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};

use super::auth::{self, AuthError};
use super::competition::competition_status;
use super::db;
use super::error::LeaderboardError;
use super::positions::{SettledOrder, SettledTradeSummary};
use super::server::AppState;
use super::service::LadderQuery;
use super::types::*;
use crate::config::Config;

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

/// A ladder request with every default applied.
#[derive(Debug, PartialEq, Eq)]
pub struct WindowRequest {
    pub query: LadderQuery,
    pub offset: u32,
    pub page_size: u32,
}

/// Applies the chain, window and paging defaults shared by every ladder endpoint.
pub fn resolve_window(
    params: &LeaderboardParams,
    config: &Config,
) -> Result<WindowRequest, LeaderboardError> {
    let chain = match params.chain.as_deref() {
        None => Chain::Arbitrum,
        Some(raw) => Chain::from_param(raw).ok_or_else(|| {
            LeaderboardError::InvalidParams(format!(
                "unknown chain {raw:?}. Allowed: arbitrum, avalanche"
            ))
        })?,
    };
    let from = params.from.unwrap_or(config.competition_start);
    let to = params.to.unwrap_or(config.competition_end);
    if from >= to {
        return Err(LeaderboardError::InvalidParams(
            "`from` must be before `to`".into(),
        ));
    }
    let page_size = params
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    Ok(WindowRequest {
        query: LadderQuery { chain, from, to },
        offset: params.offset.unwrap_or(0),
        page_size,
    })
}

pub async fn leaderboard(
    State(state): State<AppState>,
    Query(params): Query<LeaderboardParams>,
) -> Result<impl IntoResponse, LeaderboardError> {
    let req = resolve_window(&params, &state.config)?;
    let page = state
        .ladder
        .page(req.query, req.offset, req.page_size)
        .await?;
    Ok(Json(page))
}

async fn settled_ladder(
    state: AppState,
    params: LeaderboardParams,
    order: SettledOrder,
) -> Result<Json<Page<SettledTradeSummary>>, LeaderboardError> {
    let req = resolve_window(&params, &state.config)?;
    let page = state
        .ladder
        .settled_page(req.query, order, req.offset, req.page_size)
        .await?;
    Ok(Json(page))
}

pub async fn highest_percentage(
    State(state): State<AppState>,
    Query(params): Query<LeaderboardParams>,
) -> Result<impl IntoResponse, LeaderboardError> {
    settled_ladder(state, params, SettledOrder::Highest).await
}

pub async fn lowest_percentage(
    State(state): State<AppState>,
    Query(params): Query<LeaderboardParams>,
) -> Result<impl IntoResponse, LeaderboardError> {
    settled_ladder(state, params, SettledOrder::Lowest).await
}

pub async fn open_positions(
    State(state): State<AppState>,
    Query(params): Query<LeaderboardParams>,
) -> Result<impl IntoResponse, LeaderboardError> {
    let req = resolve_window(&params, &state.config)?;
    let page = state
        .ladder
        .open_page(req.query, req.offset, req.page_size)
        .await?;
    Ok(Json(page))
}

pub async fn competition(State(state): State<AppState>) -> impl IntoResponse {
    Json(competition_status(
        state.config.competition_start,
        state.config.competition_end,
        chrono::Utc::now().timestamp(),
    ))
}

pub async fn claims(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, LeaderboardError> {
    let claims = state.claims.with_conn(db::list_claims).await?;
    Ok(Json(ClaimsResponse { claims }))
}

pub async fn claim_nonce(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, Response> {
    if address.trim().parse::<alloy_primitives::Address>().is_err() {
        return Err(AuthError::InvalidAddress.into_response());
    }

    let (nonce, issued_at) = state
        .claims
        .with_conn(move |conn| db::issue_nonce(conn, &address))
        .await
        .map_err(IntoResponse::into_response)?;

    Ok(Json(NonceResponse { nonce, issued_at }))
}

pub async fn submit_claim(
    State(state): State<AppState>,
    Json(req): Json<ClaimRequest>,
) -> Result<impl IntoResponse, Response> {
    let signer = auth::recover_claim_signer(
        &req.address,
        &req.nonce,
        &req.issued_at,
        &req.signature,
        chrono::Utc::now(),
    )
    .map_err(IntoResponse::into_response)?;
    let account = normalize_account(&signer.to_string());

    let ClaimRequest {
        nonce, issued_at, ..
    } = req;
    let account_for_db = account.clone();
    let outcome = state
        .claims
        .with_conn(move |conn| {
            if !db::verify_and_rotate_nonce(conn, &account_for_db, &nonce, &issued_at)? {
                return Ok(None);
            }
            db::insert_claim(conn, &account_for_db).map(Some)
        })
        .await
        .map_err(IntoResponse::into_response)?;

    match outcome {
        None => Err(AuthError::NonceMismatch.into_response()),
        Some(inserted) => {
            if inserted {
                tracing::info!("Recorded competition claim for {account}");
            } else {
                tracing::debug!("Duplicate competition claim for {account}");
            }
            Ok(Json(serde_json::json!({ "account": account, "claimed": true })))
        }
    }
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        cached_windows: state.ladder.cached_windows().await,
    })
}
