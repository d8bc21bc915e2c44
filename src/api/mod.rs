// Copyright (c) 2026 EFY Finance
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! HTTP surface of the local node.
//!
//! | route | effect |
//! |---|---|
//! | `GET /health` | liveness |
//! | `GET /metrics` | Prometheus text |
//! | `GET /v1/rate` | rate in force, policy, checkpoint log |
//! | `GET /v1/stakes/:account` | `(amounts, start_times, closed, accrued_interest)` |
//! | `GET /v1/balances/:account` | spendable and staked balance |
//! | `POST /v1/stake` | `{account, amount}` |
//! | `POST /v1/unstake` | `{account, index}` |
//! | `POST /v1/rate` | `{caller, rate}` |
//!
//! Amounts travel as decimal strings. All routes share one mutex around the runtime, so each
//! request is one atomic transition; a command is persisted before it is acknowledged.

use crate::core::economics::balances::{BalanceBook, BalanceError, InMemoryBalances};
use crate::core::economics::interest::{RateCheckpoint, RatePolicy, INTEREST_RATE_SCALE};
use crate::core::economics::staking::StakingError;
use crate::core::runtime::clock::Clock;
use crate::core::runtime::executor::{Command, LedgerRuntime, Outcome, RuntimeState};
use crate::core::security::authority::OwnerAuthority;
use crate::core::state::persistent_state::{LedgerStore, SnapshotSink};
use crate::core::types::{Address, Amount, Timestamp};
use crate::monitoring::metrics::Metrics;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error};

/// Runtime type served by the node.
pub type NodeRuntime = LedgerRuntime<InMemoryBalances, OwnerAuthority, Arc<dyn Clock>>;

/// Persisted state of the node.
pub type NodeState = RuntimeState<InMemoryBalances, OwnerAuthority>;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    runtime: Arc<Mutex<NodeRuntime>>,
    sink: Option<Arc<dyn SnapshotSink<NodeState>>>,
    metrics: Arc<Metrics>,
}

impl AppState {
    /// Handler state; with `store` set every applied command is persisted.
    pub fn new(runtime: NodeRuntime, store: Option<LedgerStore>, metrics: Arc<Metrics>) -> Self {
        let sink = store.map(|s| Arc::new(s) as Arc<dyn SnapshotSink<NodeState>>);
        Self {
            runtime: Arc::new(Mutex::new(runtime)),
            sink,
            metrics,
        }
    }

    /// Handler state persisting through `sink`.
    pub fn with_sink(
        runtime: NodeRuntime,
        sink: Arc<dyn SnapshotSink<NodeState>>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            runtime: Arc::new(Mutex::new(runtime)),
            sink: Some(sink),
            metrics,
        }
    }

    /// Shared runtime handle.
    pub fn runtime(&self) -> Arc<Mutex<NodeRuntime>> {
        self.runtime.clone()
    }
}

/// API errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Path account is not an address.
    #[error("invalid address")]
    BadAddress,
    /// Ledger rejected the command.
    #[error("{0}")]
    Ledger(#[from] StakingError),
    /// Snapshot could not be persisted; the command was rolled back.
    #[error("persist failed")]
    Persist,
    /// Metrics encoding failed.
    #[error("metrics")]
    Metrics,
}

/// HTTP status for a ledger rejection.
pub fn status_for(e: &StakingError) -> StatusCode {
    match e {
        StakingError::InvalidAmount | StakingError::InvalidState(_) => StatusCode::BAD_REQUEST,
        StakingError::IndexOutOfRange { .. } => StatusCode::NOT_FOUND,
        StakingError::AlreadyClosed { .. } => StatusCode::CONFLICT,
        StakingError::Unauthorized => StatusCode::FORBIDDEN,
        StakingError::Balance(BalanceError::InsufficientBalance)
        | StakingError::Balance(BalanceError::InsufficientStaked) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        StakingError::Balance(BalanceError::Overflow) | StakingError::Overflow => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadAddress => StatusCode::BAD_REQUEST,
            ApiError::Ledger(e) => status_for(e),
            ApiError::Persist | ApiError::Metrics => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

mod amount_str {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &u128, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&v.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u128, D::Error> {
        let s = String::deserialize(d)?;
        s.trim().parse().map_err(serde::de::Error::custom)
    }
}

/// `POST /v1/stake` body.
#[derive(Debug, Deserialize)]
pub struct StakeRequest {
    /// Staking account.
    pub account: Address,
    /// Decimal principal.
    #[serde(with = "amount_str")]
    pub amount: Amount,
}

/// `POST /v1/unstake` body.
#[derive(Debug, Deserialize)]
pub struct UnstakeRequest {
    /// Staking account.
    pub account: Address,
    /// Entry index.
    pub index: usize,
}

/// `POST /v1/rate` body.
#[derive(Debug, Deserialize)]
pub struct RateRequest {
    /// Claimed owner.
    pub caller: Address,
    /// Rate scaled by 100000.
    pub rate: u32,
}

#[derive(Serialize)]
struct StakeResponse {
    index: usize,
}

#[derive(Serialize)]
struct UnstakeResponse {
    index: usize,
    #[serde(with = "amount_str")]
    principal: Amount,
    #[serde(with = "amount_str")]
    interest: Amount,
    #[serde(with = "amount_str")]
    total_returned: Amount,
}

#[derive(Serialize)]
struct RateResponse {
    annual_interest_rate: u32,
    scale: u32,
    policy: RatePolicy,
    checkpoints: Vec<RateCheckpoint>,
}

#[derive(Serialize)]
struct StakesResponse {
    account: Address,
    now: Timestamp,
    amounts: Vec<String>,
    start_times: Vec<Timestamp>,
    closed: Vec<bool>,
    accrued_interest: Vec<String>,
}

#[derive(Serialize)]
struct BalancesResponse {
    account: Address,
    #[serde(with = "amount_str")]
    spendable: Amount,
    #[serde(with = "amount_str")]
    staked: Amount,
}

/// Build the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/v1/rate", get(get_rate).post(post_rate))
        .route("/v1/stakes/:account", get(get_stakes))
        .route("/v1/balances/:account", get(get_balances))
        .route("/v1/stake", post(post_stake))
        .route("/v1/unstake", post(post_unstake))
        .with_state(state)
}

fn parse_account(s: &str) -> Result<Address, ApiError> {
    s.parse().map_err(|_| ApiError::BadAddress)
}

/// Execute, persist, and roll back in memory if persisting fails.
///
/// The runtime stays locked in the returned guard so the caller can answer from the state
/// this command produced.
async fn apply(
    app: &AppState,
    cmd: Command,
) -> Result<(Outcome, MutexGuard<'_, NodeRuntime>), ApiError> {
    let mut rt = app.runtime.lock().await;
    let outcome = match &app.sink {
        None => rt.stage(cmd)?,
        Some(sink) => {
            let before = rt.snapshot();
            let outcome = rt.stage(cmd)?;
            match sink.save_snapshot(rt.state()) {
                Ok(digest) => debug!(%digest, "snapshot persisted"),
                Err(e) => {
                    error!(error = %e, "snapshot persist failed; rolling back");
                    rt.restore(before);
                    app.metrics.rollbacks_total.inc();
                    return Err(ApiError::Persist);
                }
            }
            outcome
        }
    };
    rt.record_committed(&outcome);
    Ok((outcome, rt))
}

async fn health() -> &'static str {
    "ok"
}

async fn metrics(State(app): State<AppState>) -> Result<String, ApiError> {
    app.metrics.render().map_err(|_| ApiError::Metrics)
}

fn rate_response(rt: &NodeRuntime) -> RateResponse {
    let ledger = &rt.state().ledger;
    RateResponse {
        annual_interest_rate: ledger.annual_interest_rate(),
        scale: INTEREST_RATE_SCALE,
        policy: ledger.rate_policy(),
        checkpoints: ledger.rate_checkpoints().to_vec(),
    }
}

async fn get_rate(State(app): State<AppState>) -> Json<RateResponse> {
    let rt = app.runtime.lock().await;
    Json(rate_response(&rt))
}

async fn get_stakes(
    State(app): State<AppState>,
    Path(account): Path<String>,
) -> Result<Json<StakesResponse>, ApiError> {
    let account = parse_account(&account)?;
    let rt = app.runtime.lock().await;
    let now = rt.now();
    let view = rt.state().ledger.stakes_view(&account, now)?;
    Ok(Json(StakesResponse {
        account,
        now,
        amounts: view.amounts.iter().map(u128::to_string).collect(),
        start_times: view.start_times,
        closed: view.closed,
        accrued_interest: view.accrued_interest.iter().map(u128::to_string).collect(),
    }))
}

async fn get_balances(
    State(app): State<AppState>,
    Path(account): Path<String>,
) -> Result<Json<BalancesResponse>, ApiError> {
    let account = parse_account(&account)?;
    let rt = app.runtime.lock().await;
    let balances = &rt.state().balances;
    Ok(Json(BalancesResponse {
        account,
        spendable: balances.balance_of(&account),
        staked: balances.staked_of(&account),
    }))
}

async fn post_stake(
    State(app): State<AppState>,
    Json(req): Json<StakeRequest>,
) -> Result<Json<StakeResponse>, ApiError> {
    let (outcome, _) = apply(
        &app,
        Command::Stake {
            account: req.account,
            amount: req.amount,
        },
    )
    .await?;
    match outcome {
        Outcome::Staked { index } => Ok(Json(StakeResponse { index })),
        _ => Err(ApiError::Ledger(StakingError::InvalidState("unexpected outcome"))),
    }
}

async fn post_unstake(
    State(app): State<AppState>,
    Json(req): Json<UnstakeRequest>,
) -> Result<Json<UnstakeResponse>, ApiError> {
    let (outcome, _) = apply(
        &app,
        Command::Unstake {
            account: req.account,
            index: req.index,
        },
    )
    .await?;
    match outcome {
        Outcome::Unstaked(r) => Ok(Json(UnstakeResponse {
            index: r.index,
            principal: r.principal,
            interest: r.interest,
            total_returned: r.total_returned,
        })),
        _ => Err(ApiError::Ledger(StakingError::InvalidState("unexpected outcome"))),
    }
}

async fn post_rate(
    State(app): State<AppState>,
    Json(req): Json<RateRequest>,
) -> Result<Json<RateResponse>, ApiError> {
    let (_, rt) = apply(
        &app,
        Command::SetAnnualInterestRate {
            caller: req.caller,
            rate: req.rate,
        },
    )
    .await?;
    Ok(Json(rate_response(&rt)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::economics::interest::SECONDS_PER_YEAR;
    use crate::core::economics::staking::StakingLedger;
    use crate::core::runtime::clock::ManualClock;
    use crate::core::state::persistent_state::StateError;
    use crate::core::types::H256;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn owner() -> Address {
        Address::from_bytes([1; 20])
    }

    fn eco() -> Address {
        Address::from_bytes([4; 20])
    }

    fn runtime(clock: Arc<ManualClock>, metrics: Arc<Metrics>) -> NodeRuntime {
        let mut balances = InMemoryBalances::new();
        balances.mint(&eco(), 1_000).unwrap();
        let clock: Arc<dyn Clock> = clock;
        LedgerRuntime::new(
            RuntimeState {
                ledger: StakingLedger::new(20_000, 0, RatePolicy::FlatCurrent),
                balances,
                authority: OwnerAuthority::new(owner()),
            },
            clock,
        )
        .with_metrics(metrics)
    }

    fn app(store: Option<LedgerStore>) -> AppState {
        let metrics = Arc::new(Metrics::new().unwrap());
        let rt = runtime(Arc::new(ManualClock::new(0)), metrics.clone());
        AppState::new(rt, store, metrics)
    }

    fn api_err<T>(res: Result<T, ApiError>) -> ApiError {
        match res {
            Err(e) => e,
            Ok(_) => panic!("expected an api error"),
        }
    }

    struct BrokenDisk;

    impl SnapshotSink<NodeState> for BrokenDisk {
        fn save_snapshot(&self, _: &NodeState) -> Result<H256, StateError> {
            Err(StateError::DbIo)
        }
    }

    /// One HTTP/1.1 exchange; returns status and body.
    async fn call(addr: SocketAddr, method: &str, path: &str, body: &str) -> (u16, String) {
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let req = format!(
            "{method} {path} HTTP/1.1\r\nhost: {addr}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(req.as_bytes()).await.unwrap();
        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.unwrap();
        let text = String::from_utf8(raw).unwrap();
        let status = text[9..12].parse().unwrap();
        let body = text
            .split_once("\r\n\r\n")
            .map(|(_, b)| b.to_string())
            .unwrap_or_default();
        (status, body)
    }

    #[test]
    fn ledger_errors_map_to_statuses() {
        assert_eq!(status_for(&StakingError::InvalidAmount), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&StakingError::IndexOutOfRange { index: 1, len: 0 }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&StakingError::AlreadyClosed { index: 0 }),
            StatusCode::CONFLICT
        );
        assert_eq!(status_for(&StakingError::Unauthorized), StatusCode::FORBIDDEN);
        assert_eq!(
            status_for(&StakingError::Balance(BalanceError::InsufficientBalance)),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&StakingError::Overflow),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn apply_persists_each_command() {
        let dir = tempfile::tempdir().unwrap();
        let store = LedgerStore::open(dir.path().to_str().unwrap()).unwrap();
        let state = app(Some(store.clone()));

        let out = apply(
            &state,
            Command::Stake {
                account: eco(),
                amount: 400,
            },
        )
        .await
        .unwrap()
        .0;
        assert_eq!(out, Outcome::Staked { index: 0 });

        let (saved, _) = store.load::<NodeState>().unwrap().unwrap();
        let rt = state.runtime();
        let rt = rt.lock().await;
        assert_eq!(&saved, rt.state());
        assert_eq!(saved.balances.staked_of(&eco()), 400);
    }

    #[tokio::test]
    async fn rejected_command_is_not_persisted() {
        let state = app(None);
        let stranger = Address::from_bytes([9; 20]);
        let err = api_err(
            apply(
                &state,
                Command::SetAnnualInterestRate {
                    caller: stranger,
                    rate: 1,
                },
            )
            .await,
        );
        assert!(matches!(err, ApiError::Ledger(StakingError::Unauthorized)));
        let rt = state.runtime();
        assert_eq!(rt.lock().await.state().ledger.annual_interest_rate(), 20_000);
    }

    #[tokio::test]
    async fn failed_persist_rolls_back_state_and_counters() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let rt = runtime(Arc::new(ManualClock::new(0)), metrics.clone());
        let before = rt.snapshot();
        let state = AppState::with_sink(rt, Arc::new(BrokenDisk), metrics.clone());

        let err = api_err(
            apply(
                &state,
                Command::Stake {
                    account: eco(),
                    amount: 400,
                },
            )
            .await,
        );
        assert!(matches!(err, ApiError::Persist));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let rt = state.runtime();
        let rt = rt.lock().await;
        assert_eq!(rt.state(), &before);
        assert_eq!(rt.state().balances.balance_of(&eco()), 1_000);
        assert_eq!(metrics.stakes_total.get(), 0);
        assert_eq!(metrics.open_stakes.get(), 0);
        assert_eq!(metrics.rollbacks_total.get(), 1);
    }

    #[tokio::test]
    async fn http_stake_lifecycle() {
        let clock = Arc::new(ManualClock::new(0));
        let metrics = Arc::new(Metrics::new().unwrap());
        let state = AppState::new(runtime(clock.clone(), metrics.clone()), None, metrics);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move { axum::serve(listener, router(state)).await });

        let eco = eco();
        let (status, body) = call(
            addr,
            "POST",
            "/v1/stake",
            &format!(r#"{{"account":"{eco}","amount":"1000"}}"#),
        )
        .await;
        assert_eq!(status, 200);
        assert!(body.contains(r#""index":0"#), "{body}");

        clock.advance(SECONDS_PER_YEAR);
        let (status, body) = call(addr, "GET", &format!("/v1/stakes/{eco}"), "").await;
        assert_eq!(status, 200);
        assert!(body.contains(r#""amounts":["1000"]"#), "{body}");
        assert!(body.contains(r#""closed":[false]"#), "{body}");
        assert!(body.contains(r#""accrued_interest":["200"]"#), "{body}");

        let unstake = format!(r#"{{"account":"{eco}","index":0}}"#);
        let (status, body) = call(addr, "POST", "/v1/unstake", &unstake).await;
        assert_eq!(status, 200);
        assert!(body.contains(r#""interest":"200""#), "{body}");
        assert!(body.contains(r#""total_returned":"1200""#), "{body}");

        let (status, _) = call(addr, "POST", "/v1/unstake", &unstake).await;
        assert_eq!(status, 409);

        let stranger = Address::from_bytes([9; 20]);
        let (status, body) = call(
            addr,
            "POST",
            "/v1/rate",
            &format!(r#"{{"caller":"{stranger}","rate":1}}"#),
        )
        .await;
        assert_eq!(status, 403);
        assert!(body.contains("unauthorized"), "{body}");

        let (status, body) = call(
            addr,
            "POST",
            "/v1/rate",
            &format!(r#"{{"caller":"{}","rate":30000}}"#, owner()),
        )
        .await;
        assert_eq!(status, 200);
        assert!(body.contains(r#""annual_interest_rate":30000"#), "{body}");

        let (status, _) = call(addr, "GET", "/v1/stakes/not-an-address", "").await;
        assert_eq!(status, 400);

        let (status, body) = call(addr, "GET", &format!("/v1/balances/{eco}"), "").await;
        assert_eq!(status, 200);
        assert!(body.contains(r#""spendable":"1200""#), "{body}");

        let (status, body) = call(addr, "GET", "/metrics", "").await;
        assert_eq!(status, 200);
        assert!(body.contains("efy_stakes_total 1"), "{body}");
        assert!(body.contains("efy_unstakes_total 1"), "{body}");

        server.abort();
    }
}
