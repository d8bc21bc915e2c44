#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! EFY staking node entrypoint: loads config, restores or creates the ledger, serves HTTP.

use std::sync::Arc;

use anyhow::{Context, Result};
use efy_staking::api::{router, AppState};
use efy_staking::core::config::NodeConfig;
use efy_staking::core::economics::balances::InMemoryBalances;
use efy_staking::core::runtime::clock::{Clock, SystemClock};
use efy_staking::core::runtime::executor::{LedgerRuntime, RuntimeState};
use efy_staking::core::security::authority::OwnerAuthority;
use efy_staking::core::state::persistent_state::LedgerStore;
use efy_staking::monitoring::{logging, metrics::Metrics};
use tracing::{info, warn};

fn env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "ctrl-c handler failed");
    }
    info!("shutdown requested");
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = env("EFY_CONFIG", "efy.toml");
    let mut cfg = NodeConfig::load(&config_path).with_context(|| format!("config {config_path}"))?;
    if let Ok(dir) = std::env::var("EFY_DATA_DIR") {
        cfg.node.data_dir = dir;
    }

    logging::init(cfg.log.json, &cfg.log.level);
    info!(
        node = %cfg.node.name,
        version = env!("CARGO_PKG_VERSION"),
        built = option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown"),
        rustc = option_env!("VERGEN_RUSTC_SEMVER").unwrap_or("unknown"),
        "efy staking node starting"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = LedgerStore::open(&cfg.node.data_dir)
        .with_context(|| format!("open state at {}", cfg.node.data_dir))?;

    let state = match store
        .load::<RuntimeState<InMemoryBalances, OwnerAuthority>>()
        .context("load snapshot")?
    {
        Some((state, digest)) => {
            info!(%digest, accounts = state.ledger.account_count(), "restored ledger snapshot");
            state
        }
        None => {
            let state = cfg.genesis_state(clock.now()).context("genesis")?;
            let digest = store.save(&state).context("persist genesis")?;
            info!(
                %digest,
                owner = %cfg.ledger.owner,
                rate = cfg.ledger.annual_interest_rate,
                policy = ?cfg.ledger.rate_policy,
                allocations = cfg.genesis.len(),
                "created genesis ledger"
            );
            state
        }
    };

    let metrics = Arc::new(Metrics::new().context("metrics init")?);
    let runtime = LedgerRuntime::new(state, clock).with_metrics(metrics.clone());
    let app = router(AppState::new(runtime, Some(store), metrics));

    let listener = tokio::net::TcpListener::bind(&cfg.http.listen_addr)
        .await
        .with_context(|| format!("bind {}", cfg.http.listen_addr))?;
    info!(listen = %cfg.http.listen_addr, data_dir = %cfg.node.data_dir, "http listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server")?;

    info!("efy staking node stopped");
    Ok(())
}
