mod config;
mod pump;
mod state;
mod web;

use anyhow::Result;
use irrigation_controller::{ControlLoop, JsonFileStore};
use std::env;
use tracing_subscriber::EnvFilter;

use pump::PumpRelay;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config file + env overrides ──────────────────────────────────
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    let cfg = config::resolve(&config_path, |key| env::var(key).ok())?;

    // Many common relay boards are active-low. If yours is active-high, set false.
    let active_low = env::var("RELAY_ACTIVE_LOW")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(true);

    // ── Control loop ─────────────────────────────────────────────────
    let store = JsonFileStore::new(&cfg.settings_path);
    tracing::info!(
        settings = %store.path().display(),
        tick_ms = cfg.tick_interval_ms,
        "starting irrigation controller"
    );

    let (control, control_task) = ControlLoop::new(&cfg.loop_config(), store, fastrand::Rng::new())
        .with_observer(PumpRelay::new(active_low))
        .spawn();

    // ── Web server ───────────────────────────────────────────────────
    let shared = AppState::new(control.clone(), cfg.tick_interval());
    let web = tokio::spawn(web::serve(shared, cfg.web_port));

    tokio::select! {
        res = web => {
            control.shutdown().await;
            res??;
        }
        res = tokio::signal::ctrl_c() => {
            res?;
            tracing::info!("shutdown requested");
            control.shutdown().await;
        }
    }

    control_task.await?;
    Ok(())
}
