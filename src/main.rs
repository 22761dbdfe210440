use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod login;
mod state;

use config::Config;
use login::brute_force::{spawn_sweeper, AttemptTracker};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        "Lockout policy: {} failures within {}s, up to {} tracked keys",
        config.lockout.max_attempts,
        config.lockout.block_time.as_secs(),
        config.lockout.max_tracked_keys
    );

    let state = Arc::new(AppState {
        login_tracker: tokio::sync::Mutex::new(AttemptTracker::new(config.lockout.clone())),
        admin_config: config.admin.clone(),
    });

    spawn_sweeper(state.clone(), config.sweep_interval);

    let app = login::routes::router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("LoginGuard server listening on {}", config.bind_addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
