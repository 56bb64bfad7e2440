//! onair-server/src/server.rs
//!
//! Wires the database, the OBS client and the services together and serves
//! the UI websocket until Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use onair_core::eventbus::UiEventBus;
use onair_core::platforms::obs::ObsControl;
use onair_core::repositories::sqlite::{
    SqliteCurrentAssignmentRepository, SqliteMediaRepository, SqliteSceneRepository,
};
use onair_core::services::{MediaAssignmentService, SocketHandler, VolumeMonitor};
use onair_core::{Database, ShowConfig};
use onair_obs::{ObsClient, ObsConnectionConfig};

use crate::ws::{ws_handler, AppState};
use crate::Args;

fn obs_config(args: &Args) -> ObsConnectionConfig {
    ObsConnectionConfig {
        host: args.obs_host.clone(),
        port: args.obs_port,
        use_password: args.obs_password.is_some(),
        password: args.obs_password.clone(),
        reconnect: !args.no_reconnect,
        ..ObsConnectionConfig::default()
    }
}

pub async fn run_server(args: Args) -> anyhow::Result<()> {
    // 1) Database
    let db = Database::new(&args.database_url).await?;
    db.migrate().await?;

    let config = Arc::new(ShowConfig {
        media_dir: PathBuf::from(&args.media_dir),
        ..ShowConfig::default()
    });
    let bus = UiEventBus::new();

    // 2) OBS client and volume monitoring. Handlers go in before the first
    //    connect so no event is missed.
    let client = ObsClient::new(obs_config(&args));
    let volume = VolumeMonitor::from_config(&config, bus.clone());
    volume.start(&client);
    spawn_initial_connect(client.clone(), bus.clone());

    // 3) Services
    let pool = db.pool().clone();
    let obs: Arc<dyn ObsControl> = Arc::new(client.clone());
    let scenes = Arc::new(SqliteSceneRepository::new(pool.clone()));
    let media_service = Arc::new(MediaAssignmentService::new(
        obs.clone(),
        Arc::new(SqliteMediaRepository::new(pool.clone())),
        scenes.clone(),
        Arc::new(SqliteCurrentAssignmentRepository::media_in_group(
            pool,
            config.tracked_scenes.clone(),
        )),
        bus.clone(),
        config.clone(),
    ));
    let handler = SocketHandler::new(obs, scenes, volume, bus.clone(), config)
        .with_media_assignments(media_service);

    // 4) UI websocket
    let state = AppState {
        handler: Arc::new(handler),
        bus: bus.clone(),
    };
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("binding {}", args.bind))?;
    info!("UI websocket listening on ws://{}/ws", args.bind);

    let bus_for_ctrlc = bus.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {:?}", e);
        }
        info!("Ctrl-C detected; shutting down...");
        bus_for_ctrlc.shutdown();
    });

    let mut shutdown_rx = bus.shutdown_rx.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            while shutdown_rx.changed().await.is_ok() {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        })
        .await?;

    // Cleanup
    if let Err(e) = client.close().await {
        warn!("Error closing OBS connection: {}", e);
    }
    info!("Server shutdown complete.");
    Ok(())
}

/// Dials OBS until the first connection succeeds. Later drops are handled by
/// the client's own reconnect loop.
fn spawn_initial_connect(client: ObsClient, bus: UiEventBus) {
    tokio::spawn(async move {
        let delay = client.config().reconnect_delay;
        let mut shutdown_rx = bus.shutdown_rx.clone();
        loop {
            match client.connect().await {
                Ok(()) => {
                    info!("Connected to OBS at {}", client.config().url());
                    return;
                }
                Err(e) => warn!("OBS not reachable ({}); retrying in {:?}", e, delay),
            }
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                Ok(_) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        return;
                    }
                }
            }
        }
    });
}
