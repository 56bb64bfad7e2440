use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

mod server;
mod ws;

#[derive(Parser, Debug, Clone)]
#[command(name = "onair")]
#[command(author, version, about = "OnAir - broadcast control backend for OBS")]
pub struct Args {
    /// Address the UI websocket server binds to
    #[arg(long, env = "ONAIR_BIND", default_value = "0.0.0.0:8080")]
    pub bind: String,

    /// SQLite database URL or path
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://onair.db")]
    pub database_url: String,

    #[arg(long, env = "OBS_HOST", default_value = "127.0.0.1")]
    pub obs_host: String,

    #[arg(long, env = "OBS_PORT", default_value_t = 4455)]
    pub obs_port: u16,

    /// OBS-WebSocket password; omit when authentication is off
    #[arg(long, env = "OBS_PASSWORD")]
    pub obs_password: Option<String>,

    /// Root directory that stored media paths are relative to
    #[arg(long, env = "MEDIA_DIR", default_value = "./media")]
    pub media_dir: String,

    /// Do not re-dial OBS after an established connection drops
    #[arg(long, default_value = "false")]
    pub no_reconnect: bool,
}

fn init_tracing() {
    let filter = EnvFilter::from_default_env()
        .add_directive("onair=info".parse().unwrap_or_default())
        .add_directive("onair_obs=info".parse().unwrap_or_default())
        .add_directive("onair_core=info".parse().unwrap_or_default())
        .add_directive("onair_server=info".parse().unwrap_or_default());
    let sub = fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(sub)
        .expect("Failed to set global subscriber");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();
    let args = Args::parse();
    info!(
        "OnAir starting. bind={}, obs={}:{}",
        args.bind, args.obs_host, args.obs_port
    );

    if let Err(e) = server::run_server(args).await {
        error!("Server error: {:?}", e);
        return Err(e);
    }
    info!("Main finished. Goodbye!");
    Ok(())
}
