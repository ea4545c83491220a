use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use axum_server::Handle;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use loyalty_core::tasks::expiry_sweep::spawn_expiry_sweep_task;

mod context;
mod identity;
mod seed;
mod server;

use context::AppContext;

#[derive(Parser, Debug, Clone)]
#[command(name = "loyalty-server")]
#[command(author, version, about = "Loyalty points redemption engine")]
pub struct Args {
    /// Address to which the HTTP server will bind
    #[arg(long, env = "LOYALTY_BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind_addr: SocketAddr,

    /// Postgres connection URL. Without one, an in-memory store is used.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    #[arg(long, env = "LOYALTY_DB_MAX_CONNECTIONS", default_value_t = 10)]
    pub db_max_connections: u32,

    /// HS256 secret for redemption tokens (at least 32 bytes)
    #[arg(long, env = "LOYALTY_TOKEN_SECRET", hide_env_values = true)]
    pub token_secret: Option<String>,

    /// Cap on token lifetime in seconds. Unset ties tokens to the redemption expiry.
    #[arg(long, env = "LOYALTY_MAX_TOKEN_TTL_SECS")]
    pub max_token_ttl_secs: Option<i64>,

    /// Seconds between expiry sweeps; 0 disables the sweep
    #[arg(long, env = "LOYALTY_SWEEP_INTERVAL_SECS", default_value_t = 60)]
    pub sweep_interval_secs: u64,

    /// Check reservations against the raw balance instead of balance minus reserved
    #[arg(long, env = "LOYALTY_RAW_BALANCE", default_value_t = false)]
    pub raw_balance: bool,

    /// JSON file of rewards and opening balances to load at startup
    #[arg(long, env = "LOYALTY_SEED_FILE")]
    pub seed_file: Option<PathBuf>,
}

fn init_tracing() {
    let filter = EnvFilter::from_default_env()
        .add_directive("loyalty=info".parse().unwrap_or_default());
    let sub = fmt().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(sub) {
        eprintln!("Failed to set global subscriber: {}", e);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();
    let args = Args::parse();
    info!(
        "loyalty-server starting. bind={}, store={}, raw_balance={}",
        args.bind_addr,
        if args.database_url.is_some() { "postgres" } else { "memory" },
        args.raw_balance
    );

    if let Err(e) = run_server(args).await {
        error!("Server error: {:?}", e);
        return Err(e);
    }
    Ok(())
}

async fn run_server(args: Args) -> anyhow::Result<()> {
    let ctx = AppContext::new(&args).await?;

    if let Some(path) = &args.seed_file {
        seed::load_seed_file(&ctx, path).await?;
    }

    let sweep = if args.sweep_interval_secs > 0 {
        Some(spawn_expiry_sweep_task(
            ctx.service.clone(),
            Duration::from_secs(args.sweep_interval_secs),
        ))
    } else {
        warn!("Expiry sweep disabled; overdue redemptions expire only when touched.");
        None
    };

    let app = server::router(ctx);

    let handle = Handle::new();
    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received; shutting down.");
        }
        shutdown_handle.graceful_shutdown(Some(Duration::from_secs(10)));
    });

    info!("Loyalty API listening on http://{}", args.bind_addr);
    axum_server::bind(args.bind_addr)
        .handle(handle)
        .serve(app.into_make_service())
        .await?;

    if let Some(task) = sweep {
        task.abort();
    }
    info!("Loyalty API shut down.");
    Ok(())
}
