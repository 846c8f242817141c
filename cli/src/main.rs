//! `gigi-cli`: boots config and tracing, then serves the WS+REST+webhook
//! gateway until Ctrl-C.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "gigi-cli", about = "Serve the gigi WS+REST+webhook gateway")]
struct Args {
    /// Listen address, e.g. 127.0.0.1:8080. Overrides LISTEN_ADDR.
    #[arg(long, value_name = "ADDR")]
    addr: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    gigi_config::load_and_apply("gigi", None::<&std::path::Path>).ok();
    let _tracing_guard = gigi_config::init_tracing("gigi-cli", std::path::Path::new("logs"))?;

    let args = Args::parse();
    let config = cli::BootConfig::from_env();
    let addr = args.addr.or_else(|| std::env::var("LISTEN_ADDR").ok());

    cli::serve(&config, addr.as_deref(), shutdown_signal()).await
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
