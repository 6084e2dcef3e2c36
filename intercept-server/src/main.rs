use std::time::Duration;

use clap::Parser;
use intercept_server::settings::Cli;
use intercept_server::AppState;
use tokio_graceful_shutdown::{SubsystemBuilder, Toplevel};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    intercept_server::settings::init_logging(&cli);

    log::info!("intercept-server {} starting", intercept_server::VERSION);

    let port = cli.port;

    Toplevel::new(move |s| async move {
        let state = AppState::new(&s, cli);
        s.start(SubsystemBuilder::new("web", move |s| async move {
            intercept_server::web::serve(state, port, &s).await
        }));
    })
    .catch_signals()
    .handle_shutdown_requests(Duration::from_secs(5))
    .await?;

    Ok(())
}
