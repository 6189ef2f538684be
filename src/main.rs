use log::info;

use pensionserver::main_module::{bootstrap, init_logging, run_axum_server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_logging();
    info!("Starting pensionserver {}", env!("CARGO_PKG_VERSION"));

    let app_state = tokio::task::spawn_blocking(bootstrap).await??;
    run_axum_server(app_state).await?;

    info!("pensionserver stopped");
    Ok(())
}
