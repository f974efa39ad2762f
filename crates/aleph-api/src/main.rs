use aleph_api::setup;
use aleph_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize the application (database, storage, services, routes)
    let (state, router) = setup::initialize_app(&config).await?;

    // Start the server; returns after graceful shutdown
    setup::server::start_server(&config, state, router).await?;

    Ok(())
}
