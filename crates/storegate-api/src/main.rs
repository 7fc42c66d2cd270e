use storegate_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize the application (database, storage resolver, routes)
    let (state, router) = storegate_api::setup::initialize_app(config.clone()).await?;

    // Start the server
    storegate_api::setup::server::start_server(&config, router, state.database.clone()).await?;

    Ok(())
}
