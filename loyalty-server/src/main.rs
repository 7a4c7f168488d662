use loyalty_server::{print_banner, setup_environment, Config, Server, ServerState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Environment setup (dotenv, working directory, logging)
    setup_environment()?;

    print_banner();

    tracing::info!("Loyalty server starting...");

    // 2. Load configuration
    let config = Config::from_env();

    // 3. Initialize shared state (database, migrations, locks)
    let state = ServerState::initialize(&config).await?;

    // 4. Run the HTTP server (spawns the expiry sweeper)
    let server = Server::with_state(config, state);

    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
