use batcher::{
    api::Server,
    batch::{BatchKeeper, BlockProducer},
    config::Config,
    registry::Registry,
    state::ChainState,
};
use tracing::info;

/// The main entry point for the batcher node.
///
/// Loads the configuration, opens the event registry, starts home-chain block
/// production in the background and serves the JSON-RPC API.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "config/default.toml".to_string());
    let config = Config::load(&path)?;
    info!("Batcher starting with config: {:?}", config);

    let registry = Registry::connect(&config.database.url).await?;
    let chain = ChainState::new(BatchKeeper::new(config.params.clone(), config.bridge.clone()));

    let producer = BlockProducer::new(chain.clone(), Some(registry.clone()));
    tokio::spawn(async move {
        if let Err(e) = producer.start().await {
            tracing::error!("Block producer error: {:?}", e);
        }
    });
    info!("Block producer started");

    let server = Server::new(config.api, chain, Some(registry));
    server.start().await?;

    Ok(())
}
