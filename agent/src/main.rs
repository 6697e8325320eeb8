use std::sync::Arc;

use clap::Parser;
use directory::DirectoryClient;
use mimalloc::MiMalloc;
use natproxy_agent::{
    agent::{self, AgentLoopConfig},
    config::Config,
};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    simple_logger::init_with_level(config.log_level.as_level())?;

    let directory = Arc::new(DirectoryClient::new(config.directory_url.clone()));

    agent::run(config, AgentLoopConfig::default(), directory).await?;

    Ok(())
}
