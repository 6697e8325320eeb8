use clap::Parser;
use mimalloc::MiMalloc;
use natproxy_broker::{config::Config, server};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    simple_logger::init_with_level(config.log_level.as_level())?;

    server::run(config).await
}
