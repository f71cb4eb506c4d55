use anyhow::Result;
use kukeon::{Config, Server};
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::default();
    let _engine = Server::new(config).build()?;
    info!("engine ready");
    Ok(())
}
