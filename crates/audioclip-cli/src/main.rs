//! audioclip-factory entry point

use anyhow::Result;
use clap::Parser;

use audioclip_cli::{execute, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    execute(cli).await
}
