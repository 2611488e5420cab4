use clap::Parser;

use forge_resolver::cli::{self, Cli};
use forge_resolver::logging;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli::load_config(cli.config.as_deref())?;
    let _guard = logging::init(&config.logging)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(cli::run(cli, &config, &mut std::io::stdout()))
}
