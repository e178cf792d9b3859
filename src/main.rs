use anyhow::Context;

use straddle_board::app::run;
use straddle_board::config::Config;
use straddle_board::logging::init;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();

    let config = Config::from_env().context("loading configuration")?;

    run(config).await.context("running server")
}
