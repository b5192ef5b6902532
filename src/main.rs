use clap::Parser;
use log::{error, info};

use notekit::{initialize_logger, App, Cli, Config};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    initialize_logger(cli.verbose);

    let config = match Config::load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    };

    let app = App::new(config, cli.verbose);
    if let Err(e) = app.run(cli.command).await {
        error!("{}", e);
        eprintln!("error: {}", e);
        std::process::exit(1);
    }

    info!("Done");
}
