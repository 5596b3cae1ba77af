//! kvbench CLI entry point.

use kvbench::cli::{self, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    if let Err(err) = cli::execute(cli).await {
        eprintln!("kvbench: {}", err);
        std::process::exit(1);
    }
}
