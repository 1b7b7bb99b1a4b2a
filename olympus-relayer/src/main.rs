use clap::Parser;

use olympus_relayer::{cli, logging};

fn main() {
    let cli = cli::Cli::parse();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create Tokio runtime: {}", e);
            std::process::exit(1);
        }
    };
    rt.block_on(async {
        if let Err(e) = cli::run(cli).await {
            // No-op if logging was already installed.
            let _ = logging::init("info", None);
            tracing::error!("Fatal error: {}", e);
            std::process::exit(1);
        }
    });
}
