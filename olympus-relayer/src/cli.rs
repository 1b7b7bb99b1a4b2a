use clap::{Parser, Subcommand};
use olympus_types::NetworkId;

use crate::config::RelayerConfig;
use crate::error::NodeError;

#[derive(Parser)]
#[command(
    name = "olympus-relayer",
    about = "Olympus relayer: rendezvous discovery and stream-to-gossip relay",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the relayer
    Run(RunArgs),
    /// Write a default configuration file
    Init {
        /// Output directory
        #[arg(short, long, default_value = ".")]
        dir: String,
    },
    /// Print the peer ID of the node key in a data directory
    Id {
        /// Data directory holding node_key.dat
        #[arg(long)]
        datadir: Option<String>,
    },
}

#[derive(clap::Args, Debug, Default)]
pub struct RunArgs {
    /// Path to config file. Defaults are used when omitted.
    #[arg(short, long)]
    pub config: Option<String>,
    /// Directory for the node key and log file
    #[arg(long)]
    pub datadir: Option<String>,
    /// P2P listen port
    #[arg(long)]
    pub port: Option<u16>,
    /// Network: "testnet" or "mainnet"
    #[arg(long)]
    pub network: Option<String>,
    /// Log at debug level
    #[arg(long)]
    pub debug: bool,
    /// Write logs to <datadir>/relayer.log instead of stdout
    #[arg(long)]
    pub logfile: bool,
    /// Boot node multiaddr to connect to (can be specified multiple times)
    #[arg(long = "boot-node")]
    pub boot_nodes: Vec<String>,
    /// Do not dial the network's well-known relayers
    #[arg(long)]
    pub no_bootstrap: bool,
}

/// Build the effective configuration: file (or defaults), then CLI overrides.
pub fn resolve_config(args: &RunArgs) -> Result<RelayerConfig, NodeError> {
    let mut config = match &args.config {
        Some(path) => RelayerConfig::load(path)?,
        None => RelayerConfig::default(),
    };

    if let Some(dir) = &args.datadir {
        config.datadir = dir.clone();
    }
    if let Some(port) = args.port {
        config.p2p.port = port;
    }
    if let Some(net) = &args.network {
        config.network = NetworkId::parse(net).ok_or_else(|| NodeError::ConfigError {
            reason: format!("unknown network '{}', expected 'testnet' or 'mainnet'", net),
        })?;
    }
    if args.debug {
        config.logging.level = "debug".to_string();
    }
    if args.logfile {
        config.logging.logfile = true;
    }
    if args.no_bootstrap {
        config.p2p.use_default_relayers = false;
        config.p2p.boot_nodes.clear();
    }
    config.p2p.boot_nodes.extend(args.boot_nodes.iter().cloned());

    Ok(config)
}

pub async fn run(cli: Cli) -> Result<(), NodeError> {
    match cli.command {
        Command::Run(args) => {
            let config = resolve_config(&args)?;
            let log_dir = config.logging.logfile.then(|| config.datadir());
            crate::logging::init(&config.logging.level, log_dir)?;

            crate::banner::print_banner();
            crate::banner::print_summary(&config);

            let node = crate::node::RelayerNode::start(&config).await?;
            node.run().await
        }
        Command::Init { dir } => {
            crate::logging::init("info", None)?;
            let path = RelayerConfig::init(&dir)?;
            tracing::info!("Relayer configuration written to {}", path.display());
            Ok(())
        }
        Command::Id { datadir } => {
            let mut config = RelayerConfig::default();
            if let Some(dir) = datadir {
                config.datadir = dir;
            }
            let keypair = crate::keys::load_or_generate(config.datadir())?;
            println!("{}", keypair.public().to_peer_id());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::try_parse_from([
            "olympus-relayer",
            "run",
            "--datadir",
            "/tmp/relayer",
            "--port",
            "26000",
            "--network",
            "mainnet",
            "--debug",
            "--boot-node",
            "/ip4/10.0.0.1/tcp/25000/p2p/12D3KooWDRZhZcemi7T5EAts9qEW19iqt1jnooDn1krpZ9hBhdFE",
        ])
        .unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.datadir, "/tmp/relayer");
        assert_eq!(config.p2p.port, 26000);
        assert_eq!(config.network, NetworkId::Mainnet);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.p2p.boot_nodes.len(), 1);
        assert!(config.p2p.use_default_relayers);
    }

    #[test]
    fn test_no_bootstrap_keeps_explicit_boot_nodes() {
        let args = RunArgs {
            no_bootstrap: true,
            boot_nodes: vec!["/ip4/10.0.0.1/tcp/25000".to_string()],
            ..Default::default()
        };
        let config = resolve_config(&args).unwrap();
        assert!(!config.p2p.use_default_relayers);
        assert_eq!(config.boot_nodes(), vec!["/ip4/10.0.0.1/tcp/25000".to_string()]);
    }

    #[test]
    fn test_unknown_network_rejected() {
        let args = RunArgs {
            network: Some("devnet".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            resolve_config(&args),
            Err(NodeError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_config_file_then_overrides() {
        let tmp = tempfile::tempdir().unwrap();
        let path = RelayerConfig::init(tmp.path().to_str().unwrap()).unwrap();
        let args = RunArgs {
            config: Some(path.to_string_lossy().into_owned()),
            port: Some(25001),
            logfile: true,
            ..Default::default()
        };
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.p2p.port, 25001);
        assert!(config.logging.logfile);
    }
}
