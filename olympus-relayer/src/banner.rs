use console::Style;

use crate::config::RelayerConfig;

const BANNER: &str = r#"
  ██████╗ ██╗  ██╗   ██╗███╗   ███╗██████╗ ██╗   ██╗███████╗
 ██╔═══██╗██║  ╚██╗ ██╔╝████╗ ████║██╔══██╗██║   ██║██╔════╝
 ██║   ██║██║   ╚████╔╝ ██╔████╔██║██████╔╝██║   ██║███████╗
 ██║   ██║██║    ╚██╔╝  ██║╚██╔╝██║██╔═══╝ ██║   ██║╚════██║
 ╚██████╔╝███████╗██║   ██║ ╚═╝ ██║██║     ╚██████╔╝███████║
  ╚═════╝ ╚══════╝╚═╝   ╚═╝     ╚═╝╚═╝      ╚═════╝ ╚══════╝"#;

/// Print the OLYMPUS startup banner with version info.
pub fn print_banner() {
    let blue = Style::new().blue().bold();
    let dim = Style::new().dim();

    println!("{}", blue.apply_to(BANNER));
    println!(
        "  {}",
        dim.apply_to(format!(
            "v{} · relayer node",
            env!("CARGO_PKG_VERSION")
        ))
    );
    println!();
}

/// Print a compact startup summary.
pub fn print_summary(config: &RelayerConfig) {
    let dim = Style::new().dim();
    let cyan = Style::new().cyan();
    let params = config.network.params();

    println!(
        "  {} {} · magic {:#010x}",
        dim.apply_to("Network "),
        cyan.apply_to(params.name),
        params.net_magic,
    );
    println!(
        "  {} {}",
        dim.apply_to("Port    "),
        cyan.apply_to(config.p2p.port),
    );
    println!(
        "  {} {}",
        dim.apply_to("Datadir "),
        cyan.apply_to(&config.datadir),
    );
    let boot_nodes = config.boot_nodes();
    if !boot_nodes.is_empty() {
        println!(
            "  {} {}",
            dim.apply_to("Peers   "),
            cyan.apply_to(format!("{} boot node(s)", boot_nodes.len())),
        );
    }
    println!();
}
