use libp2p::multiaddr::Protocol;
use libp2p::Multiaddr;
use std::collections::HashSet;
use std::net::IpAddr;

/// TCP listen multiaddrs for `ips` on `port`, IPv4 before IPv6.
pub fn listen_multiaddrs(ips: &[IpAddr], port: u16) -> Vec<Multiaddr> {
    let mut seen = HashSet::new();
    let mut ips: Vec<IpAddr> = ips.iter().copied().filter(|ip| seen.insert(*ip)).collect();
    ips.sort_by_key(|ip| ip.is_ipv6());
    ips.into_iter()
        .map(|ip| Multiaddr::empty().with(Protocol::from(ip)).with(Protocol::Tcp(port)))
        .collect()
}
