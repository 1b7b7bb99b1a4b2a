//! Rendezvous advertisement and the per-string discovery loop.

use std::time::Duration;

use futures::StreamExt;
use libp2p::multiaddr::Protocol;
use libp2p::{Multiaddr, PeerId};
use olympus_types::constants::REDISCOVER_INTERVAL;
use serde::{Deserialize, Serialize};
use tracing::{error, info, trace, warn};

use crate::connect::PeerConnector;
use crate::error::RelayError;
use crate::network::{Discovery, Host, PeerDescriptor};
use crate::tasks::Shutdown;

/// What a discovery loop does when a lookup cannot be issued at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryRetry {
    /// Stop discovering under that rendezvous string for the rest of the run.
    #[default]
    Stop,
    /// Wait the rediscover interval and try again.
    Backoff,
}

/// Timing and failure policy shared by all discovery loops.
#[derive(Debug, Clone, Copy)]
pub struct DiscoverySettings {
    /// Wait between a closed lookup and the next one.
    pub rediscover_interval: Duration,
    pub retry: DiscoveryRetry,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            rediscover_interval: REDISCOVER_INTERVAL,
            retry: DiscoveryRetry::Stop,
        }
    }
}

/// Why a discovery loop ended.
#[derive(Debug)]
pub enum LoopExit {
    Cancelled,
    Failed(RelayError),
}

/// Announce this node once under every rendezvous string.
///
/// Failures are logged and do not stop the remaining strings. Returns the
/// number of strings successfully advertised.
pub async fn advertise_all<D: Discovery>(discovery: &D, rendezvous_strings: &[String]) -> usize {
    let mut advertised = 0;
    for (version, rendezvous) in rendezvous_strings.iter().enumerate() {
        info!(%rendezvous, version, "starting advertising string");
        match discovery.advertise(rendezvous).await {
            Ok(()) => advertised += 1,
            Err(e) => warn!(%rendezvous, error = %e, "advertise failed"),
        }
    }
    advertised
}

/// Keep looking up peers under `rendezvous` and hand each one to `connector`.
///
/// A lookup that closes normally is re-issued after the rediscover interval.
/// A lookup that fails outright ends the loop unless the retry policy says
/// otherwise. Returns promptly once `shutdown` fires, including mid-lookup.
pub async fn run_rendezvous_loop<D, H>(
    discovery: D,
    connector: PeerConnector<H>,
    rendezvous: String,
    settings: DiscoverySettings,
    shutdown: Shutdown,
) -> LoopExit
where
    D: Discovery,
    H: Host,
{
    info!(%rendezvous, "starting listening routine for string");
    loop {
        if shutdown.is_cancelled() {
            return LoopExit::Cancelled;
        }

        let lookup = tokio::select! {
            _ = shutdown.cancelled() => return LoopExit::Cancelled,
            lookup = discovery.find_peers(&rendezvous) => lookup,
        };

        let mut peers = match lookup {
            Ok(peers) => peers,
            Err(e) => match settings.retry {
                DiscoveryRetry::Stop => {
                    error!(%rendezvous, error = %e, "peer lookup failed, discovery stopped for this string");
                    return LoopExit::Failed(e);
                }
                DiscoveryRetry::Backoff => {
                    warn!(%rendezvous, error = %e, "peer lookup failed, retrying");
                    if !sleep_unless_cancelled(settings.rediscover_interval, &shutdown).await {
                        return LoopExit::Cancelled;
                    }
                    continue;
                }
            },
        };

        loop {
            let next = tokio::select! {
                _ = shutdown.cancelled() => return LoopExit::Cancelled,
                next = peers.next() => next,
            };
            let Some(peer) = next else {
                break;
            };
            trace!(%rendezvous, peer_id = %peer.peer_id, "advertised peer found, handling");
            tokio::select! {
                _ = shutdown.cancelled() => return LoopExit::Cancelled,
                _ = connector.handle_peer(&peer) => {}
            }
        }

        trace!(%rendezvous, "peer lookup closed");
        if !sleep_unless_cancelled(settings.rediscover_interval, &shutdown).await {
            return LoopExit::Cancelled;
        }
    }
}

/// Returns false if shutdown fired before `duration` elapsed.
async fn sleep_unless_cancelled(duration: Duration, shutdown: &Shutdown) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

/// Parse bootstrap relayer multiaddrs. Each must end in `/p2p/<peer id>`.
///
/// Invalid entries and our own address are logged and skipped.
pub fn parse_boot_nodes(boot_nodes: &[String], local_peer_id: &PeerId) -> Vec<PeerDescriptor> {
    boot_nodes
        .iter()
        .filter_map(|s| {
            let addr = s
                .parse::<Multiaddr>()
                .map_err(|e| {
                    warn!("Invalid multiaddr '{}': {}", s, e);
                    e
                })
                .ok()?;
            let Some(Protocol::P2p(peer_id)) = addr.iter().last() else {
                warn!("Boot node '{}' has no /p2p/ peer id", s);
                return None;
            };
            if &peer_id == local_peer_id {
                return None;
            }
            Some(PeerDescriptor::new(peer_id, vec![addr]))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Connectedness;
    use async_trait::async_trait;
    use futures::io::Cursor;
    use futures::stream::BoxStream;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct FakeDiscovery {
        lookups: Arc<Mutex<HashMap<String, usize>>>,
        advertised: Arc<Mutex<Vec<String>>>,
        results: Vec<PeerDescriptor>,
        fail_lookup: bool,
        fail_advertise: Option<&'static str>,
    }

    impl FakeDiscovery {
        fn lookups(&self, rendezvous: &str) -> usize {
            *self.lookups.lock().unwrap().get(rendezvous).unwrap_or(&0)
        }
    }

    #[async_trait]
    impl Discovery for FakeDiscovery {
        async fn find_peers(
            &self,
            rendezvous: &str,
        ) -> Result<BoxStream<'static, PeerDescriptor>, RelayError> {
            *self
                .lookups
                .lock()
                .unwrap()
                .entry(rendezvous.to_string())
                .or_default() += 1;
            if self.fail_lookup {
                return Err(RelayError::DiscoveryError {
                    reason: "lookup refused".to_string(),
                });
            }
            Ok(Box::pin(futures::stream::iter(self.results.clone())))
        }

        async fn advertise(&self, rendezvous: &str) -> Result<(), RelayError> {
            if self.fail_advertise == Some(rendezvous) {
                return Err(RelayError::DiscoveryError {
                    reason: "no peers".to_string(),
                });
            }
            self.advertised.lock().unwrap().push(rendezvous.to_string());
            Ok(())
        }
    }

    #[derive(Clone)]
    struct CountingHost {
        local: PeerId,
        dials: Arc<Mutex<usize>>,
    }

    #[async_trait]
    impl Host for CountingHost {
        type Stream = Cursor<Vec<u8>>;

        fn local_peer_id(&self) -> PeerId {
            self.local
        }

        async fn connectedness(&self, _peer: &PeerId) -> Result<Connectedness, RelayError> {
            Ok(Connectedness::NotConnected)
        }

        async fn connect(&self, _peer: &PeerDescriptor) -> Result<(), RelayError> {
            *self.dials.lock().unwrap() += 1;
            Ok(())
        }

        async fn new_stream(&self, _peer: PeerId, _protocol: &str) -> Result<Self::Stream, RelayError> {
            Ok(Cursor::new(Vec::new()))
        }

        fn accept(
            &self,
            _protocol: &str,
        ) -> Result<BoxStream<'static, (PeerId, Self::Stream)>, RelayError> {
            Ok(Box::pin(futures::stream::empty()))
        }
    }

    fn host() -> CountingHost {
        CountingHost {
            local: PeerId::random(),
            dials: Arc::default(),
        }
    }

    #[tokio::test]
    async fn test_advertise_each_string_once() {
        let discovery = FakeDiscovery::default();
        let strings = vec!["r1".to_string(), "r2".to_string()];
        assert_eq!(advertise_all(&discovery, &strings).await, 2);
        assert_eq!(*discovery.advertised.lock().unwrap(), strings);
    }

    #[tokio::test]
    async fn test_advertise_failure_does_not_stop_others() {
        let discovery = FakeDiscovery {
            fail_advertise: Some("r1"),
            ..Default::default()
        };
        let strings = vec!["r1".to_string(), "r2".to_string()];
        assert_eq!(advertise_all(&discovery, &strings).await, 1);
        assert_eq!(*discovery.advertised.lock().unwrap(), vec!["r2".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_lookup_is_reissued_after_interval() {
        let host = host();
        let discovery = FakeDiscovery {
            results: vec![
                PeerDescriptor::new(PeerId::random(), vec![]),
                PeerDescriptor::new(host.local, vec![]),
            ],
            ..Default::default()
        };
        let (trigger, shutdown) = crate::tasks::shutdown_channel();

        let handle = tokio::spawn(run_rendezvous_loop(
            discovery.clone(),
            PeerConnector::new(host.clone()),
            "r1".to_string(),
            DiscoverySettings::default(),
            shutdown,
        ));

        tokio::time::sleep(Duration::from_secs(25)).await;
        trigger.cancel();
        let exit = handle.await.unwrap();

        assert!(matches!(exit, LoopExit::Cancelled));
        assert_eq!(discovery.lookups("r1"), 3);
        // The self descriptor is never dialed.
        assert_eq!(*host.dials.lock().unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hard_error_stops_loop_by_default() {
        let discovery = FakeDiscovery {
            fail_lookup: true,
            ..Default::default()
        };
        let (_trigger, shutdown) = crate::tasks::shutdown_channel();

        let exit = run_rendezvous_loop(
            discovery.clone(),
            PeerConnector::new(host()),
            "r1".to_string(),
            DiscoverySettings::default(),
            shutdown,
        )
        .await;

        assert!(matches!(exit, LoopExit::Failed(_)));
        assert_eq!(discovery.lookups("r1"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_policy_retries_after_hard_error() {
        let discovery = FakeDiscovery {
            fail_lookup: true,
            ..Default::default()
        };
        let (trigger, shutdown) = crate::tasks::shutdown_channel();
        let settings = DiscoverySettings {
            retry: DiscoveryRetry::Backoff,
            ..Default::default()
        };

        let handle = tokio::spawn(run_rendezvous_loop(
            discovery.clone(),
            PeerConnector::new(host()),
            "r1".to_string(),
            settings,
            shutdown,
        ));

        tokio::time::sleep(Duration::from_secs(35)).await;
        trigger.cancel();
        assert!(matches!(handle.await.unwrap(), LoopExit::Cancelled));
        assert_eq!(discovery.lookups("r1"), 4);
    }

    #[test]
    fn test_parse_boot_nodes() {
        let local = PeerId::random();
        let remote = PeerId::random();
        let nodes = vec![
            format!("/ip4/10.0.0.1/tcp/25000/p2p/{}", remote),
            format!("/ip4/10.0.0.2/tcp/25000/p2p/{}", local),
            "/ip4/10.0.0.3/tcp/25000".to_string(),
            "not-a-multiaddr".to_string(),
        ];
        let parsed = parse_boot_nodes(&nodes, &local);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].peer_id, remote);
    }
}
