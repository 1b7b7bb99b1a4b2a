use std::collections::HashMap;

use olympus_types::{Command, ProtocolMessage};
use tokio::sync::RwLock;
use tracing::{debug, error, trace, warn};

use crate::error::RelayError;
use crate::network::{PubSub, Topic};

/// What happened to a message handed to [`TopicRegistry::relay`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Published on the command's topic.
    Published(Command),
    /// Command is not relayable.
    Ignored,
    /// Relayable, but the topic could not be joined or the publish failed.
    Dropped(Command),
}

/// Maps every relayable command to its joined gossip topic.
///
/// Topics are joined at most once per registry. All access goes through a
/// single write lock, which also serializes publication.
pub struct TopicRegistry<P: PubSub> {
    pubsub: P,
    topics: RwLock<HashMap<Command, P::Topic>>,
}

impl<P: PubSub> TopicRegistry<P> {
    pub fn new(pubsub: P) -> Self {
        Self {
            pubsub,
            topics: RwLock::new(HashMap::new()),
        }
    }

    /// Join every relayable topic and enable re-gossip on it.
    ///
    /// Must finish before any stream receiver starts. Any failure is returned
    /// and is meant to abort startup.
    pub async fn subscribe_all(&self) -> Result<(), RelayError> {
        let mut topics = self.topics.write().await;
        for command in Command::ALL {
            debug!(topic = %command, "subscribing and relaying on topic");
            if !topics.contains_key(&command) {
                let topic = self.pubsub.join(command.as_str()).await?;
                topics.insert(command, topic);
            }
            if let Some(topic) = topics.get(&command) {
                topic.relay().await.map_err(|e| RelayError::TopicJoin {
                    topic: command.as_str().to_string(),
                    reason: e.to_string(),
                })?;
            }
        }
        Ok(())
    }

    /// Republish `message` on the topic for its command.
    ///
    /// Unknown commands are skipped silently. Publish failures are logged and
    /// swallowed, as are join failures for topics not joined at startup.
    pub async fn relay(&self, message: &ProtocolMessage) -> RelayOutcome {
        let command = match message.relayable() {
            Some(command) => command,
            None => {
                trace!(command = %message.command, "ignoring non-relayable message");
                return RelayOutcome::Ignored;
            }
        };

        let mut topics = self.topics.write().await;
        if !topics.contains_key(&command) {
            match self.pubsub.join(command.as_str()).await {
                Ok(topic) => {
                    topics.insert(command, topic);
                }
                Err(e) => {
                    error!(topic = %command, error = %e, "could not join topic, dropping message");
                    return RelayOutcome::Dropped(command);
                }
            }
        }
        let Some(topic) = topics.get(&command) else {
            return RelayOutcome::Dropped(command);
        };

        match topic.publish(message.payload.clone()).await {
            Ok(()) => {
                trace!(topic = %command, size = message.payload.len(), "relayed message");
                RelayOutcome::Published(command)
            }
            Err(e) => {
                warn!(topic = %command, error = %e, "publish failed");
                RelayOutcome::Dropped(command)
            }
        }
    }

    /// Whether the topic for `command` has been joined.
    pub async fn is_joined(&self, command: Command) -> bool {
        self.topics.read().await.contains_key(&command)
    }

    /// Number of joined topics.
    pub async fn topic_count(&self) -> usize {
        self.topics.read().await.len()
    }
}
