//! Routing of a single awaited reply to the task that asked for it

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::oneshot;

use crate::chat::{ChannelRef, IncomingMessage};

type WaiterKey = (String, String);

/// Tasks blocked on the next message of an actor in a channel
#[derive(Clone, Default)]
pub struct ReplyWaiters {
    waiters: Arc<DashMap<WaiterKey, oneshot::Sender<String>>>,
}

impl ReplyWaiters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start listening for `actor_id`'s next message on `channel`
    ///
    /// Register before prompting, so a fast reply is not missed. A newer
    /// registration for the same key replaces the older one.
    pub fn register(&self, actor_id: &str, channel: &ChannelRef) -> PendingReply {
        let key = (actor_id.to_owned(), channel.id.clone());
        let (tx, rx) = oneshot::channel();
        self.waiters.insert(key.clone(), tx);

        PendingReply {
            key,
            rx,
            waiters: Arc::clone(&self.waiters),
        }
    }

    /// Hand a message to its waiter, returning it when nobody is waiting
    pub fn offer(&self, message: IncomingMessage) -> Result<(), IncomingMessage> {
        let key = (message.actor.id.clone(), message.channel.id.clone());
        let Some((_, tx)) = self.waiters.remove(&key) else {
            return Err(message);
        };

        tx.send(message.text).map_err(|text| IncomingMessage { text, ..message })
    }

    pub fn is_waiting(&self, actor_id: &str, channel: &ChannelRef) -> bool {
        self.waiters.contains_key(&(actor_id.to_owned(), channel.id.clone()))
    }
}

/// A registered waiter; unregisters itself when dropped
pub struct PendingReply {
    key: WaiterKey,
    rx: oneshot::Receiver<String>,
    waiters: Arc<DashMap<WaiterKey, oneshot::Sender<String>>>,
}

impl PendingReply {
    /// Receive the reply text, or `None` on timeout
    pub async fn wait_for(mut self, timeout: Duration) -> Option<String> {
        tokio::time::timeout(timeout, &mut self.rx).await.ok()?.ok()
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        // Only remove our own sender; a newer registration may own the key
        self.rx.close();
        self.waiters.remove_if(&self.key, |_, tx| tx.is_closed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::Actor;

    fn message(actor: &str, channel: &str, text: &str) -> IncomingMessage {
        IncomingMessage {
            actor: Actor {
                id: actor.to_string(),
                name: actor.to_string(),
                roles: Vec::new(),
            },
            channel: ChannelRef {
                id: channel.to_string(),
                private: true,
            },
            text: text.to_string(),
        }
    }

    fn dm(id: &str) -> ChannelRef {
        ChannelRef {
            id: id.to_string(),
            private: true,
        }
    }

    #[tokio::test]
    async fn reply_reaches_waiter() {
        let waiters = ReplyWaiters::new();
        let pending = waiters.register("u1", &dm("u1"));

        assert!(waiters.offer(message("u1", "u1", "secret")).is_ok());
        assert_eq!(pending.wait_for(Duration::from_secs(1)).await.as_deref(), Some("secret"));
        assert!(!waiters.is_waiting("u1", &dm("u1")));
    }

    #[tokio::test]
    async fn other_channel_or_actor_is_not_captured() {
        let waiters = ReplyWaiters::new();
        let _pending = waiters.register("u1", &dm("u1"));

        assert!(waiters.offer(message("u1", "group", "hello")).is_err());
        assert!(waiters.offer(message("u2", "u1", "hello")).is_err());
        assert!(waiters.is_waiting("u1", &dm("u1")));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_unregisters() {
        let waiters = ReplyWaiters::new();
        let pending = waiters.register("u1", &dm("u1"));

        assert_eq!(pending.wait_for(Duration::from_secs(60)).await, None);
        assert!(!waiters.is_waiting("u1", &dm("u1")));

        let returned = waiters.offer(message("u1", "u1", "late")).unwrap_err();
        assert_eq!(returned.text, "late");
    }

    #[tokio::test]
    async fn replaced_waiter_keeps_newer_registration() {
        let waiters = ReplyWaiters::new();
        let old = waiters.register("u1", &dm("u1"));
        let new = waiters.register("u1", &dm("u1"));
        drop(old);

        assert!(waiters.is_waiting("u1", &dm("u1")));
        assert!(waiters.offer(message("u1", "u1", "pw")).is_ok());
        assert_eq!(new.wait_for(Duration::from_secs(1)).await.as_deref(), Some("pw"));
    }
}
