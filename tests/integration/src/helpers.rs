//! Test helpers for integration tests
//!
//! Provides a shared in-process network, per-participant clients and a
//! recorder for typing-change callbacks.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use presence_client::{ChannelOptions, PresenceClient, TypingChannel};
use presence_common::PresenceSettings;
use presence_core::BroadcastEnvelope;
use presence_transport::{
    BroadcastTransport, ChannelName, InMemoryBus, InMemoryTransport, Subscription,
    SubscriptionId, TransportResult,
};
use tokio::sync::Notify;

/// Shared broadcast network that test participants join
pub struct TestNetwork {
    pub bus: InMemoryBus,
}

impl TestNetwork {
    /// Network that does not echo messages to their sender
    pub fn new() -> Self {
        Self {
            bus: InMemoryBus::new(),
        }
    }

    /// Network that echoes every message back to its sender
    pub fn with_self_echo() -> Self {
        Self {
            bus: InMemoryBus::with_self_echo(),
        }
    }

    /// Connect a new participant with default timing
    pub fn join(&self) -> TestPeer {
        self.join_with(ChannelOptions::default())
    }

    /// Connect a new participant with custom timing
    pub fn join_with(&self, options: ChannelOptions) -> TestPeer {
        let transport = Arc::new(self.bus.connect());
        let client = PresenceClient::new(transport.clone()).with_options(options);
        TestPeer { transport, client }
    }

    /// Number of endpoints listening on a conversation's channel
    pub fn listeners(&self, conversation: &str) -> usize {
        self.bus.subscriber_count(&channel_for(conversation))
    }
}

impl Default for TestNetwork {
    fn default() -> Self {
        Self::new()
    }
}

/// One participant: its own endpoint and presence client
pub struct TestPeer {
    pub transport: Arc<InMemoryTransport>,
    pub client: PresenceClient,
}

impl TestPeer {
    pub async fn open(&self, conversation: &str, self_id: &str, peer_id: &str) -> Result<TypingChannel> {
        Ok(self.client.open(conversation, self_id, peer_id).await?)
    }

    /// Messages this participant has put on the wire
    pub fn sent(&self) -> u64 {
        self.transport.sent_count()
    }

    /// Broadcast an arbitrary envelope on a conversation's channel
    pub async fn inject(&self, conversation: &str, envelope: &BroadcastEnvelope) -> Result<()> {
        self.transport
            .send(&channel_for(conversation), envelope)
            .await?;
        Ok(())
    }
}

/// Bus endpoint whose sends block until released one at a time
pub struct HeldTransport {
    inner: InMemoryTransport,
    entered: Notify,
    release: Notify,
}

impl HeldTransport {
    pub fn connect(network: &TestNetwork) -> Self {
        Self {
            inner: network.bus.connect(),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }

    /// Wait until a send is blocked inside the transport
    pub async fn send_started(&self) {
        self.entered.notified().await;
    }

    /// Let one blocked send through
    pub fn release_send(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl BroadcastTransport for HeldTransport {
    async fn subscribe(&self, channel: &ChannelName) -> TransportResult<Subscription> {
        self.inner.subscribe(channel).await
    }

    async fn send(&self, channel: &ChannelName, envelope: &BroadcastEnvelope) -> TransportResult<()> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.send(channel, envelope).await
    }

    async fn unsubscribe(&self, channel: &ChannelName, id: SubscriptionId) -> TransportResult<()> {
        self.inner.unsubscribe(channel, id).await
    }
}

/// Channel name used for a conversation under the default prefix
pub fn channel_for(conversation: &str) -> ChannelName {
    ChannelName::custom(format!("{}{conversation}", presence_transport::DEFAULT_CHANNEL_PREFIX))
}

/// Records every value passed to a typing-change callback
#[derive(Clone, Default)]
pub struct ChangeLog {
    changes: Arc<Mutex<Vec<bool>>>,
}

impl ChangeLog {
    /// Start recording changes of `channel`
    pub fn attach(channel: &TypingChannel) -> Self {
        let log = Self::default();
        let changes = log.changes.clone();
        channel.on_remote_typing_change(move |typing| changes.lock().push(typing));
        log
    }

    pub fn changes(&self) -> Vec<bool> {
        self.changes.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.changes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.lock().is_empty()
    }
}

/// Let listener tasks drain their queues.
///
/// With paused time the clock only advances once every task is idle, so a
/// short sleep returns after all pending deliveries were handled.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Advance (paused) time by `ms` milliseconds and let tasks react
pub async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    settle().await;
}

/// Load settings for tests that need a live Redis
pub fn check_redis_env() -> Option<PresenceSettings> {
    dotenvy::dotenv().ok();

    if std::env::var("REDIS_URL").is_err() {
        eprintln!("Skipping test: REDIS_URL not set");
        return None;
    }

    match PresenceSettings::from_env() {
        Ok(settings) => Some(settings),
        Err(e) => {
            eprintln!("Skipping test: {e}");
            None
        }
    }
}
