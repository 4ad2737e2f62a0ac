//! Redis Pub/Sub subscriber.
//!
//! A background task owns the dedicated pub/sub connection. Channel changes
//! reach it as commands and are acknowledged once Redis has confirmed them;
//! received messages fan out on a broadcast channel. Each channel is counted:
//! Redis sees one `SUBSCRIBE` for the first holder and one `UNSUBSCRIBE` when
//! the last holder leaves. After a connection loss the task waits
//! `reconnect_delay_ms`, reconnects and resubscribes to every channel it had.

use futures_util::StreamExt;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::channels::ChannelName;
use crate::transport::{ReceivedMessage, TransportError, TransportResult};

/// Subscriber configuration
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    /// Redis connection URL
    pub redis_url: String,
    /// Capacity of the fan-out broadcast
    pub broadcast_buffer: usize,
    /// Delay before reconnecting, in milliseconds
    pub reconnect_delay_ms: u64,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            broadcast_buffer: 1024,
            reconnect_delay_ms: 1000,
        }
    }
}

impl From<&presence_common::RedisConfig> for SubscriberConfig {
    fn from(config: &presence_common::RedisConfig) -> Self {
        Self {
            redis_url: config.url.clone(),
            reconnect_delay_ms: config.reconnect_delay_ms,
            ..Self::default()
        }
    }
}

type Ack = oneshot::Sender<TransportResult<()>>;

enum Command {
    Subscribe(String, Ack),
    Unsubscribe(String, Ack),
    Shutdown,
}

enum SessionEnd {
    Shutdown,
    Disconnected,
}

/// Handle to the background pub/sub listener
pub struct Subscriber {
    broadcast_tx: broadcast::Sender<ReceivedMessage>,
    control_tx: mpsc::Sender<Command>,
}

impl Subscriber {
    /// Start the background listener
    pub fn new(config: SubscriberConfig) -> Self {
        let (broadcast_tx, _) = broadcast::channel(config.broadcast_buffer.max(1));
        let (control_tx, control_rx) = mpsc::channel(32);

        let task = ListenerTask {
            config,
            channels: HashMap::new(),
            broadcast_tx: broadcast_tx.clone(),
            control_rx,
        };
        tokio::spawn(task.run());

        Self {
            broadcast_tx,
            control_tx,
        }
    }

    /// Take a reference on a channel; resolves once Redis confirmed it
    pub async fn subscribe(&self, channel: &ChannelName) -> TransportResult<()> {
        let name = channel.as_str().to_string();
        self.request(|ack| Command::Subscribe(name, ack)).await
    }

    /// Release a reference on a channel taken by `subscribe`
    pub async fn unsubscribe(&self, channel: &ChannelName) -> TransportResult<()> {
        let name = channel.as_str().to_string();
        self.request(|ack| Command::Unsubscribe(name, ack)).await
    }

    async fn request(&self, command: impl FnOnce(Ack) -> Command) -> TransportResult<()> {
        let (ack, done) = oneshot::channel();
        self.control_tx
            .send(command(ack))
            .await
            .map_err(|_| TransportError::ChannelClosed)?;
        done.await.map_err(|_| TransportError::ChannelClosed)?
    }

    /// Receiver for every message on every subscribed channel
    #[must_use]
    pub fn receiver(&self) -> broadcast::Receiver<ReceivedMessage> {
        self.broadcast_tx.subscribe()
    }

    /// Stop the background listener
    pub async fn shutdown(&self) -> TransportResult<()> {
        self.control_tx
            .send(Command::Shutdown)
            .await
            .map_err(|_| TransportError::ChannelClosed)
    }
}

struct ListenerTask {
    config: SubscriberConfig,
    /// Holders per channel; every key is restored after a reconnect
    channels: HashMap<String, usize>,
    broadcast_tx: broadcast::Sender<ReceivedMessage>,
    control_rx: mpsc::Receiver<Command>,
}

impl ListenerTask {
    async fn run(mut self) {
        loop {
            match self.session().await {
                Ok(SessionEnd::Shutdown) => break,
                Ok(SessionEnd::Disconnected) => {
                    tracing::warn!("Pub/Sub stream ended, reconnecting");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Subscriber connection failed, reconnecting");
                }
            }

            if self.wait_reconnect().await {
                break;
            }
        }

        tracing::info!("Subscriber shut down");
    }

    /// One connected session; `Err` means the connection could not be set up
    async fn session(&mut self) -> TransportResult<SessionEnd> {
        let client = redis::Client::open(self.config.redis_url.as_str())?;
        let mut pubsub = client.get_async_pubsub().await?;
        for channel in self.channels.keys() {
            pubsub.subscribe(channel).await?;
        }

        tracing::info!(channels = self.channels.len(), "Subscriber connected to Redis");

        loop {
            // The message stream borrows the connection; rebuild it after each command
            let command = {
                let mut messages = pubsub.on_message();
                loop {
                    tokio::select! {
                        message = messages.next() => match message {
                            Some(message) => self.forward(&message),
                            None => return Ok(SessionEnd::Disconnected),
                        },
                        command = self.control_rx.recv() => break command,
                    }
                }
            };

            match command {
                Some(Command::Subscribe(channel, ack)) => {
                    if let Some(holders) = self.channels.get_mut(&channel) {
                        *holders += 1;
                        let _ = ack.send(Ok(()));
                        continue;
                    }
                    let result = pubsub.subscribe(&channel).await;
                    if result.is_ok() {
                        tracing::debug!(channel = %channel, "Redis channel subscribed");
                        self.channels.insert(channel, 1);
                    }
                    let _ = ack.send(result.map_err(TransportError::from));
                }
                Some(Command::Unsubscribe(channel, ack)) => {
                    let result = if self.release(&channel) {
                        tracing::debug!(channel = %channel, "Redis channel unsubscribed");
                        pubsub.unsubscribe(&channel).await.map_err(TransportError::from)
                    } else {
                        Ok(())
                    };
                    let _ = ack.send(result);
                }
                Some(Command::Shutdown) | None => return Ok(SessionEnd::Shutdown),
            }
        }
    }

    /// Sleep out the reconnect delay while answering commands; `true` on shutdown
    async fn wait_reconnect(&mut self) -> bool {
        let delay = tokio::time::sleep(Duration::from_millis(self.config.reconnect_delay_ms));
        tokio::pin!(delay);

        loop {
            tokio::select! {
                () = &mut delay => return false,
                command = self.control_rx.recv() => match command {
                    Some(Command::Subscribe(channel, ack)) => {
                        let _ = ack.send(Err(TransportError::Unavailable(format!(
                            "not connected, cannot subscribe to {channel}"
                        ))));
                    }
                    Some(Command::Unsubscribe(channel, ack)) => {
                        self.release(&channel);
                        let _ = ack.send(Ok(()));
                    }
                    Some(Command::Shutdown) | None => return true,
                },
            }
        }
    }

    /// Drop one holder of `channel`; `true` when it was the last one
    fn release(&mut self, channel: &str) -> bool {
        match self.channels.get_mut(channel) {
            Some(holders) if *holders > 1 => {
                *holders -= 1;
                false
            }
            Some(_) => {
                self.channels.remove(channel);
                true
            }
            None => false,
        }
    }

    fn forward(&self, message: &redis::Msg) {
        let channel = message.get_channel_name();
        match message.get_payload::<String>() {
            Ok(payload) => {
                tracing::trace!(channel = %channel, "Received Pub/Sub message");
                // No receivers is fine
                let _ = self
                    .broadcast_tx
                    .send(ReceivedMessage::new(ChannelName::custom(channel), payload));
            }
            Err(e) => {
                tracing::trace!(channel = %channel, error = %e, "Discarding undecodable payload");
            }
        }
    }
}
