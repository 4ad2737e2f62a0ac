//! Presence channel for one conversation.
//!
//! A `TypingChannel` owns the subscription to its conversation's broadcast
//! channel. A single listener task is the only writer of the peer's typing
//! state: it multiplexes inbound messages, the decay deadline, peer switches
//! and shutdown. The handle itself only throttles and sends outbound signals.

use parking_lot::{Mutex, RwLock};
use presence_common::{PresenceError, PresenceResult};
use presence_core::{ConversationId, InboundTypingEvent, ParticipantId, TypingEvent};
use presence_transport::{
    ChannelName, ReceivedMessage, SharedTransport, Subscription, SubscriptionId,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::client::ChannelOptions;
use crate::registry::Registration;
use crate::throttle::ThrottleGate;
use crate::tracker::RemoteTypingTracker;

type ChangeCallback = Arc<dyn Fn(bool) + Send + Sync>;

/// What happened to an outbound typing signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Handed to the transport
    Sent,
    /// Dropped by the throttle window
    Coalesced,
    /// The transport refused it; the signal is lost
    Failed,
    /// The channel was already closed
    Closed,
}

impl SendOutcome {
    #[must_use]
    pub fn is_sent(self) -> bool {
        matches!(self, Self::Sent)
    }
}

enum Command {
    SwitchPeer(ParticipantId),
    Shutdown,
}

/// State read by the handle, written by the listener task
#[derive(Default)]
struct Shared {
    peer_typing: AtomicBool,
    callbacks: RwLock<Vec<ChangeCallback>>,
}

impl Shared {
    fn notify(&self, is_typing: bool) {
        self.peer_typing.store(is_typing, Ordering::SeqCst);

        // Callbacks run without the lock held so they may register more
        let callbacks = self.callbacks.read().clone();
        for callback in callbacks {
            callback(is_typing);
        }
    }
}

/// Live typing-presence channel between the local user and one peer
pub struct TypingChannel {
    conversation_id: ConversationId,
    self_id: ParticipantId,
    peer_id: RwLock<ParticipantId>,
    channel: ChannelName,
    subscription_id: SubscriptionId,
    transport: SharedTransport,
    gate: Mutex<ThrottleGate>,
    /// Held shared by each send; `close` takes it exclusively to wait them out
    sending: tokio::sync::RwLock<()>,
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<Command>,
    listener: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    registration: Mutex<Option<Registration>>,
    closed: AtomicBool,
}

impl TypingChannel {
    /// Start listening on an established subscription
    pub(crate) fn spawn(
        conversation_id: ConversationId,
        self_id: ParticipantId,
        peer_id: ParticipantId,
        transport: SharedTransport,
        subscription: Subscription,
        registration: Registration,
        options: ChannelOptions,
    ) -> Self {
        let channel = subscription.channel().clone();
        let subscription_id = subscription.id();
        let shared = Arc::new(Shared::default());
        let (commands, command_rx) = mpsc::unbounded_channel();

        let tracker = RemoteTypingTracker::new(peer_id.clone(), options.decay_window);
        let listener = tokio::spawn(listen(
            subscription,
            tracker,
            command_rx,
            shared.clone(),
            conversation_id.clone(),
        ));

        Self {
            conversation_id,
            self_id,
            peer_id: RwLock::new(peer_id),
            channel,
            subscription_id,
            transport,
            gate: Mutex::new(ThrottleGate::new(options.throttle_window)),
            sending: tokio::sync::RwLock::new(()),
            shared,
            commands,
            listener: tokio::sync::Mutex::new(Some(listener)),
            registration: Mutex::new(Some(registration)),
            closed: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    #[must_use]
    pub fn self_id(&self) -> &ParticipantId {
        &self.self_id
    }

    #[must_use]
    pub fn peer_id(&self) -> ParticipantId {
        self.peer_id.read().clone()
    }

    #[must_use]
    pub fn channel_name(&self) -> &ChannelName {
        &self.channel
    }

    /// Whether the peer is currently shown as typing
    #[must_use]
    pub fn is_peer_typing(&self) -> bool {
        self.shared.peer_typing.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Register a consumer for peer typing changes.
    ///
    /// Invoked on the listener task each time the observed state flips.
    /// A refreshing `true` does not invoke it again.
    pub fn on_remote_typing_change<F>(&self, callback: F)
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.shared.callbacks.write().push(Arc::new(callback));
    }

    /// Report the local user's typing state to the peer.
    ///
    /// `true` is sent at most once per throttle window; `false` is always sent.
    pub async fn report_typing(&self, is_typing: bool) -> SendOutcome {
        let _sending = self.sending.read().await;
        if self.is_closed() {
            return SendOutcome::Closed;
        }

        let admitted = self.gate.lock().admit(is_typing, Instant::now());
        if !admitted {
            tracing::trace!(conversation_id = %self.conversation_id, "Typing signal coalesced");
            return SendOutcome::Coalesced;
        }

        let envelope = match TypingEvent::new(&self.self_id, is_typing).to_envelope() {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode typing signal");
                return SendOutcome::Failed;
            }
        };

        match self.transport.send(&self.channel, &envelope).await {
            Ok(()) => {
                tracing::trace!(
                    conversation_id = %self.conversation_id,
                    is_typing = is_typing,
                    "Typing signal sent"
                );
                SendOutcome::Sent
            }
            Err(e) => {
                // Let the next keystroke try again instead of waiting out the window
                if is_typing {
                    self.gate.lock().reset();
                }
                let err = PresenceError::send(&self.channel, e);
                tracing::warn!(
                    conversation_id = %self.conversation_id,
                    code = err.error_code(),
                    error = %err,
                    "Typing signal dropped"
                );
                SendOutcome::Failed
            }
        }
    }

    /// Tell the peer the local user stopped typing (message sent, input blurred)
    pub async fn stop_typing(&self) -> SendOutcome {
        self.report_typing(false).await
    }

    /// Watch another participant of this conversation.
    ///
    /// The peer's typing state restarts as not typing.
    pub fn switch_peer(&self, peer: ParticipantId) -> PresenceResult<()> {
        if self.is_closed() {
            return Err(PresenceError::ChannelClosed);
        }

        *self.peer_id.write() = peer.clone();
        self.commands
            .send(Command::SwitchPeer(peer))
            .map_err(|_| PresenceError::ChannelClosed)
    }

    /// Unsubscribe and release the channel.
    ///
    /// Safe to call more than once. Once this returns, no change callback
    /// runs and no typing signal goes out.
    pub async fn close(&self) {
        let mut listener = self.listener.lock().await;
        let Some(handle) = listener.take() else {
            return;
        };

        self.closed.store(true, Ordering::SeqCst);
        // Sends that passed the closed check finish before this resolves
        drop(self.sending.write().await);

        let _ = self.commands.send(Command::Shutdown);
        if let Err(e) = handle.await {
            if e.is_panic() {
                tracing::warn!(
                    conversation_id = %self.conversation_id,
                    "Presence listener panicked"
                );
            }
        }

        self.gate.lock().reset();
        self.shared.peer_typing.store(false, Ordering::SeqCst);

        if let Err(e) = self
            .transport
            .unsubscribe(&self.channel, self.subscription_id)
            .await
        {
            tracing::warn!(channel = %self.channel, error = %e, "Failed to unsubscribe");
        }

        self.registration.lock().take();

        tracing::debug!(conversation_id = %self.conversation_id, "Presence channel closed");
    }
}

impl std::fmt::Debug for TypingChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypingChannel")
            .field("conversation_id", &self.conversation_id)
            .field("self_id", &self.self_id)
            .field("peer_id", &*self.peer_id.read())
            .field("peer_typing", &self.is_peer_typing())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Drop for TypingChannel {
    fn drop(&mut self) {
        let Some(handle) = self.listener.get_mut().take() else {
            return;
        };
        handle.abort();
        tracing::debug!(
            conversation_id = %self.conversation_id,
            "Presence channel dropped without close"
        );

        // Best effort: without a runtime the subscription lives until the transport goes
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let transport = self.transport.clone();
        let channel = self.channel.clone();
        let id = self.subscription_id;
        runtime.spawn(async move {
            if let Err(e) = transport.unsubscribe(&channel, id).await {
                tracing::warn!(channel = %channel, error = %e, "Failed to unsubscribe dropped channel");
            }
        });
    }
}

/// Listener loop; the only writer of the tracker
async fn listen(
    mut subscription: Subscription,
    mut tracker: RemoteTypingTracker,
    mut commands: mpsc::UnboundedReceiver<Command>,
    shared: Arc<Shared>,
    conversation_id: ConversationId,
) {
    loop {
        let deadline = tracker.deadline();

        tokio::select! {
            biased;

            command = commands.recv() => match command {
                Some(Command::SwitchPeer(peer)) => {
                    tracing::debug!(
                        conversation_id = %conversation_id,
                        peer_id = %peer,
                        "Presence peer switched"
                    );
                    if let Some(state) = tracker.switch_peer(peer) {
                        shared.notify(state);
                    }
                }
                Some(Command::Shutdown) | None => break,
            },

            () = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if let Some(state) = tracker.expire(Instant::now()) {
                    tracing::trace!(
                        conversation_id = %conversation_id,
                        peer_id = %tracker.peer(),
                        "Peer typing decayed"
                    );
                    shared.notify(state);
                }
            }

            message = subscription.recv() => match message {
                Some(message) => {
                    let Some(inbound) = decode(&message) else {
                        continue;
                    };
                    if let Some(state) = tracker.apply(&inbound.event, Instant::now()) {
                        tracing::trace!(
                            conversation_id = %conversation_id,
                            peer_id = %tracker.peer(),
                            is_typing = state,
                            received_at = %inbound.received_at,
                            "Peer typing changed"
                        );
                        shared.notify(state);
                    }
                }
                None => {
                    tracing::debug!(
                        conversation_id = %conversation_id,
                        "Presence subscription ended"
                    );
                    if let Some(state) = tracker.reset() {
                        shared.notify(state);
                    }
                    break;
                }
            },
        }
    }
}

/// Extract a typing event, discarding anything malformed or unrelated
fn decode(message: &ReceivedMessage) -> Option<InboundTypingEvent> {
    let envelope = match message.envelope() {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::trace!(channel = %message.channel, error = %e, "Discarding malformed message");
            return None;
        }
    };

    match TypingEvent::from_envelope(&envelope) {
        Ok(Some(event)) => Some(InboundTypingEvent {
            event,
            received_at: message.received_at,
        }),
        Ok(None) => {
            tracing::trace!(channel = %message.channel, event = %envelope.event, "Ignoring non-typing event");
            None
        }
        Err(e) => {
            tracing::trace!(channel = %message.channel, error = %e, "Discarding malformed typing event");
            None
        }
    }
}
