//! The narrow seam between the pipeline and the messaging platform.
//!
//! The pipeline never sees transport identifiers beyond an opaque reply
//! target; the transport never sees pipeline internals beyond "deliver this
//! artifact" / "deliver this text".

#[cfg(feature = "telegram")]
pub mod telegram;

use crate::audio::AudioClip;
use crate::error::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Opaque address for replies. The transport mints it and is the only
/// party that can interpret it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTarget(pub String);

/// A voice recording handed to the pipeline, with its reply address.
#[derive(Debug, Clone)]
pub struct IncomingClip {
    pub reply: ReplyTarget,
    pub clip: AudioClip,
}

/// What gets sent back for one invocation: exactly one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// The result artifact, offered as a file download.
    Document { filename: String, bytes: Vec<u8> },
    /// A plain-text message (not-found or generic failure).
    Text(String),
}

/// Messaging platform seam.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Wait for the next voice clip. `None` means the transport has shut
    /// down and the serve loop should exit.
    ///
    /// Implementations retry transient receive failures internally; an
    /// `Err` here is non-recoverable and stops the service.
    async fn next_clip(&mut self) -> Result<Option<IncomingClip>>;

    /// Deliver one reply to the given target.
    async fn deliver(&self, to: &ReplyTarget, delivery: Delivery) -> Result<()>;
}

/// In-memory transport backed by channels. Test double for the serve loop.
pub struct ChannelTransport {
    incoming: mpsc::Receiver<IncomingClip>,
    outgoing: mpsc::Sender<(ReplyTarget, Delivery)>,
}

impl ChannelTransport {
    /// Build a transport plus the handles a test drives it with: a sender
    /// for clips and a receiver for deliveries.
    pub fn new(
        capacity: usize,
    ) -> (
        Self,
        mpsc::Sender<IncomingClip>,
        mpsc::Receiver<(ReplyTarget, Delivery)>,
    ) {
        let (clip_tx, clip_rx) = mpsc::channel(capacity);
        let (delivery_tx, delivery_rx) = mpsc::channel(capacity);
        (
            Self {
                incoming: clip_rx,
                outgoing: delivery_tx,
            },
            clip_tx,
            delivery_rx,
        )
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn next_clip(&mut self) -> Result<Option<IncomingClip>> {
        Ok(self.incoming.recv().await)
    }

    async fn deliver(&self, to: &ReplyTarget, delivery: Delivery) -> Result<()> {
        self.outgoing
            .send((to.clone(), delivery))
            .await
            .map_err(|e| crate::error::BergvoxError::Transport {
                message: format!("delivery channel closed: {}", e),
            })
    }
}
