//! Channels: how users reach the interview.
//!
//! Streaming channels (the CLI) implement [`Channel`] and are driven by
//! [`run_channel`]. The WhatsApp webhook is request/response and lives in
//! [`whatsapp`] as an axum router.

pub mod cli;
pub mod split;
pub mod whatsapp;

pub use cli::CliChannel;
pub use split::{CONTINUATION_SUFFIX, split_message};
pub use whatsapp::{WebhookState, router};

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tracing::{info, warn};

use crate::error::ChannelError;
use crate::interview::{InboundTurn, InterviewController};

/// A message received from a channel.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Channel that produced the message.
    pub channel: String,
    /// Conversation identifier the message belongs to.
    pub conversation_id: String,
    pub content: String,
}

impl IncomingMessage {
    pub fn new(
        channel: impl Into<String>,
        conversation_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            conversation_id: conversation_id.into(),
            content: content.into(),
        }
    }
}

/// Stream of inbound messages.
pub type MessageStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;

/// A source of inbound messages that can send chunked replies back.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Start listening; the stream ends when the channel closes.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Send reply chunks for `msg`, in order.
    async fn respond(&self, msg: &IncomingMessage, chunks: Vec<String>)
    -> Result<(), ChannelError>;
}

/// Feed every message from `channel` through the controller until the
/// channel's stream ends.
pub async fn run_channel(
    channel: Arc<dyn Channel>,
    controller: Arc<InterviewController>,
    chunk_size: usize,
) -> Result<(), ChannelError> {
    let mut stream = channel.start().await?;
    info!(channel = channel.name(), "Channel started");

    while let Some(msg) = stream.next().await {
        let reply = controller
            .handle(InboundTurn::new(&msg.conversation_id, &msg.content))
            .await;
        let chunks = split_message(&reply.text, chunk_size);
        if let Err(e) = channel.respond(&msg, chunks).await {
            warn!(
                channel = channel.name(),
                conversation_id = %msg.conversation_id,
                error = %e,
                "Failed to send reply"
            );
        }
    }

    info!(channel = channel.name(), "Channel closed");
    Ok(())
}
