//! CLI channel: stdin/stdout REPL for local interviews.

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::channels::{Channel, IncomingMessage, MessageStream};
use crate::error::ChannelError;

/// Conversation identifier used for every CLI message.
pub const CLI_CONVERSATION_ID: &str = "cli:local-user";

/// Reads lines from stdin as one conversation and prints replies to stdout.
#[derive(Default)]
pub struct CliChannel;

impl CliChannel {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            let reader = BufReader::new(tokio::io::stdin());
            let mut lines = reader.lines();

            eprint!("> ");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            eprint!("> ");
                            continue;
                        }
                        let msg = IncomingMessage::new("cli", CLI_CONVERSATION_ID, line);
                        if tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        _msg: &IncomingMessage,
        chunks: Vec<String>,
    ) -> Result<(), ChannelError> {
        write_chunks(&chunks)
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: self.name().to_string(),
                reason: e.to_string(),
            })?;
        eprint!("> ");
        Ok(())
    }
}

async fn write_chunks(chunks: &[String]) -> std::io::Result<()> {
    let mut out = String::new();
    for chunk in chunks {
        out.push('\n');
        out.push_str(chunk);
        out.push('\n');
    }
    out.push('\n');

    let mut stdout = tokio::io::stdout();
    stdout.write_all(out.as_bytes()).await?;
    stdout.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_channel_name() {
        assert_eq!(CliChannel::new().name(), "cli");
    }

    #[tokio::test]
    async fn respond_accepts_chunks() {
        let channel = CliChannel::new();
        let msg = IncomingMessage::new("cli", CLI_CONVERSATION_ID, "hi");
        channel
            .respond(&msg, vec!["part one...".into(), "part two".into()])
            .await
            .unwrap();
    }
}
