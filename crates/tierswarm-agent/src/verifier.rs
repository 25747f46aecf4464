// ABOUTME: Streams the verifier's merged answer from a background producer task.
// ABOUTME: VerifierStream yields text increments in order and ends with at most one error.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::{Stream, StreamExt};
use tierswarm_core::Credential;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::model::{Message, ModelClient, ModelError};

const CHANNEL_CAPACITY: usize = 64;

/// Lazily consumed verifier output. Dropping it stops the producer at its
/// next send.
pub struct VerifierStream {
    inner: ReceiverStream<Result<String, ModelError>>,
}

impl VerifierStream {
    /// Drain the stream into one string, stopping at the first error.
    pub async fn collect_text(mut self) -> Result<String, ModelError> {
        let mut text = String::new();
        while let Some(chunk) = self.next().await {
            text.push_str(&chunk?);
        }
        Ok(text)
    }
}

impl Stream for VerifierStream {
    type Item = Result<String, ModelError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// Start the streaming verifier call. `timeout` bounds opening the stream
/// and each gap between chunks.
pub fn spawn_verifier(
    client: Arc<dyn ModelClient>,
    credential: Credential,
    model: String,
    messages: Vec<Message>,
    cancel: CancellationToken,
    timeout: Duration,
) -> VerifierStream {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    tokio::spawn(async move {
        tracing::info!(model = %model, credential = %credential, "verifier starting");
        let opened = tokio::select! {
            _ = cancel.cancelled() => Err(ModelError::Cancelled),
            opened = tokio::time::timeout(timeout, client.complete_streaming(&credential, &model, &messages)) => {
                opened.unwrap_or_else(|_| Err(ModelError::Timeout(format!("verifier did not respond within {}s", timeout.as_secs()))))
            }
        };

        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(error = %e, "verifier failed to start");
                let _ = tx.send(Err(e)).await;
                return;
            }
        };

        let mut chunks = 0usize;
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => Some(Err(ModelError::Cancelled)),
                next = tokio::time::timeout(timeout, stream.next()) => {
                    next.unwrap_or_else(|_| Some(Err(ModelError::Timeout("verifier stream stalled".to_string()))))
                }
            };
            match next {
                None => break,
                Some(Ok(text)) => {
                    chunks += 1;
                    if tx.send(Ok(text)).await.is_err() {
                        tracing::debug!("verifier consumer dropped, stopping");
                        return;
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, chunks, "verifier stream ended with error");
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            }
        }
        tracing::info!(chunks, "verifier finished");
    });

    VerifierStream {
        inner: ReceiverStream::new(rx),
    }
}
