// Message channel between the page context and the privileged relay that
// performs the scoring request on its behalf.

use serde::{Deserialize, Serialize};
use swarmwatch_scanner::{AnalysisResult, CommentRecord, ScoringClient};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// The relay went away before replying (or was never reachable).
    #[error("relay channel closed before a reply arrived")]
    Disconnected,

    #[error("relay reported an error: {0}")]
    Relay(String),
}

/// Page -> relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelayMessage {
    AnalyzeComments { payload: Vec<CommentRecord> },
}

/// Relay -> page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RelayReply {
    Success { data: Vec<AnalysisResult> },
    Error { error: String },
}

/// One in-flight request with its single reply slot.
#[derive(Debug)]
pub struct Envelope {
    pub message: RelayMessage,
    pub reply: oneshot::Sender<RelayReply>,
}

/// Page-side end of the channel. Cheap to clone; every cycle gets its own reply slot.
#[derive(Debug, Clone)]
pub struct RelayHandle {
    tx: mpsc::UnboundedSender<Envelope>,
}

/// Relay-side end of the channel.
#[derive(Debug)]
pub struct RelayInbox {
    rx: mpsc::UnboundedReceiver<Envelope>,
}

pub fn channel() -> (RelayHandle, RelayInbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RelayHandle { tx }, RelayInbox { rx })
}

impl RelayHandle {
    /// Hands `records` to the relay and waits for its one reply.
    ///
    /// Sending never blocks. A reply that never arrives because the relay was
    /// torn down is reported as [`TransportError::Disconnected`]. No retries.
    pub async fn analyze(
        &self,
        records: Vec<CommentRecord>,
    ) -> Result<Vec<AnalysisResult>, TransportError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let envelope = Envelope {
            message: RelayMessage::AnalyzeComments { payload: records },
            reply: reply_tx,
        };
        self.tx
            .send(envelope)
            .map_err(|_| TransportError::Disconnected)?;

        match reply_rx.await {
            Ok(RelayReply::Success { data }) => Ok(data),
            Ok(RelayReply::Error { error }) => Err(TransportError::Relay(error)),
            Err(_) => Err(TransportError::Disconnected),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl RelayInbox {
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }

    pub fn close(&mut self) {
        self.rx.close();
    }
}

/// The privileged side: owns the HTTP client and answers every envelope.
pub struct Relay {
    client: ScoringClient,
}

impl Relay {
    pub fn new(client: ScoringClient) -> Self {
        Self { client }
    }

    /// Serves envelopes until every [`RelayHandle`] is dropped.
    /// Each request is handled on its own task so a slow reply never stalls the next.
    pub async fn serve(self, mut inbox: RelayInbox) {
        info!("Relay listening, scoring via {}", self.client.endpoint());
        while let Some(envelope) = inbox.recv().await {
            let client = self.client.clone();
            tokio::spawn(async move {
                let reply = Self::handle(&client, envelope.message).await;
                if envelope.reply.send(reply).is_err() {
                    debug!("Requester went away before the reply was delivered");
                }
            });
        }
        debug!("Relay inbox closed");
    }

    async fn handle(client: &ScoringClient, message: RelayMessage) -> RelayReply {
        match message {
            RelayMessage::AnalyzeComments { payload } => {
                info!("Relay: analyzing {} comments", payload.len());
                match client.analyze(&payload).await {
                    Ok(data) => {
                        debug!("Relay: analysis successful ({} results)", data.len());
                        RelayReply::Success { data }
                    }
                    Err(e) => {
                        error!("Relay: scoring request failed: {}", e);
                        RelayReply::Error {
                            error: e.to_string(),
                        }
                    }
                }
            }
        }
    }
}
