//! Per-invocation lifecycle: `Interaction` (received) -> `Acknowledged` ->
//! `Responded`. Each step consumes the previous token, so a handler can
//! acknowledge once and reply once, in that order.

use crate::model::Reply;
use async_trait::async_trait;
use tokio::sync::oneshot;

/// Where acknowledgments and replies for an interaction are delivered.
#[async_trait]
pub trait ResponseSink: Send {
    /// Must return quickly; the dispatcher is waiting on it.
    fn acknowledge(&mut self, interaction_id: &str);

    async fn deliver(&mut self, interaction_id: &str, reply: Reply);
}

pub struct Interaction {
    id: String,
    sink: Box<dyn ResponseSink>,
}

pub struct Acknowledged {
    id: String,
    sink: Box<dyn ResponseSink>,
}

#[derive(Debug)]
pub struct Responded {
    pub id: String,
}

impl Interaction {
    pub fn new(id: String, sink: Box<dyn ResponseSink>) -> Self {
        Self { id, sink }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn acknowledge(mut self) -> Acknowledged {
        self.sink.acknowledge(&self.id);
        tracing::debug!(interaction_id = %self.id, "Interaction acknowledged");
        Acknowledged {
            id: self.id,
            sink: self.sink,
        }
    }
}

impl Acknowledged {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn respond(mut self, reply: Reply) -> Responded {
        self.sink.deliver(&self.id, reply).await;
        Responded { id: self.id }
    }
}

/// Sink backed by two oneshot channels, used by the HTTP gateway to wait
/// for the acknowledgment and then the reply of a spawned invocation.
pub struct ChannelSink {
    acknowledged: Option<oneshot::Sender<()>>,
    replied: Option<oneshot::Sender<Reply>>,
}

impl ChannelSink {
    pub fn new() -> (Self, oneshot::Receiver<()>, oneshot::Receiver<Reply>) {
        let (ack_sender, ack_receiver) = oneshot::channel();
        let (reply_sender, reply_receiver) = oneshot::channel();
        let sink = Self {
            acknowledged: Some(ack_sender),
            replied: Some(reply_sender),
        };
        (sink, ack_receiver, reply_receiver)
    }
}

#[async_trait]
impl ResponseSink for ChannelSink {
    fn acknowledge(&mut self, interaction_id: &str) {
        match self.acknowledged.take() {
            Some(sender) => {
                if sender.send(()).is_err() {
                    tracing::warn!(interaction_id, "Dispatcher stopped waiting for acknowledgment");
                }
            }
            None => tracing::error!(interaction_id, "Interaction acknowledged twice"),
        }
    }

    async fn deliver(&mut self, interaction_id: &str, reply: Reply) {
        match self.replied.take() {
            Some(sender) => {
                if sender.send(reply).is_err() {
                    tracing::warn!(interaction_id, "Dispatcher stopped waiting for reply");
                }
            }
            None => tracing::error!(interaction_id, "Interaction replied twice"),
        }
    }
}
