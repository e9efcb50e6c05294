use crate::retrieval::RetrievedPassage;
use std::fmt;

/// Locally assigned, monotonically increasing turn identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TurnId(pub u64);

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStatus {
    Pending,
    Done,
    Failed,
}

/// One user-utterance/model-reply exchange.
///
/// A turn lives from the moment user input is accepted until its reply has
/// been decoded and rendered. Nothing about it outlives that. `E` is the
/// provider's outbound event type.
#[derive(Debug)]
pub struct Turn<E> {
    pub id: TurnId,
    pub user_text: String,
    pub context: Option<RetrievedPassage>,
    pub status: TurnStatus,
    /// Outbound envelopes in the order they were sent.
    pub envelopes: Vec<E>,
    /// Types of the inbound events received while the turn was in flight.
    pub inbound: Vec<String>,
    /// Raw reply text, filled in when the completion event arrives.
    pub raw_reply: Option<String>,
    /// Failure-status events observed while the turn was in flight.
    pub failures_observed: u32,
}

impl<E> Turn<E> {
    pub fn new(
        id: TurnId,
        user_text: String,
        context: Option<RetrievedPassage>,
        envelopes: Vec<E>,
    ) -> Self {
        Self {
            id,
            user_text,
            context,
            status: TurnStatus::Pending,
            envelopes,
            inbound: Vec::new(),
            raw_reply: None,
            failures_observed: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status != TurnStatus::Pending
    }

    pub fn record_inbound(&mut self, event_type: &str) {
        self.inbound.push(event_type.to_string());
    }

    /// Records the completion event. `failed` marks a completion whose
    /// response status was "failed".
    pub fn complete(&mut self, raw_reply: String, failed: bool) {
        self.raw_reply = Some(raw_reply);
        self.status = if failed {
            TurnStatus::Failed
        } else {
            TurnStatus::Done
        };
    }
}

/// Hands out turn ids in increasing order, starting at 1.
#[derive(Debug, Default)]
pub struct TurnCounter {
    last: u64,
}

impl TurnCounter {
    pub fn next_id(&mut self) -> TurnId {
        self.last += 1;
        TurnId(self.last)
    }
}
