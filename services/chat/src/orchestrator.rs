//! Turn Orchestrator
//!
//! Drives one realtime session through its phases:
//!
//! ```text
//! Connecting -> Configuring -> AwaitingInput -> TurnInFlight -> Decoding -> AwaitingInput ...
//!                    \______________________________^
//! any phase -> Terminal (transport failure or end of input)
//! ```
//!
//! At most one turn is ever in flight. The orchestrator only reads human
//! input after the previous turn's completion event has been decoded and
//! rendered, so the human sets the pace.

use crate::provider::{self, Inbound};
use async_trait::async_trait;
use avatar_core::{
    prompt::PromptComposer,
    reply::{Reply, ReplyDecoder},
    retrieval::RetrievalClient,
    turn::{Turn, TurnCounter, TurnId, TurnStatus},
};
use openai_realtime::{ClientEvent, ConnectionState, RealtimeError, RealtimeTransport};
use std::io;
use tracing::{Instrument, debug, error, info, info_span, warn};

/// Source of human input.
#[async_trait]
pub trait UserInput: Send {
    /// Asks the human for the next message.
    async fn prompt(&mut self) -> io::Result<()>;

    /// The next line of input, or `None` at end of input. Must be
    /// cancel-safe.
    async fn next_line(&mut self) -> io::Result<Option<String>>;
}

/// Consumer of decoded replies.
pub trait Renderer: Send {
    fn render(&mut self, turn: &Turn<ClientEvent>, reply: &Reply) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connecting,
    Configuring,
    AwaitingInput,
    TurnInFlight,
    Decoding,
    Terminal,
}

/// Failures that end the run.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("realtime transport failed: {0}")]
    Transport(#[from] RealtimeError),
    #[error("terminal I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("transport is not open (state: {0:?})")]
    NotConnected(ConnectionState),
    #[error("turn {0} is still in flight")]
    TurnOutstanding(TurnId),
}

/// Totals reported when a run ends without a fatal error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub turns_completed: u64,
    pub turns_failed: u64,
    /// Failed-status events seen across all turns, including ones whose
    /// turn later completed normally.
    pub failure_events: u64,
}

pub struct Orchestrator<T, I, R> {
    transport: T,
    composer: PromptComposer,
    retrieval: Option<RetrievalClient>,
    decoder: ReplyDecoder,
    input: I,
    renderer: R,
    greeting: Option<String>,
    phase: Phase,
    turn: Option<Turn<ClientEvent>>,
    turn_ids: TurnCounter,
    summary: RunSummary,
}

impl<T, I, R> Orchestrator<T, I, R>
where
    T: RealtimeTransport,
    I: UserInput,
    R: Renderer,
{
    pub fn new(transport: T, composer: PromptComposer, input: I, renderer: R) -> Self {
        Self {
            transport,
            composer,
            retrieval: None,
            decoder: ReplyDecoder::default(),
            input,
            renderer,
            greeting: None,
            phase: Phase::Connecting,
            turn: None,
            turn_ids: TurnCounter::default(),
            summary: RunSummary::default(),
        }
    }

    /// Enables retrieval augmentation.
    pub fn with_retrieval(mut self, retrieval: RetrievalClient) -> Self {
        self.retrieval = Some(retrieval);
        self
    }

    /// Sends `greeting` as a synthetic first turn once the session is
    /// configured.
    pub fn with_greeting(mut self, greeting: Option<String>) -> Self {
        self.greeting = greeting;
        self
    }

    pub fn with_decoder(mut self, decoder: ReplyDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Runs until end of input or a fatal error.
    pub async fn run(&mut self) -> Result<RunSummary, OrchestratorError> {
        while self.phase != Phase::Terminal {
            self.step().await?;
        }
        Ok(self.summary)
    }

    /// Closes the session from outside the loop, e.g. on an interrupt.
    pub async fn shutdown(&mut self) -> Result<(), OrchestratorError> {
        self.phase = Phase::Terminal;
        if let Some(turn) = self.turn.take().filter(|t| !t.is_terminal()) {
            warn!(turn_id = %turn.id, "Abandoning turn in flight");
        }
        self.transport.close().await?;
        Ok(())
    }

    /// Advances the state machine by one transition and returns the new
    /// phase. Any error moves the orchestrator to `Terminal`.
    pub async fn step(&mut self) -> Result<Phase, OrchestratorError> {
        let result = match self.phase {
            Phase::Connecting => self.confirm_open(),
            Phase::Configuring => self.configure().await,
            Phase::AwaitingInput => self.await_input().await,
            Phase::TurnInFlight => self.await_completion().await,
            Phase::Decoding => self.decode_and_render(),
            Phase::Terminal => Ok(Phase::Terminal),
        };
        match result {
            Ok(next) => {
                if next != self.phase {
                    debug!(from = ?self.phase, to = ?next, "Phase transition");
                }
                self.phase = next;
                Ok(next)
            }
            Err(e) => {
                error!(phase = ?self.phase, error = %e, "Conversation terminated");
                self.phase = Phase::Terminal;
                if self.transport.state() == ConnectionState::Open {
                    let _ = self.transport.close().await;
                }
                Err(e)
            }
        }
    }

    fn confirm_open(&self) -> Result<Phase, OrchestratorError> {
        match self.transport.state() {
            ConnectionState::Open => Ok(Phase::Configuring),
            other => Err(OrchestratorError::NotConnected(other)),
        }
    }

    async fn configure(&mut self) -> Result<Phase, OrchestratorError> {
        let session = self.composer.session_config();
        self.transport
            .send(&provider::session_update(&session))
            .await?;
        info!(
            placement = ?self.composer.placement(),
            temperature = session.temperature,
            retrieval = self.retrieval.is_some(),
            "Session configured"
        );

        match self.greeting.take() {
            Some(greeting) => {
                self.start_turn(greeting).await?;
                Ok(Phase::TurnInFlight)
            }
            None => Ok(Phase::AwaitingInput),
        }
    }

    async fn await_input(&mut self) -> Result<Phase, OrchestratorError> {
        self.input.prompt().await?;
        loop {
            tokio::select! {
                line = self.input.next_line() => {
                    match line? {
                        None => {
                            info!("End of input. Closing session.");
                            self.transport.close().await?;
                            return Ok(Phase::Terminal);
                        }
                        Some(text) if text.trim().is_empty() => {
                            self.input.prompt().await?;
                        }
                        Some(text) => {
                            self.start_turn(text.trim().to_string()).await?;
                            return Ok(Phase::TurnInFlight);
                        }
                    }
                }
                event = self.transport.next_event() => {
                    let event = event?;
                    debug!(
                        event_type = ?event.event_type(),
                        "Ignoring event received between turns"
                    );
                }
            }
        }
    }

    /// Composes and sends one turn as a content + trigger pair.
    async fn start_turn(&mut self, user_text: String) -> Result<(), OrchestratorError> {
        if let Some(turn) = &self.turn {
            return Err(OrchestratorError::TurnOutstanding(turn.id));
        }
        let id = self.turn_ids.next_id();
        let span = info_span!("turn", turn_id = %id);

        let context = match &self.retrieval {
            Some(retrieval) => retrieval.query(&user_text).instrument(span.clone()).await,
            None => None,
        };
        let generic = self.composer.compose_turn(&user_text, context.as_ref());
        let events = provider::turn_events(&generic);
        self.transport
            .send_batch(&events)
            .instrument(span.clone())
            .await?;
        span.in_scope(|| info!(with_context = context.is_some(), "Turn sent"));

        self.turn = Some(Turn::new(id, user_text, context, Vec::from(events)));
        Ok(())
    }

    async fn await_completion(&mut self) -> Result<Phase, OrchestratorError> {
        let event = self.transport.next_event().await?;
        let Some(turn) = self.turn.as_mut() else {
            warn!("No turn in flight; returning to input");
            return Ok(Phase::AwaitingInput);
        };
        let _span = info_span!("turn", turn_id = %turn.id).entered();
        turn.record_inbound(event.event_type().unwrap_or("<untyped>"));

        match provider::classify(&event) {
            Inbound::Completed(done) => {
                let failed = done.is_failed();
                if failed {
                    warn!(
                        details = ?event.status_details(),
                        "Response finished with failed status"
                    );
                }
                if let Some(usage) = &done.usage {
                    info!(
                        total_tokens = usage.total_tokens,
                        input_tokens = usage.input_tokens,
                        output_tokens = usage.output_tokens,
                        "Response complete"
                    );
                }
                turn.complete(done.text, failed);
                Ok(Phase::Decoding)
            }
            Inbound::ResponseFailed(details) => {
                turn.failures_observed += 1;
                warn!(?details, "Response reported failed status; awaiting completion");
                Ok(Phase::TurnInFlight)
            }
            Inbound::Error(message) => {
                warn!(%message, "Server reported an error");
                Ok(Phase::TurnInFlight)
            }
            Inbound::Other(kind) => {
                debug!(event_type = %kind, "Inbound event");
                Ok(Phase::TurnInFlight)
            }
        }
    }

    fn decode_and_render(&mut self) -> Result<Phase, OrchestratorError> {
        let Some(turn) = self.turn.take() else {
            return Ok(Phase::AwaitingInput);
        };
        let _span = info_span!("turn", turn_id = %turn.id).entered();
        let reply = self
            .decoder
            .decode(turn.raw_reply.as_deref().unwrap_or_default());
        if reply.is_fallback() {
            warn!("Rendering fallback segment");
        }
        self.renderer.render(&turn, &reply)?;

        match turn.status {
            TurnStatus::Failed => self.summary.turns_failed += 1,
            _ => self.summary.turns_completed += 1,
        }
        self.summary.failure_events += u64::from(turn.failures_observed);
        info!(
            status = ?turn.status,
            segments = reply.segments().len(),
            user_chars = turn.user_text.chars().count(),
            context_source = turn.context.as_ref().map(|c| c.source.as_str()),
            failures_observed = turn.failures_observed,
            inbound_events = turn.inbound.len(),
            "Turn finished"
        );
        Ok(Phase::AwaitingInput)
    }
}
