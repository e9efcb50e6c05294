//! Terminal input and reply rendering.

use crate::{
    config::RenderFormat,
    orchestrator::{Renderer, UserInput},
};
use async_trait::async_trait;
use avatar_core::{reply::Reply, turn::Turn};
use openai_realtime::ClientEvent;
use std::io::{self, BufRead, Write};
use tokio::{
    io::{AsyncWriteExt, Stdout},
    sync::mpsc,
};
use tracing::debug;

pub const PROMPT: &str = "Your message: ";

/// Reads one message per line from standard input.
///
/// Lines are read on a dedicated OS thread and handed over a channel, so a
/// pending read never holds up runtime shutdown. The thread ends at end of
/// input, on a read error, or once the receiver is dropped and the next line
/// arrives.
pub struct StdinInput {
    lines: mpsc::Receiver<io::Result<String>>,
    stdout: Stdout,
}

impl StdinInput {
    pub fn new() -> Self {
        Self::from_reader(io::BufReader::new(io::stdin()))
    }

    /// Reads lines from `reader` instead of standard input.
    pub fn from_reader<B>(reader: B) -> Self
    where
        B: BufRead + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(1);
        std::thread::spawn(move || {
            for line in reader.lines() {
                let failed = line.is_err();
                if tx.blocking_send(line).is_err() || failed {
                    break;
                }
            }
            debug!("Input reader finished");
        });
        Self {
            lines: rx,
            stdout: tokio::io::stdout(),
        }
    }
}

impl Default for StdinInput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserInput for StdinInput {
    async fn prompt(&mut self) -> io::Result<()> {
        self.stdout.write_all(PROMPT.as_bytes()).await?;
        self.stdout.flush().await
    }

    async fn next_line(&mut self) -> io::Result<Option<String>> {
        self.lines.recv().await.transpose()
    }
}

/// Writes each reply to `out`, either as one annotated line per segment or
/// as a single JSON array line.
pub struct TerminalRenderer<W> {
    out: W,
    format: RenderFormat,
}

impl TerminalRenderer<io::Stdout> {
    pub fn stdout(format: RenderFormat) -> Self {
        Self::new(io::stdout(), format)
    }
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W, format: RenderFormat) -> Self {
        Self { out, format }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Renderer for TerminalRenderer<W> {
    fn render(&mut self, _turn: &Turn<ClientEvent>, reply: &Reply) -> io::Result<()> {
        match self.format {
            RenderFormat::Text => {
                for segment in reply.segments() {
                    writeln!(
                        self.out,
                        "[{} | {}] {}",
                        segment.facial_expression, segment.animation, segment.text
                    )?;
                }
            }
            RenderFormat::Json => {
                serde_json::to_writer(&mut self.out, reply.segments())?;
                writeln!(self.out)?;
            }
        }
        self.out.flush()
    }
}
