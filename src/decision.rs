//! Decision sources: who says what happens after a completed pass.
//!
//! The find routine asks once per accepted pass. Sources only review results;
//! they never take part in exposure or device error recovery.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::str::FromStr;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::diagnostics::PassKind;
use crate::error::{AppResult, FinderError};
use crate::locator::InterfaceEstimate;

/// Reply to a completed pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Sweep the same pass again around the current position.
    Repeat,
    /// Move on to the fine pass (coarse only).
    Advance,
    /// Stop; the stage stays on the last estimate.
    Exit,
}

impl Decision {
    /// Short label used in prompts and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Repeat => "repeat",
            Decision::Advance => "fine scan",
            Decision::Exit => "exit",
        }
    }
}

impl FromStr for Decision {
    type Err = FinderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "r" | "repeat" => Ok(Decision::Repeat),
            "f" | "fine" | "advance" => Ok(Decision::Advance),
            "e" | "x" | "q" | "exit" | "quit" => Ok(Decision::Exit),
            other => Err(FinderError::DecisionSource(format!(
                "unrecognised decision '{}'",
                other
            ))),
        }
    }
}

/// Reviews a pass result and picks the next step.
#[async_trait]
pub trait DecisionSource: Send {
    /// Next step after `pass` settled on `estimate`.
    async fn decide(&mut self, pass: PassKind, estimate: &InterfaceEstimate)
        -> AppResult<Decision>;
}

#[async_trait]
impl<S: DecisionSource + ?Sized> DecisionSource for Box<S> {
    async fn decide(
        &mut self,
        pass: PassKind,
        estimate: &InterfaceEstimate,
    ) -> AppResult<Decision> {
        (**self).decide(pass, estimate).await
    }
}

// =============================================================================
// ScriptedDecisions
// =============================================================================

/// Replays a fixed list of decisions, then answers `Exit`.
///
/// ```
/// use interface_finder::decision::{Decision, DecisionSource, ScriptedDecisions};
/// use interface_finder::diagnostics::PassKind;
/// use interface_finder::locator::InterfaceEstimate;
///
/// # tokio_test::block_on(async {
/// let estimate = InterfaceEstimate { index: 0, offset: 0.0, position: 5.0, scores: vec![1] };
/// let mut source = ScriptedDecisions::parse("fine").unwrap();
/// assert_eq!(source.decide(PassKind::Coarse, &estimate).await.unwrap(), Decision::Advance);
/// assert_eq!(source.decide(PassKind::Fine, &estimate).await.unwrap(), Decision::Exit);
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct ScriptedDecisions {
    queue: VecDeque<Decision>,
    asked: Vec<PassKind>,
}

impl ScriptedDecisions {
    /// Source that answers with `decisions`, in order.
    pub fn new(decisions: impl IntoIterator<Item = Decision>) -> Self {
        Self {
            queue: decisions.into_iter().collect(),
            asked: Vec::new(),
        }
    }

    /// Parse a comma separated list such as `"repeat,fine,exit"`.
    pub fn parse(script: &str) -> AppResult<Self> {
        let decisions = script
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(Decision::from_str)
            .collect::<AppResult<Vec<_>>>()?;
        Ok(Self::new(decisions))
    }

    /// Passes this source was consulted about, in order.
    pub fn asked(&self) -> &[PassKind] {
        &self.asked
    }
}

#[async_trait]
impl DecisionSource for ScriptedDecisions {
    async fn decide(
        &mut self,
        pass: PassKind,
        _estimate: &InterfaceEstimate,
    ) -> AppResult<Decision> {
        self.asked.push(pass);
        Ok(self.queue.pop_front().unwrap_or(Decision::Exit))
    }
}

// =============================================================================
// ConsoleDecisions
// =============================================================================

/// Asks an operator on a line-oriented terminal.
///
/// Unrecognised answers re-prompt. End of input counts as `Exit`.
pub struct ConsoleDecisions<R, W> {
    input: R,
    output: W,
}

impl ConsoleDecisions<BufReader<tokio::io::Stdin>, tokio::io::Stdout> {
    /// Console on the process's stdin and stdout.
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> ConsoleDecisions<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Console reading answers from `input` and prompting on `output`.
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    async fn prompt(&mut self, pass: PassKind, estimate: &InterfaceEstimate) -> AppResult<()> {
        let choices = match pass {
            PassKind::Coarse => "(r)epeat, (f)ine scan, (e)xit",
            PassKind::Fine => "(r)epeat, (e)xit",
        };
        let text = format!(
            "[{}] interface at offset {:+.3} (z = {:.3}). {}? ",
            pass, estimate.offset, estimate.position, choices
        );
        self.output
            .write_all(text.as_bytes())
            .await
            .map_err(|e| FinderError::DecisionSource(e.to_string()))?;
        self.output
            .flush()
            .await
            .map_err(|e| FinderError::DecisionSource(e.to_string()))
    }
}

#[async_trait]
impl<R, W> DecisionSource for ConsoleDecisions<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn decide(
        &mut self,
        pass: PassKind,
        estimate: &InterfaceEstimate,
    ) -> AppResult<Decision> {
        loop {
            self.prompt(pass, estimate).await?;

            let mut line = String::new();
            let read = self
                .input
                .read_line(&mut line)
                .await
                .map_err(|e| FinderError::DecisionSource(e.to_string()))?;
            if read == 0 {
                return Ok(Decision::Exit);
            }

            match line.parse::<Decision>() {
                Ok(Decision::Advance) if pass == PassKind::Fine => {}
                Ok(decision) => return Ok(decision),
                Err(_) => {}
            }
        }
    }
}
