//! Interactive input collaborator used by `down` and `switch`.
//!
//! # Invariants
//! - Cancellation is an explicit `Reply::Cancelled`, never an error.

/// One answer from the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Answer(String),
    /// Interrupt or end of input.
    Cancelled,
}

/// Line-oriented user interaction.
pub trait Prompter {
    /// Prints one informational line.
    fn show(&mut self, line: &str);
    /// Reads one line of free input.
    fn ask(&mut self, prompt: &str) -> Reply;
    /// Lets the user choose among `candidates`, possibly with fuzzy
    /// completion. The answer may be text that matches no candidate.
    fn pick(&mut self, prompt: &str, candidates: &[String]) -> Reply;
}
