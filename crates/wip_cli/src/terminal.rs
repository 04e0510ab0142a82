//! Terminal implementation of the `Prompter` collaborator.
//!
//! End of input counts as cancellation. `pick` lists the candidates and reads
//! a query. A bare word resolves to the best fuzzy match; a query containing
//! `/` is taken literally so a mistyped path reports the missing segment.

use crate::fuzzy::best_match;
use log::warn;
use std::io::{self, BufRead, Stdin, StdinLock, Stdout, Write};
use wip_core::{Prompter, Reply};

pub struct Terminal<I, O> {
    input: I,
    output: O,
}

impl Terminal<StdinLock<'static>, Stdout> {
    pub fn stdio() -> Self {
        let stdin: Stdin = io::stdin();
        Self::new(stdin.lock(), io::stdout())
    }
}

impl<I: BufRead, O: Write> Terminal<I, O> {
    pub fn new(input: I, output: O) -> Self {
        Self { input, output }
    }

    #[cfg(test)]
    fn into_output(self) -> O {
        self.output
    }
}

impl<I: BufRead, O: Write> Prompter for Terminal<I, O> {
    fn show(&mut self, line: &str) {
        let _ = writeln!(self.output, "{line}");
    }

    fn ask(&mut self, prompt: &str) -> Reply {
        let _ = write!(self.output, "{prompt}");
        let _ = self.output.flush();

        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) => {
                let _ = writeln!(self.output);
                Reply::Cancelled
            }
            Ok(_) => Reply::Answer(line.trim_end_matches(['\n', '\r']).to_string()),
            Err(err) => {
                warn!("event=prompt_read module=cli status=error error={err}");
                Reply::Cancelled
            }
        }
    }

    fn pick(&mut self, prompt: &str, candidates: &[String]) -> Reply {
        for candidate in candidates {
            self.show(&format!("  {candidate}"));
        }
        let query = match self.ask(prompt) {
            Reply::Answer(query) => query,
            Reply::Cancelled => return Reply::Cancelled,
        };
        let trimmed = query.trim();
        if trimmed.is_empty()
            || trimmed.contains('/')
            || candidates.iter().any(|c| c == trimmed)
        {
            return Reply::Answer(query);
        }
        match best_match(&query, candidates) {
            Some(candidate) => {
                self.show(&format!("-> {candidate}"));
                Reply::Answer(candidate.to_string())
            }
            None => Reply::Answer(query),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Terminal;
    use std::io::Cursor;
    use wip_core::{Prompter, Reply};

    fn terminal(input: &str) -> Terminal<Cursor<Vec<u8>>, Vec<u8>> {
        Terminal::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    fn paths() -> Vec<String> {
        vec!["root".to_string(), "/alpha".to_string(), "/alpha/beta".to_string()]
    }

    #[test]
    fn ask_strips_line_ending_and_eof_cancels() {
        let mut term = terminal("2\r\n");
        assert_eq!(term.ask("> "), Reply::Answer("2".to_string()));
        assert_eq!(term.ask("> "), Reply::Cancelled);
    }

    #[test]
    fn pick_resolves_fuzzy_query_to_candidate() {
        let mut term = terminal("bet\n");
        assert_eq!(
            term.pick("Switch to: ", &paths()),
            Reply::Answer("/alpha/beta".to_string())
        );
        let printed = String::from_utf8(term.into_output()).unwrap();
        assert!(printed.contains("  /alpha/beta"));
        assert!(printed.contains("-> /alpha/beta"));
    }

    #[test]
    fn pick_takes_path_queries_literally() {
        let mut term = terminal("/alpha/bet\nalpha/\n");
        assert_eq!(
            term.pick("? ", &paths()),
            Reply::Answer("/alpha/bet".to_string())
        );
        assert_eq!(
            term.pick("? ", &paths()),
            Reply::Answer("alpha/".to_string())
        );
        let printed = String::from_utf8(term.into_output()).unwrap();
        assert!(!printed.contains("->"));
    }

    #[test]
    fn pick_passes_through_exact_empty_and_unmatched_queries() {
        let mut term = terminal("/alpha\n\n/zzz\n");
        assert_eq!(
            term.pick("? ", &paths()),
            Reply::Answer("/alpha".to_string())
        );
        assert_eq!(term.pick("? ", &paths()), Reply::Answer(String::new()));
        assert_eq!(term.pick("? ", &paths()), Reply::Answer("/zzz".to_string()));
        assert_eq!(term.pick("? ", &paths()), Reply::Cancelled);
    }
}
