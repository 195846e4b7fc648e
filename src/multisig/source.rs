//! Where contribution lines come from
//!
//! The coordinator pulls lines one at a time. In production they are pasted
//! into a terminal; elsewhere they can come from any fixed sequence.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

pub trait SignatureSource {
    /// Read the raw line for contribution `index` (zero-based)
    fn next_line(&mut self, index: usize) -> io::Result<String>;

    /// How many lines the operator will supply, `suggested` unless overridden
    fn expected_count(&mut self, suggested: usize) -> io::Result<usize> {
        Ok(suggested)
    }
}

/// Prompts on a writer and reads pasted lines from a reader
pub struct TerminalSource<R, W> {
    input: R,
    prompt: W,
}

impl TerminalSource<io::StdinLock<'static>, io::Stdout> {
    /// Prompt on stdout, read from stdin
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> TerminalSource<R, W> {
    pub fn new(input: R, prompt: W) -> Self {
        Self { input, prompt }
    }
}

impl<R: BufRead, W: Write> TerminalSource<R, W> {
    fn read_answer(&mut self, what: &str) -> io::Result<String> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("input closed before {what} was supplied"),
            ));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

impl<R: BufRead, W: Write> SignatureSource for TerminalSource<R, W> {
    fn next_line(&mut self, index: usize) -> io::Result<String> {
        write!(self.prompt, "\nsigned-tx-{index}>$ ")?;
        self.prompt.flush()?;
        self.read_answer(&format!("signature {index}"))
    }

    /// Ask the operator; a blank answer takes `suggested`
    fn expected_count(&mut self, suggested: usize) -> io::Result<usize> {
        write!(self.prompt, "\nHow many signatures expected? [{suggested}] ")?;
        self.prompt.flush()?;

        let answer = self.read_answer("the signature count")?;
        let answer = answer.trim();
        if answer.is_empty() {
            return Ok(suggested);
        }
        answer.parse().map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("not a signature count: {answer:?}"),
            )
        })
    }
}

/// Replays a fixed list of lines
#[derive(Debug, Default, Clone)]
pub struct ScriptedSource {
    lines: VecDeque<String>,
}

impl ScriptedSource {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    /// Lines not yet consumed
    pub fn remaining(&self) -> usize {
        self.lines.len()
    }
}

impl SignatureSource for ScriptedSource {
    fn next_line(&mut self, index: usize) -> io::Result<String> {
        self.lines.pop_front().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("no scripted line for signature {index}"),
            )
        })
    }
}
