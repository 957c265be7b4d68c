// Scripted operator for tests: answers from a fixed list, records all output

use std::collections::VecDeque;

use super::{Result, SessionError, SessionStream};

#[derive(Debug, Default)]
pub(crate) struct ScriptedSession {
    input: VecDeque<String>,
    output: String,
}

impl ScriptedSession {
    pub(crate) fn new(lines: &[&str]) -> Self {
        Self {
            input: lines.iter().map(|l| l.to_string()).collect(),
            ..Self::default()
        }
    }

    pub(crate) fn output(&self) -> &str {
        &self.output
    }

    pub(crate) fn remaining(&self) -> usize {
        self.input.len()
    }
}

impl SessionStream for ScriptedSession {
    fn read_line(&mut self) -> Result<String> {
        self.input.pop_front().ok_or(SessionError::Closed)
    }

    fn write(&mut self, text: &str) -> Result<()> {
        self.output.push_str(text);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
