// Console session: stdin/stdout, exactly one logical session

use std::io::{self, StdinLock, Stdout, Write};

use tracing::info;

use super::{Result, SessionError, SessionHandler, SessionListener, SessionStream, read_text_line};

pub struct ConsoleSession {
    stdin: StdinLock<'static>,
    stdout: Stdout,
}

impl ConsoleSession {
    pub fn new() -> Self {
        Self {
            stdin: io::stdin().lock(),
            stdout: io::stdout(),
        }
    }
}

impl Default for ConsoleSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStream for ConsoleSession {
    fn read_line(&mut self) -> Result<String> {
        read_text_line(&mut self.stdin)
    }

    fn write(&mut self, text: &str) -> Result<()> {
        self.stdout.write_all(text.as_bytes())?;
        self.stdout.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.stdout.flush()?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct ConsoleListener;

impl SessionListener for ConsoleListener {
    fn on_reconnect(&mut self, callback: &mut SessionHandler<'_>) -> Result<()> {
        info!("Starting console session");
        let mut session = ConsoleSession::new();
        let outcome = callback(&mut session);
        session.close()?;

        match outcome {
            Err(SessionError::Closed) => Ok(()),
            other => other,
        }
    }
}
