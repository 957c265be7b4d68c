// Operator session streams
//
// A `SessionListener` hands out one `SessionStream` per logical session
// (a console run, a TCP connection, an opened serial line). The calibration
// prompts and the top-level menu only ever see the `SessionStream` trait.

use std::io::BufRead;

mod console;
mod serial;
mod tcp;

#[cfg(test)]
pub(crate) mod scripted;

pub use console::{ConsoleListener, ConsoleSession};
pub use serial::{DEFAULT_BAUDRATE, SerialSession, SerialSessionListener};
pub use tcp::{TcpSession, TcpSessionListener};

/// Error types for operator sessions
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session closed by operator")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// Line-oriented duplex text channel to the operator
pub trait SessionStream {
    /// Block until the operator sends a line; the line ending is stripped
    fn read_line(&mut self) -> Result<String>;

    fn write(&mut self, text: &str) -> Result<()>;

    fn close(&mut self) -> Result<()>;
}

/// Callback run once per logical session
pub type SessionHandler<'a> = dyn FnMut(&mut dyn SessionStream) -> Result<()> + 'a;

pub trait SessionListener: Send {
    /// Invoke `callback` for every new logical session
    ///
    /// Blocks for as long as the transport can produce sessions. Each session is
    /// closed after the callback returns, whatever the outcome.
    fn on_reconnect(&mut self, callback: &mut SessionHandler<'_>) -> Result<()>;
}

/// Write a prompt and wait for the answer
pub fn ask(session: &mut dyn SessionStream, prompt: &str) -> Result<String> {
    session.write(prompt)?;
    session.read_line()
}

/// Read one line from a buffered transport
///
/// Bytes that are not UTF-8 are replaced rather than rejected. End of stream
/// is `SessionError::Closed`.
pub(crate) fn read_text_line(reader: &mut impl BufRead) -> Result<String> {
    let mut raw = Vec::new();
    if reader.read_until(b'\n', &mut raw)? == 0 {
        return Err(SessionError::Closed);
    }
    Ok(strip_line_ending(String::from_utf8_lossy(&raw).into_owned()))
}

pub(crate) fn strip_line_ending(mut line: String) -> String {
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    line
}
