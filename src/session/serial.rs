// Serial line session (USB-UART console cable)

use std::io::{Read, Write};
use std::time::Duration;

use serialport::SerialPort;
use tracing::info;

use super::{Result, SessionError, SessionHandler, SessionListener, SessionStream};

/// Default serial configuration for the operator console
pub const DEFAULT_BAUDRATE: u32 = 115_200;
const READ_TIMEOUT: Duration = Duration::from_secs(60);

pub struct SerialSession {
    port: Box<dyn SerialPort>,
}

impl SerialSession {
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(READ_TIMEOUT)
            .open()?;
        Ok(Self { port })
    }
}

impl SessionStream for SerialSession {
    fn read_line(&mut self) -> Result<String> {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];

        loop {
            match self.port.read(&mut byte) {
                Ok(0) => return Err(SessionError::Closed),
                Ok(_) => match byte[0] {
                    b'\n' => break,
                    b'\r' => {}
                    b => line.push(b),
                },
                // Operator reads block indefinitely; the port timeout is only a poll interval
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(String::from_utf8_lossy(&line).into_owned())
    }

    fn write(&mut self, text: &str) -> Result<()> {
        self.port.write_all(text.as_bytes())?;
        self.port.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.port.flush()?;
        Ok(())
    }
}

pub struct SerialSessionListener {
    port_name: String,
    baud_rate: u32,
}

impl SerialSessionListener {
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
        }
    }
}

impl SessionListener for SerialSessionListener {
    fn on_reconnect(&mut self, callback: &mut SessionHandler<'_>) -> Result<()> {
        info!(
            "Opening serial session on {} at {} baud",
            self.port_name, self.baud_rate
        );
        let mut session = SerialSession::open(&self.port_name, self.baud_rate)?;
        let outcome = callback(&mut session);
        session.close()?;

        match outcome {
            Err(SessionError::Closed) => Ok(()),
            other => other,
        }
    }
}
