// TCP session server
//
// Connections are accepted one at a time with a blocking accept; each
// connection is one logical session and the menu restarts for the next one.

use std::io::{BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use tracing::{info, warn};

use super::{Result, SessionError, SessionHandler, SessionListener, SessionStream, read_text_line};

// Pause after a failed accept so a persistent error (e.g. EMFILE) does not spin
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

pub struct TcpSession {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    peer: SocketAddr,
}

impl TcpSession {
    pub fn new(stream: TcpStream) -> Result<Self> {
        let peer = stream.peer_addr()?;
        let reader = BufReader::new(stream.try_clone()?);
        Ok(Self {
            reader,
            writer: stream,
            peer,
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl SessionStream for TcpSession {
    fn read_line(&mut self) -> Result<String> {
        read_text_line(&mut self.reader)
    }

    fn write(&mut self, text: &str) -> Result<()> {
        self.writer.write_all(text.as_bytes())?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        match self.writer.shutdown(Shutdown::Both) {
            // Peer already gone
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            other => Ok(other?),
        }
    }
}

pub struct TcpSessionListener {
    listener: TcpListener,
}

impl TcpSessionListener {
    pub fn bind(port: u16) -> Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port))?;
        info!("Session server listening on TCP port {}", port);
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

impl SessionListener for TcpSessionListener {
    fn on_reconnect(&mut self, callback: &mut SessionHandler<'_>) -> Result<()> {
        loop {
            info!("Waiting for incoming TCP connection...");
            let stream = match self.listener.accept() {
                Ok((stream, _)) => stream,
                Err(e) => {
                    warn!("Failed to accept TCP connection: {}", e);
                    std::thread::sleep(ACCEPT_RETRY_DELAY);
                    continue;
                }
            };
            // A peer that reset right after connecting is just skipped
            let mut session = match TcpSession::new(stream) {
                Ok(session) => session,
                Err(e) => {
                    warn!("Dropping TCP connection: {}", e);
                    continue;
                }
            };
            info!("Operator connected from {}", session.peer());

            match callback(&mut session) {
                Ok(()) | Err(SessionError::Closed) => {
                    info!("Operator {} disconnected", session.peer())
                }
                Err(e) => warn!("Session with {} ended: {}", session.peer(), e),
            }

            if let Err(e) = session.close() {
                warn!("Failed to close session with {}: {}", session.peer(), e);
            }
        }
    }
}
