// UDP steering engine
//
// Listens for Motion Command datagrams and applies each one to the shared
// vehicle. A datagram arriving while the vehicle is busy (calibration, or
// another apply) is dropped, never queued.

use std::io;
use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::codec::Framing;
use crate::vehicle::SharedVehicle;

// Larger than any valid datagram; the excess is truncated by the socket
const RECV_BUFFER_LEN: usize = 64;

/// What happened to one received datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Applied,
    /// Vehicle was locked by someone else
    Busy,
    /// Did not decode
    Rejected,
    /// Decoded but `apply` failed
    Failed,
}

struct Running {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

pub struct UdpSteeringEngine {
    port: u16,
    framing: Framing,
    running: Option<Running>,
}

impl UdpSteeringEngine {
    pub fn new(port: u16, framing: Framing) -> Self {
        Self {
            port,
            framing,
            running: None,
        }
    }

    /// True while the listener task is alive; it ends on its own after a
    /// receive error
    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.task.is_finished())
    }

    /// Bind and start listening; starting a running engine is a no-op
    ///
    /// Returns the bound address.
    pub async fn start(&mut self, vehicle: SharedVehicle) -> io::Result<SocketAddr> {
        if let Some(running) = &self.running {
            if !running.task.is_finished() {
                info!("UDP steering engine is already running...");
                return Ok(running.local_addr);
            }
            warn!("UDP listener on {} has died, restarting", running.local_addr);
            self.running = None;
        }

        let socket = UdpSocket::bind(("0.0.0.0", self.port)).await?;
        let local_addr = socket.local_addr()?;
        info!("Listening for incoming UDP instructions on {}", local_addr);

        let (shutdown, stopped) = oneshot::channel();
        let task = tokio::spawn(listen(socket, vehicle, self.framing, stopped));

        self.running = Some(Running {
            local_addr,
            shutdown,
            task,
        });
        Ok(local_addr)
    }

    /// Close the socket and wait for the listener; stopping twice is a no-op
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            info!("UDP steering engine has ended already...");
            return;
        };

        // The listener may already be gone after a receive error
        let _ = running.shutdown.send(());
        if let Err(e) = running.task.await {
            warn!("UDP listener task failed: {}", e);
        }
        info!("UDP steering engine stopped");
    }
}

async fn listen(
    socket: UdpSocket,
    vehicle: SharedVehicle,
    framing: Framing,
    mut stopped: oneshot::Receiver<()>,
) {
    let mut buffer = [0u8; RECV_BUFFER_LEN];

    loop {
        tokio::select! {
            _ = &mut stopped => break,
            received = socket.recv_from(&mut buffer) => match received {
                Ok((len, remote)) => {
                    handle_datagram(&vehicle, framing, &buffer[..len], remote);
                }
                Err(e) => {
                    warn!("Error while receiving UDP commands: {}", e);
                    break;
                }
            },
        }
    }
}

/// Decode and apply one datagram without waiting for the vehicle lock
pub fn handle_datagram(
    vehicle: &SharedVehicle,
    framing: Framing,
    datagram: &[u8],
    remote: SocketAddr,
) -> Disposition {
    debug!(
        "UDP message received: sender {}, length {}, data {:?}",
        remote,
        datagram.len(),
        datagram
    );

    let command = match framing.decode(datagram) {
        Ok(command) => command,
        Err(e) => {
            warn!("Dropping datagram from {}: {}", remote, e);
            return Disposition::Rejected;
        }
    };

    let Ok(mut controller) = vehicle.try_lock() else {
        warn!("Vehicle busy, dropping command from {}", remote);
        return Disposition::Busy;
    };

    match controller.apply(&command) {
        Ok(()) => Disposition::Applied,
        Err(e) => {
            warn!("Error while handling command: {}", e);
            Disposition::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::codec;
    use crate::hardware::{ActuatorEvent, SimBoard};
    use crate::messages::{HorizontalDirection, MotionCommand, Movement};
    use crate::profile::{CalibrationStore, MemoryStore};
    use crate::vehicle::VehicleController;

    fn shared_vehicle() -> (SharedVehicle, SimBoard) {
        let store = CalibrationStore::open(Box::new(MemoryStore::new())).unwrap();
        let mut board = SimBoard::new();
        let vehicle = VehicleController::new(&mut board, store).unwrap();
        (vehicle.into_shared(), board)
    }

    fn remote() -> SocketAddr {
        "127.0.0.1:4000".parse().unwrap()
    }

    fn forward() -> MotionCommand {
        MotionCommand {
            speed: 50.0,
            steer: Movement::new(HorizontalDirection::Right, 100.0),
            ..MotionCommand::default()
        }
    }

    #[tokio::test]
    async fn test_dispositions() {
        let (vehicle, board) = shared_vehicle();

        let bytes = codec::encode(&forward());
        assert_eq!(
            handle_datagram(&vehicle, Framing::Plain, &bytes, remote()),
            Disposition::Applied
        );
        assert_eq!(board.events().len(), 9);

        assert_eq!(
            handle_datagram(&vehicle, Framing::Plain, &bytes[..10], remote()),
            Disposition::Rejected
        );
        assert_eq!(
            handle_datagram(&vehicle, Framing::Crc8, &bytes, remote()),
            Disposition::Rejected
        );

        let mut wild = forward();
        wild.speed = 300.0;
        assert_eq!(
            handle_datagram(&vehicle, Framing::Plain, &codec::encode(&wild), remote()),
            Disposition::Failed
        );
        assert_eq!(board.events().len(), 9);
    }

    #[tokio::test]
    async fn test_busy_vehicle_drops_command() {
        let (vehicle, board) = shared_vehicle();
        let guard = vehicle.lock().await;

        let bytes = codec::encode(&forward());
        assert_eq!(
            handle_datagram(&vehicle, Framing::Plain, &bytes, remote()),
            Disposition::Busy
        );
        drop(guard);
        assert!(board.events().is_empty());
    }

    #[tokio::test]
    async fn test_engine_applies_datagrams() {
        let (vehicle, board) = shared_vehicle();
        let mut engine = UdpSteeringEngine::new(0, Framing::Plain);

        let bound = engine.start(vehicle.clone()).await.unwrap();
        // Second start keeps the same socket
        assert_eq!(engine.start(vehicle.clone()).await.unwrap(), bound);

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target: SocketAddr = ([127, 0, 0, 1], bound.port()).into();
        sender
            .send_to(&codec::encode(&forward()), target)
            .await
            .unwrap();

        let mut applied = false;
        for _ in 0..100 {
            let steered = board
                .events()
                .iter()
                .any(|e| matches!(e, ActuatorEvent::Angle { channel: 0, .. }));
            if steered {
                applied = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(applied, "datagram was never applied");

        engine.stop().await;
        assert!(!engine.is_running());
        engine.stop().await;
    }

    #[tokio::test]
    async fn test_dead_listener_is_restarted() {
        let (vehicle, _) = shared_vehicle();
        let mut engine = UdpSteeringEngine::new(0, Framing::Plain);
        engine.start(vehicle.clone()).await.unwrap();

        // Simulate the listener ending after a receive error
        if let Some(running) = &engine.running {
            running.task.abort();
        }
        for _ in 0..100 {
            if !engine.is_running() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!engine.is_running());

        engine.start(vehicle.clone()).await.unwrap();
        assert!(engine.is_running());

        engine.stop().await;
    }
}
