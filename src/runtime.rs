// Operator command loop and process wiring
//
// The operator session runs on its own thread: session I/O is blocking and the
// calibration prompts hold the vehicle lock for their whole duration. The UDP
// listener lives on the tokio runtime and only ever try-locks the vehicle.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{Mutex, oneshot};
use tracing::{info, warn};

use crate::calibration;
use crate::codec::Framing;
use crate::config::{Args, SessionKind};
use crate::error::VehicleError;
use crate::hardware::SimBoard;
use crate::profile::{CalibrationStore, JsonFileStore};
use crate::session::{
    self, ConsoleListener, SerialSessionListener, SessionError, SessionListener, SessionStream,
    TcpSessionListener, ask,
};
use crate::udp::UdpSteeringEngine;
use crate::vehicle::{SharedVehicle, VehicleController};

pub const MAIN_MENU: &str =
    "Please enter your next command:\r\n[0] Calibrate\r\n[1] Steer\r\n[q] Quit session\r\n";

pub const STEERING_MENU: &str = "Please select your steering method:\r\n[0] UDP\r\n";

/// Serve one operator session until it quits or its stream fails
///
/// Must run outside the tokio runtime: it blocks on the session and uses
/// `handle` to drive the UDP engine.
pub fn command_loop(
    session: &mut dyn SessionStream,
    vehicle: &SharedVehicle,
    engine: &mut UdpSteeringEngine,
    handle: &Handle,
) -> session::Result<()> {
    loop {
        let command = ask(session, MAIN_MENU)?;
        match command.trim_start().chars().next() {
            Some('0') => {
                let result = {
                    let mut controller = vehicle.blocking_lock();
                    calibration::run(&mut *controller, session)
                };
                match result {
                    Ok(()) => {}
                    // A broken session cannot show the error, end it instead
                    Err(VehicleError::Session(e)) => return Err(e),
                    Err(e) => {
                        warn!("Calibration failed: {}", e);
                        session.write(&format!(
                            "Error while calibrating car. Error: {}\r\n",
                            e
                        ))?;
                    }
                }
            }
            Some('1') => steer(session, vehicle, engine, handle)?,
            Some('q') | Some('Q') => {
                info!("Operator left the session");
                return Ok(());
            }
            _ => {}
        }
    }
}

fn steer(
    session: &mut dyn SessionStream,
    vehicle: &SharedVehicle,
    engine: &mut UdpSteeringEngine,
    handle: &Handle,
) -> session::Result<()> {
    let method = ask(session, STEERING_MENU)?;
    if !method.trim_start().starts_with('0') {
        return session.write(&format!(
            "Error while steering car. Error: Unknown steering method: {}\r\n",
            method
        ));
    }

    if let Err(e) = handle.block_on(engine.start(vehicle.clone())) {
        warn!("Could not start UDP steering engine: {}", e);
        return session.write(&format!(
            "Error while steering car. Error: Could not start steering method: {}\r\n",
            e
        ));
    }

    // Stop the engine even if the session dies while we wait
    let waited = session
        .write("Press any key to exit steering\r\n")
        .and_then(|()| session.read_line());
    handle.block_on(engine.stop());
    waited.map(|_| ())
}

fn listener_for(args: &Args) -> Result<Box<dyn SessionListener>, SessionError> {
    Ok(match args.session {
        SessionKind::Console => Box::new(ConsoleListener),
        SessionKind::Tcp => Box::new(TcpSessionListener::bind(args.tcp_port)?),
        SessionKind::Serial => Box::new(SerialSessionListener::new(
            args.serial_port.clone(),
            args.baud_rate,
        )),
    })
}

pub async fn run(args: Args) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Starting new vehicle runtime instance...");

    let backend = JsonFileStore::new(&args.profile);
    info!("Loading calibration profile from {}", backend.path().display());
    let store = CalibrationStore::open(Box::new(backend))?;

    // Only the simulated board ships; it logs every actuator write
    let mut board = SimBoard::new();
    let vehicle: SharedVehicle =
        Arc::new(Mutex::new(VehicleController::new(&mut board, store)?));

    let framing = if args.crc8 {
        Framing::Crc8
    } else {
        Framing::Plain
    };
    info!(
        "Session: {:?}, UDP port: {}, framing: {:?}",
        args.session, args.udp_port, framing
    );

    let mut listener = listener_for(&args)?;
    let mut engine = UdpSteeringEngine::new(args.udp_port, framing);
    let handle = Handle::current();
    let (done, finished) = oneshot::channel();

    std::thread::Builder::new()
        .name("operator-session".into())
        .spawn(move || {
            let result = listener.on_reconnect(&mut |session: &mut dyn SessionStream| {
                info!("(Re-)Starting command loop");
                command_loop(session, &vehicle, &mut engine, &handle)
            });
            let _ = done.send(result);
        })?;

    tokio::select! {
        outcome = finished => match outcome {
            Ok(Ok(())) => info!("Operator sessions ended"),
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => warn!("Operator session thread exited without a result"),
        },
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
    }

    Ok(())
}
