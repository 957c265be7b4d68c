// Keyboard teleop over UDP: W/S drive, A/D steer, arrows move the camera,
// R/F speed, Q quit
//
// Usage: cargo run --example udp_teleop -- <vehicle-host:port> [--crc8]
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tracing::info;

use rc_vehicle_runtime::codec::Framing;
use rc_vehicle_runtime::config::STEERING_UDP_PORT;
use rc_vehicle_runtime::messages::{
    HorizontalDirection, MotionCommand, Movement, VerticalDirection,
};

const SPEEDS: [f64; 3] = [30.0, 60.0, 100.0]; // percent
const STEER_PERCENT: f64 = 100.0;
const CAMERA_PERCENT: f64 = 50.0;
const INPUT_TIMEOUT_MS: u64 = 150; // Back to neutral after this much time with no input

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let mut args = std::env::args().skip(1);
    let target = args
        .next()
        .unwrap_or_else(|| format!("127.0.0.1:{}", STEERING_UDP_PORT));
    let framing = if args.any(|a| a == "--crc8") {
        Framing::Crc8
    } else {
        Framing::Plain
    };

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.connect(&target).await?;
    info!("Sending Motion Commands to {} ({:?})", target, framing);

    info!("Controls: W/S=drive, A/D=steer, arrows=camera, R/F=speed, Q=quit");
    info!("Speed: LOW");

    enable_raw_mode()?;
    let result = run_teleop(&socket, framing).await;
    disable_raw_mode()?;

    result
}

async fn run_teleop(
    socket: &UdpSocket,
    framing: Framing,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut speed_idx: usize = 0;

    let mut cmd = MotionCommand::default();
    let mut last_input = Instant::now();

    loop {
        // Poll for key with 20ms timeout (50Hz effective rate)
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;
                if pressed {
                    last_input = Instant::now();
                }

                match code {
                    KeyCode::Char('w') if pressed => cmd.speed = SPEEDS[speed_idx],
                    KeyCode::Char('s') if pressed => cmd.speed = -SPEEDS[speed_idx],
                    KeyCode::Char('a') if pressed => {
                        cmd.steer = Movement::new(HorizontalDirection::Left, STEER_PERCENT)
                    }
                    KeyCode::Char('d') if pressed => {
                        cmd.steer = Movement::new(HorizontalDirection::Right, STEER_PERCENT)
                    }

                    // Camera
                    KeyCode::Up if pressed => {
                        cmd.camera_vertical = Movement::new(VerticalDirection::Up, CAMERA_PERCENT)
                    }
                    KeyCode::Down if pressed => {
                        cmd.camera_vertical =
                            Movement::new(VerticalDirection::Down, CAMERA_PERCENT)
                    }
                    KeyCode::Left if pressed => {
                        cmd.camera_horizontal =
                            Movement::new(HorizontalDirection::Left, CAMERA_PERCENT)
                    }
                    KeyCode::Right if pressed => {
                        cmd.camera_horizontal =
                            Movement::new(HorizontalDirection::Right, CAMERA_PERCENT)
                    }

                    // Speed control
                    KeyCode::Char('r') if pressed => {
                        speed_idx = (speed_idx + 1).min(2);
                        print_speed(speed_idx);
                    }
                    KeyCode::Char('f') if pressed => {
                        speed_idx = speed_idx.saturating_sub(1);
                        print_speed(speed_idx);
                    }

                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,

                    _ => {}
                }
            }
        }

        if last_input.elapsed() > Duration::from_millis(INPUT_TIMEOUT_MS) {
            cmd = MotionCommand::default();
        }

        socket.send(&framing.encode(&cmd)).await?;
    }

    // Leave the vehicle stopped and centered
    socket.send(&framing.encode(&MotionCommand::default())).await?;
    Ok(())
}

fn print_speed(idx: usize) {
    let label = ["LOW", "MED", "HIGH"][idx];
    info!("Speed: {}", label);
}
