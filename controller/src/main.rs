//! R1 robot control process.
//!
//! Receives controller and drivetrain packets from the UDP collaborator
//! and turns them into CAN bus command frames, enforcing safe ordering of
//! mode transitions, button actions and multi-step mechanical sequences.

mod action;
mod bus;
mod config;
mod control;
mod dispatch;
mod drive;
mod hand;
mod heartbeat;
mod mode;
mod net;

use crate::{
    bus::{Bus, CanSink},
    config::Config,
    dispatch::Dispatcher,
    hand::HandState,
    mode::ModeStateMachine,
};
use tokio::{net::UdpSocket, sync::mpsc};
use tracing::{error, info};

/// Queue depth for inbound packet channels. The control loop discards
/// backlog anyway; this only has to absorb a burst during an entry
/// sequence.
const PACKET_QUEUE_DEPTH: usize = 32;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    info!("Using CAN interface {}", config.can_interface);

    let sink = match CanSink::open(&config.can_interface) {
        Ok(sink) => sink,
        Err(e) => {
            error!("Failed to open CAN interface for writing: {e}");
            std::process::exit(1);
        }
    };
    let bus = Bus::spawn(sink);

    let responses = match bus::spawn_listener(&config.can_interface) {
        Ok(responses) => responses,
        Err(e) => {
            error!("Failed to open CAN interface for listening: {e}");
            std::process::exit(1);
        }
    };

    let dispatcher = Dispatcher::new(
        ModeStateMachine::new(config.wait_for_ready, responses),
        HandState::new(config.hand_codes.clone()),
    );

    let gamepad_socket = match UdpSocket::bind(config.gamepad_bind).await {
        Ok(socket) => socket,
        Err(e) => {
            error!("Failed to bind {}: {e}", config.gamepad_bind);
            std::process::exit(1);
        }
    };
    let drive_socket = match UdpSocket::bind(config.drive_bind).await {
        Ok(socket) => socket,
        Err(e) => {
            error!("Failed to bind {}: {e}", config.drive_bind);
            std::process::exit(1);
        }
    };

    let (gamepad_tx, gamepad_rx) = mpsc::channel(PACKET_QUEUE_DEPTH);
    let (drive_tx, drive_rx) = mpsc::channel(PACKET_QUEUE_DEPTH);

    tokio::spawn(net::task(gamepad_socket, gamepad_tx));
    tokio::spawn(net::task(drive_socket, drive_tx));
    tokio::spawn(control::task(gamepad_rx, dispatcher, bus.clone()));
    tokio::spawn(drive::task(drive_rx, bus.clone()));
    tokio::spawn(heartbeat::task(bus));

    info!("Control process running");

    // In-flight entry or shoot sequences are not resumable across a
    // shutdown; the hardware is left wherever the last write put it.
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to wait for shutdown signal: {e}");
    }

    info!("Control process stopped");
}
