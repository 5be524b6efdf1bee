//! Dedicated drivetrain loop.
//!
//! A second, higher-rate input path that bypasses mode and button logic
//! entirely; velocity bytes go straight to the bus.

use crate::bus::Bus;
use r1_protocol::{can::CanId, wire::DrivePacket};
use tokio::sync::mpsc;
use tracing::{info, warn};

pub(crate) async fn task(mut rx: mpsc::Receiver<Vec<u8>>, bus: Bus) {
    info!("Drive loop running");

    while let Some(datagram) = rx.recv().await {
        match serde_json::from_slice::<DrivePacket>(&datagram) {
            Ok(packet) => {
                if let Err(e) = bus.send(CanId::RobotVel, packet.velocity_payload()).await {
                    warn!("Velocity write failed: {e}");
                }
            }
            Err(e) => warn!("Dropping malformed drive packet: {e}"),
        }
    }

    info!("Drive loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::testing::{drain, recording_bus};
    use r1_protocol::can::CanCommand;

    #[tokio::test]
    async fn velocity_passes_through_unmodified() {
        let (bus, mut rx) = recording_bus();
        let (tx, packets) = mpsc::channel(8);

        let loop_task = tokio::spawn(task(packets, bus.clone()));

        tx.send(br#"{"v_x": 200, "v_y": 55, "omega": 0}"#.to_vec())
            .await
            .unwrap();
        tx.send(b"garbage".to_vec()).await.unwrap();

        drop(tx);
        loop_task.await.unwrap();

        bus.run_sequence(Vec::new()).await.unwrap();
        assert_eq!(
            drain(&mut rx),
            vec![CanCommand::new(CanId::RobotVel, [200, 55, 0])]
        );
    }
}
