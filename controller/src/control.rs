//! Primary input loop.

use crate::{bus::Bus, dispatch::Dispatcher};
use r1_protocol::wire::GamepadPacket;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Decodes and dispatches primary-channel packets until the channel
/// closes.
pub(crate) async fn task(mut rx: mpsc::Receiver<Vec<u8>>, mut dispatcher: Dispatcher, bus: Bus) {
    info!("Control loop running");

    while let Some(datagram) = rx.recv().await {
        match serde_json::from_slice::<GamepadPacket>(&datagram) {
            Ok(packet) => {
                if let Err(e) = dispatcher.dispatch(&packet, &bus).await {
                    warn!("Dispatch failed: {e}");
                }
            }
            // A malformed packet is dropped whole; no state has been
            // touched yet.
            Err(e) => warn!("Dropping malformed packet: {e}"),
        }

        // A mode entry or shoot sequence may have blocked this loop for
        // seconds; drop whatever queued up meanwhile so the next cycle
        // reads the freshest sample rather than a backlog.
        while rx.try_recv().is_ok() {}
    }

    info!("Control loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bus::testing::{drain, recording_bus},
        config::HandWireCodes,
        hand::HandState,
        mode::ModeStateMachine,
    };
    use r1_protocol::can::{CanCommand, CanId};
    use tokio::sync::broadcast;

    fn dispatcher() -> Dispatcher {
        let (responses, _) = broadcast::channel(16);
        Dispatcher::new(
            ModeStateMachine::new(false, responses),
            HandState::new(HandWireCodes::default()),
        )
    }

    #[tokio::test]
    async fn malformed_packet_changes_nothing() {
        let (bus, mut rx) = recording_bus();
        let (tx, packets) = mpsc::channel(8);

        let loop_task = tokio::spawn(task(packets, dispatcher(), bus.clone()));

        // One packet per cycle: the loop discards queued backlog, so let
        // it pick each one up before sending the next.
        // Missing btn_a, and not JSON at all.
        tx.send(br#"{"btn_b": false}"#.to_vec()).await.unwrap();
        tokio::task::yield_now().await;
        tx.send(b"not json".to_vec()).await.unwrap();
        tokio::task::yield_now().await;

        // A well-formed packet afterwards still dispatches normally.
        tx.send(
            br#"{"btn_a": false, "btn_b": false, "btn_x": false, "btn_y": false,
                 "btn_rb": false, "seedling_hand_pos": 0, "area_state": 0,
                 "v_x": 1, "v_y": 2, "omega": 3}"#
                .to_vec(),
        )
        .await
        .unwrap();

        drop(tx);
        loop_task.await.unwrap();

        bus.run_sequence(Vec::new()).await.unwrap();
        assert_eq!(
            drain(&mut rx),
            vec![CanCommand::new(CanId::RobotVel, [1, 2, 3])]
        );
    }

    #[tokio::test]
    async fn backlog_is_discarded_after_a_cycle() {
        let (bus, mut rx) = recording_bus();
        let (tx, packets) = mpsc::channel(8);

        let loop_task = tokio::spawn(task(packets, dispatcher(), bus.clone()));

        // A burst arrives before the loop wakes; only the first packet of
        // the burst gets dispatched, the rest are stale.
        for v in [10u8, 20, 30] {
            let json = format!(
                r#"{{"btn_a": false, "btn_b": false, "btn_x": false, "btn_y": false,
                     "btn_rb": false, "seedling_hand_pos": 0, "area_state": 0,
                     "v_x": {v}, "v_y": 0, "omega": 0}}"#
            );
            tx.send(json.into_bytes()).await.unwrap();
        }

        drop(tx);
        loop_task.await.unwrap();

        bus.run_sequence(Vec::new()).await.unwrap();
        assert_eq!(
            drain(&mut rx),
            vec![CanCommand::new(CanId::RobotVel, [10, 0, 0])]
        );
    }
}
