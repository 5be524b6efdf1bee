//! Liveness reporting to the downstream microcontrollers.

use crate::bus::Bus;
use r1_protocol::can::CanId;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

const PERIOD: Duration = Duration::from_millis(100);

/// Emits the empty liveness frame on a fixed period, independent of all
/// other state. An entry sequence stalls it for the sequence's duration;
/// the skipped ticks are not made up afterwards.
pub(crate) async fn task(bus: Bus) {
    info!("Heartbeat running");

    let mut ticker = tokio::time::interval(PERIOD);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        if bus.send(CanId::CheckIsActive, Vec::new()).await.is_err() {
            warn!("Bus writer gone, stopping heartbeat");
            return;
        }
    }
}
