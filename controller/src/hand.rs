//! Seedling hand position control.

use crate::{
    action::Action,
    bus::{Bus, BusError, Step},
    config::HandWireCodes,
};
use r1_protocol::{
    can::CanId,
    UnknownValue,
};
use std::time::Duration;
use tracing::{debug, warn};

/// How long the reset pulse is given before the previous position is
/// restored.
const RESET_SETTLE: Duration = Duration::from_millis(500);

/// Gap between the inner and outer hand writes when both move in one
/// action.
const DUAL_HAND_GAP: Duration = Duration::from_millis(50);

/// Physical positions of the seedling hand.
///
/// `Reset` is a transient pulse, never a stored state: after issuing it
/// the previous stable position is restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HandPosition {
    Pickup,
    PutOutside,
    PutInside,
    Reset,
}

pub(crate) struct HandState {
    current: HandPosition,
    codes: HandWireCodes,
}

impl HandState {
    pub(crate) fn new(codes: HandWireCodes) -> Self {
        Self {
            current: HandPosition::Pickup,
            codes,
        }
    }

    pub(crate) fn current(&self) -> HandPosition {
        self.current
    }

    /// Maps a raw wire code through the configured table.
    pub(crate) fn parse(&self, raw: u8) -> Result<HandPosition, UnknownValue> {
        if raw == self.codes.pickup {
            Ok(HandPosition::Pickup)
        } else if raw == self.codes.put_inside {
            Ok(HandPosition::PutInside)
        } else if raw == self.codes.put_outside {
            Ok(HandPosition::PutOutside)
        } else if raw == self.codes.reset {
            Ok(HandPosition::Reset)
        } else {
            Err(UnknownValue::new("hand position", raw))
        }
    }

    fn code(&self, position: HandPosition) -> u8 {
        match position {
            HandPosition::Pickup => self.codes.pickup,
            HandPosition::PutInside => self.codes.put_inside,
            HandPosition::PutOutside => self.codes.put_outside,
            HandPosition::Reset => self.codes.reset,
        }
    }

    /// Decodes and applies a raw wire code. Unknown codes are logged and
    /// ignored; the stored position is untouched.
    pub(crate) async fn apply_raw(&mut self, raw: u8, bus: &Bus) -> Result<(), BusError> {
        match self.parse(raw) {
            Ok(position) => self.update_state(position, bus).await,
            Err(e) => {
                warn!("Dropping hand position update: {e}");
                Ok(())
            }
        }
    }

    /// Applies a requested position.
    ///
    /// Equal to the stored position: nothing happens. `Reset`: pulse the
    /// reset code, let the mechanism settle, then restore the previous
    /// stable position, all as one bus block; the stored position is left
    /// unchanged. Anything else: one position write, then store the new
    /// value.
    pub(crate) async fn update_state(
        &mut self,
        requested: HandPosition,
        bus: &Bus,
    ) -> Result<(), BusError> {
        if requested == self.current {
            return Ok(());
        }

        if requested == HandPosition::Reset {
            debug!("Hand reset pulse, restoring {:?}", self.current);

            let restore = self.code(self.current);
            return bus
                .run_sequence(vec![
                    Step::frame(CanId::SeedlingHandPosition, [self.codes.reset]),
                    Step::settle(RESET_SETTLE),
                    Step::frame(CanId::SeedlingHandPosition, [restore]),
                ])
                .await;
        }

        debug!("Hand position {:?} -> {:?}", self.current, requested);

        bus.send(CanId::SeedlingHandPosition, [self.code(requested)])
            .await?;
        self.current = requested;

        Ok(())
    }

    /// (close, open) actions for the grip button in the current position.
    ///
    /// In the pickup pose both hands grip together; in either put pose
    /// only the hand over the planter moves.
    pub(crate) fn grip_actions(&self) -> (Action, Action) {
        match self.current {
            HandPosition::Pickup => (
                Action::SendSequence(vec![
                    Step::frame(CanId::SeedlingInsideHandOpen, [0]),
                    Step::settle(DUAL_HAND_GAP),
                    Step::frame(CanId::SeedlingOutsideHandOpen, [0]),
                ]),
                Action::SendSequence(vec![
                    Step::frame(CanId::SeedlingInsideHandOpen, [1]),
                    Step::settle(DUAL_HAND_GAP),
                    Step::frame(CanId::SeedlingOutsideHandOpen, [1]),
                ]),
            ),
            HandPosition::PutInside => (
                Action::SendFixed(CanId::SeedlingInsideHandOpen, vec![0]),
                Action::SendFixed(CanId::SeedlingInsideHandOpen, vec![1]),
            ),
            HandPosition::PutOutside => (
                Action::SendFixed(CanId::SeedlingOutsideHandOpen, vec![0]),
                Action::SendFixed(CanId::SeedlingOutsideHandOpen, vec![1]),
            ),
            // Hand motion is not meaningful mid-reset.
            HandPosition::Reset => (Action::NoOp, Action::NoOp),
        }
    }

    /// Force-sets the stored position without emitting anything, for use
    /// after an entry sequence has already placed the hand with its own
    /// writes.
    pub(crate) fn reset_state(&mut self, position: HandPosition) {
        debug_assert!(position != HandPosition::Reset);
        self.current = position;
    }
}
