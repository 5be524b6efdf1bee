//! Operating mode state machine.
//!
//! The robot is always in exactly one top level mode, and changing mode
//! means physically reconfiguring the machine: arms swap over and hands
//! close. Each transition therefore runs a fixed,
//! time-ordered entry sequence on the bus before the new mode is
//! considered entered, and resynchronises the button detectors with the
//! hardware state the sequence just programmed.

use crate::{
    bus::{Bus, BusError, Step},
    hand::{HandPosition, HandState},
};
use r1_debounce::{Armed, TwoStateButton};
use r1_protocol::{can::CanId, UnknownValue};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info};

/// Settle time after stowing one arm before deploying the other.
const ARM_SWAP_SETTLE: Duration = Duration::from_millis(500);

/// Settle time for full arm travel.
const ARM_TRAVEL_SETTLE: Duration = Duration::from_secs(1);

/// Bound on the optional mechanism readiness wait.
const READY_TIMEOUT: Duration = Duration::from_secs(2);

/// Top level operating phase. Gates which button mappings are live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    Start,
    Seedling,
    Ball,
}

impl Mode {
    /// Decodes the `area_state` wire value.
    pub(crate) fn from_wire(raw: u8) -> Result<Self, UnknownValue> {
        match raw {
            0 => Ok(Self::Start),
            1 => Ok(Self::Seedling),
            2 => Ok(Self::Ball),
            _ => Err(UnknownValue::new("mode", raw)),
        }
    }
}

/// The pieces of dispatcher state an entry sequence must resynchronise:
/// the hand position store and the per-mode button detectors.
pub(crate) struct ModeContext<'a> {
    pub(crate) hand: &'a mut HandState,
    pub(crate) btn_a: &'a mut TwoStateButton,
    pub(crate) btn_y: &'a mut TwoStateButton,
    pub(crate) btn_b: &'a mut TwoStateButton,
    pub(crate) btn_x: &'a mut TwoStateButton,
}

pub(crate) struct ModeStateMachine {
    /// `None` while a transition is in flight or after one was abandoned;
    /// the next requested mode then re-runs its entry sequence.
    current: Option<Mode>,
    wait_for_ready: bool,
    responses: broadcast::Sender<CanId>,
}

impl ModeStateMachine {
    /// The machine boots in Start without emitting the Start sequence;
    /// the microcontrollers power up in the stowed pose Start describes.
    pub(crate) fn new(wait_for_ready: bool, responses: broadcast::Sender<CanId>) -> Self {
        Self {
            current: Some(Mode::Start),
            wait_for_ready,
            responses,
        }
    }

    pub(crate) fn current(&self) -> Option<Mode> {
        self.current
    }

    /// Applies a requested mode.
    ///
    /// Requesting the current mode is a pure no-op. Otherwise the entry
    /// sequence runs to completion as one serialized bus block before the
    /// new mode is committed; the calling loop is blocked for the
    /// sequence's full duration.
    pub(crate) async fn set_state(
        &mut self,
        requested: Mode,
        ctx: &mut ModeContext<'_>,
        bus: &Bus,
    ) -> Result<(), BusError> {
        if self.current == Some(requested) {
            return Ok(());
        }

        info!("Entering {requested:?} mode");
        self.current = None;

        let entered = match requested {
            Mode::Start => self.enter_start(bus).await?,
            Mode::Seedling => self.enter_seedling(ctx, bus).await?,
            Mode::Ball => self.enter_ball(ctx, bus).await?,
        };

        if entered {
            self.current = Some(requested);
        }

        Ok(())
    }

    /// Start: everything stowed and closed, the pose the robot must hold
    /// before the match begins.
    async fn enter_start(&mut self, bus: &Bus) -> Result<bool, BusError> {
        bus.run_sequence(vec![
            Step::frame(CanId::SeedlingArmElevator, [0]),
            Step::frame(CanId::SeedlingArmSet, [0]),
            Step::settle(ARM_SWAP_SETTLE),
            Step::frame(CanId::BallArmUnexpand, [1]),
            Step::frame(CanId::BallHandOpen, [0]),
        ])
        .await?;

        Ok(true)
    }

    async fn enter_seedling(
        &mut self,
        ctx: &mut ModeContext<'_>,
        bus: &Bus,
    ) -> Result<bool, BusError> {
        bus.run_sequence(vec![
            // The ball arm must be out of the way before the seedling arm
            // swings across it.
            Step::frame(CanId::BallArmUnexpand, [1]),
            Step::settle(ARM_SWAP_SETTLE),
            Step::frame(CanId::SeedlingArmSet, [1]),
            Step::settle(ARM_TRAVEL_SETTLE),
            Step::frame(CanId::SeedlingArmElevator, [1]),
        ])
        .await?;

        if !self
            .await_ready(CanId::CheckSeedlingMechanism, CanId::ResponseSeedlingMechanism, bus)
            .await?
        {
            return Ok(false);
        }

        // The sequence above left the hand in the pickup pose, hands
        // released. Align the stored position and button expectations
        // without re-emitting anything.
        ctx.hand.reset_state(HandPosition::Pickup);
        ctx.btn_y.force_transition(Armed::Press);
        ctx.btn_a.force_transition(Armed::Press);

        info!("Seedling mode ready, hand at {:?}", ctx.hand.current());

        Ok(true)
    }

    async fn enter_ball(
        &mut self,
        ctx: &mut ModeContext<'_>,
        bus: &Bus,
    ) -> Result<bool, BusError> {
        bus.run_sequence(vec![
            Step::frame(CanId::SeedlingArmElevator, [0]),
            Step::frame(CanId::SeedlingArmSet, [0]),
            Step::settle(ARM_SWAP_SETTLE),
            Step::frame(CanId::BallArmUnexpand, [0]),
            Step::settle(ARM_TRAVEL_SETTLE),
            Step::frame(CanId::BallHandOpen, [0]),
        ])
        .await?;

        if !self
            .await_ready(
                CanId::CheckInjectionMechanism,
                CanId::ResponseInjectionMechanism,
                bus,
            )
            .await?
        {
            return Ok(false);
        }

        ctx.btn_b.force_transition(Armed::Press);
        ctx.btn_x.force_transition(Armed::Press);

        Ok(true)
    }

    /// Optional readiness handshake with a mechanism microcontroller.
    ///
    /// Disabled installs return immediately. A timeout abandons the
    /// transition: the mode stays indeterminate, the mechanical state is
    /// left as the sequence put it, and the next sample retries.
    async fn await_ready(
        &mut self,
        check: CanId,
        response: CanId,
        bus: &Bus,
    ) -> Result<bool, BusError> {
        if !self.wait_for_ready {
            return Ok(true);
        }

        // Subscribe before emitting the check so the response cannot slip
        // past between the write and the wait.
        let mut responses = self.responses.subscribe();
        bus.send(check, Vec::new()).await?;

        let wait = async {
            loop {
                match responses.recv().await {
                    Ok(id) if id == response => return true,
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return false,
                }
            }
        };

        match tokio::time::timeout(READY_TIMEOUT, wait).await {
            Ok(true) => Ok(true),
            Ok(false) => {
                error!("Bus listener gone while waiting for {response:?}");
                Ok(false)
            }
            Err(_) => {
                error!("No readiness response {response:?} within {READY_TIMEOUT:?}");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bus::testing::{drain, recording_bus},
        config::HandWireCodes,
    };
    use r1_protocol::can::CanCommand;

    struct Fixture {
        hand: HandState,
        btn_a: TwoStateButton,
        btn_y: TwoStateButton,
        btn_b: TwoStateButton,
        btn_x: TwoStateButton,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                hand: HandState::new(HandWireCodes::default()),
                btn_a: TwoStateButton::new(Armed::Press),
                btn_y: TwoStateButton::new(Armed::Press),
                btn_b: TwoStateButton::new(Armed::Press),
                btn_x: TwoStateButton::new(Armed::Press),
            }
        }

        fn ctx(&mut self) -> ModeContext<'_> {
            ModeContext {
                hand: &mut self.hand,
                btn_a: &mut self.btn_a,
                btn_y: &mut self.btn_y,
                btn_b: &mut self.btn_b,
                btn_x: &mut self.btn_x,
            }
        }
    }

    fn machine(wait_for_ready: bool) -> (ModeStateMachine, broadcast::Sender<CanId>) {
        let (tx, _) = broadcast::channel(16);
        (ModeStateMachine::new(wait_for_ready, tx.clone()), tx)
    }

    #[test]
    fn wire_values_decode() {
        assert_eq!(Mode::from_wire(0), Ok(Mode::Start));
        assert_eq!(Mode::from_wire(1), Ok(Mode::Seedling));
        assert_eq!(Mode::from_wire(2), Ok(Mode::Ball));
        assert!(Mode::from_wire(7).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn entry_sequence_runs_once() {
        let (bus, mut rx) = recording_bus();
        let (mut machine, _responses) = machine(false);
        let mut fixture = Fixture::new();

        machine
            .set_state(Mode::Seedling, &mut fixture.ctx(), &bus)
            .await
            .unwrap();
        assert_eq!(machine.current(), Some(Mode::Seedling));

        let first = drain(&mut rx);
        assert_eq!(
            first,
            vec![
                CanCommand::new(CanId::BallArmUnexpand, [1]),
                CanCommand::new(CanId::SeedlingArmSet, [1]),
                CanCommand::new(CanId::SeedlingArmElevator, [1]),
            ]
        );

        // Requesting the same mode again must be a pure no-op: no frames,
        // no delay.
        let before = tokio::time::Instant::now();
        machine
            .set_state(Mode::Seedling, &mut fixture.ctx(), &bus)
            .await
            .unwrap();
        assert_eq!(before.elapsed(), Duration::ZERO);

        bus.run_sequence(Vec::new()).await.unwrap();
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn entry_resynchronises_hand_and_buttons() {
        let (bus, mut rx) = recording_bus();
        let (mut machine, _responses) = machine(false);
        let mut fixture = Fixture::new();

        // Leave the detectors and hand store deliberately out of step.
        fixture.btn_y.force_transition(Armed::Release);
        fixture.hand.reset_state(HandPosition::PutOutside);

        machine
            .set_state(Mode::Seedling, &mut fixture.ctx(), &bus)
            .await
            .unwrap();

        assert_eq!(fixture.hand.current(), HandPosition::Pickup);
        assert_eq!(fixture.btn_y.armed(), Armed::Press);
        assert_eq!(fixture.btn_a.armed(), Armed::Press);
        drain(&mut rx);
    }

    #[tokio::test(start_paused = true)]
    async fn ball_entry_orders_arm_swap() {
        let (bus, mut rx) = recording_bus();
        let (mut machine, _responses) = machine(false);
        let mut fixture = Fixture::new();

        machine
            .set_state(Mode::Ball, &mut fixture.ctx(), &bus)
            .await
            .unwrap();

        let ids: Vec<CanId> = drain(&mut rx).into_iter().map(|c| c.id).collect();
        assert_eq!(
            ids,
            vec![
                CanId::SeedlingArmElevator,
                CanId::SeedlingArmSet,
                CanId::BallArmUnexpand,
                CanId::BallHandOpen,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn ready_timeout_leaves_mode_indeterminate() {
        let (bus, mut rx) = recording_bus();
        let (mut machine, _responses) = machine(true);
        let mut fixture = Fixture::new();

        machine
            .set_state(Mode::Seedling, &mut fixture.ctx(), &bus)
            .await
            .unwrap();

        // Nobody answered the check frame: the transition is abandoned
        // and the mode stays indeterminate.
        assert_eq!(machine.current(), None);
        let ids: Vec<CanId> = drain(&mut rx).into_iter().map(|c| c.id).collect();
        assert_eq!(*ids.last().unwrap(), CanId::CheckSeedlingMechanism);

        // The next request retries the whole entry sequence.
        machine
            .set_state(Mode::Seedling, &mut fixture.ctx(), &bus)
            .await
            .unwrap();
        assert!(!drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn ready_response_commits_the_mode() {
        let (bus, mut rx) = recording_bus();
        let (mut machine, responses) = machine(true);
        let mut fixture = Fixture::new();

        let answer = tokio::spawn({
            let responses = responses.clone();
            async move {
                // Answer shortly after the entry writes (1.5 s of settle)
                // have gone out and the check frame is on the wire.
                tokio::time::sleep(Duration::from_millis(1600)).await;
                let _ = responses.send(CanId::ResponseSeedlingMechanism);
            }
        });

        machine
            .set_state(Mode::Seedling, &mut fixture.ctx(), &bus)
            .await
            .unwrap();
        answer.await.unwrap();

        assert_eq!(machine.current(), Some(Mode::Seedling));
        drain(&mut rx);
    }
}
