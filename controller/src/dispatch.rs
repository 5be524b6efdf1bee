//! Per-sample orchestration: one decoded controller packet in, CAN
//! command frames out.
//!
//! All mutable control state (mode, hand position, button edge state)
//! lives here and is only ever touched from the primary loop, so none of
//! it needs locking; the bus handle is the only shared resource.

use crate::{
    action::Action,
    bus::{Bus, BusError, Step},
    hand::HandState,
    mode::{Mode, ModeContext, ModeStateMachine},
};
use r1_debounce::{Armed, OneShotButton, TwoStateButton};
use r1_protocol::{can::CanId, wire::GamepadPacket};
use std::time::Duration;
use tracing::warn;

/// Shooter feed motor spin-up time before release.
const SHOOT_SPINUP: Duration = Duration::from_secs(1);

/// Time the shot is given to leave before the mechanism restows.
const SHOOT_RELEASE_SETTLE: Duration = Duration::from_millis(500);

pub(crate) struct Dispatcher {
    mode: ModeStateMachine,
    hand: HandState,
    btn_a: TwoStateButton,
    btn_b: TwoStateButton,
    btn_x: TwoStateButton,
    btn_y: TwoStateButton,
    btn_shoot: OneShotButton,
}

impl Dispatcher {
    pub(crate) fn new(mode: ModeStateMachine, hand: HandState) -> Self {
        Self {
            mode,
            hand,
            // Everything boots in the released pose, so a press is the
            // first meaningful edge everywhere.
            btn_a: TwoStateButton::new(Armed::Press),
            btn_b: TwoStateButton::new(Armed::Press),
            btn_x: TwoStateButton::new(Armed::Press),
            btn_y: TwoStateButton::new(Armed::Press),
            btn_shoot: OneShotButton::new(),
        }
    }

    /// Runs one control cycle for a decoded sample.
    pub(crate) async fn dispatch(
        &mut self,
        packet: &GamepadPacket,
        bus: &Bus,
    ) -> Result<(), BusError> {
        match Mode::from_wire(packet.area_state) {
            Ok(requested) => {
                let mut ctx = ModeContext {
                    hand: &mut self.hand,
                    btn_a: &mut self.btn_a,
                    btn_y: &mut self.btn_y,
                    btn_b: &mut self.btn_b,
                    btn_x: &mut self.btn_x,
                };
                self.mode.set_state(requested, &mut ctx, bus).await?;
            }
            Err(e) => warn!("Keeping current mode: {e}"),
        }

        match self.mode.current() {
            Some(Mode::Seedling) => self.dispatch_seedling(packet, bus).await?,
            Some(Mode::Ball) => self.dispatch_ball(packet, bus).await?,
            // No buttons are live before the match starts or while a
            // transition is unresolved.
            Some(Mode::Start) | None => {}
        }

        // The drivetrain bytes ride along on every sample regardless of
        // mode, unmodified.
        bus.send(CanId::RobotVel, packet.velocity_payload()).await?;

        Ok(())
    }

    async fn dispatch_seedling(
        &mut self,
        packet: &GamepadPacket,
        bus: &Bus,
    ) -> Result<(), BusError> {
        self.hand.apply_raw(packet.seedling_hand_pos, bus).await?;

        // Y grips while pressed and releases on the way back up; entry
        // sequences leave the hands released, so a press closes first.
        let (close, open) = self.hand.grip_actions();
        let fired = self.btn_y.handle(packet.btn_y, open, close);
        self.perform(fired, bus).await?;

        // A lifts the seedling arm elevator while held.
        let fired = self.btn_a.handle(
            packet.btn_a,
            Action::SendFixed(CanId::SeedlingArmElevator, vec![1]),
            Action::SendFixed(CanId::SeedlingArmElevator, vec![0]),
        );
        self.perform(fired, bus).await
    }

    async fn dispatch_ball(&mut self, packet: &GamepadPacket, bus: &Bus) -> Result<(), BusError> {
        // B opens and closes the ball hand.
        let fired = self.btn_b.handle(
            packet.btn_b,
            Action::SendFixed(CanId::BallHandOpen, vec![0]),
            Action::SendFixed(CanId::BallHandOpen, vec![1]),
        );
        self.perform(fired, bus).await?;

        // X deploys and stows the ball arm.
        let fired = self.btn_x.handle(
            packet.btn_x,
            Action::SendFixed(CanId::BallArmUnexpand, vec![1]),
            Action::SendFixed(CanId::BallArmUnexpand, vec![0]),
        );
        self.perform(fired, bus).await?;

        let fired = self.btn_shoot.handle(packet.btn_rb, Action::Shoot);
        self.perform(fired, bus).await
    }

    async fn perform(&mut self, action: Option<Action>, bus: &Bus) -> Result<(), BusError> {
        match action {
            None | Some(Action::NoOp) => Ok(()),
            Some(Action::SendFixed(id, payload)) => bus.send(id, payload).await,
            Some(Action::SendSequence(steps)) => bus.run_sequence(steps).await,
            Some(Action::Shoot) => self.shoot(bus).await,
        }
    }

    /// Fires the shooter: spin up, release, then power down and restow.
    ///
    /// The ordering is mechanically load bearing, so the whole thing runs
    /// as one bus block.
    async fn shoot(&mut self, bus: &Bus) -> Result<(), BusError> {
        bus.run_sequence(vec![
            Step::frame(CanId::BallMotorOn, [1]),
            Step::settle(SHOOT_SPINUP),
            Step::frame(CanId::BallShoot, [0]),
            Step::settle(SHOOT_RELEASE_SETTLE),
            Step::frame(CanId::BallMotorOn, [0]),
            Step::frame(CanId::BallShoot, [1]),
        ])
        .await?;

        // The shot restowed the mechanism; re-arm the paired detectors so
        // the next press reads correctly instead of replaying a stale
        // expectation.
        self.btn_b.force_transition(Armed::Press);
        self.btn_x.force_transition(Armed::Press);

        Ok(())
    }
}
