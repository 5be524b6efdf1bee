use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator};

/// Every frame identifier the robot exchanges on the control bus.
///
/// Discriminants are the raw 11 bit CAN arbitration ids. Payload shape is
/// fixed per identifier and owned by the downstream microcontrollers; this
/// side only ever carries bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter)]
pub enum CanId {
    /// Fire or restow the ball shooting mechanism.
    BallShoot = 0x101,
    /// Open or close the ball collection hand.
    BallHandOpen = 0x102,
    /// Stow or deploy the ball collection arm.
    BallArmUnexpand = 0x103,
    /// Raise or lower the seedling arm elevator.
    SeedlingArmElevator = 0x104,
    /// Open or close the inner seedling hand.
    SeedlingInsideHandOpen = 0x105,
    /// Open or close the outer seedling hand.
    SeedlingOutsideHandOpen = 0x106,
    /// Move the seedling hand to a position code, or pulse a reset.
    SeedlingHandPosition = 0x108,
    /// Deploy or stow the seedling arm.
    SeedlingArmSet = 0x109,
    /// Shooter feed motor on/off.
    BallMotorOn = 0x10A,
    /// Drivetrain velocity, three bytes: vx, vy, omega.
    RobotVel = 0x10B,
    /// Readiness query for the injection mechanism.
    CheckInjectionMechanism = 0x300,
    /// Readiness query for the seedling mechanism.
    CheckSeedlingMechanism = 0x301,
    /// Readiness response from the injection mechanism.
    ResponseInjectionMechanism = 0x400,
    /// Readiness response from the seedling mechanism.
    ResponseSeedlingMechanism = 0x401,
    /// Empty-payload liveness frame asserting this process is running.
    CheckIsActive = 0x500,
}

impl CanId {
    /// The raw arbitration id placed on the bus.
    pub fn address(self) -> u16 {
        self as u16
    }

    /// Maps a received arbitration id back into the registry.
    pub fn from_address(address: u16) -> Option<Self> {
        Self::iter().find(|id| id.address() == address)
    }
}

/// One outbound command frame: an identifier plus its raw payload bytes.
///
/// Commands are write-only and fire-and-forget; no acknowledgement is
/// awaited outside the optional mechanism handshake path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanCommand {
    pub id: CanId,
    pub payload: Vec<u8>,
}

impl CanCommand {
    pub fn new(id: CanId, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            payload: payload.into(),
        }
    }
}
