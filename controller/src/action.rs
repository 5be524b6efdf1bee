//! Actions fired by button edges.

use crate::bus::Step;
use r1_protocol::can::CanId;

/// What a fired button edge does.
///
/// Kept as plain data so the dispatcher can execute them and tests can
/// inspect them without a bus attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Action {
    /// Write a single fixed frame.
    SendFixed(CanId, Vec<u8>),
    /// Run a write sequence as one indivisible bus block.
    SendSequence(Vec<Step>),
    /// Run the ball shoot sequence.
    Shoot,
    /// Fire nothing.
    NoOp,
}
