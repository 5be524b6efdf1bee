//! Wire-facing types shared by the R1 control process and its tooling.
//!
//! This crate carries no I/O: the CAN identifier registry, the outbound
//! command representation and the inbound JSON packet shapes live here so
//! that every consumer agrees on them.

pub mod can;
pub mod wire;

/// A raw wire value that does not map to any known enum variant.
///
/// Raised at the decode boundary; raw integers never travel past it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} wire value {value}")]
pub struct UnknownValue {
    /// Name of the enumeration the value failed to map into.
    pub kind: &'static str,
    pub value: u8,
}

impl UnknownValue {
    pub fn new(kind: &'static str, value: u8) -> Self {
        Self { kind, value }
    }
}
