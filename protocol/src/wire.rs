//! Inbound packet shapes, as decoded from the UDP collaborator's JSON.
//!
//! Every field is required; a packet missing a key fails to decode and is
//! dropped by the receiving loop without touching any state.

use serde::{Deserialize, Deserializer};

/// One primary-channel controller sample.
///
/// Constructed fresh per received datagram, consumed synchronously, then
/// discarded; no sample is retained across control cycles.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GamepadPacket {
    #[serde(deserialize_with = "bool_or_int")]
    pub btn_a: bool,
    #[serde(deserialize_with = "bool_or_int")]
    pub btn_b: bool,
    #[serde(deserialize_with = "bool_or_int")]
    pub btn_x: bool,
    #[serde(deserialize_with = "bool_or_int")]
    pub btn_y: bool,
    #[serde(deserialize_with = "bool_or_int")]
    pub btn_rb: bool,
    pub seedling_hand_pos: u8,
    pub area_state: u8,
    pub v_x: u8,
    pub v_y: u8,
    pub omega: u8,
}

/// One drivetrain-channel sample: the higher rate path that bypasses mode
/// and button logic entirely.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DrivePacket {
    pub v_x: u8,
    pub v_y: u8,
    pub omega: u8,
}

impl GamepadPacket {
    /// Velocity bytes in bus order. Values pass through unmodified.
    pub fn velocity_payload(&self) -> [u8; 3] {
        [self.v_x, self.v_y, self.omega]
    }
}

impl DrivePacket {
    pub fn velocity_payload(&self) -> [u8; 3] {
        [self.v_x, self.v_y, self.omega]
    }
}

/// Some controller firmwares report buttons as booleans, others as 0/1
/// integers. Accept both.
fn bool_or_int<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    struct BoolOrInt;

    impl serde::de::Visitor<'_> for BoolOrInt {
        type Value = bool;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            f.write_str("a boolean or an integer")
        }

        fn visit_bool<E: serde::de::Error>(self, v: bool) -> Result<bool, E> {
            Ok(v)
        }

        fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<bool, E> {
            Ok(v != 0)
        }

        fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<bool, E> {
            Ok(v != 0)
        }
    }

    deserializer.deserialize_any(BoolOrInt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gamepad_packet_decodes() {
        let packet: GamepadPacket = serde_json::from_str(
            r#"{
                "btn_a": true, "btn_b": false, "btn_x": false, "btn_y": true,
                "btn_rb": false, "seedling_hand_pos": 1, "area_state": 2,
                "v_x": 127, "v_y": 130, "omega": 128
            }"#,
        )
        .unwrap();

        assert!(packet.btn_a);
        assert!(!packet.btn_rb);
        assert_eq!(packet.area_state, 2);
        assert_eq!(packet.velocity_payload(), [127, 130, 128]);
    }

    #[test]
    fn integer_buttons_are_accepted() {
        let packet: GamepadPacket = serde_json::from_str(
            r#"{
                "btn_a": 1, "btn_b": 0, "btn_x": 1, "btn_y": 0,
                "btn_rb": 1, "seedling_hand_pos": 0, "area_state": 0,
                "v_x": 0, "v_y": 0, "omega": 0
            }"#,
        )
        .unwrap();

        assert!(packet.btn_a);
        assert!(!packet.btn_b);
        assert!(packet.btn_rb);
    }

    #[test]
    fn missing_key_is_an_error() {
        let result = serde_json::from_str::<GamepadPacket>(
            r#"{
                "btn_b": false, "btn_x": false, "btn_y": true,
                "btn_rb": false, "seedling_hand_pos": 1, "area_state": 2,
                "v_x": 127, "v_y": 130, "omega": 128
            }"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn drive_packet_decodes() {
        let packet: DrivePacket =
            serde_json::from_str(r#"{"v_x": 10, "v_y": 20, "omega": 30}"#).unwrap();
        assert_eq!(packet.velocity_payload(), [10, 20, 30]);
    }
}
