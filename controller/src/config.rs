//! Process configuration.
//!
//! There is no command line surface; everything that varies between
//! installs is an environment variable on top of a working default.

use std::net::SocketAddr;

#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

/// Numeric wire codes for the seedling hand positions.
///
/// The hand firmware has renumbered these between mechanism revisions, so
/// they are configuration rather than constants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HandWireCodes {
    pub(crate) pickup: u8,
    pub(crate) put_inside: u8,
    pub(crate) put_outside: u8,
    pub(crate) reset: u8,
}

impl Default for HandWireCodes {
    fn default() -> Self {
        Self {
            pickup: 0,
            put_inside: 1,
            put_outside: 2,
            reset: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Config {
    /// Name of the CAN network interface, e.g. `can0`.
    pub(crate) can_interface: String,
    /// Bind address for the primary controller packet channel.
    pub(crate) gamepad_bind: SocketAddr,
    /// Bind address for the dedicated drivetrain packet channel.
    pub(crate) drive_bind: SocketAddr,
    /// Whether mode entry sequences wait for a mechanism readiness
    /// response before committing. Off unless the microcontrollers are
    /// flashed with firmware that answers.
    pub(crate) wait_for_ready: bool,
    pub(crate) hand_codes: HandWireCodes,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            can_interface: "can0".to_string(),
            gamepad_bind: "0.0.0.0:12345".parse().unwrap(),
            drive_bind: "0.0.0.0:12346".parse().unwrap(),
            wait_for_ready: false,
            hand_codes: HandWireCodes::default(),
        }
    }
}

impl Config {
    /// Reads overrides from the environment on top of the defaults.
    pub(crate) fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("R1_CAN_INTERFACE") {
            config.can_interface = value;
        }

        if let Ok(value) = std::env::var("R1_GAMEPAD_BIND") {
            config.gamepad_bind = parse(value, "R1_GAMEPAD_BIND")?;
        }

        if let Ok(value) = std::env::var("R1_DRIVE_BIND") {
            config.drive_bind = parse(value, "R1_DRIVE_BIND")?;
        }

        if let Ok(value) = std::env::var("R1_WAIT_FOR_READY") {
            config.wait_for_ready = value == "1" || value.eq_ignore_ascii_case("true");
        }

        // Hand position codes as "pickup,put_inside,put_outside,reset".
        if let Ok(value) = std::env::var("R1_HAND_CODES") {
            config.hand_codes = parse_hand_codes(&value).ok_or(ConfigError::Invalid {
                key: "R1_HAND_CODES",
                value,
            })?;
        }

        Ok(config)
    }
}

fn parse<T: std::str::FromStr>(value: String, key: &'static str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Invalid { key, value })
}

fn parse_hand_codes(value: &str) -> Option<HandWireCodes> {
    let mut codes = value.split(',').map(|part| part.trim().parse::<u8>().ok());

    let pickup = codes.next()??;
    let put_inside = codes.next()??;
    let put_outside = codes.next()??;
    let reset = codes.next()??;

    if codes.next().is_some() {
        return None;
    }

    Some(HandWireCodes {
        pickup,
        put_inside,
        put_outside,
        reset,
    })
}
