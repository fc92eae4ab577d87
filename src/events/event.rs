//! # Key events reported by lircd.
//!
//! A [`KeyEvent`] is one line of upstream output:
//!
//! ```text
//! <id> <repeatHex> <name> <device>
//! 0000000000f40bf0 00 KEY_UP devinput
//! 0000000000f40bf0 01 KEY_UP devinput
//! ```
//!
//! `id` and `device` are opaque and passed through unchanged. `repeat` is the
//! counter lircd assigns to consecutive repeats of one physical key-down
//! (`0` = fresh press).
//!
//! ## Example
//! ```rust
//! use lirc_relay::KeyEvent;
//!
//! let ev = KeyEvent::parse("qwe 1a KEY_UP device").unwrap();
//! assert_eq!(ev.repeat, 26);
//! assert_eq!(ev.name, "KEY_UP");
//! ```

use std::str::FromStr;

use tokio::time::Instant;

use crate::error::ParseError;

/// Suffix appended to the key name of a sustained press.
pub const HOLD_SUFFIX: &str = "_HOLD";

/// A single reported key activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    /// Remote/protocol identifier.
    pub id: String,
    /// Key symbol, possibly carrying [`HOLD_SUFFIX`].
    pub name: String,
    /// Device name.
    pub device: String,
    /// Repeat counter (0 = fresh press).
    pub repeat: u32,
    /// When the line was parsed.
    pub observed_at: Instant,
}

impl KeyEvent {
    /// Creates an event observed now.
    pub fn new(
        id: impl Into<String>,
        repeat: u32,
        name: impl Into<String>,
        device: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            device: device.into(),
            repeat,
            observed_at: Instant::now(),
        }
    }

    /// Overrides the observation time.
    pub fn at(mut self, observed_at: Instant) -> Self {
        self.observed_at = observed_at;
        self
    }

    /// Parses `id repeatHex name device`; fields after the fourth are ignored.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 {
            return Err(ParseError::MissingFields {
                line: line.to_string(),
                fields: fields.len(),
            });
        }
        let repeat = u32::from_str_radix(fields[1], 16).map_err(|_| ParseError::BadRepeat {
            line: line.to_string(),
            repeat: fields[1].to_string(),
        })?;

        Ok(Self::new(fields[0], repeat, fields[2], fields[3]))
    }

    /// True for a fresh press.
    #[inline]
    pub fn is_fresh(&self) -> bool {
        self.repeat == 0
    }

    /// True if `next` continues this key-down: same name, counter one higher.
    #[inline]
    pub fn is_followed_by(&self, next: &KeyEvent) -> bool {
        self.name == next.name && self.repeat.checked_add(1) == Some(next.repeat)
    }

    /// Marks this event as a sustained hold.
    pub fn mark_hold(&mut self) {
        self.name.push_str(HOLD_SUFFIX);
    }
}

impl FromStr for KeyEvent {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fresh_press() {
        let ev = KeyEvent::parse("qwe 0 KEY_UP device").unwrap();
        assert_eq!(ev.repeat, 0);
        assert_eq!(ev.id, "qwe");
        assert_eq!(ev.name, "KEY_UP");
        assert_eq!(ev.device, "device");
        assert!(ev.is_fresh());
    }

    #[test]
    fn test_parse_hex_repeat() {
        let ev: KeyEvent = "qwe 1a KEY_UP device".parse().unwrap();
        assert_eq!(ev.repeat, 26);

        let ev = KeyEvent::parse("0000000000f40bf0 0F KEY_DOWN devinput\r").unwrap();
        assert_eq!(ev.repeat, 15);
        assert_eq!(ev.device, "devinput");
    }

    #[test]
    fn test_parse_ignores_extra_fields() {
        let ev = KeyEvent::parse("id 2 KEY_OK dev trailing junk").unwrap();
        assert_eq!(ev.device, "dev");
        assert_eq!(ev.repeat, 2);
    }

    #[test]
    fn test_parse_rejects_short_line() {
        let err = KeyEvent::parse("id 0 KEY_OK").unwrap_err();
        assert_eq!(
            err,
            ParseError::MissingFields {
                line: "id 0 KEY_OK".into(),
                fields: 3
            }
        );
        assert!(KeyEvent::parse("").is_err());
    }

    #[test]
    fn test_parse_rejects_bad_hex() {
        let err = KeyEvent::parse("id zz KEY_OK dev").unwrap_err();
        assert!(matches!(err, ParseError::BadRepeat { ref repeat, .. } if repeat == "zz"));
        assert!(KeyEvent::parse("id -1 KEY_OK dev").is_err());
        assert!(KeyEvent::parse("id 100000000 KEY_OK dev").is_err());
    }

    #[test]
    fn test_sequence_continuation() {
        let a = KeyEvent::new("id", 3, "KEY_UP", "dev");
        assert!(a.is_followed_by(&KeyEvent::new("id", 4, "KEY_UP", "dev")));
        assert!(!a.is_followed_by(&KeyEvent::new("id", 5, "KEY_UP", "dev")));
        assert!(!a.is_followed_by(&KeyEvent::new("id", 4, "KEY_DOWN", "dev")));

        let max = KeyEvent::new("id", u32::MAX, "KEY_UP", "dev");
        assert!(!max.is_followed_by(&KeyEvent::new("id", 0, "KEY_UP", "dev")));
    }
}
