//! Key event types for the chord engine.
//!
//! Only a closed set of logical keys is ever represented here. Raw key names
//! from the OS are validated at the hook boundary and anything outside this
//! vocabulary never becomes a [`KeyEvent`].

use crate::core::profile::ProfileId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two modifiers that together form the recording chord.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Modifier {
    /// Control
    Primary,
    /// Shift
    Secondary,
}

impl Modifier {
    /// Both modifiers, in a fixed order.
    pub const ALL: [Modifier; 2] = [Modifier::Primary, Modifier::Secondary];
}

/// Which physical copy of a modifier. Keys reported without a side are `Left`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

/// A key the engine cares about.
///
/// Modifiers are physical keys: left and right Shift are tracked separately,
/// and a modifier counts as held while either of its keys is down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KeyId {
    /// One physical key of a chord modifier.
    Modifier(Modifier, Side),
    /// A digit-row selector, carrying its digit (0-9).
    Selector(u8),
}

const MODIFIER_NAMES: [(&str, Modifier, Side); 7] = [
    ("ctrl", Modifier::Primary, Side::Left),
    ("control", Modifier::Primary, Side::Left),
    ("left ctrl", Modifier::Primary, Side::Left),
    ("right ctrl", Modifier::Primary, Side::Right),
    ("shift", Modifier::Secondary, Side::Left),
    ("left shift", Modifier::Secondary, Side::Left),
    ("right shift", Modifier::Secondary, Side::Right),
];

/// Shifted digit-row symbols, indexed by digit.
const SHIFTED_DIGITS: [char; 10] = [')', '!', '@', '#', '$', '%', '^', '&', '*', '('];

impl KeyId {
    /// Parse a raw key name as delivered by the OS hook layer.
    ///
    /// Matching is case-insensitive. Selector keys are accepted both as the
    /// plain digit (`"2"`) and as the symbol the OS reports while Shift is held
    /// (`"@"`). Returns `None` for every other key.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        if let Some((_, modifier, side)) = MODIFIER_NAMES
            .iter()
            .find(|(n, _, _)| n.eq_ignore_ascii_case(name))
        {
            return Some(KeyId::Modifier(*modifier, *side));
        }

        let mut chars = name.chars();
        let (Some(c), None) = (chars.next(), chars.next()) else {
            return None;
        };
        if let Some(digit) = c.to_digit(10) {
            return Some(KeyId::Selector(digit as u8));
        }
        SHIFTED_DIGITS
            .iter()
            .position(|&s| s == c)
            .map(|digit| KeyId::Selector(digit as u8))
    }

    /// The selector key that selects `profile`, if the profile fits on the digit row.
    pub fn selector_for(profile: ProfileId) -> Option<Self> {
        u8::try_from(profile.get())
            .ok()
            .filter(|d| *d < 10)
            .map(KeyId::Selector)
    }

    /// The profile this key selects, for selector keys.
    pub fn profile(&self) -> Option<ProfileId> {
        match self {
            KeyId::Selector(digit) => Some(ProfileId::new(u32::from(*digit))),
            KeyId::Modifier(..) => None,
        }
    }

    /// The modifier this key is a copy of, for modifier keys.
    pub fn modifier(&self) -> Option<Modifier> {
        match self {
            KeyId::Modifier(modifier, _) => Some(*modifier),
            KeyId::Selector(_) => None,
        }
    }

    /// Whether this key is one of the chord modifiers.
    pub fn is_modifier(&self) -> bool {
        matches!(self, KeyId::Modifier(..))
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyId::Modifier(Modifier::Primary, Side::Left) => write!(f, "left ctrl"),
            KeyId::Modifier(Modifier::Primary, Side::Right) => write!(f, "right ctrl"),
            KeyId::Modifier(Modifier::Secondary, Side::Left) => write!(f, "left shift"),
            KeyId::Modifier(Modifier::Secondary, Side::Right) => write!(f, "right shift"),
            KeyId::Selector(digit) => write!(f, "{digit}"),
        }
    }
}

/// Direction of a physical key transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transition {
    Down,
    Up,
}

/// One physical key transition, as observed by the hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    /// Logical key
    pub key: KeyId,
    /// Press or release
    pub transition: Transition,
    /// When the hook observed the transition
    pub observed_at: DateTime<Utc>,
}

impl KeyEvent {
    /// Create an event stamped with the current time.
    pub fn new(key: KeyId, transition: Transition) -> Self {
        Self::at(key, transition, Utc::now())
    }

    /// Create an event with an explicit timestamp.
    pub fn at(key: KeyId, transition: Transition, observed_at: DateTime<Utc>) -> Self {
        Self {
            key,
            transition,
            observed_at,
        }
    }

    pub fn down(key: KeyId) -> Self {
        Self::new(key, Transition::Down)
    }

    pub fn up(key: KeyId) -> Self {
        Self::new(key, Transition::Up)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifier_names() {
        for name in ["ctrl", "left ctrl", "Control"] {
            assert_eq!(
                KeyId::from_name(name),
                Some(KeyId::Modifier(Modifier::Primary, Side::Left))
            );
        }
        assert_eq!(
            KeyId::from_name("Right Ctrl"),
            Some(KeyId::Modifier(Modifier::Primary, Side::Right))
        );
        for name in ["shift", "left shift"] {
            assert_eq!(
                KeyId::from_name(name),
                Some(KeyId::Modifier(Modifier::Secondary, Side::Left))
            );
        }
        assert_eq!(
            KeyId::from_name("RIGHT SHIFT"),
            Some(KeyId::Modifier(Modifier::Secondary, Side::Right))
        );
    }

    #[test]
    fn test_sides_are_distinct_keys() {
        let left = KeyId::from_name("left shift").unwrap();
        let right = KeyId::from_name("right shift").unwrap();
        assert_ne!(left, right);
        assert_eq!(left.modifier(), right.modifier());
        assert_eq!(right.to_string(), "right shift");
    }

    #[test]
    fn test_selector_names() {
        assert_eq!(KeyId::from_name("!"), Some(KeyId::Selector(1)));
        assert_eq!(KeyId::from_name("1"), Some(KeyId::Selector(1)));
        assert_eq!(KeyId::from_name("@"), Some(KeyId::Selector(2)));
        assert_eq!(KeyId::from_name("("), Some(KeyId::Selector(9)));
        assert_eq!(KeyId::from_name(")"), Some(KeyId::Selector(0)));
        assert_eq!(KeyId::from_name("0"), Some(KeyId::Selector(0)));
    }

    #[test]
    fn test_unrelated_keys_are_invisible() {
        for name in ["a", "space", "alt", "f1", "", "12", "windows"] {
            assert_eq!(KeyId::from_name(name), None, "{name:?}");
        }
    }

    #[test]
    fn test_selector_profile_mapping() {
        assert_eq!(KeyId::Selector(3).profile(), Some(ProfileId::new(3)));
        assert_eq!(KeyId::Modifier(Modifier::Primary, Side::Left).profile(), None);
        assert_eq!(
            KeyId::selector_for(ProfileId::new(7)),
            Some(KeyId::Selector(7))
        );
        assert_eq!(KeyId::selector_for(ProfileId::new(12)), None);
    }
}
