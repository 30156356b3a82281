//! Membership tiers
//!
//! Tiers are ordered; a gate on `min` is passed by any tier `>= min`.
//! `Founder` is an override tier and, together with `Deepening`, passes
//! every gate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ordered entitlement level controlling feature access
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Tier {
    /// No paid membership
    #[default]
    Free = 0,
    Starter = 1,
    AiBlueprint = 2,
    Accelerator = 3,
    Deepening = 4,
    /// Founder override, tracked separately from Deepening for display
    Founder = 5,
}

impl Tier {
    /// All tiers in ascending order
    pub const ALL: [Tier; 6] = [
        Tier::Free,
        Tier::Starter,
        Tier::AiBlueprint,
        Tier::Accelerator,
        Tier::Deepening,
        Tier::Founder,
    ];

    /// Canonical upper-case name, as stored and returned over the API
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "FREE",
            Tier::Starter => "STARTER",
            Tier::AiBlueprint => "AI_BLUEPRINT",
            Tier::Accelerator => "ACCELERATOR",
            Tier::Deepening => "DEEPENING",
            Tier::Founder => "FOUNDER",
        }
    }

    /// Whether this tier passes a gate requiring at least `min`.
    pub fn satisfies(self, min: Tier) -> bool {
        self >= Tier::Deepening || self >= min
    }

    /// Tier used for feature gating and display; Founder behaves like Deepening.
    pub fn gating(self) -> Tier {
        match self {
            Tier::Founder => Tier::Deepening,
            other => other,
        }
    }

    /// Parse a stored tier string.
    ///
    /// Case-insensitive; `-` and spaces are treated as `_`, so
    /// `"ai-blueprint"` and `"AI_BLUEPRINT"` both parse. Returns `None` for
    /// blank or unrecognized values.
    pub fn parse_stored(raw: &str) -> Option<Tier> {
        let normalized: String = raw
            .trim()
            .chars()
            .map(|c| match c {
                '-' | ' ' => '_',
                c => c.to_ascii_uppercase(),
            })
            .collect();

        match normalized.as_str() {
            "FREE" => Some(Tier::Free),
            "STARTER" => Some(Tier::Starter),
            "AI_BLUEPRINT" => Some(Tier::AiBlueprint),
            "ACCELERATOR" => Some(Tier::Accelerator),
            "DEEPENING" => Some(Tier::Deepening),
            "FOUNDER" => Some(Tier::Founder),
            _ => None,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for tier names that are not recognized
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tier: {0}")]
pub struct UnknownTier(pub String);

impl FromStr for Tier {
    type Err = UnknownTier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tier::parse_stored(s).ok_or_else(|| UnknownTier(s.to_string()))
    }
}
