use serde::{Deserialize, Serialize};

use crate::models::Place;

pub const MIN_DURATION_MS: u64 = 1_000;
pub const MAX_DURATION_MS: u64 = 60_000;
pub const MIN_EXTRA_TURNS: u32 = 1;
pub const MAX_EXTRA_TURNS: u32 = 50;

/// Spin tuning for one place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceSpin {
    pub duration_ms: u64,
    pub extra_turns: u32,
    pub prize_label: String,
}

impl PlaceSpin {
    fn default_for(place: Place) -> Self {
        let (duration_ms, extra_turns, prize_label) = match place {
            Place::Third => (4_000, 6, "BUY ME – 200₪"),
            Place::Second => (6_000, 8, "BUY ME – 300₪"),
            Place::First => (8_000, 10, "BUY ME – 500₪"),
        };
        Self {
            duration_ms,
            extra_turns,
            prize_label: prize_label.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinSettings {
    pub third: PlaceSpin,
    pub second: PlaceSpin,
    pub first: PlaceSpin,
}

impl Default for SpinSettings {
    fn default() -> Self {
        Self {
            third: PlaceSpin::default_for(Place::Third),
            second: PlaceSpin::default_for(Place::Second),
            first: PlaceSpin::default_for(Place::First),
        }
    }
}

impl SpinSettings {
    pub fn for_place(&self, place: Place) -> &PlaceSpin {
        match place {
            Place::Third => &self.third,
            Place::Second => &self.second,
            Place::First => &self.first,
        }
    }

    /// Clamps durations to 1–60 s and turns to 1–50; blank prize labels fall
    /// back to the default for that place.
    pub fn sanitized(mut self) -> Self {
        for place in Place::ALL {
            let spin = match place {
                Place::Third => &mut self.third,
                Place::Second => &mut self.second,
                Place::First => &mut self.first,
            };
            spin.duration_ms = spin.duration_ms.clamp(MIN_DURATION_MS, MAX_DURATION_MS);
            spin.extra_turns = spin.extra_turns.clamp(MIN_EXTRA_TURNS, MAX_EXTRA_TURNS);
            let label = spin.prize_label.trim();
            spin.prize_label = if label.is_empty() {
                PlaceSpin::default_for(place).prize_label
            } else {
                label.to_string()
            };
        }
        self
    }

    /// Reads persisted settings; anything unreadable means defaults.
    pub fn decode(raw: &str) -> Self {
        match serde_json::from_str::<SpinSettings>(raw) {
            Ok(s) => s.sanitized(),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable spin settings");
                Self::default()
            }
        }
    }
}
