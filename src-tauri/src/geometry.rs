use std::f64::consts::{FRAC_PI_2, TAU};

use serde::Serialize;

use crate::models::Entry;

/// Where the first sector starts: 12 o'clock, with 0 at 3 o'clock.
pub const WHEEL_START_ANGLE: f64 = -FRAC_PI_2;

/// Angular slice of the wheel for one entry. Angles are radians in wheel space.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sector {
    pub entry: Entry,
    pub start_angle: f64,
    pub end_angle: f64,
    pub center_angle: f64,
}

impl Sector {
    pub fn span(&self) -> f64 {
        self.end_angle - self.start_angle
    }
}

/// Lays entries out consecutively from [`WHEEL_START_ANGLE`], each spanning
/// its share of the total tickets. Empty input or a non-positive total gives
/// an empty wheel.
pub fn build_sectors<'a, I>(entries: I) -> Vec<Sector>
where
    I: IntoIterator<Item = &'a Entry>,
    I::IntoIter: Clone,
{
    let entries = entries.into_iter();
    let total: i64 = entries.clone().map(|e| e.tickets).sum();
    if total <= 0 {
        return Vec::new();
    }

    let mut start = WHEEL_START_ANGLE;
    entries
        .map(|entry| {
            let span = TAU * (entry.tickets as f64 / total as f64);
            let sector = Sector {
                entry: entry.clone(),
                start_angle: start,
                end_angle: start + span,
                center_angle: start + span / 2.0,
            };
            start += span;
            sector
        })
        .collect()
}

pub fn find_sector<'s>(sectors: &'s [Sector], entry_id: &str) -> Option<&'s Sector> {
    sectors.iter().find(|s| s.entry.id == entry_id)
}
