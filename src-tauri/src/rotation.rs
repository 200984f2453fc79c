use std::f64::consts::{FRAC_PI_2, TAU};

use crate::geometry::{Sector, WHEEL_START_ANGLE};

/// The wheel is drawn with sector angle `θ` at screen angle `θ + POINTER_OFFSET`;
/// a clockwise rotation `R` then puts it at `θ + POINTER_OFFSET - R`. The
/// pointer sits at screen angle 0 (3 o'clock).
pub const POINTER_OFFSET: f64 = FRAC_PI_2;

/// Reduces an angle into `[0, 2π)`.
pub fn normalize(angle: f64) -> f64 {
    let r = angle.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs
    if r >= TAU {
        0.0
    } else {
        r
    }
}

/// Final wheel rotation that lands `winner_center` under the pointer.
///
/// The result is always strictly greater than `current`: the wheel spins
/// forward through `extra_full_turns - 1` whole turns plus the alignment
/// delta, and an already aligned wheel still does a full extra revolution.
pub fn compute_target_rotation(current: f64, winner_center: f64, extra_full_turns: u32) -> f64 {
    let current_mod = normalize(current);
    let mut target_mod = normalize(winner_center + POINTER_OFFSET);
    if target_mod < current_mod {
        target_mod += TAU;
    }
    let mut delta = target_mod - current_mod;
    if delta <= 0.0 {
        delta += TAU;
    }
    let turns = extra_full_turns.max(1);
    current + f64::from(turns - 1) * TAU + delta
}

/// Index of the sector under the pointer once the wheel is at `rotation`.
pub fn sector_under_pointer(rotation: f64, sectors: &[Sector]) -> Option<usize> {
    let last = sectors.len().checked_sub(1)?;
    // wheel-space angle that sits at screen angle 0
    let offset_from_start = normalize(rotation - POINTER_OFFSET - WHEEL_START_ANGLE);
    let idx = sectors
        .iter()
        .position(|s| offset_from_start < s.end_angle - WHEEL_START_ANGLE)
        .unwrap_or(last);
    Some(idx)
}

/// Signed distance between the pointer and a sector center after `rotation`,
/// folded into `(-π, π]`.
pub fn pointer_error(rotation: f64, center: f64) -> f64 {
    let e = normalize(center + POINTER_OFFSET - rotation);
    if e > std::f64::consts::PI {
        e - TAU
    } else {
        e
    }
}
