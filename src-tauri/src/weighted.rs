use rand::Rng;

use crate::models::Entry;

/// Picks one index with probability proportional to its weight.
///
/// `random` must return values in `[0, 1)`. One value is drawn, scaled to the
/// total weight and walked down the candidates in order; the first index where
/// the remainder reaches zero wins. Returns `None` for an empty slice or a
/// non-positive total.
pub fn select_index(weights: &[f64], random: &mut impl FnMut() -> f64) -> Option<usize> {
    if weights.is_empty() {
        return None;
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return None;
    }

    let mut remainder = random() * total;
    for (i, w) in weights.iter().enumerate() {
        remainder -= w;
        if remainder <= 0.0 {
            return Some(i);
        }
    }
    // rounding can leave a sliver after the last candidate
    Some(weights.len() - 1)
}

/// Ticket-weighted pick over entries, in the order given.
pub fn pick_entry<'a>(entries: &[&'a Entry], random: &mut impl FnMut() -> f64) -> Option<&'a Entry> {
    let weights: Vec<f64> = entries.iter().map(|e| e.tickets as f64).collect();
    select_index(&weights, random).map(|i| entries[i])
}

/// Uniform `[0, 1)` source backed by any `rand` generator.
pub fn unit_random<R: Rng>(mut rng: R) -> impl FnMut() -> f64 {
    move || rng.gen::<f64>()
}
