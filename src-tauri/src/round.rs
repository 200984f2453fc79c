use std::collections::HashSet;

use serde::Serialize;

use crate::models::{Entry, LotteryState, LotteryStep, Place, Winner};

/// Why a draw did not happen. These are expected, UI-guarded conditions;
/// callers treat them as no-ops.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DrawRejected {
    #[error("no lottery is loaded")]
    NoLottery,
    #[error("{place:?} cannot be drawn at step {step:?}")]
    OutOfTurn { place: Place, step: LotteryStep },
    #[error("a spin is already in flight")]
    SpinInFlight,
    #[error("no spin is in flight")]
    NothingInFlight,
    #[error("no entries remain to draw from")]
    EmptyPool,
    #[error("the selector produced no winner")]
    NoWinnerDrawn,
    #[error("winner {0} has no sector on the wheel")]
    WinnerNotInSectors(String),
    #[error("entry {0} has already won")]
    AlreadyWon(String),
    #[error("the spin plan no longer matches the session")]
    StalePlan,
}

impl LotteryState {
    /// A lottery with entries and no rounds drawn yet.
    pub fn ready(last_import_at: Option<i64>) -> Self {
        Self {
            step: LotteryStep::Ready,
            winners: Vec::new(),
            last_import_at,
        }
    }

    pub fn can_draw(&self, place: Place) -> bool {
        self.step == place.required_step()
    }

    pub fn has_won(&self, entry_id: &str) -> bool {
        self.winners.iter().any(|w| w.entry_id == entry_id)
    }

    /// Appends the winner for `winner.place` and advances one step.
    pub fn record_winner(&mut self, winner: Winner) -> Result<(), DrawRejected> {
        if !self.can_draw(winner.place) {
            return Err(DrawRejected::OutOfTurn {
                place: winner.place,
                step: self.step,
            });
        }
        if self.has_won(&winner.entry_id) {
            return Err(DrawRejected::AlreadyWon(winner.entry_id));
        }
        self.step = winner.place.completed_step();
        self.winners.push(winner);
        Ok(())
    }

    /// Back to `ready` with no winners, keeping the import timestamp.
    pub fn restarted(&self) -> Self {
        Self::ready(self.last_import_at)
    }

    /// Entries that have not won yet, in entry order.
    pub fn remaining<'a>(&self, entries: &'a [Entry]) -> Vec<&'a Entry> {
        let won: HashSet<&str> = self.winners.iter().map(|w| w.entry_id.as_str()).collect();
        entries.iter().filter(|e| !won.contains(e.id.as_str())).collect()
    }
}

/* ------------------- PODIUM ------------------- */
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Podium {
    pub first: Option<Winner>,
    pub second: Option<Winner>,
    pub third: Option<Winner>,
}

impl Podium {
    pub fn from_winners(winners: &[Winner]) -> Self {
        let pick = |place| winners.iter().find(|w| w.place == place).cloned();
        Self {
            first: pick(Place::First),
            second: pick(Place::Second),
            third: pick(Place::Third),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.first.is_some() && self.second.is_some() && self.third.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(n: usize) -> Vec<Entry> {
        (0..n)
            .map(|i| Entry {
                id: format!("e{i}"),
                name: format!("Name {i}"),
                tickets: 1 + i as i64,
                created_at: 0,
            })
            .collect()
    }

    fn win(place: Place, entry: &Entry) -> Winner {
        Winner {
            place,
            entry_id: entry.id.clone(),
            name: entry.name.clone(),
            prize_label: "prize".into(),
            won_at: 0,
        }
    }

    #[test]
    fn rounds_advance_in_place_order() {
        let pool = entries(5);
        let mut state = LotteryState::ready(Some(10));
        for (i, place) in Place::ALL.into_iter().enumerate() {
            assert_eq!(state.remaining(&pool).len(), pool.len() - i);
            state.record_winner(win(place, &pool[i])).unwrap();
            assert_eq!(state.step, place.completed_step());
            assert_eq!(state.winners.len(), i + 1);
        }
        assert_eq!(state.step, LotteryStep::FirstDone);
        assert_eq!(state.remaining(&pool).len(), 2);
        assert!(state.is_consistent());
    }

    #[test]
    fn second_place_only_draws_after_third() {
        let pool = entries(4);
        let mut state = LotteryState::ready(None);
        assert!(!state.can_draw(Place::Second));
        let err = state.record_winner(win(Place::Second, &pool[0])).unwrap_err();
        assert_eq!(
            err,
            DrawRejected::OutOfTurn {
                place: Place::Second,
                step: LotteryStep::Ready
            }
        );
        assert!(state.winners.is_empty());

        state.record_winner(win(Place::Third, &pool[0])).unwrap();
        assert!(state.can_draw(Place::Second));
        state.record_winner(win(Place::Second, &pool[1])).unwrap();
        state.record_winner(win(Place::First, &pool[2])).unwrap();
        assert!(!state.can_draw(Place::Second));
        assert!(state.record_winner(win(Place::Second, &pool[3])).is_err());
    }

    #[test]
    fn an_entry_cannot_win_twice() {
        let pool = entries(3);
        let mut state = LotteryState::ready(None);
        state.record_winner(win(Place::Third, &pool[1])).unwrap();
        let err = state.record_winner(win(Place::Second, &pool[1])).unwrap_err();
        assert_eq!(err, DrawRejected::AlreadyWon("e1".into()));
        assert_eq!(state.step, LotteryStep::ThirdDone);
    }

    #[test]
    fn restart_keeps_the_import_timestamp() {
        let pool = entries(3);
        let mut state = LotteryState::ready(Some(1_700_000_000_000));
        for (i, place) in Place::ALL.into_iter().enumerate() {
            state.record_winner(win(place, &pool[i])).unwrap();
        }
        let restarted = state.restarted();
        assert_eq!(restarted, LotteryState::ready(Some(1_700_000_000_000)));
        assert_eq!(restarted.remaining(&pool).len(), 3);
    }

    #[test]
    fn podium_orders_by_place() {
        let pool = entries(3);
        let mut state = LotteryState::ready(None);
        state.record_winner(win(Place::Third, &pool[0])).unwrap();
        let partial = Podium::from_winners(&state.winners);
        assert_eq!(partial.third.as_ref().map(|w| w.entry_id.as_str()), Some("e0"));
        assert!(!partial.is_complete());

        state.record_winner(win(Place::Second, &pool[1])).unwrap();
        state.record_winner(win(Place::First, &pool[2])).unwrap();
        let podium = Podium::from_winners(&state.winners);
        assert!(podium.is_complete());
        assert_eq!(podium.first.map(|w| w.entry_id), Some("e2".to_string()));
    }
}
