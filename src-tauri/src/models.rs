use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/* ------------------- ENTRIES ------------------- */
/// One participant. `tickets` is the selection weight and is always >= 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: String,
    pub name: String,
    pub tickets: i64,
    pub created_at: i64,
}

/* ------------------- PLACES ------------------- */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Place {
    Third,
    Second,
    First,
}

impl Place {
    /// Draw order: third place is drawn first.
    pub const ALL: [Place; 3] = [Place::Third, Place::Second, Place::First];

    /// Step the lottery must be at before this place can be drawn.
    pub fn required_step(self) -> LotteryStep {
        match self {
            Place::Third => LotteryStep::Ready,
            Place::Second => LotteryStep::ThirdDone,
            Place::First => LotteryStep::SecondDone,
        }
    }

    /// Step the lottery moves to once this place has a winner.
    pub fn completed_step(self) -> LotteryStep {
        match self {
            Place::Third => LotteryStep::ThirdDone,
            Place::Second => LotteryStep::SecondDone,
            Place::First => LotteryStep::FirstDone,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Place::Third => "3rd Place",
            Place::Second => "2nd Place",
            Place::First => "1st Place",
        }
    }
}

/* ------------------- STEPS ------------------- */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LotteryStep {
    Idle,
    Ready,
    ThirdDone,
    SecondDone,
    FirstDone,
}

impl LotteryStep {
    /// Number of winners a state at this step must hold.
    pub fn completed_rounds(self) -> usize {
        match self {
            LotteryStep::Idle | LotteryStep::Ready => 0,
            LotteryStep::ThirdDone => 1,
            LotteryStep::SecondDone => 2,
            LotteryStep::FirstDone => 3,
        }
    }

    /// The place that may be drawn from this step, if any.
    pub fn next_place(self) -> Option<Place> {
        Place::ALL.into_iter().find(|p| p.required_step() == self)
    }
}

/* ------------------- WINNERS ------------------- */
/// `name` and `prize_label` are snapshots taken when the round completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Winner {
    pub place: Place,
    pub entry_id: String,
    pub name: String,
    pub prize_label: String,
    pub won_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotteryState {
    pub step: LotteryStep,
    pub winners: Vec<Winner>,
    pub last_import_at: Option<i64>,
}

impl LotteryState {
    /// Decodes a persisted state blob. Anything that does not parse, or that
    /// parses but breaks the winners/step invariants, is treated as absent.
    pub fn decode(raw: &str) -> Option<Self> {
        let state: LotteryState = match serde_json::from_str(raw) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "discarding undecodable lottery state");
                return None;
            }
        };
        if !state.is_consistent() {
            tracing::warn!(step = ?state.step, winners = state.winners.len(), "discarding inconsistent lottery state");
            return None;
        }
        Some(state)
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Winners count matches the step, places follow draw order and no entry
    /// won twice.
    pub fn is_consistent(&self) -> bool {
        if self.winners.len() != self.step.completed_rounds() {
            return false;
        }
        let in_order = self
            .winners
            .iter()
            .zip(Place::ALL)
            .all(|(w, p)| w.place == p);
        let mut ids: Vec<&str> = self.winners.iter().map(|w| w.entry_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        in_order && ids.len() == self.winners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn winner(place: Place, id: &str) -> Winner {
        Winner {
            place,
            entry_id: id.into(),
            name: id.to_uppercase(),
            prize_label: "prize".into(),
            won_at: 1,
        }
    }

    #[test]
    fn state_uses_the_persisted_wire_names() {
        let state = LotteryState {
            step: LotteryStep::ThirdDone,
            winners: vec![winner(Place::Third, "a")],
            last_import_at: Some(42),
        };
        let json = state.encode().unwrap();
        assert!(json.contains(r#""step":"third_done""#));
        assert!(json.contains(r#""entryId":"a""#));
        assert!(json.contains(r#""lastImportAt":42"#));
        assert_eq!(LotteryState::decode(&json), Some(state));
    }

    #[test]
    fn decode_fails_closed_on_unknown_shapes() {
        assert_eq!(LotteryState::decode("not json"), None);
        assert_eq!(LotteryState::decode(r#"{"step":"bogus","winners":[],"lastImportAt":null}"#), None);
        assert_eq!(LotteryState::decode(r#"{"step":"ready"}"#), None);
        assert_eq!(LotteryState::decode(r#"[1,2,3]"#), None);
    }

    #[test]
    fn decode_rejects_states_that_break_invariants() {
        let too_few = r#"{"step":"second_done","winners":[],"lastImportAt":null}"#;
        assert_eq!(LotteryState::decode(too_few), None);

        let repeated = LotteryState {
            step: LotteryStep::SecondDone,
            winners: vec![winner(Place::Third, "a"), winner(Place::Second, "a")],
            last_import_at: None,
        };
        assert_eq!(LotteryState::decode(&repeated.encode().unwrap()), None);

        let out_of_order = LotteryState {
            step: LotteryStep::ThirdDone,
            winners: vec![winner(Place::First, "a")],
            last_import_at: None,
        };
        assert_eq!(LotteryState::decode(&out_of_order.encode().unwrap()), None);
    }

    #[test]
    fn places_chain_through_the_steps() {
        assert_eq!(LotteryStep::Ready.next_place(), Some(Place::Third));
        assert_eq!(LotteryStep::ThirdDone.next_place(), Some(Place::Second));
        assert_eq!(LotteryStep::SecondDone.next_place(), Some(Place::First));
        assert_eq!(LotteryStep::FirstDone.next_place(), None);
        assert_eq!(LotteryStep::Idle.next_place(), None);
        for p in Place::ALL {
            assert_eq!(p.completed_step().completed_rounds(), p.required_step().completed_rounds() + 1);
        }
    }
}
