use std::future::Future;
use std::time::Duration;

use serde::Serialize;

use crate::animation::{FrameTicker, SpinAnimation, SpinFrame};
use crate::geometry::{build_sectors, find_sector, Sector};
use crate::models::{Entry, LotteryState, LotteryStep, Place, Winner};
use crate::rotation::compute_target_rotation;
use crate::round::{DrawRejected, Podium};
use crate::settings::SpinSettings;
use crate::store::{SqliteStore, StoreResult};
use crate::weighted::{pick_entry, unit_random};

/// Everything a round needs to animate and then be recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinPlan {
    pub round_id: u64,
    pub place: Place,
    pub winner: Entry,
    pub prize_label: String,
    pub from_rotation: f64,
    pub target_rotation: f64,
    pub duration_ms: u64,
    /// Wheel layout of the pool the winner was drawn from.
    pub sectors: Vec<Sector>,
}

impl SpinPlan {
    pub fn animation(&self) -> SpinAnimation {
        SpinAnimation::new(self.from_rotation, self.target_rotation, Duration::from_millis(self.duration_ms))
    }
}

/// What the presentation layer renders.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub step: LotteryStep,
    pub next_place: Option<Place>,
    pub entries: Vec<Entry>,
    pub remaining: Vec<Entry>,
    pub sectors: Vec<Sector>,
    pub winners: Vec<Winner>,
    pub rotation: f64,
    pub spinning: bool,
    pub last_import_at: Option<i64>,
    pub settings: SpinSettings,
}

/// How a single awaited round ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RoundOutcome {
    Completed(Winner),
    Cancelled,
}

/* ------------------- SESSION ------------------- */
/// In-memory lottery session: the authoritative copy of entries, state,
/// wheel rotation and the in-flight flag while the app is running.
#[derive(Debug, Clone, Default)]
pub struct DrawSession {
    entries: Vec<Entry>,
    state: Option<LotteryState>,
    rotation: f64,
    in_flight: Option<u64>,
    rounds_started: u64,
    settings: SpinSettings,
}

impl DrawSession {
    pub fn new(entries: Vec<Entry>, state: Option<LotteryState>, settings: SpinSettings) -> Self {
        Self {
            entries,
            state,
            rotation: 0.0,
            in_flight: None,
            rounds_started: 0,
            settings: settings.sanitized(),
        }
    }

    pub fn step(&self) -> LotteryStep {
        self.state.as_ref().map_or(LotteryStep::Idle, |s| s.step)
    }

    pub fn state(&self) -> Option<&LotteryState> {
        self.state.as_ref()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    pub fn is_spinning(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn settings(&self) -> &SpinSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: SpinSettings) {
        self.settings = settings.sanitized();
    }

    pub fn remaining(&self) -> Vec<&Entry> {
        match &self.state {
            Some(state) => state.remaining(&self.entries),
            None => self.entries.iter().collect(),
        }
    }

    pub fn sectors(&self) -> Vec<Sector> {
        build_sectors(self.remaining())
    }

    pub fn podium(&self) -> Podium {
        self.state
            .as_ref()
            .map(|s| Podium::from_winners(&s.winners))
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> Snapshot {
        let step = self.step();
        Snapshot {
            step,
            next_place: step.next_place(),
            entries: self.entries.clone(),
            remaining: self.remaining().into_iter().cloned().collect(),
            sectors: self.sectors(),
            winners: self.state.as_ref().map(|s| s.winners.clone()).unwrap_or_default(),
            rotation: self.rotation,
            spinning: self.is_spinning(),
            last_import_at: self.state.as_ref().and_then(|s| s.last_import_at),
            settings: self.settings.clone(),
        }
    }

    /// Validates the round, draws the winner and plans the spin. On success
    /// the session is marked as spinning; nothing else changes until
    /// [`DrawSession::complete_round`] or [`DrawSession::cancel_round`].
    pub fn begin_round(
        &mut self,
        place: Place,
        random: &mut impl FnMut() -> f64,
    ) -> Result<SpinPlan, DrawRejected> {
        if self.is_spinning() {
            return Err(DrawRejected::SpinInFlight);
        }
        let state = self.state.as_ref().ok_or(DrawRejected::NoLottery)?;
        if !state.can_draw(place) {
            return Err(DrawRejected::OutOfTurn {
                place,
                step: state.step,
            });
        }
        let pool = state.remaining(&self.entries);
        if pool.is_empty() {
            return Err(DrawRejected::EmptyPool);
        }

        let winner = pick_entry(&pool, random).ok_or(DrawRejected::NoWinnerDrawn)?;
        let sectors = build_sectors(pool.iter().copied());
        let center = find_sector(&sectors, &winner.id)
            .map(|s| s.center_angle)
            .ok_or_else(|| DrawRejected::WinnerNotInSectors(winner.id.clone()))?;

        let spin = self.settings.for_place(place);
        let round_id = self.rounds_started + 1;
        let plan = SpinPlan {
            round_id,
            place,
            winner: winner.clone(),
            prize_label: spin.prize_label.clone(),
            from_rotation: self.rotation,
            target_rotation: compute_target_rotation(self.rotation, center, spin.extra_turns),
            duration_ms: spin.duration_ms,
            sectors,
        };
        self.rounds_started = round_id;
        self.in_flight = Some(round_id);
        Ok(plan)
    }

    /// Records the planned winner once the wheel has landed.
    pub fn complete_round(&mut self, plan: &SpinPlan, won_at: i64) -> Result<Winner, DrawRejected> {
        match self.in_flight {
            None => return Err(DrawRejected::NothingInFlight),
            Some(id) if id != plan.round_id => return Err(DrawRejected::StalePlan),
            Some(_) => {}
        }
        let state = self.state.as_mut().ok_or(DrawRejected::NoLottery)?;
        let winner = Winner {
            place: plan.place,
            entry_id: plan.winner.id.clone(),
            name: plan.winner.name.clone(),
            prize_label: plan.prize_label.clone(),
            won_at,
        };
        let recorded = state.record_winner(winner.clone());
        // the round is over either way
        self.in_flight = None;
        recorded?;
        self.rotation = plan.target_rotation;
        Ok(winner)
    }

    /// Drops an in-flight round without touching the lottery state.
    pub fn cancel_round(&mut self) -> bool {
        self.in_flight.take().is_some()
    }

    /// Makes sure a session that has entries is drawable: a missing state,
    /// or an `idle` one left over from an empty store, becomes `ready`.
    /// Returns the new state when one was set.
    pub fn ensure_state(&mut self) -> Option<&LotteryState> {
        if self.entries.is_empty() {
            return None;
        }
        let last_import_at = match &self.state {
            None => None,
            Some(s) if s.step == LotteryStep::Idle => s.last_import_at,
            Some(_) => return None,
        };
        self.state = Some(LotteryState::ready(last_import_at));
        self.state.as_ref()
    }

    pub fn restart(&mut self) -> Option<&LotteryState> {
        let next = self.state.as_ref()?.restarted();
        self.state = Some(next);
        self.in_flight = None;
        self.rotation = 0.0;
        self.state.as_ref()
    }

    pub fn replace(&mut self, entries: Vec<Entry>, state: LotteryState) {
        self.entries = entries;
        self.state = Some(state);
        self.in_flight = None;
        self.rotation = 0.0;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.state = None;
        self.in_flight = None;
        self.rotation = 0.0;
    }
}

/* ------------------- ORCHESTRATOR ------------------- */
/// A session bound to its store. Writes on the draw path are best effort:
/// the in-memory session stays authoritative when the store fails.
pub struct Lottery {
    store: SqliteStore,
    session: DrawSession,
}

impl Lottery {
    /// Loads entries, state and settings, initialising a missing state when
    /// entries exist so a half-finished earlier session can be drawn from.
    pub async fn open(store: SqliteStore) -> StoreResult<Self> {
        let entries = store.load_entries().await?;
        let state = store.load_state().await?;
        let settings = store.load_settings().await?;

        let mut session = DrawSession::new(entries, state, settings);
        if let Some(state) = session.ensure_state() {
            tracing::info!("entries found without a drawable lottery state, initialising");
            store.save_state(state).await?;
        }
        tracing::info!(
            entries = session.entries().len(),
            step = ?session.step(),
            "lottery loaded"
        );
        Ok(Self { store, session })
    }

    pub fn session(&self) -> &DrawSession {
        &self.session
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    pub fn snapshot(&self) -> Snapshot {
        self.session.snapshot()
    }

    pub fn begin_round(&mut self, place: Place) -> Result<SpinPlan, DrawRejected> {
        let mut random = unit_random(rand::thread_rng());
        self.begin_round_with(place, &mut random)
    }

    pub fn begin_round_with(
        &mut self,
        place: Place,
        random: &mut impl FnMut() -> f64,
    ) -> Result<SpinPlan, DrawRejected> {
        match self.session.begin_round(place, random) {
            Ok(plan) => {
                tracing::info!(
                    ?place,
                    winner = %plan.winner.name,
                    target = plan.target_rotation,
                    "round started"
                );
                Ok(plan)
            }
            Err(rejected) => {
                tracing::debug!(?place, %rejected, "draw rejected");
                Err(rejected)
            }
        }
    }

    /// Records the landed winner and persists the new state. A failed write
    /// is logged; the round still counts for this session.
    pub async fn finish_round(&mut self, plan: &SpinPlan) -> Result<Winner, DrawRejected> {
        let won_at = chrono::Utc::now().timestamp_millis();
        let winner = match self.session.complete_round(plan, won_at) {
            Ok(w) => w,
            Err(rejected) => {
                tracing::warn!(place = ?plan.place, %rejected, "round could not be recorded");
                return Err(rejected);
            }
        };
        tracing::info!(place = ?winner.place, winner = %winner.name, "round complete");

        if let Some(state) = self.session.state() {
            if let Err(e) = self.store.save_state(state).await {
                tracing::error!(error = %e, "failed to persist lottery state");
            }
        }
        self.store
            .log_audit(
                &format!("draw_{}", place_key(winner.place)),
                Some(format!("{} ({})", winner.name, winner.prize_label)),
            )
            .await;
        Ok(winner)
    }

    pub fn cancel_round(&mut self) {
        if self.session.cancel_round() {
            tracing::info!("round cancelled");
        }
    }

    /// Runs one round end to end: draw, animate, record. If `cancel`
    /// resolves first the round is dropped with no state change.
    pub async fn run_round<T, F, C>(
        &mut self,
        place: Place,
        ticker: &mut T,
        on_frame: F,
        cancel: C,
    ) -> Result<RoundOutcome, DrawRejected>
    where
        T: FrameTicker,
        F: FnMut(SpinFrame),
        C: Future<Output = ()>,
    {
        let plan = self.begin_round(place)?;
        self.animate_and_finish(plan, ticker, on_frame, cancel).await
    }

    pub async fn animate_and_finish<T, F, C>(
        &mut self,
        plan: SpinPlan,
        ticker: &mut T,
        on_frame: F,
        cancel: C,
    ) -> Result<RoundOutcome, DrawRejected>
    where
        T: FrameTicker,
        F: FnMut(SpinFrame),
        C: Future<Output = ()>,
    {
        let animation = plan.animation();
        tokio::select! {
            _ = animation.play(ticker, on_frame) => {
                self.finish_round(&plan).await.map(RoundOutcome::Completed)
            }
            _ = cancel => {
                self.cancel_round();
                Ok(RoundOutcome::Cancelled)
            }
        }
    }

    /* ------------------- ENTRY SET ------------------- */
    pub async fn replace_entries(&mut self, entries: Vec<Entry>) -> StoreResult<()> {
        let now = chrono::Utc::now().timestamp_millis();
        let state = self.store.replace_entries(&entries, now).await?;
        let count = entries.len();
        self.session.replace(entries, state);
        tracing::info!(entries = count, "entries replaced");
        self.store
            .log_audit("import_entries", Some(format!("{count} entries")))
            .await;
        Ok(())
    }

    pub async fn clear_all(&mut self) -> StoreResult<()> {
        self.store.clear_all().await?;
        self.session.clear();
        tracing::info!("lottery cleared");
        self.store.log_audit("clear_all", None).await;
        Ok(())
    }

    /// Back to `ready` with the same entries. No-op without a lottery. The
    /// session only changes once the new state is stored.
    pub async fn restart(&mut self) -> StoreResult<()> {
        let Some(next) = self.session.state().map(LotteryState::restarted) else {
            return Ok(());
        };
        self.store.save_state(&next).await?;
        self.session.restart();
        tracing::info!("lottery restarted");
        self.store.log_audit("restart_lottery", None).await;
        Ok(())
    }

    pub async fn update_settings(&mut self, settings: SpinSettings) -> StoreResult<SpinSettings> {
        let settings = settings.sanitized();
        self.store.save_settings(&settings).await?;
        self.session.set_settings(settings.clone());
        Ok(settings)
    }
}

fn place_key(place: Place) -> &'static str {
    match place {
        Place::Third => "third",
        Place::Second => "second",
        Place::First => "first",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rotation::pointer_error;

    fn pool() -> Vec<Entry> {
        [("alice", 2), ("bob", 5), ("carol", 3)]
            .into_iter()
            .map(|(id, tickets)| Entry {
                id: id.into(),
                name: id.to_uppercase(),
                tickets,
                created_at: 0,
            })
            .collect()
    }

    fn ready_session() -> DrawSession {
        DrawSession::new(pool(), Some(LotteryState::ready(Some(9))), SpinSettings::default())
    }

    fn fixed(v: f64) -> impl FnMut() -> f64 {
        move || v
    }

    #[test]
    fn begin_plans_a_landing_on_the_winner() {
        let mut session = ready_session();
        let plan = session.begin_round(Place::Third, &mut fixed(0.5)).unwrap();
        assert_eq!(plan.winner.id, "bob");
        assert_eq!(plan.duration_ms, 4_000);
        assert_eq!(plan.prize_label, "BUY ME – 200₪");
        let center = find_sector(&plan.sectors, "bob").unwrap().center_angle;
        assert!(plan.target_rotation > plan.from_rotation);
        assert!(pointer_error(plan.target_rotation, center).abs() < 1e-9);
        assert!(session.is_spinning());
        // nothing recorded yet
        assert_eq!(session.step(), LotteryStep::Ready);
    }

    #[test]
    fn one_spin_at_a_time() {
        let mut session = ready_session();
        let plan = session.begin_round(Place::Third, &mut fixed(0.1)).unwrap();
        assert_eq!(session.begin_round(Place::Third, &mut fixed(0.1)), Err(DrawRejected::SpinInFlight));
        session.complete_round(&plan, 1).unwrap();
        assert!(!session.is_spinning());
        assert!(session.begin_round(Place::Second, &mut fixed(0.1)).is_ok());
    }

    #[test]
    fn out_of_turn_and_idle_draws_are_rejected() {
        let mut idle = DrawSession::default();
        assert_eq!(idle.begin_round(Place::Third, &mut fixed(0.5)), Err(DrawRejected::NoLottery));

        let mut session = ready_session();
        assert_eq!(
            session.begin_round(Place::First, &mut fixed(0.5)),
            Err(DrawRejected::OutOfTurn {
                place: Place::First,
                step: LotteryStep::Ready
            })
        );
        assert!(!session.is_spinning());
    }

    #[test]
    fn empty_pool_is_rejected_without_state_change() {
        let entries = pool().into_iter().take(1).collect();
        let mut session = DrawSession::new(entries, Some(LotteryState::ready(None)), SpinSettings::default());
        let plan = session.begin_round(Place::Third, &mut fixed(0.3)).unwrap();
        session.complete_round(&plan, 1).unwrap();
        let before = session.state().cloned();
        assert_eq!(session.begin_round(Place::Second, &mut fixed(0.3)), Err(DrawRejected::EmptyPool));
        assert_eq!(session.state().cloned(), before);
        assert!(!session.is_spinning());
    }

    #[test]
    fn completing_records_winner_and_moves_the_wheel() {
        let mut session = ready_session();
        let plan = session.begin_round(Place::Third, &mut fixed(0.99)).unwrap();
        let winner = session.complete_round(&plan, 1234).unwrap();
        assert_eq!(winner.entry_id, "carol");
        assert_eq!(winner.name, "CAROL");
        assert_eq!(winner.won_at, 1234);
        assert_eq!(session.step(), LotteryStep::ThirdDone);
        assert_eq!(session.rotation(), plan.target_rotation);
        let remaining: Vec<&str> = session.remaining().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(remaining, ["alice", "bob"]);
        assert_eq!(session.sectors().len(), 2);
    }

    #[test]
    fn cancel_leaves_everything_as_it_was() {
        let mut session = ready_session();
        let _plan = session.begin_round(Place::Third, &mut fixed(0.5)).unwrap();
        assert!(session.cancel_round());
        assert!(!session.is_spinning());
        assert_eq!(session.step(), LotteryStep::Ready);
        assert_eq!(session.rotation(), 0.0);
        assert!(!session.cancel_round());
    }

    #[test]
    fn restart_abandons_the_in_flight_plan() {
        let mut session = ready_session();
        let first = session.begin_round(Place::Third, &mut fixed(0.5)).unwrap();
        session.complete_round(&first, 1).unwrap();
        let second = session.begin_round(Place::Second, &mut fixed(0.5)).unwrap();
        session.restart();
        assert_eq!(session.complete_round(&second, 2), Err(DrawRejected::NothingInFlight));
        assert_eq!(session.step(), LotteryStep::Ready);
    }

    #[test]
    fn an_abandoned_plan_cannot_complete_a_newer_round() {
        let mut session = ready_session();
        let old = session.begin_round(Place::Third, &mut fixed(0.1)).unwrap();
        session.cancel_round();
        let new = session.begin_round(Place::Third, &mut fixed(0.9)).unwrap();
        assert_eq!(session.complete_round(&old, 1), Err(DrawRejected::StalePlan));
        assert!(session.is_spinning());
        assert_eq!(session.complete_round(&new, 2).unwrap().entry_id, "carol");
    }

    #[test]
    fn entries_without_state_get_a_ready_state() {
        let mut session = DrawSession::new(pool(), None, SpinSettings::default());
        assert_eq!(session.step(), LotteryStep::Idle);
        assert_eq!(session.ensure_state(), Some(&LotteryState::ready(None)));
        assert_eq!(session.step(), LotteryStep::Ready);
        assert_eq!(session.ensure_state(), None);

        let mut empty = DrawSession::default();
        assert_eq!(empty.ensure_state(), None);
        assert_eq!(empty.step(), LotteryStep::Idle);
    }

    #[test]
    fn an_idle_state_over_entries_becomes_ready() {
        let idle = LotteryState {
            step: LotteryStep::Idle,
            winners: Vec::new(),
            last_import_at: Some(42),
        };
        let mut session = DrawSession::new(pool(), Some(idle), SpinSettings::default());
        assert_eq!(session.ensure_state(), Some(&LotteryState::ready(Some(42))));
        assert!(session.begin_round(Place::Third, &mut fixed(0.5)).is_ok());

        let mut underway = ready_session();
        let plan = underway.begin_round(Place::Third, &mut fixed(0.5)).unwrap();
        underway.complete_round(&plan, 1).unwrap();
        assert_eq!(underway.ensure_state(), None);
        assert_eq!(underway.step(), LotteryStep::ThirdDone);
    }

    #[test]
    fn snapshot_mirrors_the_session() {
        let session = ready_session();
        let snap = session.snapshot();
        assert_eq!(snap.step, LotteryStep::Ready);
        assert_eq!(snap.next_place, Some(Place::Third));
        assert_eq!(snap.remaining.len(), 3);
        assert_eq!(snap.sectors.len(), 3);
        assert_eq!(snap.last_import_at, Some(9));
        assert!(!snap.spinning);
    }
}
