use core::time::Duration;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};
use web_time::Instant;

use crate::*;

/// Lifecycle phase of the engine.
///
/// Valid transitions:
/// - Menu/LevelSelect/Won/GameOver/Paused -> Memorizing (level load)
/// - Memorizing -> Playing
/// - Playing <-> Paused
/// - Playing -> Won
/// - Playing -> GameOver
/// - anything -> Menu, and Menu/Won/GameOver/Paused -> LevelSelect
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GamePhase {
    #[default]
    Menu,
    LevelSelect,
    Memorizing,
    Playing,
    Paused,
    Won,
    GameOver,
}

impl GamePhase {
    /// Whether a level may be (re)loaded from this phase.
    pub const fn can_load_level(self) -> bool {
        use GamePhase::*;
        match self {
            Menu | LevelSelect | Won | GameOver | Paused => true,
            Memorizing | Playing => false,
        }
    }

    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Won | Self::GameOver)
    }

    /// A level is loaded and not yet decided.
    pub const fn is_in_level(self) -> bool {
        matches!(self, Self::Memorizing | Self::Playing | Self::Paused)
    }
}

/// User-visible message the presentation layer may show.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notice {
    AiGenerating,
    AiFailed(String),
    ChaosStrike,
    PickTileToLock,
}

/// Everything about the current attempt the presentation layer reads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub phase: GamePhase,
    pub lives: u8,
    pub score: u16,
    pub chaos_progress: f32,
    pub level: Option<LevelId>,
    pub max_unlocked: u32,
    pub memorize_remaining: u8,
    pub inventory: Inventory,
    pub notice: Option<Notice>,
}

impl Session {
    fn new(max_unlocked: u32) -> Self {
        Self {
            phase: GamePhase::Menu,
            lives: MAX_LIVES,
            score: 0,
            chaos_progress: 0.0,
            level: None,
            max_unlocked: max_unlocked.max(1),
            memorize_remaining: 0,
            inventory: Inventory::default(),
            notice: None,
        }
    }

    /// Numeric level, `-1` for generated levels.
    pub fn level_number(&self) -> Option<i64> {
        self.level.map(LevelId::number)
    }
}

/// Something that happened while the engine was ticked.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EngineEvent {
    MemorizeCountdown { remaining: u8 },
    Scrambled,
    ChaosStrike {
        strike: Strike,
        shift: LineShift,
        lives: u8,
    },
    EffectEnded(PowerUpKind),
    Won { score: u16 },
    GameOver,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PowerUpOutcome {
    NoChange,
    /// A timed effect is running until the given instant.
    Activated { until: Instant },
    /// Lock tile is ready; the charge is taken by the following
    /// [`Engine::lock_at`].
    AwaitingTarget,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TapOutcome {
    NoChange,
    Selected(Coord2),
    Deselected,
    Swap(SwapOutcome),
    Lock(Outcome),
}

/// The game engine: owns the grid, the session, and every timer of one
/// level attempt.
///
/// The engine never reads a clock. Hosts pass `now` into every timed
/// operation and call [`Engine::tick`] regularly; all periodic work runs
/// from the internal [`TimerQueue`] at its own deadline, so the cadence of
/// `tick` does not matter.
#[derive(Debug)]
pub struct Engine<G, S> {
    generator: G,
    store: S,
    rng: SmallRng,
    session: Session,
    level: Option<Level>,
    grid: Option<Grid>,
    effects: EffectManager,
    chaos: Option<ChaosScheduler>,
    timers: TimerQueue,
    pending_ai: Option<AiTicket>,
    next_ticket: u64,
}

impl Engine<CurveGenerator, MemoryProgressStore> {
    /// Engine with the built-in campaign curve and an in-memory store.
    pub fn with_seed(seed: u64) -> Self {
        Self::new(
            CurveGenerator::new(seed),
            MemoryProgressStore::default(),
            seed,
        )
    }
}

impl<G: LevelGenerator, S: ProgressStore> Engine<G, S> {
    pub fn new(generator: G, store: S, seed: u64) -> Self {
        let max_unlocked = store.max_unlocked();
        log::debug!("engine started, levels unlocked up to {max_unlocked}");
        Self {
            generator,
            store,
            rng: SmallRng::seed_from_u64(seed),
            session: Session::new(max_unlocked),
            level: None,
            grid: None,
            effects: EffectManager::new(),
            chaos: None,
            timers: TimerQueue::new(),
            pending_ai: None,
            next_ticket: 0,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn phase(&self) -> GamePhase {
        self.session.phase
    }

    pub fn grid(&self) -> Option<&Grid> {
        self.grid.as_ref()
    }

    pub fn level(&self) -> Option<&Level> {
        self.level.as_ref()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn effects(&self) -> ActiveEffects {
        self.effects.snapshot()
    }

    pub fn effect_remaining(&self, kind: PowerUpKind, now: Instant) -> Option<Duration> {
        self.effects.remaining(kind, now)
    }

    /// The target, but only while the player is allowed to see it.
    pub fn visible_target(&self) -> Option<&TargetPattern> {
        let visible = match self.session.phase {
            GamePhase::Memorizing => true,
            GamePhase::Playing => self.effects.is_peeking(),
            _ => false,
        };
        self.level.as_ref().filter(|_| visible).map(|level| &level.pattern)
    }

    /// Absolute time of the next chaos strike, while one is scheduled.
    pub fn chaos_fire_at(&self) -> Option<Instant> {
        self.chaos.as_ref().map(ChaosScheduler::fire_at)
    }

    /// Chaos meter in `0.0..=100.0`, recomputed from scheduler state.
    pub fn chaos_progress(&self, now: Instant) -> f32 {
        match (&self.chaos, self.session.phase) {
            (Some(chaos), GamePhase::Playing | GamePhase::Paused) => {
                chaos.progress(now, self.effects.is_slowed(), self.effects.frozen_since())
            }
            _ => 0.0,
        }
    }

    /// Earliest pending deadline, useful for hosts that sleep between ticks.
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.session.phase {
            GamePhase::Paused => None,
            _ => self.timers.next_due(),
        }
    }

    /// Runs every timer due at or before `now`.
    ///
    /// Each timer runs with its own deadline as the clock. Nothing runs
    /// while paused.
    pub fn tick(&mut self, now: Instant) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        if self.session.phase != GamePhase::Paused {
            while let Some((at, event)) = self.timers.pop_due(now) {
                self.on_timer(event, at, &mut events);
            }
        }
        self.session.chaos_progress = self.chaos_progress(now);
        events
    }

    /// Loads `level` and starts its memorize phase.
    pub fn load_level(&mut self, level: Level, now: Instant) -> Outcome {
        if !self.session.phase.can_load_level() {
            log::debug!("ignoring level load while {:?}", self.session.phase);
            return Outcome::NoChange;
        }
        self.enter_memorizing(level, now);
        Outcome::Changed
    }

    /// Generates and loads campaign level `number`.
    pub fn start_level(&mut self, number: u32, now: Instant) -> Result<Outcome> {
        if !self.session.phase.can_load_level() {
            return Ok(Outcome::NoChange);
        }
        if !(1..=MAX_LEVEL).contains(&number) {
            return Err(GameError::LevelOutOfRange(number));
        }
        if number > self.session.max_unlocked {
            return Err(GameError::LevelLocked(number));
        }
        let level = self.generator.generate(number);
        Ok(self.load_level(level, now))
    }

    /// Plays the current level again. Campaign levels get a fresh pattern.
    pub fn retry(&mut self, now: Instant) -> Result<Outcome> {
        use GamePhase::*;

        if !matches!(self.session.phase, Won | GameOver | Paused) {
            return Ok(Outcome::NoChange);
        }
        match self.level.as_ref().map(|level| level.id) {
            Some(LevelId::Campaign(number)) => self.start_level(number, now),
            Some(LevelId::Generated) => {
                let level = self.level.clone();
                Ok(level.map_or(Outcome::NoChange, |level| self.load_level(level, now)))
            }
            None => Ok(Outcome::NoChange),
        }
    }

    /// Moves on after a win: next campaign level, or back to level select.
    pub fn advance(&mut self, now: Instant) -> Result<Outcome> {
        if self.session.phase != GamePhase::Won {
            return Ok(Outcome::NoChange);
        }
        match self.session.level.and_then(LevelId::campaign_number) {
            Some(number) if number < MAX_LEVEL => self.start_level(number + 1, now),
            _ => Ok(self.open_level_select()),
        }
    }

    pub fn open_level_select(&mut self) -> Outcome {
        use GamePhase::*;

        match self.session.phase {
            Menu | Won | GameOver | Paused => {
                self.discard_session(LevelSelect);
                Outcome::Changed
            }
            LevelSelect | Memorizing | Playing => Outcome::NoChange,
        }
    }

    pub fn exit_to_menu(&mut self) -> Outcome {
        if self.session.phase == GamePhase::Menu {
            return Outcome::NoChange;
        }
        self.discard_session(GamePhase::Menu);
        Outcome::Changed
    }

    /// Pauses a running level or resumes a paused one.
    ///
    /// Resuming shifts the chaos deadline and every pending timer by the
    /// exact paused duration.
    pub fn toggle_pause(&mut self, now: Instant) -> Outcome {
        match self.session.phase {
            GamePhase::Playing => {
                if let Some(chaos) = &mut self.chaos {
                    chaos.pause(now);
                }
                self.session.phase = GamePhase::Paused;
                log::debug!("paused");
                Outcome::Changed
            }
            GamePhase::Paused => {
                let paused = self
                    .chaos
                    .as_mut()
                    .and_then(|chaos| chaos.resume(now))
                    .unwrap_or_default();
                self.timers.postpone(paused);
                self.effects.postpone(paused);
                self.cancel_ai_request();
                self.session.phase = GamePhase::Playing;
                log::debug!("resumed after {paused:?}");
                Outcome::Changed
            }
            _ => Outcome::NoChange,
        }
    }

    /// Exchanges two tiles. Outside of play, or with a locked tile, nothing
    /// happens.
    pub fn swap(&mut self, a: Coord2, b: Coord2) -> Result<SwapOutcome> {
        if self.session.phase != GamePhase::Playing {
            return Ok(SwapOutcome::NoChange);
        }
        let Some(grid) = self.grid.as_mut() else {
            return Ok(SwapOutcome::NoChange);
        };
        let a = grid.validate_coords(a)?;
        let b = grid.validate_coords(b)?;

        if !grid.swap(a, b)?.has_update() {
            return Ok(SwapOutcome::NoChange);
        }
        log::trace!("swapped {a:?} and {b:?}");
        Ok(if self.check_completion() {
            SwapOutcome::Won
        } else {
            SwapOutcome::Swapped
        })
    }

    /// Locks a tile, spending one lock charge even if it was already locked.
    pub fn lock_at(&mut self, coords: Coord2) -> Result<Outcome> {
        if self.session.phase != GamePhase::Playing {
            return Ok(Outcome::NoChange);
        }
        let Some(grid) = self.grid.as_mut() else {
            return Ok(Outcome::NoChange);
        };
        let coords = grid.validate_coords(coords)?;
        if !self.session.inventory.try_consume(PowerUpKind::LockTile) {
            return Ok(Outcome::NoChange);
        }

        grid.lock(coords)?;
        if self.session.notice == Some(Notice::PickTileToLock) {
            self.session.notice = None;
        }
        log::debug!("locked tile at {coords:?}");
        Ok(Outcome::Changed)
    }

    /// Routes a board tap through the caller's selection state.
    pub fn select_and_possibly_swap(
        &mut self,
        selector: &mut TileSelector,
        coords: Coord2,
    ) -> Result<TapOutcome> {
        if self.session.phase != GamePhase::Playing {
            return Ok(TapOutcome::NoChange);
        }
        if let Some(grid) = &self.grid {
            grid.validate_coords(coords)?;
        }

        Ok(match selector.tap(coords) {
            TapIntent::Select(coords) => TapOutcome::Selected(coords),
            TapIntent::Deselect => TapOutcome::Deselected,
            TapIntent::Swap(a, b) => TapOutcome::Swap(self.swap(a, b)?),
            TapIntent::Lock(coords) => TapOutcome::Lock(self.lock_at(coords)?),
        })
    }

    /// Spends a charge of `kind` and starts its effect.
    ///
    /// Lock tile only reports that a target is needed; its charge is taken
    /// by [`Engine::lock_at`].
    pub fn activate_powerup(&mut self, kind: PowerUpKind, now: Instant) -> PowerUpOutcome {
        if self.session.phase != GamePhase::Playing || !self.session.inventory.has_charge(kind) {
            return PowerUpOutcome::NoChange;
        }
        if kind == PowerUpKind::LockTile {
            self.session.notice = Some(Notice::PickTileToLock);
            return PowerUpOutcome::AwaitingTarget;
        }

        let Some(until) = self.effects.activate(kind, now) else {
            return PowerUpOutcome::NoChange;
        };
        self.session.inventory.try_consume(kind);
        self.timers.schedule(until, TimerEvent::EffectExpiry(kind));
        log::info!("{kind:?} active until {until:?}");
        PowerUpOutcome::Activated { until }
    }

    /// Starts an AI level request. Returns `None` when a level cannot be
    /// loaded from the current phase.
    pub fn begin_ai_request(&mut self, details: &str) -> Option<AiRequest> {
        if !self.session.phase.can_load_level() {
            return None;
        }
        let ticket = AiTicket::new(self.next_ticket);
        self.next_ticket += 1;
        self.pending_ai = Some(ticket);
        self.session.notice = Some(Notice::AiGenerating);
        Some(AiRequest {
            ticket,
            prompt: build_ai_prompt(details),
        })
    }

    /// Hands the generator's answer back to the engine.
    ///
    /// On any failure the session stays as it was and an
    /// [`Notice::AiFailed`] is shown; the caller decides whether to retry.
    pub fn complete_ai_request(
        &mut self,
        ticket: AiTicket,
        response: core::result::Result<String, GeneratorError>,
        now: Instant,
    ) -> Result<Outcome> {
        if self.pending_ai != Some(ticket) {
            return Err(GameError::StaleRequest);
        }
        self.pending_ai = None;

        let pattern = response
            .map_err(GameError::from)
            .and_then(|text| parse_ai_response(&text));
        let pattern = match pattern {
            Ok(pattern) => pattern,
            Err(err) => {
                log::warn!("AI level rejected: {err}");
                self.session.notice = Some(Notice::AiFailed(err.to_string()));
                return Err(err);
            }
        };
        if !self.session.phase.can_load_level() {
            let err = GameError::IllegalState(self.session.phase);
            self.session.notice = Some(Notice::AiFailed(err.to_string()));
            return Err(err);
        }

        self.session.notice = None;
        Ok(self.load_level(Level::generated(pattern), now))
    }

    /// Drops the outstanding AI request once its answer could no longer be
    /// loaded.
    fn cancel_ai_request(&mut self) {
        if self.pending_ai.take().is_some() {
            log::debug!("AI request dropped");
        }
        if self.session.notice == Some(Notice::AiGenerating) {
            self.session.notice = None;
        }
    }

    fn enter_memorizing(&mut self, level: Level, now: Instant) {
        log::info!(
            "loading {} ({:?}, {}x{}, chaos every {} ms)",
            level.id,
            level.difficulty,
            level.grid_size().0,
            level.grid_size().1,
            level.chaos_interval_ms
        );
        self.timers.clear();
        self.effects.clear();
        self.chaos = None;
        self.pending_ai = None;

        self.grid = Some(Grid::from_pattern(&level.pattern));
        self.session.phase = GamePhase::Memorizing;
        self.session.lives = MAX_LIVES;
        self.session.score = 0;
        self.session.chaos_progress = 0.0;
        self.session.level = Some(level.id);
        self.session.memorize_remaining = level.memorize_secs;
        self.session.inventory = Inventory::for_difficulty(level.difficulty);
        self.session.notice = None;
        self.level = Some(level);

        if self.session.memorize_remaining == 0 {
            self.begin_playing(now);
        } else {
            self.timers.schedule(now + MEMORIZE_TICK, TimerEvent::MemorizeTick);
        }
    }

    fn begin_playing(&mut self, now: Instant) {
        let (Some(level), Some(grid)) = (&self.level, &mut self.grid) else {
            return;
        };

        for _ in 0..MAX_SCRAMBLE_ATTEMPTS {
            grid.shuffle(&mut self.rng);
            if !evaluate(grid, &level.pattern).is_complete() {
                break;
            }
        }

        self.session.phase = GamePhase::Playing;
        self.chaos = Some(ChaosScheduler::armed(level.chaos_interval(), now));
        self.timers.schedule(now + CHAOS_POLL_INTERVAL, TimerEvent::ChaosPoll);
        log::debug!("grid scrambled, chaos armed");
        self.check_completion();
    }

    fn on_timer(&mut self, event: TimerEvent, at: Instant, events: &mut Vec<EngineEvent>) {
        log::trace!("timer {event:?} at {at:?}");
        match event {
            TimerEvent::MemorizeTick => {
                if self.session.phase != GamePhase::Memorizing {
                    return;
                }
                self.session.memorize_remaining = self.session.memorize_remaining.saturating_sub(1);
                events.push(EngineEvent::MemorizeCountdown {
                    remaining: self.session.memorize_remaining,
                });
                if self.session.memorize_remaining == 0 {
                    self.begin_playing(at);
                    events.push(EngineEvent::Scrambled);
                    self.push_finish_event(events);
                } else {
                    self.timers.schedule(at + MEMORIZE_TICK, TimerEvent::MemorizeTick);
                }
            }
            TimerEvent::ChaosPoll => {
                if self.session.phase != GamePhase::Playing {
                    return;
                }
                self.poll_chaos(at, events);
                if self.session.phase == GamePhase::Playing {
                    self.timers.schedule(at + CHAOS_POLL_INTERVAL, TimerEvent::ChaosPoll);
                }
            }
            TimerEvent::EffectExpiry(kind) => {
                if !self.effects.expire(kind, at) {
                    return;
                }
                if kind == PowerUpKind::Freeze
                    && let Some(chaos) = &mut self.chaos
                {
                    chaos.unfreeze(at);
                }
                log::debug!("{kind:?} ended");
                events.push(EngineEvent::EffectEnded(kind));
            }
            TimerEvent::ClearNotice => {
                if self.session.notice == Some(Notice::ChaosStrike) {
                    self.session.notice = None;
                }
            }
        }
    }

    fn poll_chaos(&mut self, at: Instant, events: &mut Vec<EngineEvent>) {
        let effects = self.effects.snapshot();
        let (Some(chaos), Some(grid)) = (&mut self.chaos, &mut self.grid) else {
            return;
        };
        if !chaos.poll(at, effects) {
            return;
        }

        let strike = Strike::roll(&mut self.rng, grid.size());
        let shift = match strike.apply(grid) {
            Ok(shift) => shift,
            Err(err) => {
                log::error!("chaos strike {strike:?} failed: {err}");
                LineShift::Blocked
            }
        };
        // damage is for the attempt, a blocked shift still hurts
        self.session.lives = self.session.lives.saturating_sub(1);
        self.session.chaos_progress = 0.0;
        self.session.notice = Some(Notice::ChaosStrike);
        self.timers.cancel(|event| event == TimerEvent::ClearNotice);
        self.timers.schedule(at + STRIKE_NOTICE, TimerEvent::ClearNotice);
        log::info!(
            "chaos strike {:?} {} {:?}: {:?}, {} lives left",
            strike.axis,
            strike.index,
            strike.direction,
            shift,
            self.session.lives
        );
        events.push(EngineEvent::ChaosStrike {
            strike,
            shift,
            lives: self.session.lives,
        });

        if self.session.lives == 0 {
            self.finish(GamePhase::GameOver);
        } else if shift == LineShift::Shifted {
            self.check_completion();
        }
        self.push_finish_event(events);
    }

    fn push_finish_event(&self, events: &mut Vec<EngineEvent>) {
        match self.session.phase {
            GamePhase::Won => events.push(EngineEvent::Won {
                score: self.session.score,
            }),
            GamePhase::GameOver => events.push(EngineEvent::GameOver),
            _ => {}
        }
    }

    /// Re-scores the grid and ends the level when it is complete. Returns
    /// whether the level was won.
    fn check_completion(&mut self) -> bool {
        if self.session.phase != GamePhase::Playing {
            return false;
        }
        let (Some(level), Some(grid)) = (&self.level, &self.grid) else {
            return false;
        };

        let evaluation = evaluate(grid, &level.pattern);
        self.session.score = evaluation.score.min(MAX_SCORE);
        if !evaluation.is_complete() {
            return false;
        }

        let level_id = level.id;
        self.finish(GamePhase::Won);
        if let LevelId::Campaign(number) = level_id {
            self.record_progress(number);
        }
        true
    }

    fn record_progress(&mut self, completed: u32) {
        if completed < self.session.max_unlocked {
            return;
        }
        let next = (completed + 1).min(MAX_LEVEL);
        if let Err(err) = self.store.unlock_up_to(next) {
            log::error!("could not save progress: {err}");
        }
        self.session.max_unlocked = self.session.max_unlocked.max(next);
    }

    fn finish(&mut self, phase: GamePhase) {
        if self.session.phase.is_finished() {
            return;
        }
        log::info!("level finished: {phase:?} with score {}", self.session.score);
        self.session.phase = phase;
        self.timers.clear();
        self.effects.clear();
        self.session.notice = None;
    }

    fn discard_session(&mut self, phase: GamePhase) {
        self.timers.clear();
        self.effects.clear();
        self.chaos = None;
        self.grid = None;
        self.level = None;
        self.pending_ai = None;
        self.session = Session::new(self.session.max_unlocked);
        self.session.phase = phase;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestEngine = Engine<FixedGenerator, MemoryProgressStore>;

    /// Hands out the same descriptor for every campaign number.
    struct FixedGenerator(Level);

    impl LevelGenerator for FixedGenerator {
        fn generate(&mut self, level: u32) -> Level {
            Level {
                id: LevelId::Campaign(level),
                ..self.0.clone()
            }
        }
    }

    const fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    const fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn level(rows: &[Vec<i64>], chaos_interval_ms: u32, memorize_secs: u8) -> Level {
        Level::new(
            LevelId::Campaign(1),
            Difficulty::Easy,
            TargetPattern::from_rows(rows).unwrap(),
            chaos_interval_ms,
            memorize_secs,
        )
    }

    fn three_by_three() -> Vec<Vec<i64>> {
        vec![vec![1, 2, 3], vec![2, 3, 1], vec![3, 1, 2]]
    }

    fn engine_with(level: Level, unlocked: u32) -> TestEngine {
        Engine::new(FixedGenerator(level), MemoryProgressStore::new(unlocked), 42)
    }

    /// Starts level 1 without a memorize phase.
    fn playing(rows: &[Vec<i64>], chaos_interval_ms: u32, t0: Instant) -> TestEngine {
        let mut engine = engine_with(level(rows, chaos_interval_ms, 0), 1);
        assert_eq!(engine.start_level(1, t0), Ok(Outcome::Changed));
        assert_eq!(engine.phase(), GamePhase::Playing);
        engine
    }

    fn strikes(events: &[EngineEvent]) -> usize {
        events
            .iter()
            .filter(|event| matches!(event, EngineEvent::ChaosStrike { .. }))
            .count()
    }

    fn sorted_kinds(grid: &Grid) -> Vec<TileKind> {
        let mut kinds: Vec<_> = grid.tiles().iter().map(|tile| tile.kind).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Swaps every cell into place, returning the last swap outcome.
    fn solve(engine: &mut TestEngine) -> SwapOutcome {
        let target = engine.level().unwrap().pattern.clone();
        let (rows, cols) = target.size();
        let cells: Vec<Coord2> = (0..rows)
            .flat_map(|row| (0..cols).map(move |col| (row, col)))
            .collect();

        let mut last = SwapOutcome::NoChange;
        for (i, &cell) in cells.iter().enumerate() {
            let wanted = target.kind_at(cell);
            let grid = engine.grid().unwrap();
            if grid.tile_at(cell).kind == wanted {
                continue;
            }
            let source = cells[i + 1..]
                .iter()
                .copied()
                .find(|&other| grid.tile_at(other).kind == wanted)
                .unwrap();
            last = engine.swap(cell, source).unwrap();
        }
        last
    }

    #[test]
    fn level_one_memorize_then_scramble() {
        let t0 = Instant::now();
        let mut engine = engine_with(level(&three_by_three(), 18000, 6), 1);

        assert_eq!(engine.start_level(1, t0), Ok(Outcome::Changed));
        assert_eq!(engine.phase(), GamePhase::Memorizing);
        assert_eq!(engine.session().memorize_remaining, 6);
        assert!(engine.visible_target().is_some());
        assert_eq!(engine.grid().unwrap().kinds(), *engine.level().unwrap().pattern.as_array());

        let events = engine.tick(t0 + secs(5));
        assert_eq!(events.len(), 5);
        assert_eq!(events[4], EngineEvent::MemorizeCountdown { remaining: 1 });
        assert_eq!(engine.phase(), GamePhase::Memorizing);

        let events = engine.tick(t0 + secs(6));
        assert!(events.contains(&EngineEvent::Scrambled));
        assert_eq!(engine.phase(), GamePhase::Playing);
        assert!(engine.visible_target().is_none());
        assert_eq!(engine.session().lives, MAX_LIVES);
        assert_eq!(engine.chaos_fire_at(), Some(t0 + secs(6) + ms(18000)));

        let grid = engine.grid().unwrap();
        assert_eq!(sorted_kinds(grid), vec![1, 1, 1, 2, 2, 2, 3, 3, 3]);
        let mut ids: Vec<_> = grid.tiles().iter().map(|tile| tile.id.get()).collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..9).collect::<Vec<_>>());
        assert!(engine.session().score < MAX_SCORE);
    }

    #[test]
    fn pause_shifts_next_strike_by_paused_length() {
        let t0 = Instant::now();
        let mut engine = playing(&three_by_three(), 10000, t0);

        assert!(engine.tick(t0 + secs(4)).is_empty());
        assert_eq!(engine.toggle_pause(t0 + secs(4)), Outcome::Changed);
        assert_eq!(engine.phase(), GamePhase::Paused);
        assert!(engine.tick(t0 + secs(100)).is_empty());
        assert_eq!(engine.next_deadline(), None);
        assert_eq!(engine.session().lives, MAX_LIVES);

        assert_eq!(engine.toggle_pause(t0 + secs(104)), Outcome::Changed);
        assert_eq!(engine.chaos_fire_at(), Some(t0 + secs(110)));
        assert_eq!(strikes(&engine.tick(t0 + ms(109_999))), 0);
        assert_eq!(strikes(&engine.tick(t0 + secs(110))), 1);
        assert_eq!(engine.session().lives, MAX_LIVES - 1);
        assert_eq!(engine.session().notice, Some(Notice::ChaosStrike));

        engine.tick(t0 + secs(112));
        assert_eq!(engine.session().notice, None);
    }

    #[test]
    fn freeze_forgives_the_frozen_stretch() {
        let t0 = Instant::now();
        let mut engine = playing(&three_by_three(), 10000, t0);
        engine.tick(t0 + secs(2));

        assert_eq!(
            engine.activate_powerup(PowerUpKind::Freeze, t0 + secs(2)),
            PowerUpOutcome::Activated { until: t0 + secs(7) }
        );
        assert_eq!(engine.session().inventory.charges(PowerUpKind::Freeze), 0);
        assert!((engine.chaos_progress(t0 + secs(2)) - 20.0).abs() < 0.01);
        assert!((engine.chaos_progress(t0 + secs(5)) - 20.0).abs() < 0.01);

        let events = engine.tick(t0 + secs(7));
        assert!(events.contains(&EngineEvent::EffectEnded(PowerUpKind::Freeze)));
        assert_eq!(strikes(&events), 0);
        assert_eq!(engine.chaos_fire_at(), Some(t0 + secs(17)));

        assert_eq!(strikes(&engine.tick(t0 + ms(16_999))), 0);
        assert_eq!(strikes(&engine.tick(t0 + secs(17))), 1);
        assert_eq!(
            engine.activate_powerup(PowerUpKind::Freeze, t0 + secs(17)),
            PowerUpOutcome::NoChange
        );
    }

    #[test]
    fn slow_chaos_doubles_the_following_interval() {
        let t0 = Instant::now();
        let mut engine = playing(&three_by_three(), 1000, t0);

        assert!(matches!(
            engine.activate_powerup(PowerUpKind::SlowChaos, t0),
            PowerUpOutcome::Activated { .. }
        ));
        assert_eq!(strikes(&engine.tick(t0 + secs(1))), 1);
        assert_eq!(engine.chaos_fire_at(), Some(t0 + secs(3)));
    }

    #[test]
    fn pause_postpones_running_effects() {
        let t0 = Instant::now();
        let mut engine = playing(&three_by_three(), 60000, t0);

        engine.activate_powerup(PowerUpKind::Peek, t0 + secs(1));
        assert!(engine.visible_target().is_some());
        engine.toggle_pause(t0 + secs(2));
        engine.tick(t0 + secs(5));
        assert!(engine.effects().peeking);
        engine.toggle_pause(t0 + secs(12));

        assert!(engine.tick(t0 + ms(12_500)).is_empty());
        assert_eq!(engine.effect_remaining(PowerUpKind::Peek, t0 + ms(12_500)), Some(ms(500)));
        let events = engine.tick(t0 + secs(13));
        assert_eq!(events, vec![EngineEvent::EffectEnded(PowerUpKind::Peek)]);
        assert!(engine.visible_target().is_none());
    }

    #[test]
    fn locked_tiles_block_every_strike_but_still_cost_lives() {
        let t0 = Instant::now();
        let mut engine = playing(&[vec![1, 2], vec![3, 4]], 500, t0);

        assert_eq!(
            engine.activate_powerup(PowerUpKind::LockTile, t0),
            PowerUpOutcome::AwaitingTarget
        );
        assert_eq!(engine.session().notice, Some(Notice::PickTileToLock));
        assert_eq!(engine.lock_at((0, 0)), Ok(Outcome::Changed));
        assert_eq!(engine.session().notice, None);
        assert_eq!(engine.lock_at((1, 1)), Ok(Outcome::Changed));
        let before = engine.grid().unwrap().clone();

        let events = engine.tick(t0 + ms(500));
        assert!(matches!(
            events[..],
            [EngineEvent::ChaosStrike {
                shift: LineShift::Blocked,
                lives: 2,
                ..
            }]
        ));
        assert_eq!(engine.grid(), Some(&before));
    }

    #[test]
    fn locked_tile_never_moves_under_random_strikes() {
        let t0 = Instant::now();
        let mut engine = playing(&three_by_three(), 500, t0);
        engine.lock_at((0, 1)).unwrap();
        let mut grid = engine.grid().unwrap().clone();
        let locked = grid.tile_at((0, 1));
        let mut rng = SmallRng::seed_from_u64(9);

        for _ in 0..1000 {
            let strike = Strike::roll(&mut rng, grid.size());
            let shift = strike.apply(&mut grid).unwrap();
            if strike.axis == Axis::Row && strike.index == 0
                || strike.axis == Axis::Column && strike.index == 1
            {
                assert_eq!(shift, LineShift::Blocked);
            }
            assert_eq!(grid.tile_at((0, 1)), locked);
        }
    }

    #[test]
    fn relocking_spends_a_charge() {
        let t0 = Instant::now();
        let mut engine = playing(&three_by_three(), 60000, t0);
        assert_eq!(engine.session().inventory.charges(PowerUpKind::LockTile), 2);

        assert_eq!(engine.lock_at((1, 1)), Ok(Outcome::Changed));
        assert_eq!(engine.lock_at((1, 1)), Ok(Outcome::Changed));
        assert_eq!(engine.session().inventory.charges(PowerUpKind::LockTile), 0);
        assert_eq!(engine.lock_at((2, 2)), Ok(Outcome::NoChange));
        assert!(!engine.grid().unwrap().tile_at((2, 2)).locked);
        assert_eq!(engine.lock_at((3, 0)), Err(GameError::InvalidCoords));
        assert_eq!(
            engine.activate_powerup(PowerUpKind::LockTile, t0),
            PowerUpOutcome::NoChange
        );
    }

    #[test]
    fn restoring_the_grid_wins_and_unlocks_next_level() {
        let t0 = Instant::now();
        let mut engine = playing(&[vec![1, 2], vec![3, 4]], 60000, t0);
        assert_eq!(engine.session().max_unlocked, 1);

        assert_eq!(solve(&mut engine), SwapOutcome::Won);

        assert_eq!(engine.phase(), GamePhase::Won);
        assert_eq!(engine.session().score, MAX_SCORE);
        assert_eq!(engine.session().max_unlocked, 2);
        assert_eq!(engine.store().max_unlocked(), 2);
        assert_eq!(engine.next_deadline(), None);
        assert_eq!(engine.swap((0, 0), (0, 1)), Ok(SwapOutcome::NoChange));

        assert_eq!(engine.advance(t0 + secs(1)), Ok(Outcome::Changed));
        assert_eq!(engine.session().level, Some(LevelId::Campaign(2)));
        assert_eq!(engine.phase(), GamePhase::Playing);
    }

    #[test]
    fn replaying_an_old_level_keeps_the_watermark() {
        let t0 = Instant::now();
        let mut engine = engine_with(level(&[vec![1, 2], vec![3, 4]], 60000, 0), 5);
        engine.start_level(2, t0).unwrap();

        assert_eq!(solve(&mut engine), SwapOutcome::Won);
        assert_eq!(engine.store().max_unlocked(), 5);
        assert_eq!(engine.session().max_unlocked, 5);
    }

    #[test]
    fn three_strikes_end_the_attempt() {
        let t0 = Instant::now();
        let mut engine = playing(&three_by_three(), 500, t0);

        let events = engine.tick(t0 + secs(2));

        assert_eq!(strikes(&events), 3);
        assert_eq!(events.last(), Some(&EngineEvent::GameOver));
        assert_eq!(engine.phase(), GamePhase::GameOver);
        assert_eq!(engine.session().lives, 0);
        assert!(engine.tick(t0 + secs(10)).is_empty());
        assert_eq!(engine.session().lives, 0);
        assert_eq!(engine.swap((0, 0), (2, 2)), Ok(SwapOutcome::NoChange));
        assert_eq!(engine.toggle_pause(t0 + secs(10)), Outcome::NoChange);

        assert_eq!(engine.retry(t0 + secs(11)), Ok(Outcome::Changed));
        assert_eq!(engine.session().lives, MAX_LIVES);
        assert_eq!(engine.phase(), GamePhase::Playing);
    }

    #[test]
    fn score_stays_in_range_while_playing() {
        let t0 = Instant::now();
        let mut engine = playing(&three_by_three(), 700, t0);

        for step in 1..=40 {
            engine.tick(t0 + ms(step * 50));
            let session = engine.session();
            assert!(session.score <= MAX_SCORE);
            assert!(session.lives <= MAX_LIVES);
            assert!((0.0..=100.0).contains(&session.chaos_progress));
        }
    }

    #[test]
    fn intents_outside_play_are_ignored() {
        let t0 = Instant::now();
        let mut engine = engine_with(level(&three_by_three(), 18000, 3), 1);
        let mut selector = TileSelector::new();

        assert_eq!(engine.swap((0, 0), (1, 1)), Ok(SwapOutcome::NoChange));
        assert_eq!(engine.lock_at((0, 0)), Ok(Outcome::NoChange));
        assert_eq!(engine.toggle_pause(t0), Outcome::NoChange);
        assert_eq!(
            engine.activate_powerup(PowerUpKind::Peek, t0),
            PowerUpOutcome::NoChange
        );
        assert_eq!(engine.start_level(0, t0), Err(GameError::LevelOutOfRange(0)));
        assert_eq!(engine.start_level(101, t0), Err(GameError::LevelOutOfRange(101)));
        assert_eq!(engine.start_level(2, t0), Err(GameError::LevelLocked(2)));

        engine.start_level(1, t0).unwrap();
        let before = engine.grid().unwrap().clone();
        assert_eq!(engine.swap((0, 0), (1, 1)), Ok(SwapOutcome::NoChange));
        assert_eq!(
            engine.select_and_possibly_swap(&mut selector, (0, 0)),
            Ok(TapOutcome::NoChange)
        );
        assert_eq!(engine.toggle_pause(t0), Outcome::NoChange);
        assert_eq!(engine.grid(), Some(&before));
        assert_eq!(engine.start_level(1, t0), Ok(Outcome::NoChange));
        assert_eq!(engine.load_level(level(&[vec![1]], 500, 0), t0), Outcome::NoChange);
    }

    #[test]
    fn taps_select_then_swap() {
        let t0 = Instant::now();
        let mut engine = playing(&three_by_three(), 60000, t0);
        let mut selector = TileSelector::new();
        let first = engine.grid().unwrap().tile_at((0, 0));

        assert_eq!(
            engine.select_and_possibly_swap(&mut selector, (0, 0)),
            Ok(TapOutcome::Selected((0, 0)))
        );
        let outcome = engine.select_and_possibly_swap(&mut selector, (2, 1));
        assert!(matches!(outcome, Ok(TapOutcome::Swap(SwapOutcome::Swapped | SwapOutcome::Won))));
        assert_eq!(engine.grid().unwrap().tile_at((2, 1)), first);

        selector.arm_lock();
        assert_eq!(
            engine.select_and_possibly_swap(&mut selector, (1, 1)),
            Ok(TapOutcome::Lock(Outcome::Changed))
        );
    }

    #[test]
    fn reload_from_pause_drops_old_timers() {
        let t0 = Instant::now();
        let mut engine = playing(&three_by_three(), 60000, t0);
        engine.activate_powerup(PowerUpKind::SlowChaos, t0);
        engine.activate_powerup(PowerUpKind::Peek, t0);
        engine.toggle_pause(t0 + secs(1));

        assert_eq!(engine.retry(t0 + secs(1)), Ok(Outcome::Changed));

        assert_eq!(engine.effects(), ActiveEffects::default());
        assert_eq!(engine.phase(), GamePhase::Playing);
        let events = engine.tick(t0 + secs(30));
        assert!(
            !events
                .iter()
                .any(|event| matches!(event, EngineEvent::EffectEnded(_)))
        );
        assert_eq!(engine.session().inventory.charges(PowerUpKind::Peek), 3);
    }

    #[test]
    fn navigation_resets_the_session() {
        let t0 = Instant::now();
        let mut engine = playing(&three_by_three(), 60000, t0);

        assert_eq!(engine.open_level_select(), Outcome::NoChange);
        engine.toggle_pause(t0);
        assert_eq!(engine.open_level_select(), Outcome::Changed);
        assert_eq!(engine.phase(), GamePhase::LevelSelect);
        assert!(engine.grid().is_none());
        assert_eq!(engine.session().level, None);

        assert_eq!(engine.exit_to_menu(), Outcome::Changed);
        assert_eq!(engine.exit_to_menu(), Outcome::NoChange);
        assert_eq!(engine.phase(), GamePhase::Menu);
    }

    #[test]
    fn ai_level_loads_on_latest_ticket() {
        let t0 = Instant::now();
        let mut engine = engine_with(level(&three_by_three(), 18000, 3), 1);

        let stale = engine.begin_ai_request("a smiley").unwrap();
        assert!(stale.prompt.contains("a smiley"));
        assert_eq!(engine.session().notice, Some(Notice::AiGenerating));
        let current = engine.begin_ai_request("a heart").unwrap();

        assert_eq!(
            engine.complete_ai_request(stale.ticket, Ok("[[1, 2], [3, 4]]".into()), t0),
            Err(GameError::StaleRequest)
        );
        assert_eq!(
            engine.complete_ai_request(
                current.ticket,
                Ok(r#"{"grid": [[1, 2], [3, 4]]}"#.into()),
                t0
            ),
            Ok(Outcome::Changed)
        );

        assert_eq!(engine.phase(), GamePhase::Memorizing);
        assert_eq!(engine.session().level_number(), Some(-1));
        assert_eq!(engine.session().memorize_remaining, GENERATED_MEMORIZE_SECS);
        assert_eq!(engine.level().unwrap().difficulty, Difficulty::Insane);
        assert_eq!(engine.session().inventory.charges(PowerUpKind::Freeze), 3);
        assert_eq!(engine.session().notice, None);
    }

    #[test]
    fn resuming_drops_an_ai_request_started_while_paused() {
        let t0 = Instant::now();
        let mut engine = playing(&three_by_three(), 60000, t0);
        engine.toggle_pause(t0 + secs(1));
        let request = engine.begin_ai_request("a spiral").unwrap();
        assert_eq!(engine.session().notice, Some(Notice::AiGenerating));

        assert_eq!(engine.toggle_pause(t0 + secs(2)), Outcome::Changed);
        assert_eq!(engine.session().notice, None);

        assert_eq!(
            engine.complete_ai_request(request.ticket, Ok("[[1, 2], [2, 1]]".into()), t0 + secs(3)),
            Err(GameError::StaleRequest)
        );
        engine.tick(t0 + secs(6));
        assert_eq!(engine.phase(), GamePhase::Playing);
        assert_eq!(engine.session().level, Some(LevelId::Campaign(1)));
        assert_eq!(engine.session().notice, None);
    }

    #[test]
    fn failed_ai_request_keeps_the_session() {
        let t0 = Instant::now();
        let mut engine = engine_with(level(&three_by_three(), 18000, 3), 1);

        let request = engine.begin_ai_request("stripes").unwrap();
        let result = engine.complete_ai_request(request.ticket, Ok("here you go".into()), t0);
        assert!(matches!(
            result,
            Err(GameError::Generator(GeneratorError::InvalidResponse(_)))
        ));
        assert_eq!(engine.phase(), GamePhase::Menu);
        assert!(matches!(engine.session().notice, Some(Notice::AiFailed(_))));

        let request = engine.begin_ai_request("stripes").unwrap();
        let result = engine.complete_ai_request(
            request.ticket,
            Err(GeneratorError::Network("timed out".into())),
            t0,
        );
        assert_eq!(
            result,
            Err(GameError::Generator(GeneratorError::Network("timed out".into())))
        );
        assert!(engine.grid().is_none());
    }

    #[test]
    fn starting_a_level_invalidates_pending_ai_request() {
        let t0 = Instant::now();
        let mut engine = engine_with(level(&three_by_three(), 18000, 3), 1);

        let request = engine.begin_ai_request("waves").unwrap();
        engine.start_level(1, t0).unwrap();

        assert_eq!(
            engine.complete_ai_request(request.ticket, Ok("[[1]]".into()), t0),
            Err(GameError::StaleRequest)
        );
        assert_eq!(engine.session().level, Some(LevelId::Campaign(1)));
    }

    #[test]
    fn phase_is_checked_before_arguments() {
        let t0 = Instant::now();
        let mut engine = engine_with(level(&three_by_three(), 18000, 3), 1);
        engine.start_level(1, t0).unwrap();

        assert_eq!(engine.swap((0, 0), (9, 9)), Ok(SwapOutcome::NoChange));
        assert_eq!(engine.lock_at((7, 0)), Ok(Outcome::NoChange));
        assert_eq!(engine.start_level(500, t0), Ok(Outcome::NoChange));
        assert_eq!(engine.start_level(2, t0), Ok(Outcome::NoChange));
        assert_eq!(engine.phase(), GamePhase::Memorizing);

        engine.tick(t0 + secs(3));
        assert_eq!(engine.swap((0, 0), (9, 9)), Err(GameError::InvalidCoords));
    }

    #[test]
    fn first_campaign_level_counts_down_then_scrambles() {
        let t0 = Instant::now();
        // a single color pattern is solved by every shuffle, skip such rolls
        let mut engine = (0..64)
            .map(|seed| {
                let mut engine = Engine::with_seed(seed);
                engine.start_level(1, t0).unwrap();
                engine
            })
            .find(|engine| {
                let kinds = engine.level().unwrap().pattern.as_array();
                kinds.iter().any(|&kind| kind != kinds[[0, 0]])
            })
            .unwrap();

        let level = engine.level().unwrap().clone();
        assert_eq!(level.grid_size(), (3, 3));
        assert_eq!(level.chaos_interval_ms, 18000);
        assert_eq!(level.memorize_secs, 6);
        assert_eq!(level.difficulty, Difficulty::Easy);
        assert!(level.pattern.as_array().iter().all(|kind| (1..=2).contains(kind)));
        assert_eq!(engine.phase(), GamePhase::Memorizing);
        assert_eq!(engine.grid().unwrap().kinds(), *level.pattern.as_array());

        engine.tick(t0 + secs(5));
        assert_eq!(engine.phase(), GamePhase::Memorizing);
        assert_eq!(engine.session().memorize_remaining, 1);

        let events = engine.tick(t0 + secs(6));
        assert!(events.contains(&EngineEvent::Scrambled));
        assert_eq!(engine.phase(), GamePhase::Playing);
        assert_eq!(engine.chaos_fire_at(), Some(t0 + secs(24)));

        let grid = engine.grid().unwrap();
        let mut ids: Vec<_> = grid.tiles().iter().map(|tile| tile.id.get()).collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..9).collect::<Vec<_>>());
        let mut expected: Vec<_> = level.pattern.as_array().iter().copied().collect();
        expected.sort_unstable();
        assert_eq!(sorted_kinds(grid), expected);
    }

    #[test]
    fn with_seed_plays_the_campaign_curve() {
        let t0 = Instant::now();
        let mut engine = Engine::with_seed(1);

        engine.start_level(1, t0).unwrap();

        assert_eq!(engine.level().unwrap().grid_size(), (3, 3));
        assert_eq!(engine.session().memorize_remaining, 6);
        assert_eq!(engine.store().max_unlocked(), 1);
    }
}
