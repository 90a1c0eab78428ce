use chaosgrid_core::{
    Coord2, Engine, EngineEvent, GamePhase, Grid, LevelGenerator, PowerUpKind, PowerUpOutcome,
    ProgressStore, SwapOutcome, TargetPattern,
};
use core::time::Duration;
use web_time::Instant;

/// Chaos meter reading at which the bot reaches for a freeze.
const FREEZE_AT: f32 = 80.0;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BotConfig {
    /// Time between two bot moves.
    pub move_interval: Duration,
    pub use_powerups: bool,
    /// Sleep between moves instead of advancing a virtual clock.
    pub realtime: bool,
    pub time_limit: Duration,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            move_interval: Duration::from_millis(500),
            use_powerups: true,
            realtime: false,
            time_limit: Duration::from_secs(600),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub phase: GamePhase,
    pub score: u16,
    pub lives: u8,
    pub strikes: usize,
    pub swaps: usize,
    pub elapsed: Duration,
}

/// A player with perfect memory: it remembers whatever target it was shown
/// and greedily swaps tiles back into place.
#[derive(Clone, Debug)]
pub struct Bot {
    config: BotConfig,
    memory: Option<TargetPattern>,
}

impl Bot {
    pub fn new(config: BotConfig) -> Self {
        Self {
            config,
            memory: None,
        }
    }

    fn observe<G, S>(&mut self, engine: &Engine<G, S>)
    where
        G: LevelGenerator,
        S: ProgressStore,
    {
        if let Some(target) = engine.visible_target()
            && self.memory.as_ref() != Some(target)
        {
            self.memory = Some(target.clone());
        }
    }

    /// One move. Returns whether a swap went through.
    fn act<G, S>(&mut self, engine: &mut Engine<G, S>, now: Instant) -> chaosgrid_core::Result<bool>
    where
        G: LevelGenerator,
        S: ProgressStore,
    {
        if self.config.use_powerups {
            use_powerups(engine, now);
        }
        let (Some(target), Some(grid)) = (&self.memory, engine.grid()) else {
            return Ok(false);
        };
        let Some((cell, source)) = next_swap(grid, target) else {
            return Ok(false);
        };

        let outcome = engine.swap(cell, source)?;
        log::debug!("bot swapped {cell:?} and {source:?}: {outcome:?}");
        // the fixed cell is guarded against strikes while charges last
        if self.config.use_powerups
            && outcome == SwapOutcome::Swapped
            && engine.activate_powerup(PowerUpKind::LockTile, now) == PowerUpOutcome::AwaitingTarget
        {
            engine.lock_at(cell)?;
        }
        Ok(outcome.has_update())
    }
}

fn use_powerups<G: LevelGenerator, S: ProgressStore>(engine: &mut Engine<G, S>, now: Instant) {
    let effects = engine.effects();
    if effects.frozen || engine.chaos_progress(now) < FREEZE_AT {
        return;
    }
    for kind in [PowerUpKind::Freeze, PowerUpKind::SlowChaos] {
        if kind == PowerUpKind::SlowChaos && effects.slowed {
            continue;
        }
        if let PowerUpOutcome::Activated { until } = engine.activate_powerup(kind, now) {
            log::debug!("bot used {kind:?} until {until:?}");
            return;
        }
    }
}

/// First misplaced cell together with a misplaced tile of the kind it
/// needs. Locked tiles are left alone.
pub fn next_swap(grid: &Grid, target: &TargetPattern) -> Option<(Coord2, Coord2)> {
    let (rows, cols) = grid.size();
    let misplaced: Vec<Coord2> = (0..rows)
        .flat_map(|row| (0..cols).map(move |col| (row, col)))
        .filter(|&coords| {
            let tile = grid.tile_at(coords);
            !tile.locked && tile.kind != target.kind_at(coords)
        })
        .collect();

    misplaced.iter().find_map(|&cell| {
        let wanted = target.kind_at(cell);
        let offered = grid.tile_at(cell).kind;
        let candidates = || {
            misplaced
                .iter()
                .copied()
                .filter(move |&other| other != cell && grid.tile_at(other).kind == wanted)
        };
        // a swap fixing both cells beats one fixing only the first
        candidates()
            .find(|&other| target.kind_at(other) == offered)
            .or_else(|| candidates().next())
            .map(|source| (cell, source))
    })
}

/// Drives `engine` with `bot` from `start` until the level is decided or
/// the time limit runs out.
pub fn play_out<G, S>(
    engine: &mut Engine<G, S>,
    bot: &mut Bot,
    start: Instant,
) -> chaosgrid_core::Result<RunSummary>
where
    G: LevelGenerator,
    S: ProgressStore,
{
    let config = bot.config;
    let mut now = start;
    let mut strikes = 0;
    let mut swaps = 0;

    loop {
        for event in engine.tick(now) {
            log::debug!("{event:?}");
            if matches!(event, EngineEvent::ChaosStrike { .. }) {
                strikes += 1;
            }
        }
        let phase = engine.phase();
        if phase.is_finished() || now.duration_since(start) >= config.time_limit {
            break;
        }

        bot.observe(engine);
        if phase == GamePhase::Playing && bot.act(engine, now)? {
            swaps += 1;
        }

        let next = now + config.move_interval;
        now = if config.realtime {
            std::thread::sleep(next.saturating_duration_since(Instant::now()));
            Instant::now()
        } else {
            next
        };
    }

    let session = engine.session();
    Ok(RunSummary {
        phase: session.phase,
        score: session.score,
        lives: session.lives,
        strikes,
        swaps,
        elapsed: now.duration_since(start),
    })
}
