use anyhow::{Context, Result};
use chaosgrid_core::{
    CurveGenerator, Engine, GamePhase, LevelCurve, LevelGenerator, MAX_LEVEL, ProgressStore,
};
use clap::{Args, Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use web_time::Instant;

use crate::bot::{Bot, BotConfig, RunSummary};
use crate::store::FileProgressStore;

mod bot;
mod store;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// What log level to use
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,

    /// Force a seed instead of random
    #[arg(short, long, global = true)]
    seed: Option<u64>,

    /// Progress file to use instead of the one in the config directory
    #[arg(long, global = true)]
    progress_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the campaign curve and which levels are unlocked
    Levels,
    /// Let the bot play a campaign level
    Play {
        /// Campaign level, 1 to 100
        level: u32,

        #[command(flatten)]
        bot: BotArgs,
    },
    /// Let the bot play a level read from a saved AI generator response
    Ai {
        /// File holding the generator's JSON answer
        response: PathBuf,

        /// Description the level was requested with
        #[arg(long, default_value = "anything")]
        details: String,

        #[command(flatten)]
        bot: BotArgs,
    },
    /// Show or reset campaign progress
    Progress {
        /// Lock every level but the first
        #[arg(long)]
        reset: bool,
    },
}

#[derive(Args, Debug)]
struct BotArgs {
    /// Milliseconds between bot moves
    #[arg(long, default_value_t = 500)]
    move_ms: u64,

    /// Never use powerups
    #[arg(long)]
    no_powerups: bool,

    /// Follow the wall clock instead of a simulated one
    #[arg(long)]
    realtime: bool,

    /// Give up after this many seconds
    #[arg(long, default_value_t = 600)]
    time_limit: u64,
}

impl From<&BotArgs> for BotConfig {
    fn from(args: &BotArgs) -> Self {
        Self {
            move_interval: Duration::from_millis(args.move_ms.max(1)),
            use_powerups: !args.no_powerups,
            realtime: args.realtime,
            time_limit: Duration::from_secs(args.time_limit),
        }
    }
}

fn init_logging(verbose: &Verbosity<InfoLevel>) {
    let level = verbose.log_level_filter().as_str().to_ascii_lowercase();
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.verbose);

    let seed = cli.seed.unwrap_or_else(rand::random);
    log::debug!("seed: {seed}");

    let path = cli.progress_file.unwrap_or_else(store::default_path);
    let store = FileProgressStore::open(path)?;

    match cli.command {
        Command::Levels => list_levels(&store),
        Command::Play { level, bot } => {
            let mut engine = Engine::new(CurveGenerator::new(seed), store, seed);
            let start = Instant::now();
            engine
                .start_level(level, start)
                .with_context(|| format!("cannot start level {level}"))?;
            run(&mut engine, &bot, start)
        }
        Command::Ai {
            response,
            details,
            bot,
        } => {
            let text = fs::read_to_string(&response)
                .with_context(|| format!("reading {}", response.display()))?;
            let mut engine = Engine::new(CurveGenerator::new(seed), store, seed);
            let request = engine
                .begin_ai_request(&details)
                .context("engine cannot load a level right now")?;
            log::info!("prompt: {}", request.prompt);

            let start = Instant::now();
            engine
                .complete_ai_request(request.ticket, Ok(text), start)
                .context("AI response rejected")?;
            run(&mut engine, &bot, start)
        }
        Command::Progress { reset } => {
            let mut store = store;
            if reset {
                store.reset()?;
            }
            println!(
                "{}: levels 1 to {} unlocked",
                store.path().display(),
                store.max_unlocked()
            );
            Ok(())
        }
    }
}

fn list_levels(store: &FileProgressStore) -> Result<()> {
    let unlocked = store.max_unlocked();
    println!(
        "{:>5}  {:>4}  {:>6}  {:>8}  {:>8}  {:<10}",
        "level", "grid", "colors", "chaos ms", "memorize", "difficulty"
    );
    for level in 1..=MAX_LEVEL {
        let curve = LevelCurve::for_level(level);
        let lock = if level <= unlocked { "" } else { "  locked" };
        println!(
            "{:>5}  {:>4}  {:>6}  {:>8}  {:>7}s  {:<10}{}",
            level,
            format!("{0}x{0}", curve.grid_size),
            curve.colors,
            curve.chaos_interval_ms,
            curve.memorize_secs,
            format!("{:?}", curve.difficulty),
            lock
        );
    }
    Ok(())
}

fn run<G: LevelGenerator>(
    engine: &mut Engine<G, FileProgressStore>,
    args: &BotArgs,
    start: Instant,
) -> Result<()> {
    let level = engine
        .session()
        .level
        .context("no level was loaded")?;
    let mut bot = Bot::new(BotConfig::from(args));
    let RunSummary {
        phase,
        score,
        lives,
        strikes,
        swaps,
        elapsed,
    } = bot::play_out(engine, &mut bot, start)?;

    let verdict = match phase {
        GamePhase::Won => "won",
        GamePhase::GameOver => "lost",
        _ => "gave up",
    };
    println!(
        "{level}: {verdict} after {:.1}s, score {score}, {lives} lives left, {strikes} strikes, {swaps} swaps",
        elapsed.as_secs_f32()
    );
    if phase == GamePhase::Won {
        println!("levels 1 to {} unlocked", engine.session().max_unlocked);
    }
    Ok(())
}
