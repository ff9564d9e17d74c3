use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use minedrop_core::{
    derive_hash_hex, Credits, Engine, EngineError, EngineParams, Grid, SpinOutcome,
};

#[derive(Parser)]
#[command(name = "minedrop-cli", about = "Operator CLI for the minedrop outcome engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Engine params JSON; the built-in tables are used when absent
    #[arg(long, value_parser, env = "PARAMS_PATH")]
    params: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a local session and print every round
    Play {
        #[arg(long, default_value = "dev-server-seed")]
        server_seed: String,
        #[arg(long, default_value = "player")]
        client_seed: String,
        #[arg(long, default_value_t = 10)]
        spins: u32,
        #[arg(long, default_value_t = 1.0)]
        bet: f64,
    },
    /// Replay one round from disclosed seeds and the grid it started from
    Verify {
        #[arg(long)]
        server_seed: String,
        #[arg(long)]
        client_seed: String,
        #[arg(long)]
        nonce: u64,
        #[arg(long)]
        bet: f64,
        /// JSON grid as returned in `next_grid` by the previous round
        #[arg(long)]
        grid: PathBuf,
        /// The round was played in bonus mode
        #[arg(long)]
        bonus: bool,
    },
    /// Estimate RTP over many rounds
    Simulate {
        #[arg(long, default_value_t = 100_000)]
        spins: u64,
        #[arg(long, default_value_t = 1.0)]
        bet: f64,
        #[arg(long, default_value = "sim-server")]
        server_seed: String,
        #[arg(long, default_value = "sim-client")]
        client_seed: String,
        /// Write one CSV row per round
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Print the commitment hash for a server seed
    HashSeed { seed: String },
}

#[derive(Debug, Default, Clone, PartialEq)]
struct SimulationSummary {
    rounds: u64,
    free_rounds: u64,
    wagered: Credits,
    paid: Credits,
    hits: u64,
    bonus_triggers: u64,
    chests: u64,
    top_ups: u64,
    max_win: Credits,
}

impl SimulationSummary {
    fn rtp(&self) -> f64 {
        if self.wagered.is_positive() {
            self.paid.as_f64() / self.wagered.as_f64()
        } else {
            0.0
        }
    }

    fn record(&mut self, outcome: &SpinOutcome) {
        self.rounds += 1;
        if outcome.free_spin {
            self.free_rounds += 1;
        } else {
            self.wagered += outcome.bet;
        }
        self.paid += outcome.total_payout;
        if outcome.total_payout.is_positive() {
            self.hits += 1;
        }
        if outcome.bonus_triggered {
            self.bonus_triggers += 1;
        }
        self.chests += outcome.columns.iter().filter(|c| c.chest.is_some()).count() as u64;
        self.max_win = self.max_win.max(outcome.total_payout);
    }
}

const CSV_HEADER: [&str; 9] = [
    "nonce",
    "bet",
    "free_spin",
    "payout",
    "win_tier",
    "eyes",
    "destroyed",
    "chests",
    "balance",
];

fn csv_row(outcome: &SpinOutcome) -> [String; 9] {
    let destroyed: usize = outcome.columns.iter().map(|c| c.destroyed_count()).sum();
    let chests: Vec<String> = outcome
        .columns
        .iter()
        .filter_map(|c| c.chest.map(|m| format!("{}:{}", c.x, m)))
        .collect();
    [
        outcome.nonce.to_string(),
        outcome.bet.to_string(),
        outcome.free_spin.to_string(),
        outcome.total_payout.to_string(),
        outcome.win_tier.label().to_string(),
        outcome.total_eyes.to_string(),
        destroyed.to_string(),
        chests.join(" "),
        outcome.balance_after.to_string(),
    ]
}

fn simulate<W: Write>(
    engine: &Engine,
    server_seed: &str,
    client_seed: &str,
    spins: u64,
    bet: Credits,
    mut export: Option<&mut csv::Writer<W>>,
) -> anyhow::Result<SimulationSummary> {
    let mut state = engine.new_session(server_seed, client_seed)?;
    let mut summary = SimulationSummary::default();
    if let Some(wtr) = export.as_deref_mut() {
        wtr.write_record(CSV_HEADER)?;
    }
    for _ in 0..spins {
        if !state.bonus.active && state.balance < bet {
            state.balance += engine.params().starting_balance.max(bet);
            summary.top_ups += 1;
        }
        let outcome = engine.spin(&mut state, bet)?;
        summary.record(&outcome);
        if let Some(wtr) = export.as_deref_mut() {
            wtr.write_record(csv_row(&outcome))?;
        }
    }
    if let Some(wtr) = export {
        wtr.flush()?;
    }
    Ok(summary)
}

fn print_round(outcome: &SpinOutcome) {
    println!(
        "#{:>4} bet={} payout={} [{}] eyes={} balance={}{}",
        outcome.nonce,
        outcome.bet,
        outcome.total_payout,
        outcome.win_tier.label(),
        outcome.total_eyes,
        outcome.balance_after,
        if outcome.free_spin { " (free)" } else { "" },
    );
    for column in &outcome.columns {
        let symbols: Vec<u8> = column.reel.iter().map(|cell| cell.to_index()).collect();
        println!(
            "      col {} symbols={:?} power={} destroyed={} payout={}{}",
            column.x,
            symbols,
            column.power,
            column.destroyed_count(),
            column.payout,
            column.chest.map(|m| format!(" chest x{m}")).unwrap_or_default(),
        );
    }
    if outcome.bonus_triggered {
        println!("      bonus mode: {} free spins", outcome.bonus_spins_left);
    }
    if outcome.bonus_ended {
        println!("      bonus mode over");
    }
}

fn load_params(path: Option<&PathBuf>) -> anyhow::Result<EngineParams> {
    let Some(path) = path else {
        return Ok(EngineParams::default());
    };
    let json =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(EngineParams::from_json_str(&json)?)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();
    let cli = Cli::parse();
    let engine = Engine::new(load_params(cli.params.as_ref())?)?;

    match cli.command {
        Commands::Play {
            server_seed,
            client_seed,
            spins,
            bet,
        } => {
            let bet = Credits::from_f64(bet);
            let mut state = engine.new_session(&server_seed, &client_seed)?;
            println!("server seed hash: {}", state.server_seed_hash);
            for _ in 0..spins {
                match engine.spin(&mut state, bet) {
                    Ok(outcome) => print_round(&outcome),
                    Err(err @ EngineError::InsufficientFunds { .. }) => {
                        println!("stopping: {err}");
                        break;
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            println!(
                "final balance {} (session win {})",
                state.balance, state.total_session_win
            );
        }
        Commands::Verify {
            server_seed,
            client_seed,
            nonce,
            bet,
            grid,
            bonus,
        } => {
            let json = std::fs::read_to_string(&grid)
                .with_context(|| format!("reading {}", grid.display()))?;
            let grid: Grid = serde_json::from_str(&json).context("grid JSON")?;
            let replay = engine.verify_round(
                &server_seed,
                &client_seed,
                nonce,
                Credits::from_f64(bet),
                bonus,
                &grid,
            )?;
            println!("{}", serde_json::to_string_pretty(&replay)?);
        }
        Commands::Simulate {
            spins,
            bet,
            server_seed,
            client_seed,
            export,
        } => {
            let bet = Credits::from_f64(bet);
            let summary = match &export {
                Some(path) => {
                    let mut wtr = csv::Writer::from_path(path)?;
                    simulate(&engine, &server_seed, &client_seed, spins, bet, Some(&mut wtr))?
                }
                None => simulate::<std::io::Sink>(
                    &engine,
                    &server_seed,
                    &client_seed,
                    spins,
                    bet,
                    None,
                )?,
            };
            info!(rounds = summary.rounds, "simulation finished");
            println!(
                "rounds={} free={} wagered={} paid={} rtp={:.4} (target {:.2})",
                summary.rounds,
                summary.free_rounds,
                summary.wagered,
                summary.paid,
                summary.rtp(),
                engine.params().rtp_target,
            );
            println!(
                "hit rate={:.4} bonus triggers={} chests={} max win={} top-ups={}",
                summary.hits as f64 / summary.rounds.max(1) as f64,
                summary.bonus_triggers,
                summary.chests,
                summary.max_win,
                summary.top_ups,
            );
            if let Some(path) = export {
                println!("exported {} rows to {}", summary.rounds, path.display());
            }
        }
        Commands::HashSeed { seed } => {
            println!("{}", derive_hash_hex(seed.as_bytes()));
        }
    }

    Ok(())
}
