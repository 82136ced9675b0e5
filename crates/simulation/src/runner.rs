//! Multi-rank simulation runner.
//!
//! Each rank drives its own SimBox on its own thread over a shared
//! [`MemoryWorld`]. A rank that fails drops its transport, so every peer
//! blocked on it fails with a disconnection instead of hanging; the runner
//! then reports the failure that started it.

use crate::SimulationConfig;
use meso_messages::MessageError;
use meso_metrics::StepCounters;
use meso_simbox::{InitialState, PhysicsEngine, SetupError, SimBox, StepError, StepReport};
use meso_transport::{Transport, TransportError};
use meso_transport_memory::{MemoryTransport, MemoryWorld, TrafficReport};
use meso_types::{Bead, Pid};
use std::thread;
use thiserror::Error;
use tracing::{error, info, info_span, warn};

/// Why one rank stopped.
#[derive(Debug, Error)]
pub enum RankFailure {
    #[error("setup failed: {0}")]
    Setup(#[from] SetupError),

    #[error("{0}")]
    Step(#[from] StepError),

    #[error("bead total exchange failed: {0}")]
    Totals(#[from] MessageError),

    #[error("step {step}: global bead total is {found}, expected {expected}")]
    Conservation { step: u64, expected: u64, found: u64 },
}

impl RankFailure {
    /// Whether the failure only reflects a peer that already failed.
    pub fn is_disconnection(&self) -> bool {
        let message = match self {
            RankFailure::Setup(SetupError::Message(e)) | RankFailure::Totals(e) => e,
            RankFailure::Step(StepError::Message { source, .. }) => source,
            _ => return false,
        };
        matches!(
            message,
            MessageError::Transport(TransportError::PeerDisconnected(_))
        )
    }
}

/// Errors from a run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("rank {rank} failed: {source}")]
    Rank {
        rank: Pid,
        #[source]
        source: RankFailure,
    },

    #[error("rank {0} panicked")]
    Panicked(Pid),
}

impl RunError {
    /// Rank the error is attributed to.
    pub fn rank(&self) -> Pid {
        match self {
            RunError::Rank { rank, .. } | RunError::Panicked(rank) => *rank,
        }
    }
}

/// What one rank ended with.
#[derive(Debug, Clone)]
pub struct RankOutcome {
    pub rank: Pid,
    /// Beads held at the end, positions global.
    pub beads: Vec<Bead>,
    pub counters: StepCounters,
    pub last_step: Option<StepReport>,
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub steps: u64,
    /// Global bead total at the end, as agreed by every rank.
    pub final_total: u64,
    /// One entry per rank, ordered by rank.
    pub ranks: Vec<RankOutcome>,
    /// Counters of every rank merged.
    pub counters: StepCounters,
    pub traffic: TrafficReport,
}

impl RunReport {
    /// Final per-rank bead snapshots, ordered by rank.
    pub fn snapshots(&self) -> Vec<Vec<Bead>> {
        self.ranks.iter().map(|r| r.beads.clone()).collect()
    }

    /// Every bead at the end, positions global.
    pub fn beads(&self) -> impl Iterator<Item = &Bead> + '_ {
        self.ranks.iter().flat_map(|r| r.beads.iter())
    }
}

/// Runs one SimBox per rank of the configured grid.
pub struct SimulationRunner {
    config: SimulationConfig,
}

impl SimulationRunner {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Load `state` on every rank and run the configured number of steps.
    pub fn run<E>(&self, state: &InitialState, engine: &E) -> Result<RunReport, RunError>
    where
        E: PhysicsEngine + Sync,
    {
        let size = self.config.world_size();
        let world = MemoryWorld::connect(size, self.config.transport.clone());
        let traffic = world.traffic();
        let expected = state.bead_count() as u64;
        info!(
            ranks = size,
            beads = expected,
            steps = self.config.steps,
            "Starting run"
        );

        let results: Vec<thread::Result<Result<(RankOutcome, u64), RankFailure>>> =
            thread::scope(|scope| {
                let handles: Vec<_> = world
                    .into_endpoints()
                    .into_iter()
                    .map(|transport| {
                        let config = &self.config;
                        scope.spawn(move || {
                            let rank = transport.rank();
                            let span = info_span!("rank", rank = rank.0);
                            let _guard = span.enter();
                            run_rank(transport, config, state, engine, expected)
                        })
                    })
                    .collect();
                handles.into_iter().map(|h| h.join()).collect()
            });

        let mut ranks = Vec::with_capacity(size);
        let mut failures = Vec::new();
        let mut final_total = 0;
        for (i, result) in results.into_iter().enumerate() {
            let rank = Pid(i as u32);
            match result {
                Ok(Ok((outcome, total))) => {
                    final_total = total;
                    ranks.push(outcome);
                }
                Ok(Err(source)) => failures.push(RunError::Rank { rank, source }),
                Err(_) => failures.push(RunError::Panicked(rank)),
            }
        }
        if let Some(first) = root_cause(failures) {
            error!(rank = first.rank().0, error = %first, "Run failed");
            return Err(first);
        }

        let mut counters = StepCounters::new();
        for outcome in &ranks {
            counters.merge(&outcome.counters);
        }
        info!(
            steps = self.config.steps,
            final_total,
            departed = counters.total_departures(),
            "Run complete"
        );
        Ok(RunReport {
            steps: self.config.steps,
            final_total,
            ranks,
            counters,
            traffic: traffic.report(),
        })
    }
}

/// The failure that is not merely a reaction to another rank's failure.
fn root_cause(failures: Vec<RunError>) -> Option<RunError> {
    let primary = failures.iter().position(|f| match f {
        RunError::Rank { source, .. } => !source.is_disconnection(),
        RunError::Panicked(_) => true,
    });
    let mut failures = failures;
    match primary {
        Some(i) => Some(failures.swap_remove(i)),
        None => failures.into_iter().next(),
    }
}

fn run_rank<E: PhysicsEngine>(
    transport: MemoryTransport,
    config: &SimulationConfig,
    state: &InitialState,
    engine: &E,
    expected: u64,
) -> Result<(RankOutcome, u64), RankFailure> {
    let mut simbox = SimBox::new(transport, config.simbox.clone())?;
    simbox.assemble()?;
    simbox.load(state)?;
    check_total(&mut simbox, 0, expected)?;

    let mut counters = StepCounters::new();
    let mut last_step = None;
    for step in 1..=config.steps {
        last_step = Some(simbox.step(engine, &mut counters)?);
        if config.total_check_interval > 0 && step % config.total_check_interval == 0 {
            check_total(&mut simbox, step, expected)?;
        }
    }
    let total = check_total(&mut simbox, config.steps, expected)?;

    Ok((
        RankOutcome {
            rank: simbox.rank(),
            beads: simbox.global_beads(),
            counters,
            last_step,
        },
        total,
    ))
}

fn check_total(
    simbox: &mut SimBox<MemoryTransport>,
    step: u64,
    expected: u64,
) -> Result<u64, RankFailure> {
    let found = simbox.global_bead_total()?;
    if found != expected {
        warn!(step, expected, found, "Global bead total changed");
        return Err(RankFailure::Conservation {
            step,
            expected,
            found,
        });
    }
    Ok(found)
}
