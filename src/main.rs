// Chameleon: Taming the transient while reconfiguring BGP
// Copyright (C) 2023 Tibor Schneider <sctibor@ethz.ch>
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Command-line entry point: load problem inputs, wire up an [`Itags`] search and solve it.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use itags::io::{build_problem, MotionPlannerHandle, ProblemInputsDocument, SolutionDocument};
use itags::model::MilpSchedulerType;
use itags::motion_planner::{MotionPlanner, SampledMotionPlanner};
use itags::scheduler::{
    DeterministicScheduler, GnnScenarioSelector, HeuristicApproximationScheduler,
    HeuristicScenarioSelector, MonolithicStochasticScheduler, ScheduleSolver,
};
use itags::search::{
    Apr, Disjunction, GoalCheck, Heuristic, Itags, MakespanBounds, Naq, NullPruningMethod,
    PreviousFailurePruning, PruningMethod, Tetam, Tetaq, TraitsImprovementPruning, ZeroAprCheck,
    ZeroPosCheck,
};
use log::{error, info, LevelFilter};

/// Which scoring function drives the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum HeuristicKind {
    /// α·APR + (1−α)·NSQ, the default forward-search heuristic.
    Tetaq,
    /// α·APR + (1−α)·POS, the reverse-search heuristic.
    Tetam,
    /// Trait-mismatch only, ignoring schedule quality.
    Apr,
    /// Allocation-quality only, ignoring schedule quality.
    Naq,
}

/// Which termination predicate ends the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum GoalCheckKind {
    /// Forward search: traits fully satisfied.
    ZeroApr,
    /// Reverse search: heuristic already at its floor.
    ZeroPos,
}

/// A pruning predicate selectable from the command line; `--prepruning`/`--postpruning` may
/// repeat to combine several (any one pruning iff any sub-predicate prunes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PruningKind {
    /// Never prunes.
    Null,
    /// Prunes successors that did not strictly improve APR over their parent.
    TraitsImprovement,
    /// Prunes allocations that are supersets of a previously-failed one.
    PreviousFailure,
}

/// Which per-node memoization / motion-plan caching strategy to use. Exact-match is the only
/// strategy implemented; the flag is kept for schema parity with the reference selector set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MemoizationKind {
    /// Exact-match `(species, from, to)` memoization.
    ExactMatch,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    /// Human-readable, timestamped (`pretty_env_logger`).
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Simultaneous trait-based task allocation and scheduling for heterogeneous robot teams.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// Path to the problem-inputs JSON document.
    problem_input_path: PathBuf,
    /// Path the solution JSON document is written to.
    solution_output_path: PathBuf,

    /// Take every selector from the problem file's own parameter blocks instead of the flags
    /// below (`itags_parameters.use_reverse`, `scheduler_parameters.milp_scheduler_type`, ...).
    #[arg(long, conflicts_with_all = ["scheduler", "use_reverse"])]
    config_file: bool,

    /// MILP scheduler formulation.
    #[arg(long, value_enum, default_value = "deterministic-milp")]
    scheduler: MilpSchedulerType,
    /// Node-scoring heuristic.
    #[arg(long, value_enum, default_value = "tetaq")]
    heuristic: HeuristicKind,
    /// TETAQ/TETAM trade-off weight; overrides the problem file's `itags_parameters.alpha`.
    #[arg(long)]
    alpha: Option<f64>,
    /// Search termination predicate.
    #[arg(long, value_enum, default_value = "zero-apr")]
    goal_check: GoalCheckKind,
    /// Motion-plan memoization strategy.
    #[arg(long, value_enum, default_value = "exact-match")]
    memoization: MemoizationKind,
    /// Pre-pruning predicates (applied to a successor before it is enqueued); repeatable.
    #[arg(long, value_enum)]
    prepruning: Vec<PruningKind>,
    /// Post-pruning predicates (applied to a node once popped); repeatable.
    #[arg(long, value_enum)]
    postpruning: Vec<PruningKind>,
    /// Run the reverse-mode search (start from the full team, remove robots).
    #[arg(long)]
    use_reverse: bool,

    /// Increase log verbosity; repeatable (`-v` = info, `-vv` = debug, `-vvv` = trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Log output format.
    #[arg(long, value_enum, default_value = "pretty")]
    log_format: LogFormat,
    /// RNG seed for scenario selection and SPRT sampling order.
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn init_logging(verbose: u8, format: LogFormat) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    match format {
        LogFormat::Pretty => {
            pretty_env_logger::formatted_timed_builder()
                .filter_level(level)
                .parse_default_env()
                .init();
        }
        LogFormat::Json => {
            env_logger::Builder::new()
                .filter_level(level)
                .parse_default_env()
                .format(|buf, record| {
                    use std::io::Write;
                    writeln!(
                        buf,
                        "{{\"level\":\"{}\",\"target\":\"{}\",\"message\":{}}}",
                        record.level(),
                        record.target(),
                        serde_json::to_string(&record.args().to_string()).unwrap()
                    )
                })
                .init();
        }
    }
}

fn build_pruning(kinds: &[PruningKind]) -> Box<dyn PruningMethod + Send + Sync> {
    if kinds.is_empty() {
        return Box::new(NullPruningMethod);
    }
    let methods: Vec<Box<dyn PruningMethod + Send + Sync>> = kinds
        .iter()
        .map(|k| -> Box<dyn PruningMethod + Send + Sync> {
            match k {
                PruningKind::Null => Box::new(NullPruningMethod),
                PruningKind::TraitsImprovement => Box::new(TraitsImprovementPruning),
                PruningKind::PreviousFailure => Box::new(PreviousFailurePruning::new()),
            }
        })
        .collect();
    Box::new(Disjunction(methods))
}

fn deterministic_planners(
    doc: &ProblemInputsDocument,
) -> Result<Vec<MotionPlanner>, itags::error::ItagsError> {
    let (_, planners) = build_problem(doc)?;
    planners
        .into_iter()
        .map(|p| match p {
            MotionPlannerHandle::Deterministic(m) => Ok(m),
            MotionPlannerHandle::Sampled(s) => Err(itags::error::ItagsError::Validation(format!(
                "expected a deterministic motion planner, found one with {} sampled scenarios",
                s.num_scenarios()
            ))),
        })
        .collect()
}

fn sampled_planners(
    doc: &ProblemInputsDocument,
) -> Result<Vec<SampledMotionPlanner>, itags::error::ItagsError> {
    let (_, planners) = build_problem(doc)?;
    planners
        .into_iter()
        .map(|p| match p {
            MotionPlannerHandle::Sampled(s) => Ok(s),
            MotionPlannerHandle::Deterministic(_) => Err(itags::error::ItagsError::Validation(
                "expected a sampled motion planner, found a deterministic one".into(),
            )),
        })
        .collect()
}

fn run(cli: &Cli) -> Result<(), itags::error::ItagsError> {
    let raw = fs::read_to_string(&cli.problem_input_path)?;
    let doc: ProblemInputsDocument = serde_json::from_str(&raw)?;
    let (mut inputs, _planners) = build_problem(&doc)?;
    if let Some(alpha) = cli.alpha {
        inputs.itags_parameters.alpha = alpha;
    }
    inputs.scheduler_parameters.seed = cli.seed;

    let scheduler_type = if cli.config_file {
        inputs.scheduler_parameters.scheduler_type
    } else {
        cli.scheduler
    };

    let scheduler: Box<dyn ScheduleSolver> = match scheduler_type {
        MilpSchedulerType::DeterministicMilp => {
            Box::new(DeterministicScheduler::new(deterministic_planners(&doc)?))
        }
        MilpSchedulerType::MonolithicStochasticMilp => {
            Box::new(MonolithicStochasticScheduler { planners: sampled_planners(&doc)? })
        }
        MilpSchedulerType::HeuristicApproximationStochastic => {
            Box::new(HeuristicApproximationScheduler {
                planners: sampled_planners(&doc)?,
                selector: Box::new(HeuristicScenarioSelector),
            })
        }
        MilpSchedulerType::GnnHeuristicApproximationStochastic => {
            Box::new(HeuristicApproximationScheduler {
                planners: sampled_planners(&doc)?,
                selector: Box::new(GnnScenarioSelector),
            })
        }
    };

    let bounds = MakespanBounds::estimate(&inputs);
    let alpha = inputs.itags_parameters.alpha;
    let naq = Naq::new(&inputs);
    let tetaq = Tetaq::new(alpha, bounds);
    let tetam = Tetam::new(alpha, bounds);
    let heuristic: &dyn Heuristic = match cli.heuristic {
        HeuristicKind::Tetaq => &tetaq,
        HeuristicKind::Tetam => &tetam,
        HeuristicKind::Apr => &Apr,
        HeuristicKind::Naq => &naq,
    };
    let goal_check: &dyn GoalCheck = match cli.goal_check {
        GoalCheckKind::ZeroApr => &ZeroAprCheck,
        GoalCheckKind::ZeroPos => &ZeroPosCheck,
    };
    let pre_pruning = build_pruning(&cli.prepruning);
    let post_pruning = build_pruning(&cli.postpruning);
    let use_reverse = if cli.config_file {
        inputs.itags_parameters.use_reverse
    } else {
        cli.use_reverse
    };

    let search = Itags::new(
        heuristic,
        goal_check,
        pre_pruning.as_ref(),
        post_pruning.as_ref(),
        scheduler.as_ref(),
    );
    info!(
        "starting ITAGS search over {} tasks, {} robots ({:?} memoization)",
        inputs.num_tasks(),
        inputs.num_robots(),
        cli.memoization
    );
    let (result, stats) = search.search(&inputs, use_reverse);

    let node = match result {
        Ok(node) => node,
        Err(reason) => {
            error!("search failed: {reason}");
            return Err(itags::error::ItagsError::Failure(reason));
        }
    };

    let allocation = node.allocation();
    let schedule = match &node.schedule {
        Some(s) => s.clone(),
        None => scheduler.solve(&allocation, &inputs)?,
    };
    let solution = SolutionDocument::build(&allocation, &schedule, &inputs, stats);
    fs::write(&cli.solution_output_path, serde_json::to_string_pretty(&solution)?)?;
    info!("solution written to {}", cli.solution_output_path.display());
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format);
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
