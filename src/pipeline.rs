//! 顺序执行的分析流水线：显式 → 符号 → 死锁 → 优化.
use itertools::Itertools;
use thiserror::Error;

use crate::analysis::StateSpace;
use crate::config::AnalysisConfig;
use crate::net::{BoolMarking, Net, NamedMarking};
use crate::relaxed::{self, RelaxedSearch, SearchError, SearchOutcome};
use crate::report::{
    AnalysisReport, DeadlockSummary, ExplicitSummary, OptimumSummary, Phase, PhaseEvent,
    ReportSink, SymbolicSummary,
};
use crate::symbolic::{SymbolicError, SymbolicReachability};
use crate::util::{Measurement, measured};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("symbolic phase failed: {0}")]
    Symbolic(#[from] SymbolicError),
    #[error("{phase} phase failed: {source}")]
    Search {
        phase: Phase,
        #[source]
        source: SearchError,
    },
    #[error("the {0} phase needs the symbolic reachable set; enable `symbolic`")]
    SymbolicRequired(Phase),
}

pub struct Analyzer<'a> {
    net: &'a Net,
    config: AnalysisConfig,
}

impl<'a> Analyzer<'a> {
    pub fn new(net: &'a Net, config: AnalysisConfig) -> Self {
        Self { net, config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Runs the enabled phases one after another. Each phase is reported to
    /// `sink` as soon as it completes.
    pub fn run(
        &self,
        mut sink: Option<&mut dyn ReportSink>,
    ) -> Result<AnalysisReport, AnalysisError> {
        let net = self.net;
        let config = &self.config;
        let mut report = AnalysisReport::new(net.places_len(), net.transitions_len());
        let mut emit = |report: &mut AnalysisReport, phase, measurement: Measurement, summary| {
            let event = PhaseEvent {
                phase,
                elapsed: measurement.elapsed,
                peak_memory_kb: measurement.peak_memory_kb,
                summary,
            };
            if let Some(sink) = sink.as_deref_mut() {
                sink.phase_finished(&event);
            }
            report.phases.push(event);
        };

        let space = if config.explicit {
            let explorer = config.explorer();
            let (space, measurement) = measured(|| StateSpace::with_config(net, &explorer));
            let stats = space.stats();
            let one_bounded = space.is_one_bounded();
            if !one_bounded {
                log::warn!("net is not 1-bounded; the boolean abstraction does not apply");
            }
            emit(
                &mut report,
                Phase::Explicit,
                measurement,
                format!(
                    "{} markings, {} edges, {} dead{}",
                    stats.state_count,
                    stats.edge_count,
                    stats.deadlock_count,
                    if stats.truncated { " (truncated)" } else { "" }
                ),
            );
            report.explicit = Some(ExplicitSummary { stats, one_bounded });
            Some(space)
        } else {
            None
        };

        let reach = if config.symbolic {
            let (reach, measurement) = measured(|| SymbolicReachability::compute(net));
            let reach = reach?;
            let summary = SymbolicSummary {
                reachable_markings: reach.count(),
                iterations: reach.iterations(),
                bdd_nodes: reach.node_count(),
            };
            if let Some(explicit) = &report.explicit {
                if !explicit.stats.truncated
                    && explicit.one_bounded
                    && explicit.stats.state_count != summary.reachable_markings
                {
                    log::warn!(
                        "explicit and symbolic reachable sets differ: {} vs {} markings",
                        explicit.stats.state_count,
                        summary.reachable_markings
                    );
                }
            }
            emit(
                &mut report,
                Phase::Symbolic,
                measurement,
                format!(
                    "{} reachable markings after {} iterations",
                    summary.reachable_markings, summary.iterations
                ),
            );
            report.symbolic = Some(summary);
            Some(reach)
        } else {
            None
        };

        if config.deadlock {
            let reach = reach
                .as_ref()
                .ok_or(AnalysisError::SymbolicRequired(Phase::Deadlock))?;
            let search = RelaxedSearch::new(net, reach).with_max_cuts(config.max_cuts);
            let (outcome, measurement) = measured(|| relaxed::find_deadlock(&search));
            let outcome = outcome.map_err(|source| AnalysisError::Search {
                phase: Phase::Deadlock,
                source,
            })?;

            let marking = self.named(outcome.candidate().map(|c| &c.marking));
            let trace: Option<Vec<String>> = match (&space, outcome.candidate()) {
                (Some(space), Some(candidate)) => space
                    .trace_to(&candidate.marking.to_marking())
                    .map(|steps| {
                        steps
                            .into_iter()
                            .map(|t| net.transitions[t].id.clone())
                            .collect()
                    }),
                _ => None,
            };
            let summary = match &outcome {
                SearchOutcome::Found { candidate, stats } => match &trace {
                    Some(steps) if !steps.is_empty() => format!(
                        "deadlock at {:?} via {} after {} cuts",
                        candidate.marking,
                        steps.iter().join(" -> "),
                        stats.cuts
                    ),
                    _ => format!(
                        "deadlock at {:?} after {} cuts",
                        candidate.marking, stats.cuts
                    ),
                },
                SearchOutcome::Exhausted { stats } => {
                    format!("no deadlock ({} cuts)", stats.cuts)
                }
            };
            emit(&mut report, Phase::Deadlock, measurement, summary);
            report.deadlock = Some(DeadlockSummary {
                has_deadlock: outcome.candidate().is_some(),
                marking,
                trace,
                search: outcome.stats().clone(),
            });
        }

        if config.optimize {
            let reach = reach
                .as_ref()
                .ok_or(AnalysisError::SymbolicRequired(Phase::Optimize))?;
            let search = RelaxedSearch::new(net, reach).with_max_cuts(config.max_cuts);
            let (outcome, measurement) =
                measured(|| relaxed::optimize(&search, &config.weights));
            let outcome = outcome.map_err(|source| AnalysisError::Search {
                phase: Phase::Optimize,
                source,
            })?;

            let value = outcome.candidate().and_then(|c| c.objective_value);
            let summary = match value {
                Some(value) => format!(
                    "optimum {} after {} cuts",
                    value,
                    outcome.stats().cuts
                ),
                None => "no feasible marking".to_string(),
            };
            emit(&mut report, Phase::Optimize, measurement, summary);
            report.optimum = Some(OptimumSummary {
                value,
                marking: self.named(outcome.candidate().map(|c| &c.marking)),
                search: outcome.stats().clone(),
            });
        }

        Ok(report)
    }

    fn named(&self, marking: Option<&BoolMarking>) -> Option<NamedMarking> {
        marking.and_then(|marking| self.net.decode(&marking.to_marking()).ok())
    }
}
