//! 分析阶段事件与最终报告.
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use serde::Serialize;

use crate::analysis::StateSpaceStats;
use crate::net::NamedMarking;
use crate::relaxed::SearchStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Explicit,
    Symbolic,
    Deadlock,
    Optimize,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Explicit => "explicit",
            Phase::Symbolic => "symbolic",
            Phase::Deadlock => "deadlock",
            Phase::Optimize => "optimize",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseEvent {
    pub phase: Phase,
    pub elapsed: Duration,
    pub peak_memory_kb: Option<u64>,
    pub summary: String,
}

/// Receives one event per finished phase.
pub trait ReportSink {
    fn phase_finished(&mut self, event: &PhaseEvent);
}

/// Forwards phase events to the `log` facade.
#[derive(Debug, Default)]
pub struct LogSink;

impl ReportSink for LogSink {
    fn phase_finished(&mut self, event: &PhaseEvent) {
        match event.peak_memory_kb {
            Some(kb) => log::info!(
                "[{}] {} ({:?}, peak {} KB)",
                event.phase,
                event.summary,
                event.elapsed,
                kb
            ),
            None => log::info!("[{}] {} ({:?})", event.phase, event.summary, event.elapsed),
        }
    }
}

#[derive(Debug, Default)]
pub struct CollectSink {
    pub events: Vec<PhaseEvent>,
}

impl ReportSink for CollectSink {
    fn phase_finished(&mut self, event: &PhaseEvent) {
        self.events.push(event.clone());
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplicitSummary {
    #[serde(flatten)]
    pub stats: StateSpaceStats,
    /// Whether every explored marking fits the boolean abstraction.
    pub one_bounded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolicSummary {
    pub reachable_markings: usize,
    pub iterations: usize,
    pub bdd_nodes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeadlockSummary {
    pub has_deadlock: bool,
    pub marking: Option<NamedMarking>,
    /// Firing sequence leading to `marking`, when the explicit phase ran.
    pub trace: Option<Vec<String>>,
    pub search: SearchStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimumSummary {
    pub value: Option<f64>,
    pub marking: Option<NamedMarking>,
    pub search: SearchStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub places: usize,
    pub transitions: usize,
    pub phases: Vec<PhaseEvent>,
    pub explicit: Option<ExplicitSummary>,
    pub symbolic: Option<SymbolicSummary>,
    pub deadlock: Option<DeadlockSummary>,
    pub optimum: Option<OptimumSummary>,
}

impl AnalysisReport {
    pub fn new(places: usize, transitions: usize) -> Self {
        Self {
            places,
            transitions,
            phases: Vec::new(),
            explicit: None,
            symbolic: None,
            deadlock: None,
            optimum: None,
        }
    }

    pub fn total_time(&self) -> Duration {
        self.phases.iter().map(|event| event.elapsed).sum()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Writes the text report to `path` and the JSON form next to it.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let path = path.as_ref();
        let mut file = File::create(path)?;
        writeln!(file, "{}", self)?;

        let mut json_path = path.as_os_str().to_owned();
        json_path.push(".json");
        let json = self.to_json().map_err(std::io::Error::other)?;
        std::fs::write(json_path, json.as_bytes())?;

        Ok(())
    }
}

fn write_marking(f: &mut fmt::Formatter<'_>, marking: &NamedMarking) -> fmt::Result {
    writeln!(f, "标识:")?;
    for (place, tokens) in marking {
        writeln!(f, "  {}: {}", place, tokens)?;
    }
    Ok(())
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Petri 网分析报告")?;
        writeln!(f, "库所数: {}, 迁移数: {}", self.places, self.transitions)?;
        writeln!(f, "分析时间: {:?}", self.total_time())?;

        if let Some(explicit) = &self.explicit {
            writeln!(f, "\n显式状态空间:")?;
            writeln!(f, "可达状态数: {}", explicit.stats.state_count)?;
            writeln!(f, "总转换数: {}", explicit.stats.edge_count)?;
            writeln!(f, "死锁状态数: {}", explicit.stats.deadlock_count)?;
            writeln!(f, "1-有界: {}", explicit.one_bounded)?;
            if explicit.stats.truncated {
                writeln!(f, "（已达到状态上限，结果不完整）")?;
            }
        }

        if let Some(symbolic) = &self.symbolic {
            writeln!(f, "\n符号可达集:")?;
            writeln!(f, "可达标识数: {}", symbolic.reachable_markings)?;
            writeln!(f, "迭代次数: {}", symbolic.iterations)?;
            writeln!(f, "BDD 节点数: {}", symbolic.bdd_nodes)?;
        }

        if let Some(deadlock) = &self.deadlock {
            writeln!(f, "\n是否存在死锁: {}", deadlock.has_deadlock)?;
            if let Some(marking) = &deadlock.marking {
                write_marking(f, marking)?;
            }
            if let Some(trace) = &deadlock.trace {
                writeln!(f, "死锁路径:")?;
                for (step, transition) in trace.iter().enumerate() {
                    writeln!(f, "  步骤 {}: {}", step + 1, transition)?;
                }
            }
            writeln!(
                f,
                "求解次数: {}, 排除伪解: {}",
                deadlock.search.solver_calls, deadlock.search.cuts
            )?;
        }

        if let Some(optimum) = &self.optimum {
            match optimum.value {
                Some(value) => writeln!(f, "\n最优目标值: {}", value)?,
                None => writeln!(f, "\n无可行标识")?,
            }
            if let Some(marking) = &optimum.marking {
                write_marking(f, marking)?;
            }
            writeln!(
                f,
                "求解次数: {}, 排除伪解: {}",
                optimum.search.solver_calls, optimum.search.cuts
            )?;
        }

        if !self.phases.is_empty() {
            writeln!(f, "\n阶段:")?;
            for event in &self.phases {
                write!(f, "  {}: {} ({:?}", event.phase, event.summary, event.elapsed)?;
                if let Some(kb) = event.peak_memory_kb {
                    write!(f, ", {} KB", kb)?;
                }
                writeln!(f, ")")?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> AnalysisReport {
        let mut report = AnalysisReport::new(3, 2);
        report.phases.push(PhaseEvent {
            phase: Phase::Symbolic,
            elapsed: Duration::from_millis(3),
            peak_memory_kb: Some(2048),
            summary: "3 reachable markings".to_string(),
        });
        report.symbolic = Some(SymbolicSummary {
            reachable_markings: 3,
            iterations: 3,
            bdd_nodes: 5,
        });
        let mut marking = NamedMarking::new();
        marking.insert("P1".to_string(), 0);
        marking.insert("P3".to_string(), 1);
        report.deadlock = Some(DeadlockSummary {
            has_deadlock: true,
            marking: Some(marking),
            trace: Some(vec!["T1".to_string(), "T2".to_string()]),
            search: SearchStats::default(),
        });
        report
    }

    #[test]
    fn text_report_lists_findings() {
        let text = sample_report().to_string();
        assert!(text.contains("可达标识数: 3"));
        assert!(text.contains("是否存在死锁: true"));
        assert!(text.contains("  P3: 1"));
        assert!(text.contains("步骤 2: T2"));
        assert!(text.contains("symbolic: 3 reachable markings"));
    }

    #[test]
    fn save_writes_text_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        sample_report().save_to_file(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Petri 网分析报告"));
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("report.txt.json")).unwrap())
                .unwrap();
        assert_eq!(json["symbolic"]["reachable_markings"], 3);
        assert_eq!(json["deadlock"]["marking"]["P3"], 1);
        assert_eq!(json["phases"][0]["phase"], "symbolic");
    }

    #[test]
    fn collect_sink_keeps_events_in_order() {
        let mut sink = CollectSink::default();
        for phase in [Phase::Explicit, Phase::Symbolic] {
            sink.phase_finished(&PhaseEvent {
                phase,
                elapsed: Duration::ZERO,
                peak_memory_kb: None,
                summary: String::new(),
            });
        }
        let phases: Vec<_> = sink.events.iter().map(|event| event.phase).collect();
        assert_eq!(phases, vec![Phase::Explicit, Phase::Symbolic]);
    }
}
