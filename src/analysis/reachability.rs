//! 显式可达图：从初始标识出发的广度优先枚举，作为符号引擎的基准与对照。
use std::collections::hash_map::Entry;

use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableGraph;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::net::ids::TransitionId;
use crate::net::structure::Marking;
use crate::net::Net;

#[derive(Debug, Clone, Default)]
pub struct ExplorerConfig {
    /// 最多探索的状态数量. None 表示不设上限（无界网将不终止）.
    pub state_limit: Option<usize>,
    /// 每层的后继计算交给 rayon 并行执行，结果与串行一致.
    pub parallel: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateSpaceStats {
    pub state_count: usize,
    pub edge_count: usize,
    pub deadlock_count: usize,
    pub truncated: bool,
}

/// Reachability graph of a net: one node per reachable marking, one edge
/// per firing.
#[derive(Debug)]
pub struct StateSpace {
    pub graph: StableGraph<Marking, TransitionId>,
    pub initial: NodeIndex,
    /// Dead markings in discovery order.
    pub deadlocks: Vec<NodeIndex>,
    pub truncated: bool,
    markings: FxHashMap<Marking, NodeIndex>,
    parents: FxHashMap<NodeIndex, (NodeIndex, TransitionId)>,
}

impl StateSpace {
    pub fn explore(net: &Net) -> Self {
        Self::with_config(net, &ExplorerConfig::default())
    }

    /// Breadth-first search processed one layer at a time. Nodes are
    /// admitted in (layer, source, transition) order, so node numbering and
    /// parent links do not depend on `config.parallel`.
    pub fn with_config(net: &Net, config: &ExplorerConfig) -> Self {
        let mut graph = StableGraph::new();
        let mut markings = FxHashMap::default();
        let initial_marking = net.initial_marking();
        let initial = graph.add_node(initial_marking.clone());
        markings.insert(initial_marking, initial);

        let mut space = StateSpace {
            graph,
            initial,
            deadlocks: Vec::new(),
            truncated: false,
            markings,
            parents: FxHashMap::default(),
        };

        let mut layer = vec![initial];
        let mut depth = 0usize;
        while !layer.is_empty() {
            let expanded: Vec<Vec<(TransitionId, Marking)>> = if config.parallel {
                layer
                    .par_iter()
                    .map(|&node| successors(net, &space.graph[node]))
                    .collect()
            } else {
                layer
                    .iter()
                    .map(|&node| successors(net, &space.graph[node]))
                    .collect()
            };

            let mut next_layer = Vec::new();
            for (&source, successors) in layer.iter().zip(expanded) {
                if successors.is_empty() {
                    space.deadlocks.push(source);
                    continue;
                }
                for (transition, marking) in successors {
                    let target = match space.markings.entry(marking) {
                        Entry::Occupied(entry) => *entry.get(),
                        Entry::Vacant(entry) => {
                            if let Some(limit) = config.state_limit {
                                if space.graph.node_count() >= limit {
                                    space.truncated = true;
                                    continue;
                                }
                            }
                            let index = space.graph.add_node(entry.key().clone());
                            entry.insert(index);
                            space.parents.insert(index, (source, transition));
                            next_layer.push(index);
                            index
                        }
                    };
                    space.graph.add_edge(source, target, transition);
                }
            }

            depth += 1;
            log::debug!(
                "explicit layer {depth}: {} new states, {} total",
                next_layer.len(),
                space.graph.node_count()
            );
            layer = next_layer;
        }

        if space.truncated {
            log::warn!(
                "explicit exploration stopped at the state limit of {} markings",
                space.graph.node_count()
            );
        }
        space
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains(&self, marking: &Marking) -> bool {
        self.markings.contains_key(marking)
    }

    pub fn node(&self, marking: &Marking) -> Option<NodeIndex> {
        self.markings.get(marking).copied()
    }

    /// Every reachable marking, in discovery order.
    pub fn markings(&self) -> impl Iterator<Item = &Marking> {
        self.graph.node_indices().map(|index| &self.graph[index])
    }

    /// True when no explored marking holds more than one token in a place.
    /// Only conclusive when the exploration was not truncated.
    pub fn is_one_bounded(&self) -> bool {
        self.markings().all(|marking| marking.0.iter().all(|&tokens| tokens <= 1))
    }

    pub fn deadlock_markings(&self) -> impl Iterator<Item = &Marking> {
        self.deadlocks.iter().map(|&index| &self.graph[index])
    }

    /// Shortest firing sequence leading from the initial marking to
    /// `marking`, if it was reached.
    pub fn trace_to(&self, marking: &Marking) -> Option<Vec<TransitionId>> {
        let mut current = self.node(marking)?;
        let mut steps = Vec::new();
        while let Some(&(parent, transition)) = self.parents.get(&current) {
            steps.push(transition);
            current = parent;
        }
        debug_assert_eq!(current, self.initial);
        steps.reverse();
        Some(steps)
    }

    pub fn stats(&self) -> StateSpaceStats {
        StateSpaceStats {
            state_count: self.graph.node_count(),
            edge_count: self.graph.edge_count(),
            deadlock_count: self.deadlocks.len(),
            truncated: self.truncated,
        }
    }
}

fn successors(net: &Net, marking: &Marking) -> Vec<(TransitionId, Marking)> {
    net.enabled_transitions(marking)
        .into_iter()
        .filter_map(|transition| {
            net.fire(transition, marking)
                .ok()
                .map(|next| (transition, next))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::chain_net;
    use crate::net::index_vec::IndexVec;

    fn marking(tokens: &[u64]) -> Marking {
        Marking(IndexVec::from(tokens.to_vec()))
    }

    /// Two places swapping a single token forever.
    fn ring_net() -> Net {
        let mut net = Net::empty();
        net.add_place("a", "a", 1);
        net.add_place("b", "b", 0);
        net.add_transition("ab", "ab");
        net.add_transition("ba", "ba");
        net.add_arc("a", "ab");
        net.add_arc("ab", "b");
        net.add_arc("b", "ba");
        net.add_arc("ba", "a");
        net
    }

    #[test]
    fn chain_has_three_markings_and_one_deadlock() {
        let net = chain_net();
        let space = StateSpace::explore(&net);

        assert_eq!(space.len(), 3);
        for tokens in [[1, 0, 0], [0, 1, 0], [0, 0, 1]] {
            assert!(space.contains(&marking(&tokens)));
        }
        let dead: Vec<_> = space.deadlock_markings().cloned().collect();
        assert_eq!(dead, vec![marking(&[0, 0, 1])]);

        let t1 = net.transition_id("T1").unwrap();
        let t2 = net.transition_id("T2").unwrap();
        assert_eq!(space.trace_to(&marking(&[0, 0, 1])), Some(vec![t1, t2]));
        assert_eq!(space.trace_to(&net.initial_marking()), Some(vec![]));
        assert_eq!(space.trace_to(&marking(&[1, 1, 1])), None);
        assert!(space.is_one_bounded());
    }

    #[test]
    fn cycles_terminate_without_deadlock() {
        let space = StateSpace::explore(&ring_net());
        let stats = space.stats();
        assert_eq!(stats.state_count, 2);
        assert_eq!(stats.edge_count, 2);
        assert_eq!(stats.deadlock_count, 0);
        assert!(!stats.truncated);
    }

    #[test]
    fn state_limit_truncates_unbounded_net() {
        let mut net = Net::empty();
        net.add_place("p", "p", 0);
        net.add_transition("gen", "gen");
        net.add_arc("gen", "p");

        let config = ExplorerConfig {
            state_limit: Some(5),
            parallel: false,
        };
        let space = StateSpace::with_config(&net, &config);
        assert!(space.truncated);
        assert_eq!(space.len(), 5);
        assert!(!space.is_one_bounded());
    }

    #[test]
    fn parallel_layers_match_sequential_order() {
        let mut net = Net::empty();
        for i in 0..4 {
            net.add_place(format!("idle{i}"), "idle", 1);
            net.add_place(format!("busy{i}"), "busy", 0);
            net.add_transition(format!("start{i}"), "start");
            net.add_transition(format!("stop{i}"), "stop");
            net.add_arc(&format!("idle{i}"), &format!("start{i}"));
            net.add_arc(&format!("start{i}"), &format!("busy{i}"));
            net.add_arc(&format!("busy{i}"), &format!("stop{i}"));
            net.add_arc(&format!("stop{i}"), &format!("idle{i}"));
        }

        let sequential = StateSpace::explore(&net);
        let parallel = StateSpace::with_config(
            &net,
            &ExplorerConfig {
                state_limit: None,
                parallel: true,
            },
        );

        assert_eq!(sequential.len(), 16);
        assert!(sequential.markings().eq(parallel.markings()));
        assert_eq!(sequential.stats(), parallel.stats());
    }
}
