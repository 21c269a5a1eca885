//! 状态方程松弛 + 反例引导精化.
//!
//! 松弛变量：每个库所一个布尔变量 `m_p`，每个迁移一个非负整数发生次数
//! `σ_t`，约束为状态方程
//! `m_p = M₀(p) + Σ_{p∈t•} σ_t − Σ_{p∈•t} σ_t`。
//! 解出的标识若不在精确可达集中，则加入只排除该点的割平面
//! `Σ_{m_p=0} m_p − Σ_{m_p=1} m_p ≥ 1 − |{p : m_p=1}|` 后重解。
use serde::Serialize;
use thiserror::Error;

use crate::net::{BoolMarking, IndexVec, Net, NetError, PlaceId, TransitionId};
use crate::relaxed::lp::{
    ConstraintSense, IntegerProgram, LinearExpression, OptimizationSense, SolveOutcome,
    SolverError, VariableId, VariableKind,
};
use crate::symbolic::SymbolicReachability;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Net(#[from] NetError),
    #[error(transparent)]
    Solver(#[from] SolverError),
    #[error("the relaxation is unbounded")]
    Unbounded,
    #[error("gave up after excluding {cuts} spurious markings")]
    CutBudgetExceeded { cuts: usize },
}

/// `Σ coefficient·m_p (sense) rhs` over the marking variables.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkingConstraint {
    pub terms: Vec<(PlaceId, f64)>,
    pub sense: ConstraintSense,
    pub rhs: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    pub sense: OptimizationSense,
    pub terms: Vec<(PlaceId, f64)>,
}

/// Extra constraints and an optional objective layered over the state
/// equation. An empty query asks for any reachable marking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub constraints: Vec<MarkingConstraint>,
    pub objective: Option<Objective>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub marking: BoolMarking,
    /// Firing counts the solver used to reach `marking` in the relaxation.
    pub firing_counts: IndexVec<TransitionId, u64>,
    pub objective_value: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchStats {
    pub solver_calls: usize,
    pub cuts: usize,
    /// Excluded markings, in the order they were refuted.
    pub spurious: Vec<BoolMarking>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// A solution that passed the exact membership check.
    Found { candidate: Candidate, stats: SearchStats },
    /// The relaxation became infeasible; no reachable marking satisfies
    /// the query.
    Exhausted { stats: SearchStats },
}

impl SearchOutcome {
    pub fn candidate(&self) -> Option<&Candidate> {
        match self {
            SearchOutcome::Found { candidate, .. } => Some(candidate),
            SearchOutcome::Exhausted { .. } => None,
        }
    }

    pub fn stats(&self) -> &SearchStats {
        match self {
            SearchOutcome::Found { stats, .. } | SearchOutcome::Exhausted { stats } => stats,
        }
    }
}

/// Relaxed search over one net, refined against its exact reachable set.
pub struct RelaxedSearch<'a> {
    net: &'a Net,
    reach: &'a SymbolicReachability,
    max_cuts: Option<usize>,
}

struct Relaxation {
    program: IntegerProgram,
    marks: IndexVec<PlaceId, VariableId>,
    firings: IndexVec<TransitionId, VariableId>,
}

impl<'a> RelaxedSearch<'a> {
    pub fn new(net: &'a Net, reach: &'a SymbolicReachability) -> Self {
        Self {
            net,
            reach,
            max_cuts: None,
        }
    }

    /// Fails with [`SearchError::CutBudgetExceeded`] once `max_cuts`
    /// spurious markings were excluded and another one shows up.
    pub fn with_max_cuts(mut self, max_cuts: Option<usize>) -> Self {
        self.max_cuts = max_cuts;
        self
    }

    pub fn net(&self) -> &'a Net {
        self.net
    }

    /// Builds the state equation from scratch; nothing is shared between
    /// two runs.
    fn relax(&self) -> Result<Relaxation, SearchError> {
        let net = self.net;
        let initial = net.initial_bool_marking()?;
        let places = self.reach.context().places();
        if places != net.places_len() {
            return Err(NetError::MarkingWidth {
                expected: places,
                found: net.places_len(),
            }
            .into());
        }

        let mut program = IntegerProgram::new();
        let marks: IndexVec<PlaceId, VariableId> = net
            .places
            .iter()
            .map(|place| program.add_variable(format!("m_{}", place.id), VariableKind::Binary))
            .collect();
        let firings: IndexVec<TransitionId, VariableId> = net
            .transitions
            .iter()
            .map(|transition| {
                program.add_variable(
                    format!("sigma_{}", transition.id),
                    VariableKind::NonNegativeInteger,
                )
            })
            .collect();

        // m_p - Σ_{producers} σ_t + Σ_{consumers} σ_t = M₀(p)
        for place in net.place_ids() {
            let mut expr = LinearExpression::from_variable(marks[place]);
            for transition in net.producers(place) {
                expr.add_term(-1.0, firings[transition]);
            }
            for transition in net.consumers(place) {
                expr.add_term(1.0, firings[transition]);
            }
            let rhs = if initial.is_marked(place) { 1.0 } else { 0.0 };
            program.add_constraint(expr, ConstraintSense::Equal, rhs)?;
        }

        Ok(Relaxation {
            program,
            marks,
            firings,
        })
    }

    fn lower(
        marks: &IndexVec<PlaceId, VariableId>,
        terms: &[(PlaceId, f64)],
    ) -> Result<LinearExpression, NetError> {
        let mut expr = LinearExpression::new(0.0);
        for &(place, coefficient) in terms {
            let variable = marks
                .get(place)
                .ok_or_else(|| NetError::UnknownPlace(place.to_string()))?;
            expr.add_term(coefficient, *variable);
        }
        Ok(expr)
    }

    pub fn run(&self, query: &Query) -> Result<SearchOutcome, SearchError> {
        let Relaxation {
            mut program,
            marks,
            firings,
        } = self.relax()?;

        for constraint in &query.constraints {
            let expr = Self::lower(&marks, &constraint.terms)?;
            program.add_constraint(expr, constraint.sense, constraint.rhs)?;
        }
        if let Some(objective) = &query.objective {
            let expr = Self::lower(&marks, &objective.terms)?;
            program.set_objective(expr, objective.sense)?;
        }
        log::trace!("relaxed program:\n{program}");

        let mut stats = SearchStats::default();
        loop {
            stats.solver_calls += 1;
            let assignment = match program.solve()? {
                SolveOutcome::Optimal(assignment) => assignment,
                SolveOutcome::Infeasible => {
                    log::debug!(
                        "relaxation infeasible after {} cuts",
                        stats.cuts
                    );
                    return Ok(SearchOutcome::Exhausted { stats });
                }
                SolveOutcome::Unbounded => return Err(SearchError::Unbounded),
            };

            let marking = BoolMarking::new(
                marks
                    .iter()
                    .map(|&variable| assignment.is_set(variable))
                    .collect(),
            );

            if self.reach.contains(&marking)? {
                log::debug!(
                    "accepted {marking:?} after {} solver calls",
                    stats.solver_calls
                );
                let firing_counts = firings
                    .iter()
                    .map(|&variable| assignment.integer(variable).max(0) as u64)
                    .collect();
                let objective_value = query
                    .objective
                    .as_ref()
                    .map(|objective| marked_value(&marking, &objective.terms));
                let candidate = Candidate {
                    marking,
                    firing_counts,
                    objective_value,
                };
                return Ok(SearchOutcome::Found { candidate, stats });
            }

            if self.max_cuts.is_some_and(|limit| stats.cuts >= limit) {
                return Err(SearchError::CutBudgetExceeded { cuts: stats.cuts });
            }
            log::debug!("excluding spurious {marking:?}");
            program.add_constraint(
                exclusion_cut(&marks, &marking),
                ConstraintSense::GreaterEqual,
                1.0 - marking.marked_places().count() as f64,
            )?;
            stats.cuts += 1;
            stats.spurious.push(marking);
        }
    }
}

/// `Σ coefficient` over the places `marking` marks.
fn marked_value(marking: &BoolMarking, terms: &[(PlaceId, f64)]) -> f64 {
    terms
        .iter()
        .filter(|&&(place, _)| marking.is_marked(place))
        .fold(0.0, |acc, &(_, coefficient)| acc + coefficient)
}

/// Left-hand side of the cut removing exactly `marking`: positive on the
/// empty places, negative on the marked ones.
fn exclusion_cut(marks: &IndexVec<PlaceId, VariableId>, marking: &BoolMarking) -> LinearExpression {
    let mut expr = LinearExpression::new(0.0);
    for (place, marked) in marking.iter() {
        let coefficient = if marked { -1.0 } else { 1.0 };
        expr.add_term(coefficient, marks[place]);
    }
    expr
}
