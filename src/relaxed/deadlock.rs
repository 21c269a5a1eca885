use crate::net::{Net, TransitionId};
use crate::relaxed::cegar::{
    MarkingConstraint, Query, RelaxedSearch, SearchError, SearchOutcome, SearchStats,
};
use crate::relaxed::lp::ConstraintSense;

/// `Σ_{p∈•t} m_p ≤ |•t| − 1` for every transition: each one misses at least
/// one input token.
pub fn deadlock_query(net: &Net) -> Query {
    let constraints = net
        .transition_ids()
        .filter_map(|transition| {
            let terms: Vec<_> = net.preset(transition).map(|place| (place, 1.0)).collect();
            if terms.is_empty() {
                return None;
            }
            let rhs = terms.len() as f64 - 1.0;
            Some(MarkingConstraint {
                terms,
                sense: ConstraintSense::LessEqual,
                rhs,
            })
        })
        .collect();
    Query {
        constraints,
        objective: None,
    }
}

/// Searches for a reachable dead marking. `Exhausted` means the net is
/// deadlock-free.
pub fn find_deadlock(search: &RelaxedSearch<'_>) -> Result<SearchOutcome, SearchError> {
    let net = search.net();
    if let Some(always) = always_enabled(net) {
        log::debug!(
            "transition {} has an empty pre-set; no marking is dead",
            net.transitions[always].id
        );
        return Ok(SearchOutcome::Exhausted {
            stats: SearchStats::default(),
        });
    }
    search.run(&deadlock_query(net))
}

fn always_enabled(net: &Net) -> Option<TransitionId> {
    net.transition_ids()
        .find(|&transition| net.preset(transition).next().is_none())
}
