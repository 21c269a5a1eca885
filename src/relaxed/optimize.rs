use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::net::{IndexVec, Net, NetError, PlaceId};
use crate::relaxed::cegar::{Objective, Query, RelaxedSearch, SearchError, SearchOutcome};
use crate::relaxed::lp::OptimizationSense;

/// Objective weights by place identifier. Places without an entry weigh
/// `default`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
    pub default: u64,
    pub places: IndexMap<String, u64>,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            default: 1,
            places: IndexMap::new(),
        }
    }
}

impl Weights {
    pub fn uniform(default: u64) -> Self {
        Self {
            default,
            places: IndexMap::new(),
        }
    }

    pub fn with(mut self, place: impl Into<String>, weight: u64) -> Self {
        self.places.insert(place.into(), weight);
        self
    }

    /// Weight of every place in canonical order. Unknown identifiers are
    /// rejected instead of silently ignored.
    pub fn resolve(&self, net: &Net) -> Result<IndexVec<PlaceId, u64>, NetError> {
        let mut resolved = IndexVec::from_elem(self.default, net.places_len());
        for (id, &weight) in &self.places {
            let place = net
                .place_id(id)
                .ok_or_else(|| NetError::UnknownPlace(id.clone()))?;
            resolved[place] = weight;
        }
        Ok(resolved)
    }
}

pub fn objective(net: &Net, weights: &Weights) -> Result<Objective, NetError> {
    let terms = weights
        .resolve(net)?
        .iter_enumerated()
        .filter(|(_, weight)| **weight > 0)
        .map(|(place, &weight)| (place, weight as f64))
        .collect();
    Ok(Objective {
        sense: OptimizationSense::Maximize,
        terms,
    })
}

/// Reachable marking maximising `Σ weight(p)·m_p`. Among several
/// maximisers, the first one the solver proposes that is actually reachable
/// is returned; its value is optimal either way.
pub fn optimize(search: &RelaxedSearch<'_>, weights: &Weights) -> Result<SearchOutcome, SearchError> {
    let query = Query {
        constraints: Vec::new(),
        objective: Some(objective(search.net(), weights)?),
    };
    search.run(&query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::StateSpace;
    use crate::fixtures::{chain_net, phantom_net, random_safe_net};
    use crate::symbolic::SymbolicReachability;

    fn best_explicit(net: &Net, weights: &Weights) -> u64 {
        let resolved = weights.resolve(net).unwrap();
        StateSpace::explore(net)
            .markings()
            .map(|marking| marking.iter().map(|(p, tokens)| tokens * resolved[p]).sum::<u64>())
            .max()
            .unwrap()
    }

    #[test]
    fn chain_optimum_is_one_token() {
        let net = chain_net();
        let reach = SymbolicReachability::compute(&net).unwrap();
        let outcome = optimize(&RelaxedSearch::new(&net, &reach), &Weights::default()).unwrap();

        let candidate = outcome.candidate().unwrap();
        assert_eq!(candidate.objective_value, Some(1.0));
        assert!(reach.contains(&candidate.marking).unwrap());
        assert_eq!(outcome.stats().cuts, 0);
    }

    #[test]
    fn weights_steer_the_optimum() {
        let net = chain_net();
        let reach = SymbolicReachability::compute(&net).unwrap();
        let weights = Weights::uniform(0).with("P2", 5).with("P3", 2);
        let outcome = optimize(&RelaxedSearch::new(&net, &reach), &weights).unwrap();

        let candidate = outcome.candidate().unwrap();
        assert_eq!(candidate.objective_value, Some(5.0));
        assert!(candidate.marking.is_marked(net.place_id("P2").unwrap()));
    }

    #[test]
    fn unknown_weight_identifier_is_an_error() {
        let net = chain_net();
        let reach = SymbolicReachability::compute(&net).unwrap();
        let weights = Weights::default().with("P9", 3);
        let result = optimize(&RelaxedSearch::new(&net, &reach), &weights);
        assert!(matches!(
            result,
            Err(SearchError::Net(NetError::UnknownPlace(id))) if id == "P9"
        ));
    }

    #[test]
    fn spurious_optimum_is_refined_away() {
        let net = phantom_net();
        let reach = SymbolicReachability::compute(&net).unwrap();
        let outcome = optimize(&RelaxedSearch::new(&net, &reach), &Weights::default()).unwrap();

        assert_eq!(outcome.candidate().unwrap().objective_value, Some(1.0));
        assert_eq!(outcome.stats().cuts, 1);
        assert_eq!(best_explicit(&net, &Weights::default()), 1);
    }

    #[test]
    fn matches_exhaustive_maximum() {
        for seed in 0..24 {
            let net = random_safe_net(seed);
            let reach = SymbolicReachability::compute(&net).unwrap();
            let mut weights = Weights::uniform(1);
            for (i, place) in net.places.iter().enumerate() {
                weights = weights.with(place.id.clone(), (i as u64 * 7 + seed) % 5);
            }

            let outcome = optimize(&RelaxedSearch::new(&net, &reach), &weights).unwrap();
            let candidate = outcome.candidate().unwrap();
            let value = candidate.objective_value.unwrap().round() as u64;
            assert_eq!(value, best_explicit(&net, &weights), "seed {seed}");
            assert!(reach.contains(&candidate.marking).unwrap(), "seed {seed}");
            assert!(outcome.stats().cuts < 1usize << net.places_len(), "seed {seed}");
        }
    }
}
