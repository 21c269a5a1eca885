use biodivine_lib_bdd::{Bdd, BddValuation, BddVariable, BddVariableSet, BddVariableSetBuilder};

use crate::net::{BoolMarking, Idx, IndexVec, Net, NetError, PlaceId, TransitionId};
use crate::symbolic::{MAX_PLACES, SymbolicError};

/// Variable layout and transition relations of one net.
///
/// Built once per net; the relations are kept so every image computation
/// reuses them.
pub struct SymbolicContext {
    variables: BddVariableSet,
    current: IndexVec<PlaceId, BddVariable>,
    next: IndexVec<PlaceId, BddVariable>,
    relations: IndexVec<TransitionId, Bdd>,
    relation: Bdd,
    /// ⋀_{p∈•t} x_p for every transition.
    enabled: IndexVec<TransitionId, Bdd>,
    /// t• \ •t: places a firing of `t` marks without first emptying them.
    produced_only: IndexVec<TransitionId, Vec<PlaceId>>,
    /// ⋀ (x ↔ x'), used to move a function from primed to unprimed variables.
    identity: Bdd,
    /// ⋀ ¬x', pins the primed half of an assignment during enumeration.
    next_cleared: Bdd,
}

impl SymbolicContext {
    pub fn new(net: &Net) -> Result<Self, SymbolicError> {
        let places = net.places_len();
        if places > MAX_PLACES {
            return Err(SymbolicError::TooManyPlaces {
                places,
                limit: MAX_PLACES,
            });
        }

        let mut builder = BddVariableSetBuilder::new();
        let mut current = IndexVec::new();
        let mut next = IndexVec::new();
        for place in net.place_ids() {
            let i = place.index();
            current.push(builder.make_variable(&format!("x{i}")));
            next.push(builder.make_variable(&format!("x{i}_next")));
        }
        let variables = builder.build();

        let mut identity = variables.mk_true();
        let mut next_cleared = variables.mk_true();
        for place in net.place_ids() {
            let unchanged = variables
                .mk_var(current[place])
                .iff(&variables.mk_var(next[place]));
            identity = identity.and(&unchanged);
            next_cleared = next_cleared.and(&variables.mk_not_var(next[place]));
        }

        let mut context = SymbolicContext {
            relation: variables.mk_false(),
            variables,
            current,
            next,
            relations: IndexVec::new(),
            enabled: IndexVec::new(),
            produced_only: IndexVec::new(),
            identity,
            next_cleared,
        };

        for transition in net.transition_ids() {
            let relation = context.build_relation(net, transition);
            context.relation = context.relation.or(&relation);
            context.relations.push(relation);

            let enabled = net
                .preset(transition)
                .fold(context.variables.mk_true(), |acc, place| {
                    acc.and(&context.variables.mk_var(context.current[place]))
                });
            context.enabled.push(enabled);
            context.produced_only.push(
                net.postset(transition)
                    .filter(|&place| !net.in_preset(place, transition))
                    .collect(),
            );
        }
        log::debug!(
            "symbolic context: {} places, {} transitions, relation has {} nodes",
            places,
            context.relations.len(),
            context.relation.size()
        );
        Ok(context)
    }

    fn build_relation(&self, net: &Net, transition: TransitionId) -> Bdd {
        let mut relation = self.variables.mk_true();
        for place in net.preset(transition) {
            relation = relation.and(&self.variables.mk_var(self.current[place]));
        }
        for (place, &next) in self.next.iter_enumerated() {
            let consumed = net.in_preset(place, transition);
            let produced = net.in_postset(place, transition);
            let frame = match (consumed, produced) {
                (true, false) => self.variables.mk_not_var(next),
                (false, true) => self.variables.mk_var(next),
                _ => self
                    .variables
                    .mk_var(self.current[place])
                    .iff(&self.variables.mk_var(next)),
            };
            relation = relation.and(&frame);
        }
        relation
    }

    pub fn places(&self) -> usize {
        self.current.len()
    }

    pub fn variables(&self) -> &BddVariableSet {
        &self.variables
    }

    pub fn empty(&self) -> Bdd {
        self.variables.mk_false()
    }

    /// First transition and place such that some marking in `states`
    /// enables the transition while the place already holds its token.
    /// Firing there would put two tokens on the place.
    pub fn find_overflow(&self, states: &Bdd) -> Option<(TransitionId, PlaceId)> {
        for (transition, enabled) in self.enabled.iter_enumerated() {
            let firing = states.and(enabled);
            if firing.is_false() {
                continue;
            }
            for &place in &self.produced_only[transition] {
                let marked = self.variables.mk_var(self.current[place]);
                if !firing.and(&marked).is_false() {
                    return Some((transition, place));
                }
            }
        }
        None
    }

    /// Number of markings in `states`, which must only mention
    /// current-state variables.
    pub fn cardinality(&self, states: &Bdd) -> f64 {
        states.and(&self.next_cleared).cardinality()
    }

    /// Minterm of `marking` over the current-state variables.
    pub fn encode(&self, marking: &BoolMarking) -> Result<Bdd, NetError> {
        if marking.len() != self.places() {
            return Err(NetError::MarkingWidth {
                expected: self.places(),
                found: marking.len(),
            });
        }
        Ok(marking
            .iter()
            .fold(self.variables.mk_true(), |acc, (place, marked)| {
                acc.and(&self.variables.mk_literal(self.current[place], marked))
            }))
    }

    pub fn transition_relation(&self, transition: TransitionId) -> Option<&Bdd> {
        self.relations.get(transition)
    }

    /// Disjunction of every transition relation.
    pub fn relation(&self) -> &Bdd {
        &self.relation
    }

    /// One-step successors of `states`, over the current-state variables.
    pub fn image(&self, states: &Bdd) -> Bdd {
        let successors = states.and(&self.relation).exists(self.current.as_slice());
        self.rename_to_current(&successors)
    }

    /// Substitutes `x` for `x'` in a function over the primed variables,
    /// as the relational product `∃x'. f ∧ ⋀(x ↔ x')`.
    pub fn rename_to_current(&self, function: &Bdd) -> Bdd {
        function
            .and(&self.identity)
            .exists(self.next.as_slice())
    }

    /// Satisfying assignments of `states` as markings, in ascending order.
    /// `states` must only mention current-state variables.
    pub fn decode_all(&self, states: &Bdd) -> Vec<BoolMarking> {
        let pinned = states.and(&self.next_cleared);
        let mut markings: Vec<BoolMarking> = pinned
            .sat_valuations()
            .map(|valuation| self.decode(&valuation))
            .collect();
        markings.sort();
        markings
    }

    fn decode(&self, valuation: &BddValuation) -> BoolMarking {
        BoolMarking::new(
            self.current
                .iter()
                .map(|&variable| valuation.value(variable))
                .collect(),
        )
    }
}
