use biodivine_lib_bdd::Bdd;

use crate::net::{BoolMarking, Net, NetError};
use crate::symbolic::{SymbolicContext, SymbolicError};

/// Exact reachable set of a 1-bounded net, as a BDD over the current-state
/// variables.
pub struct SymbolicReachability {
    context: SymbolicContext,
    states: Bdd,
    iterations: usize,
}

impl SymbolicReachability {
    pub fn compute(net: &Net) -> Result<Self, SymbolicError> {
        Self::compute_with_observer(net, |_, _| {})
    }

    /// Least fixed point of `S = S₀ ∨ Img(S)`. `observer` receives the
    /// iteration number and every approximation, starting with `S₀`.
    ///
    /// Every approximation is checked for a marking that would put a second
    /// token on a place; such a net is rejected with [`NetError::NotSafe`].
    pub fn compute_with_observer<F>(net: &Net, mut observer: F) -> Result<Self, SymbolicError>
    where
        F: FnMut(usize, &Bdd),
    {
        let initial = net.initial_bool_marking()?;
        let context = SymbolicContext::new(net)?;
        let mut states = context.encode(&initial)?;
        let mut iterations = 0;
        observer(iterations, &states);

        loop {
            if let Some((transition, place)) = context.find_overflow(&states) {
                log::debug!(
                    "{} can fire onto marked place {} after {iterations} iterations",
                    net.transitions[transition].id,
                    net.places[place].id
                );
                return Err(NetError::NotSafe {
                    place: net.places[place].id.clone(),
                    tokens: 2,
                }
                .into());
            }

            let image = context.image(&states);
            let next = states.or(&image);
            iterations += 1;
            if next == states {
                break;
            }
            log::debug!(
                "symbolic iteration {iterations}: {} BDD nodes",
                next.size()
            );
            states = next;
            observer(iterations, &states);
        }

        log::debug!(
            "symbolic fixed point after {iterations} iterations, {} BDD nodes",
            states.size()
        );
        Ok(SymbolicReachability {
            context,
            states,
            iterations,
        })
    }

    pub fn context(&self) -> &SymbolicContext {
        &self.context
    }

    pub fn states(&self) -> &Bdd {
        &self.states
    }

    /// Number of image computations, including the last one that added
    /// nothing.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn contains(&self, marking: &BoolMarking) -> Result<bool, NetError> {
        let point = self.context.encode(marking)?;
        Ok(!self.states.and(&point).is_false())
    }

    /// Every reachable marking, in ascending order.
    pub fn markings(&self) -> Vec<BoolMarking> {
        self.context.decode_all(&self.states)
    }

    pub fn count(&self) -> usize {
        self.context.cardinality(&self.states) as usize
    }

    pub fn node_count(&self) -> usize {
        self.states.size()
    }
}
