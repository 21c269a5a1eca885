//! 运行时: 网的构造、可发生判定、发生语义与标识编解码.
use std::fmt::{self, Write as FmtWrite};
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use indexmap::map::Entry;
use thiserror::Error;

use crate::net::ids::{PlaceId, TransitionId};
use crate::net::incidence::IncidenceBool;
use crate::net::index_vec::{Idx, IndexVec};
use crate::net::structure::{
    ArcDirection, BoolMarking, Marking, NamedMarking, Place, Transition, UnsafePlace, Weight,
};

#[derive(Debug, Error)]
pub enum FireError {
    #[error("transition {0:?} is out of bounds")]
    OutOfBounds(TransitionId),
    #[error("transition {0:?} is not enabled under the supplied marking")]
    NotEnabled(TransitionId),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NetError {
    #[error("unknown place `{0}`")]
    UnknownPlace(String),
    #[error("marking covers {found} places but the net declares {expected}")]
    MarkingWidth { expected: usize, found: usize },
    #[error("place `{place}` holds {tokens} tokens; the boolean abstraction requires a 1-bounded net")]
    NotSafe { place: String, tokens: Weight },
}

/// Place/transition net with unweighted arcs.
///
/// Places and transitions are addressed by their external identifier while
/// the net is built, and by [`PlaceId`] / [`TransitionId`] afterwards. The
/// `PlaceId` order is the canonical place order: it is fixed at the first
/// `add_place` of an identifier and never permuted.
#[derive(Clone, serde::Serialize, serde::Deserialize)]
pub struct Net {
    pub places: IndexVec<PlaceId, Place>,
    pub transitions: IndexVec<TransitionId, Transition>,
    pub pre: IncidenceBool,
    pub post: IncidenceBool,
    place_index: IndexMap<String, PlaceId>,
    transition_index: IndexMap<String, TransitionId>,
}

impl fmt::Debug for Net {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Net")
            .field("places", &self.places)
            .field("transitions", &self.transitions)
            .field("pre", &self.pre)
            .field("post", &self.post)
            .finish()
    }
}

impl Net {
    pub fn empty() -> Self {
        Self {
            places: IndexVec::new(),
            transitions: IndexVec::new(),
            pre: IncidenceBool::new(0, 0),
            post: IncidenceBool::new(0, 0),
            place_index: IndexMap::new(),
            transition_index: IndexMap::new(),
        }
    }

    /// Declares a place. Re-declaring an identifier keeps its canonical
    /// position and overwrites its name and initial tokens.
    pub fn add_place(
        &mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        tokens: Weight,
    ) -> PlaceId {
        let id = id.into();
        let name = name.into();
        match self.place_index.entry(id) {
            Entry::Occupied(entry) => {
                let place_id = *entry.get();
                let place = &mut self.places[place_id];
                place.name = name;
                place.tokens = tokens;
                place_id
            }
            Entry::Vacant(entry) => {
                let place_id = self.places.push(Place::new(entry.key().clone(), name, tokens));
                self.pre.push_place();
                self.post.push_place();
                entry.insert(place_id);
                place_id
            }
        }
    }

    /// Declares a transition. Re-declaring an identifier only renames it.
    pub fn add_transition(&mut self, id: impl Into<String>, name: impl Into<String>) -> TransitionId {
        let id = id.into();
        let name = name.into();
        match self.transition_index.entry(id) {
            Entry::Occupied(entry) => {
                let transition_id = *entry.get();
                self.transitions[transition_id].name = name;
                transition_id
            }
            Entry::Vacant(entry) => {
                let transition_id = self
                    .transitions
                    .push(Transition::new(entry.key().clone(), name));
                self.pre.push_transition();
                self.post.push_transition();
                entry.insert(transition_id);
                transition_id
            }
        }
    }

    /// Adds an arc between two declared nodes.
    ///
    /// place → transition extends the pre-set, transition → place extends
    /// the post-set. Any other pairing (unknown endpoint, place → place,
    /// transition → transition) is dropped and reported as `None`.
    /// Repeating an arc is a no-op.
    pub fn add_arc(&mut self, source: &str, target: &str) -> Option<ArcDirection> {
        if let (Some(&place), Some(&transition)) =
            (self.place_index.get(source), self.transition_index.get(target))
        {
            self.pre.set(place, transition, true);
            return Some(ArcDirection::PlaceToTransition);
        }
        if let (Some(&transition), Some(&place)) =
            (self.transition_index.get(source), self.place_index.get(target))
        {
            self.post.set(place, transition, true);
            return Some(ArcDirection::TransitionToPlace);
        }
        log::debug!("dropping arc {source} -> {target}: endpoints are not a place/transition pair");
        None
    }

    pub fn places_len(&self) -> usize {
        self.places.len()
    }

    pub fn transitions_len(&self) -> usize {
        self.transitions.len()
    }

    pub fn place_id(&self, id: &str) -> Option<PlaceId> {
        self.place_index.get(id).copied()
    }

    pub fn transition_id(&self, id: &str) -> Option<TransitionId> {
        self.transition_index.get(id).copied()
    }

    pub fn place_ids(&self) -> impl DoubleEndedIterator<Item = PlaceId> + use<> {
        self.places.indices()
    }

    pub fn transition_ids(&self) -> impl DoubleEndedIterator<Item = TransitionId> + use<> {
        self.transitions.indices()
    }

    pub fn preset(&self, transition: TransitionId) -> impl Iterator<Item = PlaceId> + '_ {
        self.pre.column(transition)
    }

    pub fn postset(&self, transition: TransitionId) -> impl Iterator<Item = PlaceId> + '_ {
        self.post.column(transition)
    }

    pub fn in_preset(&self, place: PlaceId, transition: TransitionId) -> bool {
        self.pre.get(place, transition)
    }

    pub fn in_postset(&self, place: PlaceId, transition: TransitionId) -> bool {
        self.post.get(place, transition)
    }

    /// Transitions that take a token from `place`.
    pub fn consumers(&self, place: PlaceId) -> impl Iterator<Item = TransitionId> + '_ {
        self.pre.row(place)
    }

    /// Transitions that put a token into `place`.
    pub fn producers(&self, place: PlaceId) -> impl Iterator<Item = TransitionId> + '_ {
        self.post.row(place)
    }

    pub fn initial_marking(&self) -> Marking {
        Marking(self.places.iter().map(|p| p.tokens).collect())
    }

    /// Boolean view of the initial marking; fails unless every place starts
    /// with at most one token.
    pub fn initial_bool_marking(&self) -> Result<BoolMarking, NetError> {
        self.to_boolean(&self.initial_marking())
    }

    pub fn to_boolean(&self, marking: &Marking) -> Result<BoolMarking, NetError> {
        marking
            .to_boolean()
            .map_err(|UnsafePlace { place, tokens }| NetError::NotSafe {
                place: self.places[place].id.clone(),
                tokens,
            })
    }

    /// Maps an identifier-keyed marking to the canonical key. Places that
    /// are not mentioned hold zero tokens.
    pub fn encode(&self, marking: &NamedMarking) -> Result<Marking, NetError> {
        let mut key = Marking::zero(self.places_len());
        for (id, tokens) in marking {
            let place = self
                .place_id(id)
                .ok_or_else(|| NetError::UnknownPlace(id.clone()))?;
            *key.tokens_mut(place) = *tokens;
        }
        Ok(key)
    }

    /// Inverse of [`Net::encode`]: every declared place, in canonical order.
    pub fn decode(&self, key: &Marking) -> Result<NamedMarking, NetError> {
        if key.len() != self.places_len() {
            return Err(NetError::MarkingWidth {
                expected: self.places_len(),
                found: key.len(),
            });
        }
        Ok(self
            .places
            .iter()
            .zip(key.0.iter())
            .map(|(place, tokens)| (place.id.clone(), *tokens))
            .collect())
    }

    pub fn is_enabled(&self, transition: TransitionId, marking: &Marking) -> bool {
        if transition.index() >= self.transitions_len() {
            return false;
        }
        self.preset(transition)
            .all(|place| marking.tokens(place) >= 1)
    }

    /// A transition with an empty pre-set is enabled everywhere.
    pub fn enabled_transitions(&self, marking: &Marking) -> Vec<TransitionId> {
        self.transition_ids()
            .filter(|&transition| self.is_enabled(transition, marking))
            .collect()
    }

    pub fn is_dead(&self, marking: &Marking) -> bool {
        self.transition_ids()
            .all(|transition| !self.is_enabled(transition, marking))
    }

    /// Fires `transition`: one token leaves every pre-set place, then one
    /// token enters every post-set place. A self-loop place therefore keeps
    /// its count.
    pub fn fire(&self, transition: TransitionId, marking: &Marking) -> Result<Marking, FireError> {
        if transition.index() >= self.transitions_len() {
            return Err(FireError::OutOfBounds(transition));
        }
        if !self.is_enabled(transition, marking) {
            return Err(FireError::NotEnabled(transition));
        }

        let mut next = marking.clone();
        for place in self.preset(transition) {
            *next.tokens_mut(place) -= 1;
        }
        for place in self.postset(transition) {
            *next.tokens_mut(place) += 1;
        }
        Ok(next)
    }

    pub fn to_dot(&self) -> String {
        let mut dot = String::new();
        let _ = writeln!(&mut dot, "digraph PetriNet {{");
        let _ = writeln!(&mut dot, "    rankdir=LR;");
        let _ = writeln!(&mut dot, "    node [fontname=\"Helvetica\"];");

        for (place_id, place) in self.places.iter_enumerated() {
            let _ = writeln!(
                &mut dot,
                "    place_{} [label=\"{}\\n{}\", shape=circle, style=filled, fillcolor=\"#e3f2fd\"];",
                place_id.index(),
                escape_label(&place.name),
                place.tokens
            );
        }

        for (transition_id, transition) in self.transitions.iter_enumerated() {
            let _ = writeln!(
                &mut dot,
                "    trans_{} [label=\"{}\", shape=box, style=filled, fillcolor=\"#ffe0b2\"];",
                transition_id.index(),
                escape_label(&transition.name)
            );
        }

        for transition in self.transition_ids() {
            for place in self.preset(transition) {
                let _ = writeln!(
                    &mut dot,
                    "    place_{} -> trans_{};",
                    place.index(),
                    transition.index()
                );
            }
            for place in self.postset(transition) {
                let _ = writeln!(
                    &mut dot,
                    "    trans_{} -> place_{};",
                    transition.index(),
                    place.index()
                );
            }
        }

        let _ = writeln!(&mut dot, "}}");
        dot
    }

    pub fn write_dot<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_dot())
    }
}

impl Default for Net {
    fn default() -> Self {
        Self::empty()
    }
}

fn escape_label(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::chain_net;

    fn marking(tokens: &[Weight]) -> Marking {
        Marking(IndexVec::from(tokens.to_vec()))
    }

    #[test]
    fn duplicate_place_keeps_position() {
        let mut net = Net::empty();
        let a = net.add_place("a", "first", 0);
        let b = net.add_place("b", "b", 0);
        let again = net.add_place("a", "second", 1);

        assert_eq!(a, again);
        assert_eq!(net.places_len(), 2);
        assert_eq!(net.place_ids().collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(net.places[a].name, "second");
        assert_eq!(net.initial_marking(), marking(&[1, 0]));
    }

    #[test]
    fn mistyped_arcs_are_dropped() {
        let mut net = chain_net();
        let before = net.pre.clone();

        assert_eq!(net.add_arc("P1", "P2"), None);
        assert_eq!(net.add_arc("T1", "T2"), None);
        assert_eq!(net.add_arc("P1", "missing"), None);
        assert_eq!(net.pre, before);

        assert_eq!(net.add_arc("P3", "T1"), Some(ArcDirection::PlaceToTransition));
        assert_eq!(net.add_arc("P3", "T1"), Some(ArcDirection::PlaceToTransition));
        let t1 = net.transition_id("T1").unwrap();
        assert_eq!(net.preset(t1).count(), 2);
    }

    #[test]
    fn fire_moves_tokens_along_chain() {
        let net = chain_net();
        let t1 = net.transition_id("T1").unwrap();
        let t2 = net.transition_id("T2").unwrap();
        let m0 = net.initial_marking();

        assert_eq!(net.enabled_transitions(&m0), vec![t1]);
        let m1 = net.fire(t1, &m0).unwrap();
        assert_eq!(m1, marking(&[0, 1, 0]));
        assert!(matches!(net.fire(t1, &m1), Err(FireError::NotEnabled(_))));
        let m2 = net.fire(t2, &m1).unwrap();
        assert_eq!(m2, marking(&[0, 0, 1]));
        assert!(net.is_dead(&m2));
        assert!(matches!(
            net.fire(TransitionId::new(9), &m2),
            Err(FireError::OutOfBounds(_))
        ));
    }

    #[test]
    fn self_loop_place_is_unchanged() {
        let mut net = Net::empty();
        net.add_place("loop", "loop", 1);
        net.add_place("in", "in", 1);
        net.add_place("out", "out", 0);
        net.add_place("idle", "idle", 1);
        let t = net.add_transition("t", "t");
        net.add_arc("loop", "t");
        net.add_arc("t", "loop");
        net.add_arc("in", "t");
        net.add_arc("t", "out");

        let next = net.fire(t, &net.initial_marking()).unwrap();
        assert_eq!(next, marking(&[1, 0, 1, 1]));
    }

    #[test]
    fn empty_preset_is_always_enabled() {
        let mut net = Net::empty();
        net.add_place("p", "p", 0);
        let t = net.add_transition("source", "source");
        net.add_arc("source", "p");

        let m = net.initial_marking();
        assert!(net.is_enabled(t, &m));
        assert_eq!(net.fire(t, &m).unwrap(), marking(&[1]));
    }

    #[test]
    fn codec_round_trips_every_marking() {
        let net = chain_net();
        for a in 0..3 {
            for b in 0..3 {
                for c in 0..3 {
                    let named: NamedMarking = [("P1", a), ("P2", b), ("P3", c)]
                        .into_iter()
                        .map(|(id, tokens)| (id.to_string(), tokens))
                        .collect();
                    let key = net.encode(&named).unwrap();
                    assert_eq!(net.decode(&key).unwrap(), named);
                }
            }
        }
    }

    #[test]
    fn encode_defaults_missing_and_rejects_unknown() {
        let net = chain_net();
        let mut partial = NamedMarking::new();
        partial.insert("P2".into(), 1);
        assert_eq!(net.encode(&partial).unwrap(), marking(&[0, 1, 0]));

        partial.insert("P9".into(), 1);
        assert_eq!(
            net.encode(&partial),
            Err(NetError::UnknownPlace("P9".into()))
        );
        assert!(matches!(
            net.decode(&marking(&[1])),
            Err(NetError::MarkingWidth { expected: 3, found: 1 })
        ));
    }

    #[test]
    fn initial_marking_must_be_safe_for_boolean_view() {
        let mut net = chain_net();
        assert!(net.initial_bool_marking().is_ok());
        net.add_place("P2", "P2", 2);
        assert_eq!(
            net.initial_bool_marking(),
            Err(NetError::NotSafe {
                place: "P2".into(),
                tokens: 2
            })
        );
    }

    #[test]
    fn dot_lists_every_arc() {
        let dot = chain_net().to_dot();
        assert!(dot.contains("place_0 -> trans_0;"));
        assert!(dot.contains("trans_0 -> place_1;"));
        assert!(dot.contains("trans_1 -> place_2;"));
    }
}
