//! P/T 网静态结构元素：库所、迁移、弧方向与标识。
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::net::ids::PlaceId;
use crate::net::index_vec::IndexVec;

pub type Weight = u64;

/// Marking keyed by place identifier, in canonical place order.
pub type NamedMarking = IndexMap<String, Weight>;

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Debug)]
pub struct Place {
    pub id: String,
    pub name: String,
    pub tokens: Weight,
}

impl Place {
    pub fn new(id: impl Into<String>, name: impl Into<String>, tokens: Weight) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tokens,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Transition {
    pub id: String,
    pub name: String,
}

impl Transition {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Transition").field(&self.id).finish()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ArcDirection {
    PlaceToTransition,
    TransitionToPlace,
}

/// Concrete marking: token count per place, indexed in canonical order.
/// This is also the fixed-width key used for hashing and equality.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Marking(pub IndexVec<PlaceId, Weight>);

impl Marking {
    pub fn new(tokens: IndexVec<PlaceId, Weight>) -> Self {
        Self(tokens)
    }

    pub fn zero(places: usize) -> Self {
        Self(IndexVec::from_elem(0, places))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PlaceId, Weight)> + '_ {
        self.0.iter_enumerated().map(|(place, tokens)| (place, *tokens))
    }

    pub fn tokens(&self, place: PlaceId) -> Weight {
        self.0[place]
    }

    pub fn tokens_mut(&mut self, place: PlaceId) -> &mut Weight {
        &mut self.0[place]
    }

    pub fn total(&self) -> Weight {
        self.0.iter().sum()
    }

    /// Boolean view of this marking. Fails on the first place holding more
    /// than one token, since presence/absence cannot represent it.
    pub fn to_boolean(&self) -> Result<BoolMarking, UnsafePlace> {
        self.iter()
            .map(|(place, tokens)| match tokens {
                0 => Ok(false),
                1 => Ok(true),
                _ => Err(UnsafePlace { place, tokens }),
            })
            .collect::<Result<IndexVec<_, _>, _>>()
            .map(BoolMarking)
    }
}

impl fmt::Debug for Marking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Marking").field(&self.0.as_slice()).finish()
    }
}

/// A place whose token count does not fit the boolean abstraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnsafePlace {
    pub place: PlaceId,
    pub tokens: Weight,
}

/// Presence/absence marking of a 1-bounded net, indexed in canonical order.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoolMarking(pub IndexVec<PlaceId, bool>);

impl BoolMarking {
    pub fn new(values: IndexVec<PlaceId, bool>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_marked(&self, place: PlaceId) -> bool {
        self.0[place]
    }

    pub fn iter(&self) -> impl Iterator<Item = (PlaceId, bool)> + '_ {
        self.0.iter_enumerated().map(|(place, marked)| (place, *marked))
    }

    pub fn marked_places(&self) -> impl Iterator<Item = PlaceId> + '_ {
        self.iter().filter(|(_, marked)| *marked).map(|(place, _)| place)
    }

    pub fn to_marking(&self) -> Marking {
        Marking(self.0.iter().map(|marked| Weight::from(*marked)).collect())
    }
}

impl fmt::Debug for BoolMarking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bits: String = self
            .0
            .iter()
            .map(|marked| if *marked { '1' } else { '0' })
            .collect();
        write!(f, "BoolMarking({bits})")
    }
}

impl From<&BoolMarking> for Marking {
    fn from(value: &BoolMarking) -> Self {
        value.to_marking()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_view_rejects_two_tokens() {
        let safe = Marking(IndexVec::from(vec![1, 0, 1]));
        let view = safe.to_boolean().unwrap();
        assert_eq!(view.marked_places().count(), 2);
        assert_eq!(view.to_marking(), safe);

        let unsafe_marking = Marking(IndexVec::from(vec![0, 2, 1]));
        let err = unsafe_marking.to_boolean().unwrap_err();
        assert_eq!(err.place, PlaceId::new(1));
        assert_eq!(err.tokens, 2);
    }

    #[test]
    fn debug_prints_bits_in_canonical_order() {
        let marking = BoolMarking(IndexVec::from(vec![true, false, true]));
        assert_eq!(format!("{marking:?}"), "BoolMarking(101)");
    }
}
