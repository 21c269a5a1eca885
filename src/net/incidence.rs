//! 库所 × 迁移 的布尔关联矩阵，记录前集/后集成员关系。
use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::net::ids::{PlaceId, TransitionId};
use crate::net::index_vec::{Idx, IndexVec};

type SmallRow = SmallVec<[bool; 8]>;

/// One row per place, one column per transition. Arcs carry no weight in
/// this model, so membership is all that is stored.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IncidenceBool {
    rows: IndexVec<PlaceId, SmallRow>,
    cols: usize,
}

impl IncidenceBool {
    pub fn new(places: usize, transitions: usize) -> Self {
        let rows = (0..places)
            .map(|_| SmallRow::from_elem(false, transitions))
            .collect();
        Self {
            rows,
            cols: transitions,
        }
    }

    pub fn places(&self) -> usize {
        self.rows.len()
    }

    pub fn transitions(&self) -> usize {
        self.cols
    }

    pub fn push_place(&mut self) -> PlaceId {
        self.rows.push(SmallRow::from_elem(false, self.cols))
    }

    pub fn push_transition(&mut self) -> TransitionId {
        let next = self.cols;
        for row in self.rows.iter_mut() {
            row.push(false);
        }
        self.cols += 1;
        TransitionId::from_usize(next)
    }

    pub fn get(&self, place: PlaceId, transition: TransitionId) -> bool {
        self.rows[place][transition.index()]
    }

    /// Returns `true` if the entry changed.
    pub fn set(&mut self, place: PlaceId, transition: TransitionId, value: bool) -> bool {
        let entry = &mut self.rows[place][transition.index()];
        let changed = *entry != value;
        *entry = value;
        changed
    }

    /// Places marked in the given column, in canonical order.
    pub fn column(&self, transition: TransitionId) -> impl Iterator<Item = PlaceId> + '_ {
        self.rows
            .iter_enumerated()
            .filter(move |(_, row)| row[transition.index()])
            .map(|(place, _)| place)
    }

    /// Transitions marked in the given row, in canonical order.
    pub fn row(&self, place: PlaceId) -> impl Iterator<Item = TransitionId> + '_ {
        self.rows[place]
            .iter()
            .enumerate()
            .filter(|(_, set)| **set)
            .map(|(idx, _)| TransitionId::from_usize(idx))
    }
}

impl fmt::Debug for IncidenceBool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncidenceBool")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growing_keeps_existing_entries() {
        let mut matrix = IncidenceBool::new(1, 1);
        let p0 = PlaceId::new(0);
        let t0 = TransitionId::new(0);
        assert!(matrix.set(p0, t0, true));
        assert!(!matrix.set(p0, t0, true));

        let t1 = matrix.push_transition();
        let p1 = matrix.push_place();
        matrix.set(p1, t1, true);

        assert_eq!(matrix.places(), 2);
        assert_eq!(matrix.transitions(), 2);
        assert!(matrix.get(p0, t0));
        assert!(!matrix.get(p0, t1));
        assert_eq!(matrix.column(t1).collect::<Vec<_>>(), vec![p1]);
        assert_eq!(matrix.row(p0).collect::<Vec<_>>(), vec![t0]);
    }
}
