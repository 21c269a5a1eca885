//! # 松弛搜索（整数规划 + CEGAR）
//!
//! 死锁检测与线性目标优化共用同一个精化循环 [`RelaxedSearch`]：二者只在
//! 附加约束与目标函数上不同。返回的标识都经过精确可达集的成员检查，
//! 因此与松弛给出多少伪解无关，结果总是可达的。

pub mod cegar;
pub mod deadlock;
pub mod lp;
pub mod optimize;

pub use cegar::{
    Candidate, MarkingConstraint, Objective, Query, RelaxedSearch, SearchError, SearchOutcome,
    SearchStats,
};
pub use deadlock::{deadlock_query, find_deadlock};
pub use lp::{IntegerProgram, SolveOutcome, SolverError};
pub use optimize::{Weights, optimize};
