//! # 符号可达性（BDD 不动点）
//!
//! 每个库所 `p_i` 对应当前态变量 `x{i}` 与后继态变量 `x{i}_next`，两者在
//! 变量序中交错排列。迁移 `t` 的关系为
//!
//! ```text
//! R_t = ⋀_{p∈•t} x_p  ∧  ⋀_p frame_t(p)
//! frame_t(p) = ¬x'_p            p ∈ •t \ t•
//!            =  x'_p            p ∈ t• \ •t
//!            =  x_p ↔ x'_p      其余（含自环）
//! ```
//!
//! 可达集是 `S = S₀ ∨ Img(S)` 的最小不动点，`Img(S) = (∃x. S ∧ R)[x'/x]`。
//! 布尔抽象只对 1-有界网可靠，初始标识在编码前检查。

mod encoding;
mod fixpoint;

use thiserror::Error;

use crate::net::NetError;

pub use encoding::SymbolicContext;
pub use fixpoint::SymbolicReachability;

/// Largest number of places the engine will encode; two BDD variables are
/// needed per place and the algebra addresses variables with `u16`.
pub const MAX_PLACES: usize = (u16::MAX / 2) as usize - 1;

#[derive(Debug, Error)]
pub enum SymbolicError {
    #[error(transparent)]
    Net(#[from] NetError),
    #[error("net has {places} places, the symbolic engine supports at most {limit}")]
    TooManyPlaces { places: usize, limit: usize },
}
