//! # Petri 网核心定义（无权 P/T 网）
//!
//! 设库所集合 `P`（按首次声明的顺序编号，即规范顺序）与迁移集合 `T`。
//! 每个迁移 `t` 有前集 `•t ⊆ P` 与后集 `t• ⊆ P`，弧不带权。对任意标识
//! `M ∈ ℕ^{|P|}`：
//!
//! * `t` **可激发** 当且仅当 `∀p ∈ •t: M[p] ≥ 1`；
//! * `t` **发射** 后 `M'[p] = M[p] - [p ∈ •t] + [p ∈ t•]`，自环库所不变。
//!
//! 布尔抽象（[`BoolMarking`]）只对 1-有界网成立，转换时显式检查。
//!
//! ## 示例
//!
//! ```rust
//! use pn_reach::net::*;
//!
//! let mut net = Net::empty();
//! net.add_place("p0", "ready", 1);
//! net.add_place("p1", "done", 0);
//! let t0 = net.add_transition("t0", "run");
//! net.add_arc("p0", "t0");
//! net.add_arc("t0", "p1");
//!
//! let marking = net.initial_marking();
//! assert_eq!(net.enabled_transitions(&marking), vec![t0]);
//! let next = net.fire(t0, &marking).unwrap();
//! assert_eq!(net.decode(&next).unwrap()["p1"], 1);
//! ```

pub mod core;
pub mod ids;
pub mod incidence;
pub mod index_vec;
pub mod io;
pub mod structure;

pub use self::core::{FireError, Net, NetError};
pub use ids::{PlaceId, TransitionId};
pub use incidence::IncidenceBool;
pub use index_vec::{Idx, IndexVec};
pub use io::{Format, IoError, NetDescription};
pub use structure::{ArcDirection, BoolMarking, Marking, NamedMarking, Place, Transition, Weight};
