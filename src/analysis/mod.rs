//! 显式状态空间分析.
pub mod reachability;

pub use reachability::{ExplorerConfig, StateSpace, StateSpaceStats};
