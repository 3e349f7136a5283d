//! Dataflow machinery shared by the rules: the symbolic operand stack and the
//! forward-branch high-water tracker.

pub mod branch_tracker;
pub mod symbolic_stack;

pub use branch_tracker::BranchTracker;
pub use symbolic_stack::{Known, ReplayError, StackValue, SymbolicStack};
