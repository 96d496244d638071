pub mod condition;
pub mod eval;
pub mod git;

pub use condition::Condition;
pub use eval::{evaluate, first_failure, BranchSource, EvalContext};
