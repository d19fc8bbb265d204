//! Plans and the planner that produces them.
//!
//! A plan is an ordered [`TaskDefinition`] list. The order is the canonical
//! result order; execution order comes from the dependency analyzer.

pub mod maker;

pub use maker::{PlanParseError, build_planner_prompt, make_plan, parse_plan};
pub use relay_store::TaskDefinition;
