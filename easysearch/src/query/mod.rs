//! Query composition: DSL types, predicate compiler, aggregation planner

pub mod aggregation;
pub mod compiler;
pub mod types;

pub use aggregation::{AggregationPlan, AggregationPlanner, AGG_MAX_SCORE, AGG_TERMS, AGG_TOP_HITS};
pub use compiler::{match_query, PredicateCompiler};
pub use types::*;
