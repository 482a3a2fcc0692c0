//! Logical planning: bound expressions, plan nodes and the builder.

pub mod builder;
pub mod expr;
pub mod logical;

pub use builder::build;
pub use expr::{
    default_frame, AggregateCall, BoundExpr, SortKey, SubqueryExpr, SubqueryKind, WindowCall,
    WindowFunc,
};
pub use logical::{JoinStrategy, LogicalPlan};
