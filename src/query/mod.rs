//! Expression-tree clause builders: each sub-module is a stateless tree-walker that
//! consumes a sub-expression rooted at a lambda body and emits one textual clause.
//! [`crate::translator::QueryTranslator`] is the only caller that drives all of them
//! together in the fixed grammar order.

pub mod aggregate;
pub mod condition;
pub mod create_statement;
pub mod expr;
pub mod group_by;
pub mod join;
pub mod projection;
pub mod render;
pub mod window;

pub use aggregate::{AggregateBuilder, HavingBuilder};
pub use condition::{ConditionBuilder, ConditionMode};
pub use create_statement::{infer_statement_kind, CreateStatementBuilder, StatementKind};
pub use expr::{Expr, JoinSpec, Lambda, Query, QueryExpr, QueryOp, WindowSpec};
pub use group_by::GroupByBuilder;
pub use join::JoinBuilder;
pub use projection::ProjectionBuilder;
pub use window::WindowBuilder;
