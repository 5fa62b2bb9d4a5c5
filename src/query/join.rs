use crate::error::Result;
use crate::query::condition::{ConditionBuilder, ConditionMode};
use crate::query::expr::JoinSpec;
use crate::query::projection::ProjectionBuilder;

/// Output of [`JoinBuilder::build`]: the pieces a join contributes to the final assembled
/// query. The outer source itself is the translator's own `from_clause`; this builder only
/// turns the key-equality expression into an `ON` clause and the result selector into a
/// `SELECT` list.
#[derive(Debug, Clone)]
pub struct JoinResult {
    pub inner_source: String,
    pub on_clause: String,
    pub projection: String,
}

/// Recognizes the canonical 5-argument join form: outer, inner, outer-key-selector,
/// inner-key-selector, result-selector. In this AST the source's two separate key-selector
/// lambdas collapse into a single equality expression carried on `outer_key` — a
/// [`crate::query::expr::Expr::CompositeEquals`] for composite keys, or a plain `Binary(Eq,
/// a.X, b.X)` for a single-column join — since both sides of the comparison must be visible
/// together to emit the `ON` clause. `inner_key` is still present on [`JoinSpec`] to mirror the
/// source's 5-argument shape at the call site, but carries no information this builder needs
/// beyond having been supplied.
pub struct JoinBuilder;

impl JoinBuilder {
    pub fn build(spec: &JoinSpec) -> Result<JoinResult> {
        let on_clause = ConditionBuilder::build(&spec.outer_key, ConditionMode::Join)?;
        let projection = ProjectionBuilder::build(&spec.result)?;
        Ok(JoinResult {
            inner_source: spec.inner_source.clone(),
            on_clause,
            projection,
        })
    }
}
