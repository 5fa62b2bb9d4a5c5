use crate::error::Result;
use crate::query::expr::{Expr, Lambda};
use crate::query::render::render_scalar;

/// Emits `GROUP BY`.
pub struct GroupByBuilder;

impl GroupByBuilder {
    pub fn build(lambda: &Lambda) -> Result<String> {
        Ok(format!("GROUP BY {}", Self::columns(lambda)?.join(", ")))
    }

    /// The bare GROUP BY column list, in declaration order, without the `GROUP BY` keyword.
    /// Used directly by the aggregate builder to resolve `g.Key` inside a post-GroupBy
    /// projection.
    pub fn columns(lambda: &Lambda) -> Result<Vec<String>> {
        Self::render(&lambda.body)
    }

    fn render(body: &Expr) -> Result<Vec<String>> {
        match body {
            Expr::Cast(inner) => Self::render(inner),
            Expr::New(fields) => fields.iter().map(|(_, expr)| render_scalar(expr)).collect(),
            other => Ok(vec![render_scalar(other)?]),
        }
    }
}
