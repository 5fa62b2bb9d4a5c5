use crate::error::Result;
use crate::query::expr::{Expr, Lambda};
use crate::query::render::render_scalar;

/// Emits the comma-separated column list for a `SELECT` clause. The caller prefixes the result
/// with `"SELECT "`.
pub struct ProjectionBuilder;

impl ProjectionBuilder {
    pub fn build(lambda: &Lambda) -> Result<String> {
        Self::render(&lambda.body)
    }

    fn render(body: &Expr) -> Result<String> {
        match body {
            // Cast/convert is transparent: this is the rule critical for `entity -> object`
            // expressions.
            Expr::Cast(inner) => Self::render(inner),
            Expr::Param => Ok("*".to_owned()),
            Expr::New(fields) => {
                let parts = fields
                    .iter()
                    .map(|(alias, expr)| Self::render_field(alias, expr))
                    .collect::<Result<Vec<_>>>()?;
                Ok(parts.join(", "))
            }
            other => render_scalar(other),
        }
    }

    fn render_field(alias: &str, expr: &Expr) -> Result<String> {
        let expr = Self::unwrap_cast(expr);
        let column = render_scalar(expr)?;
        if Self::member_name_matches(expr, alias) {
            Ok(column)
        } else {
            Ok(format!("{} AS {}", column, alias))
        }
    }

    fn unwrap_cast(expr: &Expr) -> &Expr {
        match expr {
            Expr::Cast(inner) => Self::unwrap_cast(inner),
            other => other,
        }
    }

    fn member_name_matches(expr: &Expr, alias: &str) -> bool {
        matches!(expr, Expr::Member(path) if path.last().map(|s| s.as_str()) == Some(alias))
    }
}
