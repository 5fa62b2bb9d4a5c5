use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::query::expr::{BinOp, Expr, Lambda, UnOp};
use crate::query::render::render_scalar;

/// Output of [`AggregateBuilder::build`]: the rendered `SELECT` column list plus an alias map
/// (`alias -> rendered aggregate expression`) the [`HavingBuilder`] needs to resolve `g.Alias`
/// references back to their underlying aggregate text.
#[derive(Debug, Clone, Default)]
pub struct AggregateResult {
    pub projection: String,
    pub aliases: HashMap<String, String>,
}

/// Produces the post-`GROUP BY` `SELECT` list.
pub struct AggregateBuilder;

impl AggregateBuilder {
    pub fn build(lambda: &Lambda, group_by_columns: &[String]) -> Result<AggregateResult> {
        match &lambda.body {
            Expr::New(fields) => {
                let mut parts = Vec::new();
                let mut aliases = HashMap::new();
                for (alias, expr) in fields {
                    let rendered = Self::render_field(expr, group_by_columns)?;
                    aliases.insert(alias.clone(), rendered.clone());
                    if rendered == *alias {
                        parts.push(rendered);
                    } else {
                        parts.push(format!("{} AS {}", rendered, alias));
                    }
                }
                Ok(AggregateResult {
                    projection: parts.join(", "),
                    aliases,
                })
            }
            other => {
                let rendered = Self::render_field(other, group_by_columns)?;
                Ok(AggregateResult {
                    projection: rendered,
                    aliases: HashMap::new(),
                })
            }
        }
    }

    fn render_field(expr: &Expr, group_by_columns: &[String]) -> Result<String> {
        match expr {
            Expr::GroupKey => Ok(group_by_columns.join(", ")),
            Expr::Call { method, args, .. } => Self::render_aggregate_call(method, args),
            other => render_scalar(other),
        }
    }

    fn render_aggregate_call(method: &str, args: &[Expr]) -> Result<String> {
        if method == "Count" {
            return match args {
                [] => Ok("COUNT(*)".to_owned()),
                [Expr::Member(path)] => Ok(format!("COUNT({})", path.join("."))),
                _ => Err(Error::Translation(
                    "Count() takes no arguments or a single member selector".into(),
                )),
            };
        }

        let selector = match args {
            [Expr::Member(path)] => path.join("."),
            _ => {
                return Err(Error::Translation(format!(
                    "aggregate '{}' requires a single-member selector argument",
                    method
                )))
            }
        };
        Ok(format!("{}({})", normalize_aggregate_name(method), selector))
    }
}

fn normalize_aggregate_name(method: &str) -> String {
    match method {
        "Average" => "AVG".to_owned(),
        "LatestByOffset" => "LATEST_BY_OFFSET".to_owned(),
        "EarliestByOffset" => "EARLIEST_BY_OFFSET".to_owned(),
        "CollectList" => "COLLECT_LIST".to_owned(),
        "CollectSet" => "COLLECT_SET".to_owned(),
        other => other.to_uppercase(),
    }
}

/// Produces the `HAVING` clause. Member references inside the having lambda that name a
/// projection alias (`g.TotalAmount`) are resolved against `aliases` back to the aggregate
/// expression that alias stood for, e.g. `SUM(Amount)`.
pub struct HavingBuilder;

impl HavingBuilder {
    pub fn build(lambda: &Lambda, aliases: &HashMap<String, String>) -> Result<String> {
        Ok(format!("HAVING {}", Self::render(&lambda.body, aliases)?))
    }

    fn render(expr: &Expr, aliases: &HashMap<String, String>) -> Result<String> {
        match expr {
            Expr::Member(path) => Ok(Self::resolve(path, aliases)),
            Expr::GroupKey => Ok("KEY".to_owned()),
            Expr::Unary(UnOp::Not, inner) => Ok(format!("(NOT {})", Self::render(inner, aliases)?)),
            Expr::Binary(BinOp::And, left, right) | Expr::Binary(BinOp::Or, left, right) => {
                let op = if matches!(expr, Expr::Binary(BinOp::And, ..)) { "AND" } else { "OR" };
                Ok(format!(
                    "({} {} {})",
                    Self::render(left, aliases)?,
                    op,
                    Self::render(right, aliases)?
                ))
            }
            Expr::Binary(op, left, right) => Ok(format!(
                "({} {} {})",
                Self::render(left, aliases)?,
                op.as_ksql(),
                Self::render(right, aliases)?
            )),
            Expr::Call { method, args, .. } => {
                AggregateBuilder::render_aggregate_call(method, args)
            }
            other => render_scalar(other),
        }
    }

    fn resolve(path: &[String], aliases: &HashMap<String, String>) -> String {
        if path.len() == 1 {
            if let Some(resolved) = aliases.get(&path[0]) {
                return resolved.clone();
            }
        }
        path.join(".")
    }
}
