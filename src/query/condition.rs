use crate::error::{Error, Result};
use crate::query::expr::{BinOp, ConstValue, Expr, Lambda, UnOp};
use crate::query::render::render_scalar;

/// Whether a [`ConditionBuilder`] result is prefixed with `WHERE` or left bare for use as a
/// `JOIN... ON` condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionMode {
    Where,
    Join,
}

pub struct ConditionBuilder;

impl ConditionBuilder {
    pub fn build(lambda: &Lambda, mode: ConditionMode) -> Result<String> {
        let rendered = Self::render(&lambda.body)?;
        Ok(match mode {
            ConditionMode::Where => format!("WHERE {}", rendered),
            ConditionMode::Join => rendered,
        })
    }

    fn render(expr: &Expr) -> Result<String> {
        match expr {
            // `x.Flag` -> `(Flag = true)`.
            Expr::Member(path) => Ok(format!("({} = true)", path.join("."))),
            // `!x.Flag` -> `(Flag = false)`. A nullable bool's `.Value` access resolves to the
            // same `Member` node, so it's normalized identically.
            Expr::Unary(UnOp::Not, inner) => match &**inner {
                Expr::Member(path) => Ok(format!("({} = false)", path.join("."))),
                other => Ok(format!("(NOT {})", Self::render(other)?)),
            },
            // Double-normalization: `x.Flag == true` / `x.Flag == false` collapse to the same
            // single parenthesized form a bare/negated member would produce.
            Expr::Binary(BinOp::Eq, left, right) => Self::render_possible_bool_compare(left, right, true),
            Expr::Binary(BinOp::NotEq, left, right) => {
                Self::render_possible_bool_compare(left, right, false)
            }
            // AND/OR combine sub-predicates, so each side stays in boolean context.
            Expr::Binary(op @ (BinOp::And | BinOp::Or), left, right) => {
                Ok(format!("({} {} {})", Self::render(left)?, op.as_ksql(), Self::render(right)?))
            }
            // Everything else (arithmetic, ordering comparisons) is scalar context: a bare
            // `Member` operand is a column reference, not a boolean predicate.
            Expr::Binary(op, left, right) => {
                Ok(format!("({} {} {})", render_scalar(left)?, op.as_ksql(), render_scalar(right)?))
            }
            Expr::CompositeEquals(left, right) => Self::render_composite_equals(left, right),
            other => render_scalar(other),
        }
    }

    /// Handles `member == bool_const` / `member != bool_const` by folding it into the same
    /// `(Member = true/false)` shape a bare or negated member produces, instead of emitting a
    /// doubly-wrapped comparison.
    fn render_possible_bool_compare(left: &Expr, right: &Expr, eq: bool) -> Result<String> {
        if let (Expr::Member(path), Expr::Const(ConstValue::Bool(b))) = (left, right) {
            let normalized = if eq { *b } else { !*b };
            return Ok(format!("({} = {})", path.join("."), normalized));
        }
        if let (Expr::Const(ConstValue::Bool(b)), Expr::Member(path)) = (left, right) {
            let normalized = if eq { *b } else { !*b };
            return Ok(format!("({} = {})", path.join("."), normalized));
        }
        let op = if eq { "=" } else { "<>" };
        Ok(format!("({} {} {})", render_scalar(left)?, op, render_scalar(right)?))
    }

    /// `new {a.X, a.Y} equals new {b.X, b.Y}` -> `(a.X = b.X AND a.Y = b.Y)`.
    fn render_composite_equals(left: &Expr, right: &Expr) -> Result<String> {
        let (left_fields, right_fields) = match (left, right) {
            (Expr::New(l), Expr::New(r)) => (l, r),
            _ => {
                return Err(Error::Translation(
                    "composite-key equality requires anonymous-constructor operands on both sides".into(),
                ))
            }
        };

        if left_fields.is_empty() || right_fields.is_empty() {
            return Err(Error::Translation(
                "composite-key equality requires at least one member on each side".into(),
            ));
        }
        if left_fields.len() != right_fields.len() {
            return Err(Error::Translation(format!(
                "composite-key equality arity mismatch: {} vs {}",
                left_fields.len(),
                right_fields.len()
            )));
        }

        let parts = left_fields
            .iter()
            .zip(right_fields.iter())
            .map(|((_, l), (_, r))| Ok(format!("{} = {}", render_scalar(l)?, render_scalar(r)?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(format!("({})", parts.join(" AND ")))
    }
}
