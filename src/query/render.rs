//! Shared scalar-expression rendering used by several clause builders (projection, condition,
//! group-by, aggregate arguments). Each builder still owns its own top-level behavior; this is
//! only the common "how do I turn a column/const/binary/string-method expression into KSQL
//! text" piece so it isn't copy-pasted four times.

use crate::error::{Error, Result};
use crate::query::expr::{BinOp, ConstValue, Expr, UnOp};

/// Renders a value-producing expression: member access, constants, arithmetic/comparison
/// binaries, unary not, transparent casts, and the recognized string methods. Does not handle
/// `New`, `GroupKey`, or `CompositeEquals` — those are meaningful only at specific positions
/// their owning builder checks for directly.
pub fn render_scalar(expr: &Expr) -> Result<String> {
    match expr {
        Expr::Param => Ok("*".to_owned()),
        Expr::Member(path) => Ok(path.join(".")),
        Expr::Const(c) => Ok(render_const(c)),
        Expr::Cast(inner) => render_scalar(inner),
        Expr::Unary(UnOp::Not, inner) => Ok(format!("(NOT {})", render_scalar(inner)?)),
        Expr::Binary(op, left, right) => {
            let l = render_scalar(left)?;
            let r = render_scalar(right)?;
            Ok(format!("({} {} {})", l, op.as_ksql(), r))
        }
        Expr::Call { method, receiver, args } => render_call(method, receiver.as_deref(), args),
        Expr::GroupKey => Err(Error::Translation(
            "g.Key may only appear directly inside a post-GroupBy projection".into(),
        )),
        Expr::New(_) => Err(Error::Translation(
            "anonymous constructors may only appear at the top of a projection or group-by clause"
                .into(),
        )),
        Expr::CompositeEquals(_, _) => Err(Error::Translation(
            "composite-key equality may only appear as a join condition".into(),
        )),
    }
}

pub fn render_const(c: &ConstValue) -> String {
    match c {
        ConstValue::Bool(b) => b.to_string(),
        ConstValue::Int(i) => i.to_string(),
        ConstValue::Float(f) => f.to_string(),
        ConstValue::String(s) => format!("'{}'", s.replace('\'', "''")),
        ConstValue::Null => "NULL".to_owned(),
    }
}

fn render_call(method: &str, receiver: Option<&Expr>, args: &[Expr]) -> Result<String> {
    let receiver_text = match receiver {
        Some(expr) => render_scalar(expr)?,
        None => String::new(),
    };
    match method {
        "ToString" => Ok(format!("CAST({} AS VARCHAR)", receiver_text)),
        "ToLower" => Ok(format!("LCASE({})", receiver_text)),
        "ToUpper" => Ok(format!("UCASE({})", receiver_text)),
        "Substring" => {
            let rendered_args = args
                .iter()
                .map(render_scalar)
                .collect::<Result<Vec<_>>>()?
                .join(", ");
            Ok(format!("SUBSTRING({}, {})", receiver_text, rendered_args))
        }
        other => {
            // Best-effort fallback: unrecognized method names become `UPPER_METHOD_NAME(args)`.
            let mut all_args = Vec::new();
            if !receiver_text.is_empty() {
                all_args.push(receiver_text);
            }
            for arg in args {
                all_args.push(render_scalar(arg)?);
            }
            Ok(format!("{}({})", to_upper_snake(other), all_args.join(", ")))
        }
    }
}

fn to_upper_snake(method: &str) -> String {
    let mut out = String::new();
    for (i, ch) in method.chars().enumerate() {
        if ch.is_uppercase() && i != 0 {
            out.push('_');
        }
        out.extend(ch.to_uppercase());
    }
    out
}
