//! `QueryTranslator`: walks an accumulated [`crate::query::QueryExpr`] and drives the
//! clause builders in [`crate::query`] to assemble the final KSQL text.

use crate::error::{Error, Result};
use crate::query::condition::{ConditionBuilder, ConditionMode};
use crate::query::create_statement::expr_contains_aggregate_call;
use crate::query::expr::{QueryExpr, QueryOp};
use crate::query::join::JoinBuilder;
use crate::query::{AggregateBuilder, GroupByBuilder, HavingBuilder, ProjectionBuilder, WindowBuilder};

pub struct QueryTranslator;

/// The rendered KSQL text plus the companion Pull/Push predicate exposed for callers and
/// diagnostics.
#[derive(Debug, Clone)]
pub struct TranslationResult {
    pub ksql: String,
    /// Whether the walk encountered a shape (a `WHERE` outside `HAVING`, or a `Take`) that is
    /// compatible with being served as a pull query. This is advisory only: the caller's
    /// `pull_hint` is what actually decides whether `EMIT CHANGES` is appended, because ksqlDB
    /// itself requires the caller to pick a query form up front.
    pub is_pull_query: bool,
}

/// Per-invocation walker state.
#[derive(Default)]
struct Walker {
    from_clause: String,
    select_clause: Option<String>,
    where_clause: Option<String>,
    group_by_clause: Option<String>,
    group_by_columns: Vec<String>,
    having_clause: Option<String>,
    window_clause: Option<String>,
    limit_clause: Option<String>,
    has_aggregation: bool,
    has_group_by: bool,
    is_after_group_by: bool,
    is_pull_query: bool,
    aliases: std::collections::HashMap<String, String>,
}

impl QueryTranslator {
    /// `translate(expression, topic_name, pull_hint) -> ksql_text`.
    pub fn translate(query: &QueryExpr, pull_hint: bool) -> Result<TranslationResult> {
        let mut walker = Walker {
            from_clause: query.source.clone(),
            ..Default::default()
        };

        for op in &query.ops {
            if let QueryOp::Join(spec) = op {
                // JoinBuilder owns the whole emission for a join query; return straight away.
                let join = JoinBuilder::build(spec)?;
                let ksql = format!(
                    "SELECT {} FROM {} JOIN {} ON {} EMIT CHANGES",
                    join.projection, walker.from_clause, join.inner_source, join.on_clause
                );
                return Ok(TranslationResult {
                    ksql,
                    is_pull_query: false,
                });
            }
            walker.apply(op)?;
        }

        walker.assemble(pull_hint)
    }
}

impl Walker {
    fn apply(&mut self, op: &QueryOp) -> Result<()> {
        match op {
            QueryOp::Where(lambda) => {
                if self.has_aggregation && self.is_after_group_by {
                    self.having_clause = Some(HavingBuilder::build(lambda, &self.aliases)?);
                } else {
                    self.where_clause = Some(ConditionBuilder::build(lambda, ConditionMode::Where)?);
                    self.is_pull_query = true;
                }
            }
            QueryOp::Select(lambda) => {
                if self.is_after_group_by || expr_contains_aggregate_call(&lambda.body) {
                    if !self.is_after_group_by {
                        self.has_aggregation = true;
                        self.is_pull_query = false;
                    }
                    let result = AggregateBuilder::build(lambda, &self.group_by_columns)?;
                    self.aliases = result.aliases;
                    self.select_clause = Some(result.projection);
                } else {
                    self.select_clause = Some(ProjectionBuilder::build(lambda)?);
                }
            }
            QueryOp::GroupBy(lambda) => {
                self.group_by_columns = GroupByBuilder::columns(lambda)?;
                self.group_by_clause = Some(format!("GROUP BY {}", self.group_by_columns.join(", ")));
                self.has_aggregation = true;
                self.has_group_by = true;
                self.is_after_group_by = true;
                self.is_pull_query = false;
            }
            QueryOp::Having(lambda) => {
                self.having_clause = Some(HavingBuilder::build(lambda, &self.aliases)?);
            }
            QueryOp::Take(n) => {
                self.limit_clause = Some(format!("LIMIT {}", n));
                self.is_pull_query = true;
            }
            QueryOp::Skip(n) => {
                // ksqlDB has no OFFSET/SKIP over streams or tables; a no-op `skip(0)` is
                // tolerated, anything else is as unsupported as `ORDER BY`, `DISTINCT`, and
                // set operations (see DESIGN.md).
                if *n != 0 {
                    return Err(Error::Unsupported(
                        "ksqlDB does not support SKIP/OFFSET over streams or tables".into(),
                    ));
                }
            }
            QueryOp::Window(spec) => {
                self.window_clause = Some(WindowBuilder::build(spec)?);
            }
            QueryOp::Join(_) => unreachable!("Join is handled in QueryTranslator::translate"),
            QueryOp::OrderBy => {
                return Err(Error::Unsupported(
                    "ORDER BY / THEN BY is not supported over ksqlDB streams or tables".into(),
                ))
            }
            QueryOp::SetOperation(name) => {
                return Err(Error::Unsupported(format!(
                    "{} is not supported over ksqlDB streams or tables",
                    name
                )))
            }
        }
        Ok(())
    }

    /// `SELECT... FROM... [WHERE...] [GROUP BY...] [WINDOW...] [HAVING...] [LIMIT...]`,
    /// regardless of the fluent call order the ops were pushed in.
    fn assemble(self, pull_hint: bool) -> Result<TranslationResult> {
        let select = self.select_clause.unwrap_or_else(|| "*".to_owned());
        let mut ksql = format!("SELECT {} FROM {}", select, self.from_clause);

        if let Some(where_clause) = &self.where_clause {
            ksql.push(' ');
            ksql.push_str(where_clause);
        }
        if let Some(group_by) = &self.group_by_clause {
            ksql.push(' ');
            ksql.push_str(group_by);
        }
        if let Some(window) = &self.window_clause {
            ksql.push(' ');
            ksql.push_str(window);
        }
        if let Some(having) = &self.having_clause {
            ksql.push(' ');
            ksql.push_str(having);
        }
        if let Some(limit) = &self.limit_clause {
            ksql.push(' ');
            ksql.push_str(limit);
        }

        // EMIT policy: GroupBy dominates. An aggregation always yields a Push query regardless
        // of `pull_hint`. Otherwise the caller's explicit intent decides, since ksqlDB itself
        // requires picking a query form up front; `is_pull_query` remains available on the
        // result purely as a diagnostic signal.
        let effective_pull = pull_hint && !self.has_aggregation && !self.has_group_by;
        if !effective_pull {
            ksql.push_str(" EMIT CHANGES");
        }

        Ok(TranslationResult {
            ksql,
            is_pull_query: self.is_pull_query && !self.has_aggregation && !self.has_group_by,
        })
    }
}

/// Formats a translation failure as a debug comment, used by `EntitySet::to_ksql` when debug
/// logging is enabled rather than propagating the error.
pub fn debug_comment(err: &Error) -> String {
    format!("/* KSQL translation error: {} */", err)
}
