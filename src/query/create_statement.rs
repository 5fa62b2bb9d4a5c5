//! `CREATE STREAM`/`CREATE TABLE` emission and Stream/Table inference.

use crate::avro::mapping::ksql_type;
use crate::entity::descriptor::EntityDescriptor;
use crate::query::expr::QueryOp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Stream,
    Table,
}

impl StatementKind {
    fn as_ksql(self) -> &'static str {
        match self {
            StatementKind::Stream => "STREAM",
            StatementKind::Table => "TABLE",
        }
    }
}

/// Given an entity and a declared kind, emits `CREATE {STREAM|TABLE} {Name} ({col defs}) [WITH
/// (...)]`. Ignored properties are excluded.
pub struct CreateStatementBuilder;

impl CreateStatementBuilder {
    pub fn build(descriptor: &EntityDescriptor, kind: StatementKind, name: &str) -> String {
        let columns = descriptor
            .value_properties()
            .map(|prop| format!("{} {}", prop.name, ksql_type(prop.property_type)))
            .collect::<Vec<_>>()
            .join(", ");

        let mut statement = format!("CREATE {} {} ({})", kind.as_ksql(), name, columns);

        let with_clause = Self::with_clause(descriptor);
        if !with_clause.is_empty() {
            statement.push_str(&format!(" WITH ({})", with_clause));
        }
        statement
    }

    fn with_clause(descriptor: &EntityDescriptor) -> String {
        let mut parts = vec![format!("KAFKA_TOPIC='{}'", descriptor.topic_binding.topic_name)];
        parts.push("VALUE_FORMAT='AVRO'".to_owned());
        parts.push(format!("PARTITIONS={}", descriptor.topic_binding.partition_count));
        parts.join(", ")
    }
}

/// The reasons behind a stream-vs-table decision, kept for diagnostics.
#[derive(Debug, Clone)]
pub struct InferenceResult {
    pub kind: StatementKind,
    pub reasons: Vec<String>,
}

/// Infers `STREAM` vs `TABLE` from the accumulated query ops: presence of aggregation, a `GROUP
/// BY`, or certain joins implies a materialized `TABLE`; otherwise a `STREAM`.
pub fn infer_statement_kind(ops: &[QueryOp]) -> InferenceResult {
    let mut reasons = Vec::new();

    let has_group_by = ops.iter().any(|op| matches!(op, QueryOp::GroupBy(_)));
    if has_group_by {
        reasons.push("query has a GROUP BY clause".to_owned());
    }

    let has_aggregation = ops.iter().any(|op| match op {
        QueryOp::Select(lambda) => expr_contains_aggregate_call(&lambda.body),
        QueryOp::Having(_) => true,
        _ => false,
    });
    if has_aggregation {
        reasons.push("query selects an aggregate expression".to_owned());
    }

    let has_table_join = ops.iter().any(|op| matches!(op, QueryOp::Join(_)));
    if has_table_join {
        reasons.push("query joins against another source".to_owned());
    }

    if has_group_by || has_aggregation || has_table_join {
        InferenceResult {
            kind: StatementKind::Table,
            reasons,
        }
    } else {
        if reasons.is_empty() {
            reasons.push("no aggregation, GROUP BY, or join present".to_owned());
        }
        InferenceResult {
            kind: StatementKind::Stream,
            reasons,
        }
    }
}

/// The closed set of aggregate method names: `Count` plus the methods
/// `normalize_aggregate_name` knows how to rename, plus `Sum`/`Min`/`Max`, which pass through
/// unchanged. String methods (`ToString`, `ToLower`, `ToUpper`, `Substring`) are deliberately
/// excluded: a projection can call those without the query becoming an aggregation.
const AGGREGATE_METHODS: &[&str] = &[
    "Count",
    "Sum",
    "Min",
    "Max",
    "Average",
    "LatestByOffset",
    "EarliestByOffset",
    "CollectList",
    "CollectSet",
];

pub(crate) fn expr_contains_aggregate_call(expr: &crate::query::expr::Expr) -> bool {
    use crate::query::expr::Expr;
    match expr {
        Expr::Call { method, .. } => AGGREGATE_METHODS.contains(&method.as_str()),
        Expr::New(fields) => fields.iter().any(|(_, e)| expr_contains_aggregate_call(e)),
        Expr::Cast(inner) => expr_contains_aggregate_call(inner),
        _ => false,
    }
}
