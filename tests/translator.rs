//! Literal end-to-end translation scenarios, plus the universal properties around Unsupported
//! operations and the Pull/Push EMIT CHANGES decision.

use ksql_entities::query::expr::{
    binary, call, composite_equals, lit_int, member, new_, not, BinOp, JoinSpec, Lambda, QueryExpr,
    QueryOp, WindowSpec,
};
use ksql_entities::query::expr::{Duration, TimeUnit};
use ksql_entities::query::join::JoinBuilder;
use ksql_entities::query::window::WindowBuilder;
use ksql_entities::translator::QueryTranslator;

fn translate(expr: &QueryExpr, pull_hint: bool) -> String {
    QueryTranslator::translate(expr, pull_hint).unwrap().ksql
}

#[test]
fn bare_to_ksql_is_a_push_query() {
    let expr = QueryExpr::new("test-orders");
    assert_eq!(translate(&expr, false), "SELECT * FROM test-orders EMIT CHANGES");
}

#[test]
fn where_amount_greater_than() {
    let expr = QueryExpr::new("test-orders").push(QueryOp::Where(Lambda::of1(
        "o",
        binary(BinOp::Gt, member(&["Amount"]), lit_int(1000)),
    )));
    assert_eq!(
        translate(&expr, false),
        "SELECT * FROM test-orders WHERE (Amount > 1000) EMIT CHANGES"
    );
}

#[test]
fn group_by_with_aggregates_and_having() {
    let group_by = Lambda::of1("o", member(&["CustomerId"]));
    let select = Lambda::of1(
        "g",
        new_(vec![
            ("CustomerId", ksql_entities::query::expr::group_key()),
            (
                "TotalAmount",
                call("Sum", None, vec![member(&["Amount"])]),
            ),
            ("OrderCount", call("Count", None, vec![])),
        ]),
    );
    let having = Lambda::of1(
        "g",
        binary(BinOp::Gt, member(&["TotalAmount"]), lit_int(100)),
    );

    let expr = QueryExpr::new("test-orders")
        .push(QueryOp::GroupBy(group_by))
        .push(QueryOp::Select(select))
        .push(QueryOp::Where(having));

    assert_eq!(
        translate(&expr, false),
        "SELECT CustomerId, SUM(Amount) AS TotalAmount, COUNT(*) AS OrderCount FROM test-orders \
         GROUP BY CustomerId HAVING (SUM(Amount) > 100) EMIT CHANGES"
    );
}

#[test]
fn negated_bool_with_take_is_a_pull_query() {
    let expr = QueryExpr::new("test-orders")
        .push(QueryOp::Where(Lambda::of1(
            "o",
            not(member(&["IsActive"])),
        )))
        .push(QueryOp::Take(10));

    assert_eq!(
        translate(&expr, true),
        "SELECT * FROM test-orders WHERE (IsActive = false) LIMIT 10"
    );
}

#[test]
fn tumbling_window_with_retention_grace_and_emit_final() {
    let spec = WindowSpec::tumbling(Duration::new(5, TimeUnit::Minutes))
        .retention(Duration::new(2, TimeUnit::Hours))
        .grace_period(Duration::new(10, TimeUnit::Seconds))
        .emit_final();

    assert_eq!(
        WindowBuilder::build(&spec).unwrap(),
        "WINDOW TUMBLING (SIZE 5 MINUTES, RETENTION 2 HOURS, GRACE PERIOD 10 SECONDS) EMIT FINAL"
    );
}

#[test]
fn composite_key_join_on_clause() {
    let spec = JoinSpec {
        inner_source: "test-types".to_owned(),
        outer_key: Lambda::new(
            vec!["a".to_owned(), "b".to_owned()],
            composite_equals(
                new_(vec![
                    ("Id", member(&["a", "Id"])),
                    ("Type", member(&["a", "Type"])),
                ]),
                new_(vec![
                    ("Id", member(&["b", "Id"])),
                    ("Type", member(&["b", "Type"])),
                ]),
            ),
        ),
        inner_key: Lambda::new(vec!["b".to_owned()], member(&["b", "Id"])),
        result: Lambda::new(vec!["a".to_owned(), "b".to_owned()], member(&["a"])),
    };

    let result = JoinBuilder::build(&spec).unwrap();
    assert_eq!(result.on_clause, "(a.Id = b.Id AND a.Type = b.Type)");
}

#[test]
fn composite_key_join_rejects_mismatched_arity() {
    let spec = JoinSpec {
        inner_source: "test-types".to_owned(),
        outer_key: Lambda::new(
            vec!["a".to_owned(), "b".to_owned()],
            composite_equals(
                new_(vec![("Id", member(&["a", "Id"]))]),
                new_(vec![
                    ("Id", member(&["b", "Id"])),
                    ("Type", member(&["b", "Type"])),
                ]),
            ),
        ),
        inner_key: Lambda::new(vec!["b".to_owned()], member(&["b", "Id"])),
        result: Lambda::new(vec!["a".to_owned()], member(&["a"])),
    };
    assert!(JoinBuilder::build(&spec).is_err());
}

#[test]
fn order_by_is_always_unsupported() {
    let expr = QueryExpr::new("test-orders").push(QueryOp::OrderBy);
    assert!(QueryTranslator::translate(&expr, false).is_err());
}

#[test]
fn set_operations_are_always_unsupported() {
    let expr = QueryExpr::new("test-orders").push(QueryOp::SetOperation("DISTINCT"));
    assert!(QueryTranslator::translate(&expr, false).is_err());
}

#[test]
fn session_window_rejects_retention_and_emit_final() {
    let spec = WindowSpec::session(Duration::new(30, TimeUnit::Seconds)).emit_final();
    assert!(WindowBuilder::build(&spec).is_err());
}

#[test]
fn projection_string_method_without_group_by_is_not_treated_as_an_aggregate() {
    let expr = QueryExpr::new("test-orders").push(QueryOp::Select(Lambda::of1(
        "o",
        new_(vec![(
            "Name",
            call("ToUpper", Some(member(&["Name"])), vec![]),
        )]),
    )));
    assert_eq!(
        translate(&expr, false),
        "SELECT UCASE(Name) AS Name FROM test-orders EMIT CHANGES"
    );
}

#[test]
fn push_query_always_contains_emit_changes_and_pull_never_does() {
    let push = QueryExpr::new("test-orders").push(QueryOp::GroupBy(Lambda::of1(
        "o",
        member(&["CustomerId"]),
    )));
    let push_ksql = translate(&push, true); // pull_hint is overridden: GroupBy dominates
    assert!(push_ksql.contains("EMIT CHANGES"));

    let pull = QueryExpr::new("test-orders").push(QueryOp::Take(5));
    let pull_ksql = translate(&pull, true);
    assert!(!pull_ksql.contains("EMIT CHANGES"));
}
