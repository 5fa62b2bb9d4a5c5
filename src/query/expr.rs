//! The query-expression AST: a small sum-type tree that stands in for the source's
//! expression-tree classes. Application code builds it with the helper constructors below
//! rather than through reflection; [`crate::translator::QueryTranslator`] and the clause
//! builders in this module are pattern-matching visitors over it.

use std::marker::PhantomData;

use crate::entity::Entity;

/// One node of a query expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// The lambda parameter itself (`o` in `o => o.Amount`); renders as `*` in a projection.
    Param,
    /// A member-access path, e.g. `o.Amount` -> `["Amount"]`, `g.Key` is represented separately
    /// as [`Expr::GroupKey`] since its meaning (the GROUP BY column list) is unrelated to a
    /// normal field access.
    Member(Vec<String>),
    /// `g.Key` inside a post-GroupBy projection.
    GroupKey,
    Const(ConstValue),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Unary(UnOp, Box<Expr>),
    /// An anonymous-constructor node: `new { A = x.Foo, B = x.Bar }`. Declaration order is
    /// preserved; `alias == None` means "use the member's own name" (the common case where the
    /// field name equals the alias, so `AS` is omitted).
    New(Vec<(String, Expr)>),
    /// Cast/convert is transparent at every clause builder: callers descend into `operand`
    /// rather than emitting anything for the cast itself.
    Cast(Box<Expr>),
    /// A method call, with an optional receiver (`None` for a bare function-style call such as
    /// `g.Count` which is represented with a receiver of `GroupKey`-adjacent context by the
    /// aggregate builder, not here).
    Call {
        method: String,
        receiver: Option<Box<Expr>>,
        args: Vec<Expr>,
    },
    /// A dedicated shape for composite-key equality: `new {a.X,a.Y} equals new {b.X,b.Y}`,
    /// rather than a generic `Binary(Eq, New, New)` that clause builders would have to
    /// special-case by inspecting operands.
    CompositeEquals(Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
    And,
    Or,
}

impl BinOp {
    pub fn as_ksql(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "=",
            BinOp::NotEq => "<>",
            BinOp::Gt => ">",
            BinOp::Gte => ">=",
            BinOp::Lt => "<",
            BinOp::Lte => "<=",
            BinOp::And => "AND",
            BinOp::Or => "OR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Not,
}

/// A recorded lambda: `(param_names, body)`. Most clauses use a single parameter; `Join`'s
/// result selector uses two`").
#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub params: Vec<String>,
    pub body: Expr,
}

impl Lambda {
    pub fn new(params: impl Into<Vec<String>>, body: Expr) -> Self {
        Self {
            params: params.into(),
            body,
        }
    }

    pub fn of1(param: impl Into<String>, body: Expr) -> Self {
        Self::new(vec![param.into()], body)
    }
}

// --- Construction helpers -------------------------------------------------------------------
//
// These are the small eDSL application code uses to build `Expr` trees by hand, standing in for
// what a host language with expression trees would capture implicitly from a closure.

pub fn param() -> Expr {
    Expr::Param
}

pub fn member(path: &[&str]) -> Expr {
    Expr::Member(path.iter().map(|s| s.to_string()).collect())
}

pub fn group_key() -> Expr {
    Expr::GroupKey
}

pub fn lit_bool(b: bool) -> Expr {
    Expr::Const(ConstValue::Bool(b))
}

pub fn lit_int(i: i64) -> Expr {
    Expr::Const(ConstValue::Int(i))
}

pub fn lit_float(f: f64) -> Expr {
    Expr::Const(ConstValue::Float(f))
}

pub fn lit_str(s: impl Into<String>) -> Expr {
    Expr::Const(ConstValue::String(s.into()))
}

pub fn lit_null() -> Expr {
    Expr::Const(ConstValue::Null)
}

pub fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary(op, Box::new(left), Box::new(right))
}

pub fn not(operand: Expr) -> Expr {
    Expr::Unary(UnOp::Not, Box::new(operand))
}

pub fn new_(fields: Vec<(&str, Expr)>) -> Expr {
    Expr::New(fields.into_iter().map(|(n, e)| (n.to_string(), e)).collect())
}

pub fn cast(operand: Expr) -> Expr {
    Expr::Cast(Box::new(operand))
}

pub fn call(method: &str, receiver: Option<Expr>, args: Vec<Expr>) -> Expr {
    Expr::Call {
        method: method.to_string(),
        receiver: receiver.map(Box::new),
        args,
    }
}

pub fn composite_equals(left: Expr, right: Expr) -> Expr {
    Expr::CompositeEquals(Box::new(left), Box::new(right))
}

// --- Query composition ----------------------------------------------------------------------

/// Window kind, accumulated by a fluent chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    Tumbling,
    Hopping,
    Session,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Days,
    Hours,
    Minutes,
    Seconds,
}

impl TimeUnit {
    pub fn as_ksql(self) -> &'static str {
        match self {
            TimeUnit::Days => "DAYS",
            TimeUnit::Hours => "HOURS",
            TimeUnit::Minutes => "MINUTES",
            TimeUnit::Seconds => "SECONDS",
        }
    }
}

/// A duration expressed in the coarsest exact whole unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Duration {
    pub amount: u64,
    pub unit: TimeUnit,
}

impl Duration {
    pub fn new(amount: u64, unit: TimeUnit) -> Self {
        Self { amount, unit }
    }

    /// Builds a `Duration` from milliseconds, choosing the coarsest unit that divides evenly.
    pub fn from_millis(millis: u64) -> Self {
        const SECOND: u64 = 1_000;
        const MINUTE: u64 = 60 * SECOND;
        const HOUR: u64 = 60 * MINUTE;
        const DAY: u64 = 24 * HOUR;

        if millis % DAY == 0 {
            Duration::new(millis / DAY, TimeUnit::Days)
        } else if millis % HOUR == 0 {
            Duration::new(millis / HOUR, TimeUnit::Hours)
        } else if millis % MINUTE == 0 {
            Duration::new(millis / MINUTE, TimeUnit::Minutes)
        } else {
            Duration::new(millis / SECOND, TimeUnit::Seconds)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emit {
    Default,
    Final,
}

/// Window state, accumulated from a fluent chain.
#[derive(Debug, Clone)]
pub struct WindowSpec {
    pub kind: WindowKind,
    pub size: Option<Duration>,
    pub advance_by: Option<Duration>,
    pub gap: Option<Duration>,
    pub retention: Option<Duration>,
    pub grace_period: Option<Duration>,
    pub emit: Emit,
}

impl WindowSpec {
    pub fn tumbling(size: Duration) -> Self {
        Self {
            kind: WindowKind::Tumbling,
            size: Some(size),
            advance_by: None,
            gap: None,
            retention: None,
            grace_period: None,
            emit: Emit::Default,
        }
    }

    pub fn hopping(size: Duration, advance_by: Duration) -> Self {
        Self {
            kind: WindowKind::Hopping,
            size: Some(size),
            advance_by: Some(advance_by),
            gap: None,
            retention: None,
            grace_period: None,
            emit: Emit::Default,
        }
    }

    pub fn session(gap: Duration) -> Self {
        Self {
            kind: WindowKind::Session,
            size: None,
            advance_by: None,
            gap: Some(gap),
            retention: None,
            grace_period: None,
            emit: Emit::Default,
        }
    }

    pub fn retention(mut self, retention: Duration) -> Self {
        self.retention = Some(retention);
        self
    }

    pub fn grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = Some(grace_period);
        self
    }

    pub fn emit_final(mut self) -> Self {
        self.emit = Emit::Final;
        self
    }
}

/// The canonical 5-argument join form: outer and inner sources, a key selector for each side,
/// and a result selector.
#[derive(Debug, Clone)]
pub struct JoinSpec {
    pub inner_source: String,
    pub outer_key: Lambda,
    pub inner_key: Lambda,
    pub result: Lambda,
}

/// One fluent method in the accumulated query. The translator visits these in declaration order
/// but assembles output clauses in the fixed grammar order regardless of this order.
#[derive(Debug, Clone)]
pub enum QueryOp {
    Where(Lambda),
    Select(Lambda),
    GroupBy(Lambda),
    Having(Lambda),
    Take(u64),
    Skip(u64),
    Window(WindowSpec),
    Join(JoinSpec),
    /// Any `OrderBy`/`OrderByDescending`/`ThenBy`/`ThenByDescending` — always rejected.
    OrderBy,
    /// `Distinct`/`Union`/`Intersect`/`Except` — always rejected.
    SetOperation(&'static str),
}

/// The accumulated query expression: a source (stream/table name) plus an ordered list of
/// fluent operations.
#[derive(Debug, Clone)]
pub struct QueryExpr {
    pub source: String,
    pub ops: Vec<QueryOp>,
}

impl QueryExpr {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ops: Vec::new(),
        }
    }

    pub fn push(mut self, op: QueryOp) -> Self {
        self.ops.push(op);
        self
    }
}

/// A typed query over entity `E`, carrying the composed [`QueryExpr`]. Query composition
/// operators (`where_`, `select`, `group_by`, `take`, `skip`) each return a new `Query<E>`
/// wrapping the extended tree, mirroring "EntitySet query composition operators return new
/// EntitySet-like values that carry the composed expression".
#[derive(Debug)]
pub struct Query<E> {
    pub expr: QueryExpr,
    _entity: PhantomData<fn() -> E>,
}

// Written by hand rather than `#[derive(Clone)]`: the derive macro would add an `E: Clone`
// bound to the generated impl even though `E` only ever appears inside `PhantomData`, which
// would force every entity type to implement `Clone` just to compose queries over it.
impl<E> Clone for Query<E> {
    fn clone(&self) -> Self {
        Self {
            expr: self.expr.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Query<E> {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            expr: QueryExpr::new(source),
            _entity: PhantomData,
        }
    }

    fn with_op(mut self, op: QueryOp) -> Self {
        self.expr.ops.push(op);
        self
    }

    pub fn where_(self, predicate: Lambda) -> Self {
        self.with_op(QueryOp::Where(predicate))
    }

    pub fn select(self, projection: Lambda) -> Self {
        self.with_op(QueryOp::Select(projection))
    }

    pub fn group_by(self, key_selector: Lambda) -> Self {
        self.with_op(QueryOp::GroupBy(key_selector))
    }

    pub fn take(self, n: u64) -> Self {
        self.with_op(QueryOp::Take(n))
    }

    pub fn skip(self, n: u64) -> Self {
        self.with_op(QueryOp::Skip(n))
    }

    pub fn window(self, spec: WindowSpec) -> Self {
        self.with_op(QueryOp::Window(spec))
    }

    pub fn join(self, spec: JoinSpec) -> Self {
        self.with_op(QueryOp::Join(spec))
    }

    /// Exists solely to raise `Unsupported` at translation time.
    pub fn order_by(self, _key_selector: Lambda) -> Self {
        self.with_op(QueryOp::OrderBy)
    }

    pub fn order_by_descending(self, _key_selector: Lambda) -> Self {
        self.with_op(QueryOp::OrderBy)
    }

    pub fn distinct(self) -> Self {
        self.with_op(QueryOp::SetOperation("DISTINCT"))
    }
}
