//! The parsed-statement contract (§6.1): the shape the `forgedb-sql`
//! parser collaborator produces and the executor consumes. These types
//! are plain data — no parsing logic lives here.

use crate::catalog::Column;
use crate::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// An unqualified or qualified column reference inside a predicate or
/// projection item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnRef {
    pub table: Option<String>,
    pub name: String,
}

impl ColumnRef {
    pub fn unqualified(name: impl Into<String>) -> Self {
        ColumnRef { table: None, name: name.into() }
    }

    pub fn qualified(table: impl Into<String>, name: impl Into<String>) -> Self {
        ColumnRef { table: Some(table.into()), name: name.into() }
    }
}

/// A single `WHERE` condition. A full `WHERE` clause is a conjunction
/// (`Vec<Condition>`, ANDed) — disjunction is not supported (§4.4).
#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    Compare { column: ColumnRef, op: CmpOp, value: Value },
    IsNull { column: ColumnRef },
    IsNotNull { column: ColumnRef },
    /// `DISTANCE(col, literal_vector) < threshold`, L2 distance.
    Distance { column: ColumnRef, vector: Vec<f64>, threshold: f64 },
}

#[derive(Clone, Debug, PartialEq)]
pub enum ProjectionItem {
    Star,
    Column(ColumnRef),
    Count,
    Sum(ColumnRef),
    Avg(ColumnRef),
    Min(ColumnRef),
    Max(ColumnRef),
    DpCount,
}

#[derive(Clone, Debug, PartialEq)]
pub struct JoinClause {
    pub right_table: String,
    pub left_column: ColumnRef,
    pub right_column: ColumnRef,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CreateStmt {
    pub table: String,
    pub columns: Vec<Column>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DropStmt {
    pub table: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InsertStmt {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub on_conflict_merge: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UpdateStmt {
    pub table: String,
    pub assignments: Vec<(String, Value)>,
    pub where_clause: Vec<Condition>,
    pub valid_period: Option<(String, String)>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DeleteStmt {
    pub table: String,
    pub where_clause: Vec<Condition>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SelectStmt {
    pub projections: Vec<ProjectionItem>,
    pub table: String,
    pub join: Option<JoinClause>,
    pub as_of_tx: Option<i64>,
    pub where_clause: Vec<Condition>,
    pub group_by: Vec<String>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SetStmt {
    pub key: String,
    pub value: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SaveStmt {
    pub path: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoadStmt {
    pub path: String,
}

/// The 13 discriminated statement kinds, plus `Invalid` carrying a parse
/// error message (§6.1).
#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    Create(CreateStmt),
    Drop(DropStmt),
    Insert(InsertStmt),
    Update(UpdateStmt),
    Delete(DeleteStmt),
    Select(SelectStmt),
    Set(SetStmt),
    Save(SaveStmt),
    Load(LoadStmt),
    Begin,
    Commit,
    Rollback,
    Exit,
    Invalid(String),
}

/// The uniform result shape for every statement (§6.3).
#[derive(Clone, Debug, PartialEq, Default)]
pub struct QueryResult {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub message: String,
    pub ok: bool,
}

impl QueryResult {
    pub fn ok(message: impl Into<String>) -> Self {
        QueryResult { headers: Vec::new(), rows: Vec::new(), message: message.into(), ok: true }
    }

    pub fn err(message: impl Into<String>) -> Self {
        QueryResult { headers: Vec::new(), rows: Vec::new(), message: message.into(), ok: false }
    }

    pub fn rows(headers: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        QueryResult { headers, rows, message: String::new(), ok: true }
    }
}
