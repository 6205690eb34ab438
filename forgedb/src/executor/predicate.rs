//! Common predicate evaluation shared by `SELECT`, `UPDATE`, and
//! `DELETE` (§4.4).

use crate::statement::{CmpOp, ColumnRef, Condition};
use crate::value::Value;

/// Resolves a (possibly qualified) column reference to a cell value for
/// the row currently under evaluation. Implemented once for a plain
/// table scan and once for a joined pair.
pub trait ColumnResolver {
    fn resolve(&self, column: &ColumnRef) -> Option<&Value>;
}

/// A single table's row, paired with its column name list.
pub struct SingleRowResolver<'a> {
    pub columns: &'a [String],
    pub data: &'a [Value],
}

impl<'a> ColumnResolver for SingleRowResolver<'a> {
    fn resolve(&self, column: &ColumnRef) -> Option<&Value> {
        let idx = self.columns.iter().position(|c| c.eq_ignore_ascii_case(&column.name))?;
        self.data.get(idx)
    }
}

/// A joined pair of rows: `left.table` identifies which side a qualified
/// reference belongs to; an unqualified reference is tried against the
/// left side first, then the right.
pub struct JoinRowResolver<'a> {
    pub left_table: &'a str,
    pub left_columns: &'a [String],
    pub left_data: &'a [Value],
    pub right_table: &'a str,
    pub right_columns: &'a [String],
    pub right_data: &'a [Value],
}

impl<'a> ColumnResolver for JoinRowResolver<'a> {
    fn resolve(&self, column: &ColumnRef) -> Option<&Value> {
        let find = |columns: &[String], data: &'a [Value]| {
            columns.iter().position(|c| c.eq_ignore_ascii_case(&column.name)).and_then(|i| data.get(i))
        };

        match &column.table {
            Some(t) if t.eq_ignore_ascii_case(self.left_table) => find(self.left_columns, self.left_data),
            Some(t) if t.eq_ignore_ascii_case(self.right_table) => find(self.right_columns, self.right_data),
            Some(_) => None,
            None => find(self.left_columns, self.left_data).or_else(|| find(self.right_columns, self.right_data)),
        }
    }
}

/// Evaluates a `WHERE` clause (a conjunction of conditions) against one
/// row via its resolver. An empty clause matches everything.
pub fn matches_all(conditions: &[Condition], resolver: &dyn ColumnResolver) -> bool {
    conditions.iter().all(|cond| matches_one(cond, resolver))
}

fn matches_one(condition: &Condition, resolver: &dyn ColumnResolver) -> bool {
    match condition {
        Condition::Compare { column, op, value } => {
            match resolver.resolve(column) {
                Some(cell) => compare(cell, *op, value),
                None => false,
            }
        }
        Condition::IsNull { column } => matches!(resolver.resolve(column), Some(Value::Null) | None),
        Condition::IsNotNull { column } => {
            !matches!(resolver.resolve(column), Some(Value::Null) | None)
        }
        Condition::Distance { column, vector, threshold } => match resolver.resolve(column) {
            Some(Value::Vector(stored)) if stored.len() == vector.len() => {
                l2_distance(stored, vector) < *threshold
            }
            _ => false,
        },
    }
}

/// Type-compatible comparisons only: int-int, string-string,
/// double-to-either-numeric (the non-double side widened). Any other
/// combination evaluates to false.
fn compare(lhs: &Value, op: CmpOp, rhs: &Value) -> bool {
    let ordering = match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
        (Value::Text(a), Value::Text(b)) => a.partial_cmp(b),
        (Value::Double(_), _) | (_, Value::Double(_)) => {
            match (lhs.as_f64(), rhs.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => None,
            }
        }
        _ => None,
    };

    match ordering {
        Some(ord) => match op {
            CmpOp::Eq => ord == std::cmp::Ordering::Equal,
            CmpOp::Ne => ord != std::cmp::Ordering::Equal,
            CmpOp::Lt => ord == std::cmp::Ordering::Less,
            CmpOp::Le => ord != std::cmp::Ordering::Greater,
            CmpOp::Gt => ord == std::cmp::Ordering::Greater,
            CmpOp::Ge => ord != std::cmp::Ordering::Less,
        },
        None => false,
    }
}

pub fn l2_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt()
}
