//! `SELECT ... JOIN` execution (§4.8, join path): a single inner
//! equi-join, implemented as a hash join keyed by the canonical
//! encoding of the join column (the same encoding used for group keys,
//! so the two paths can never be confused).

use std::collections::HashMap;

use crate::engine::{Engine, INFINITY};
use crate::error::{CResult, Error};
use crate::executor::aggregate::{compute_groups, has_aggregates};
use crate::executor::predicate::{matches_all, ColumnResolver, JoinRowResolver};
use crate::statement::{ColumnRef, ProjectionItem, QueryResult, SelectStmt};
use crate::value::Value;

enum JoinItem {
    Data(ColumnRef),
}

impl JoinItem {
    fn header(&self, left_table: &str, right_table: &str, resolver: &JoinRowResolver) -> String {
        match self {
            JoinItem::Data(col) => match &col.table {
                Some(t) => format!("{}.{}", t, col.name),
                None => {
                    if resolver.left_columns.iter().any(|c| c.eq_ignore_ascii_case(&col.name)) {
                        format!("{}.{}", left_table, col.name)
                    } else {
                        format!("{}.{}", right_table, col.name)
                    }
                }
            },
        }
    }
}

fn expand_star_join(left_columns: &[String], right_columns: &[String], left_table: &str, right_table: &str) -> Vec<JoinItem> {
    left_columns
        .iter()
        .map(|n| JoinItem::Data(ColumnRef::qualified(left_table, n)))
        .chain(right_columns.iter().map(|n| JoinItem::Data(ColumnRef::qualified(right_table, n))))
        .collect()
}

fn expand_projections(
    projections: &[ProjectionItem],
    left_columns: &[String],
    right_columns: &[String],
    left_table: &str,
    right_table: &str,
) -> Vec<JoinItem> {
    projections
        .iter()
        .flat_map(|p| match p {
            ProjectionItem::Star => expand_star_join(left_columns, right_columns, left_table, right_table),
            ProjectionItem::Column(col) => vec![JoinItem::Data(col.clone())],
            _ => vec![],
        })
        .collect()
}

pub fn execute_join(engine: &Engine, stmt: &SelectStmt) -> CResult<QueryResult> {
    let join = stmt.join.as_ref().ok_or_else(|| Error::Internal("execute_join called without a JOIN clause".to_string()))?;

    let left_def = engine.catalog.get(&stmt.table)?;
    let right_def = engine.catalog.get(&join.right_table)?;
    let left_table = engine.store.get(&stmt.table)?;
    let right_table = engine.store.get(&join.right_table)?;

    let left_columns: Vec<String> = left_def.columns.iter().map(|c| c.name.clone()).collect();
    let right_columns: Vec<String> = right_def.columns.iter().map(|c| c.name.clone()).collect();

    let asof_tx = stmt.as_of_tx.unwrap_or(INFINITY);
    let left_rows = left_table.versions_asof(asof_tx);
    let right_rows = right_table.versions_asof(asof_tx);

    let mut right_by_key: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, row) in right_rows.iter().enumerate() {
        let resolver = crate::executor::predicate::SingleRowResolver { columns: &right_columns, data: &row.data };
        if let Some(value) = resolver.resolve(&strip_qualifier(&join.right_column)) {
            right_by_key.entry(value.canonical_encoding()).or_default().push(idx);
        }
    }

    let mut resolvers: Vec<JoinRowResolver> = Vec::new();
    for left_row in &left_rows {
        let left_resolver = crate::executor::predicate::SingleRowResolver { columns: &left_columns, data: &left_row.data };
        let Some(left_key) = left_resolver.resolve(&strip_qualifier(&join.left_column)) else { continue };
        let Some(candidates) = right_by_key.get(&left_key.canonical_encoding()) else { continue };
        for &right_idx in candidates {
            resolvers.push(JoinRowResolver {
                left_table: &stmt.table,
                left_columns: &left_columns,
                left_data: &left_row.data,
                right_table: &join.right_table,
                right_columns: &right_columns,
                right_data: &right_rows[right_idx].data,
            });
        }
    }

    let matching: Vec<&JoinRowResolver> =
        resolvers.iter().filter(|r| matches_all(&stmt.where_clause, *r)).collect();

    if !stmt.group_by.is_empty() || has_aggregates(&stmt.projections) {
        let row_resolvers: Vec<&dyn ColumnResolver> = matching.iter().map(|r| *r as &dyn ColumnResolver).collect();
        let (headers, mut rows) = compute_groups(row_resolvers.into_iter(), &stmt.group_by, &stmt.projections);
        crate::executor::select::sort_by_header(&headers, &mut rows, stmt.order_by.as_ref());
        if let Some(limit) = stmt.limit {
            rows.truncate(limit);
        }
        return Ok(QueryResult::rows(headers, rows));
    }

    let items = expand_projections(&stmt.projections, &left_columns, &right_columns, &stmt.table, &join.right_table);

    let headers: Vec<String> = match matching.first() {
        Some(resolver) => items.iter().map(|item| item.header(&stmt.table, &join.right_table, resolver)).collect(),
        None => {
            // No matching rows to derive qualification from; fall back to a
            // resolver built from empty data purely to compute headers.
            let empty_left = vec![Value::Null; left_columns.len()];
            let empty_right = vec![Value::Null; right_columns.len()];
            let placeholder = JoinRowResolver {
                left_table: &stmt.table,
                left_columns: &left_columns,
                left_data: &empty_left,
                right_table: &join.right_table,
                right_columns: &right_columns,
                right_data: &empty_right,
            };
            items.iter().map(|item| item.header(&stmt.table, &join.right_table, &placeholder)).collect()
        }
    };

    let mut rows: Vec<Vec<Value>> = matching
        .iter()
        .map(|resolver| {
            items
                .iter()
                .map(|item| match item {
                    JoinItem::Data(col) => resolver.resolve(col).cloned().unwrap_or(Value::Null),
                })
                .collect()
        })
        .collect();

    crate::executor::select::sort_by_header(&headers, &mut rows, stmt.order_by.as_ref());

    if let Some(limit) = stmt.limit {
        rows.truncate(limit);
    }

    Ok(QueryResult::rows(headers, rows))
}

fn strip_qualifier(column: &ColumnRef) -> ColumnRef {
    ColumnRef::unqualified(&column.name)
}
