//! `SELECT` execution (§4.8): the single-table path. Joins are handled
//! by [`crate::executor::join`] and dispatched to from here when the
//! statement carries a `JOIN` clause.

use std::cmp::Ordering;

use rand::rngs::StdRng;

use crate::dp::{new_rng, sample_laplace, scale_for_epsilon};
use crate::engine::{Engine, INFINITY};
use crate::error::{CResult, Error};
use crate::executor::aggregate::{compute_groups, has_aggregates};
use crate::executor::join::execute_join;
use crate::executor::predicate::{matches_all, ColumnResolver, SingleRowResolver};
use crate::row::RowVersion;
use crate::statement::{ColumnRef, OrderBy, ProjectionItem, QueryResult, SelectStmt};
use crate::value::Value;

/// A projection item after `*` has been expanded against a concrete
/// column list; the four leading-underscore names are synthesized from
/// the row version's own bookkeeping fields rather than its data (§4.8).
enum ExpandedItem {
    Data(ColumnRef),
    TxFrom,
    TxTo,
    ValidFrom,
    ValidTo,
}

impl ExpandedItem {
    fn header(&self) -> String {
        match self {
            ExpandedItem::Data(col) => col.name.clone(),
            ExpandedItem::TxFrom => "_tx_from".to_string(),
            ExpandedItem::TxTo => "_tx_to".to_string(),
            ExpandedItem::ValidFrom => "_valid_from".to_string(),
            ExpandedItem::ValidTo => "_valid_to".to_string(),
        }
    }
}

pub fn expand_star(column_names: &[String]) -> Vec<ExpandedItem> {
    let mut items: Vec<ExpandedItem> =
        column_names.iter().map(|n| ExpandedItem::Data(ColumnRef::unqualified(n))).collect();
    items.push(ExpandedItem::TxFrom);
    items.push(ExpandedItem::TxTo);
    items.push(ExpandedItem::ValidFrom);
    items.push(ExpandedItem::ValidTo);
    items
}

fn expand_projections(projections: &[ProjectionItem], column_names: &[String]) -> Vec<ExpandedItem> {
    projections
        .iter()
        .flat_map(|p| match p {
            ProjectionItem::Star => expand_star(column_names),
            ProjectionItem::Column(col) => vec![ExpandedItem::Data(col.clone())],
            _ => vec![],
        })
        .collect()
}

fn project_row(items: &[ExpandedItem], resolver: &dyn ColumnResolver, row: &RowVersion) -> Vec<Value> {
    items
        .iter()
        .map(|item| match item {
            ExpandedItem::Data(col) => resolver.resolve(col).cloned().unwrap_or(Value::Null),
            ExpandedItem::TxFrom => Value::Int(row.tx_from),
            ExpandedItem::TxTo => Value::Int(row.tx_to),
            ExpandedItem::ValidFrom => Value::Text(row.valid_from.clone()),
            ExpandedItem::ValidTo => Value::Text(row.valid_to.clone()),
        })
        .collect()
}

pub fn execute_select(
    engine: &Engine,
    stmt: &SelectStmt,
    rng: &mut StdRng,
    dp_epsilon: f64,
) -> CResult<QueryResult> {
    if stmt.join.is_some() {
        return execute_join(engine, stmt);
    }

    let def = engine.catalog.get(&stmt.table)?;
    let table = engine.store.get(&stmt.table)?;
    let column_names: Vec<String> = def.columns.iter().map(|c| c.name.clone()).collect();
    let asof_tx = stmt.as_of_tx.unwrap_or(INFINITY);

    let visible: Vec<&RowVersion> = table.versions_asof(asof_tx);
    let resolvers: Vec<SingleRowResolver> =
        visible.iter().map(|row| SingleRowResolver { columns: &column_names, data: &row.data }).collect();

    let matching: Vec<usize> = (0..visible.len())
        .filter(|&i| matches_all(&stmt.where_clause, &resolvers[i]))
        .collect();

    let has_dp_count = stmt.projections.iter().any(|p| matches!(p, ProjectionItem::DpCount));
    if has_dp_count {
        if stmt.projections.len() != 1 || !stmt.group_by.is_empty() {
            return Err(Error::Unsupported(
                "DP_COUNT(*) must be the sole projection with no GROUP BY".to_string(),
            ));
        }
        let count = matching.len() as f64;
        let noisy = count + sample_laplace(rng, scale_for_epsilon(dp_epsilon));
        return Ok(QueryResult::rows(vec!["dp_count".to_string()], vec![vec![Value::Double(noisy)]]));
    }

    if !stmt.group_by.is_empty() || has_aggregates(&stmt.projections) {
        let row_resolvers: Vec<&dyn ColumnResolver> =
            matching.iter().map(|&i| &resolvers[i] as &dyn ColumnResolver).collect();
        let (headers, mut rows) = compute_groups(row_resolvers.into_iter(), &stmt.group_by, &stmt.projections);
        sort_by_header(&headers, &mut rows, stmt.order_by.as_ref());
        if let Some(limit) = stmt.limit {
            rows.truncate(limit);
        }
        return Ok(QueryResult::rows(headers, rows));
    }

    let items = expand_projections(&stmt.projections, &column_names);
    let headers: Vec<String> = items.iter().map(ExpandedItem::header).collect();

    let mut rows: Vec<Vec<Value>> =
        matching.iter().map(|&i| project_row(&items, &resolvers[i], visible[i])).collect();

    if let Some(order) = &stmt.order_by {
        sort_rows(&mut rows, &matching, &resolvers, order);
    }

    if let Some(limit) = stmt.limit {
        rows.truncate(limit);
    }

    Ok(QueryResult::rows(headers, rows))
}

fn sort_rows(
    rows: &mut [Vec<Value>],
    matching: &[usize],
    resolvers: &[SingleRowResolver],
    order: &OrderBy,
) {
    let column = ColumnRef::unqualified(&order.column);
    let keys: Vec<Value> = matching
        .iter()
        .map(|&i| resolvers[i].resolve(&column).cloned().unwrap_or(Value::Null))
        .collect();

    let mut indices: Vec<usize> = (0..rows.len()).collect();
    indices.sort_by(|&a, &b| {
        let ord = cmp_values(&keys[a], &keys[b]);
        if order.descending { ord.reverse() } else { ord }
    });

    let sorted_rows: Vec<Vec<Value>> = indices.iter().map(|&i| rows[i].clone()).collect();
    rows.clone_from_slice(&sorted_rows);
}

/// Sorts an already-projected result set (e.g. the output of
/// [`compute_groups`]) by one of its own output headers. Used where the
/// sort key is no longer a raw row the original resolvers can be
/// consulted for — grouped/aggregated and joined output.
pub fn sort_by_header(headers: &[String], rows: &mut [Vec<Value>], order_by: Option<&OrderBy>) {
    let Some(order) = order_by else { return };
    let Some(col_idx) = headers.iter().position(|h| h.eq_ignore_ascii_case(&order.column)) else { return };

    let mut indices: Vec<usize> = (0..rows.len()).collect();
    indices.sort_by(|&a, &b| {
        let ord = cmp_values(&rows[a][col_idx], &rows[b][col_idx]);
        if order.descending { ord.reverse() } else { ord }
    });

    let sorted: Vec<Vec<Value>> = indices.iter().map(|&i| rows[i].clone()).collect();
    rows.clone_from_slice(&sorted);
}

fn cmp_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Text(x), Value::Text(y)) => x.cmp(y),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, TableDef};
    use crate::executor::insert::execute_insert;
    use crate::statement::InsertStmt;
    use crate::value::ColumnType;
    use pretty_assertions::assert_eq;

    fn setup() -> Engine {
        let mut engine = Engine::new();
        let mut pk = Column::new("id", ColumnType::Int);
        pk.primary_key = true;
        engine
            .create_table(TableDef::new("t", vec![pk, Column::new("region", ColumnType::Text), Column::new("amt", ColumnType::Int)]))
            .unwrap();
        for (id, region, amt) in [(1, "E", 5), (2, "E", 7), (3, "W", 3)] {
            execute_insert(&mut engine, &InsertStmt {
                table: "t".to_string(),
                columns: vec!["id".to_string(), "region".to_string(), "amt".to_string()],
                rows: vec![vec![Value::Int(id), Value::Text(region.to_string()), Value::Int(amt)]],
                on_conflict_merge: false,
            })
            .unwrap();
        }
        engine
    }

    fn base_select() -> SelectStmt {
        SelectStmt {
            projections: vec![ProjectionItem::Star],
            table: "t".to_string(),
            join: None,
            as_of_tx: None,
            where_clause: vec![],
            group_by: vec![],
            order_by: None,
            limit: None,
        }
    }

    #[test]
    fn star_expands_data_and_metadata_columns() {
        let engine = setup();
        let mut rng = new_rng(1);
        let result = execute_select(&engine, &base_select(), &mut rng, 1.0).unwrap();
        assert_eq!(result.headers, vec!["id", "region", "amt", "_tx_from", "_tx_to", "_valid_from", "_valid_to"]);
        assert_eq!(result.rows.len(), 3);
    }

    #[test]
    fn group_by_with_sum_matches_expected_totals() {
        let engine = setup();
        let mut rng = new_rng(1);
        let stmt = SelectStmt {
            projections: vec![
                ProjectionItem::Column(ColumnRef::unqualified("region")),
                ProjectionItem::Sum(ColumnRef::unqualified("amt")),
            ],
            group_by: vec!["region".to_string()],
            ..base_select()
        };
        let result = execute_select(&engine, &stmt, &mut rng, 1.0).unwrap();
        assert_eq!(result.rows, vec![
            vec![Value::Text("E".to_string()), Value::Double(12.0)],
            vec![Value::Text("W".to_string()), Value::Double(3.0)],
        ]);
    }

    #[test]
    fn order_by_descending_sorts_rows() {
        let engine = setup();
        let mut rng = new_rng(1);
        let stmt = SelectStmt {
            projections: vec![ProjectionItem::Column(ColumnRef::unqualified("amt"))],
            order_by: Some(OrderBy { column: "amt".to_string(), descending: true }),
            ..base_select()
        };
        let result = execute_select(&engine, &stmt, &mut rng, 1.0).unwrap();
        assert_eq!(result.rows, vec![vec![Value::Int(7)], vec![Value::Int(5)], vec![Value::Int(3)]]);
    }

    #[test]
    fn dp_count_returns_single_noisy_row() {
        let engine = setup();
        let mut rng = new_rng(1);
        let stmt = SelectStmt { projections: vec![ProjectionItem::DpCount], ..base_select() };
        let result = execute_select(&engine, &stmt, &mut rng, 1.0).unwrap();
        assert_eq!(result.headers, vec!["dp_count".to_string()]);
        assert_eq!(result.rows.len(), 1);
    }

    #[test]
    fn dp_count_rejects_group_by() {
        let engine = setup();
        let mut rng = new_rng(1);
        let stmt = SelectStmt {
            projections: vec![ProjectionItem::DpCount],
            group_by: vec!["region".to_string()],
            ..base_select()
        };
        assert!(matches!(execute_select(&engine, &stmt, &mut rng, 1.0), Err(Error::Unsupported(_))));
    }

    #[test]
    fn dp_count_rejects_additional_projections() {
        let engine = setup();
        let mut rng = new_rng(1);
        let stmt = SelectStmt {
            projections: vec![ProjectionItem::DpCount, ProjectionItem::Column(ColumnRef::unqualified("region"))],
            ..base_select()
        };
        assert!(matches!(execute_select(&engine, &stmt, &mut rng, 1.0), Err(Error::Unsupported(_))));
    }
}
