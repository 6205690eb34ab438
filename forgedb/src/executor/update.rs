//! `UPDATE` execution (§4.6).

use log::debug;

use crate::engine::Engine;
use crate::error::{CResult, Error};
use crate::executor::predicate::{matches_all, SingleRowResolver};
use crate::merge::merge;
use crate::row::{RowVersion, TX_INFINITY};
use crate::statement::{QueryResult, UpdateStmt};
use crate::time_source::DEFAULT_VALID_TO;
use crate::value::{coerce, Value};

pub fn execute_update(engine: &mut Engine, stmt: &UpdateStmt) -> CResult<QueryResult> {
    let def = engine.catalog.get(&stmt.table)?.clone();
    let column_names: Vec<String> = def.columns.iter().map(|c| c.name.clone()).collect();

    let assignments: Vec<(usize, Value)> = stmt
        .assignments
        .iter()
        .map(|(name, value)| {
            let idx = def
                .column_index(name)
                .ok_or_else(|| Error::Schema(format!("unknown column '{}' in table '{}'", name, stmt.table)))?;
            let column = &def.columns[idx];
            let coerced = coerce(value, column.col_type);
            if coerced.is_null() && !value.is_null() {
                return Err(Error::Type(format!("cannot coerce value for column '{}'", name)));
            }
            Ok((idx, coerced))
        })
        .collect::<CResult<_>>()?;

    let tx = engine.begin_tx();
    let now = engine.time_source.now_iso8601();
    let table = engine.store.get_mut(&stmt.table)?;

    let mut matching: Vec<usize> = table
        .live_versions_indices()
        .filter(|&idx| {
            let resolver = SingleRowResolver { columns: &column_names, data: &table.versions[idx].data };
            matches_all(&stmt.where_clause, &resolver)
        })
        .collect();
    matching.sort_unstable();

    let (valid_from, valid_to) = match &stmt.valid_period {
        Some((from, to)) => (from.clone(), to.clone()),
        None => (now, DEFAULT_VALID_TO.to_string()),
    };

    let mut updated = 0usize;
    for idx in matching {
        let old = table.versions[idx].data.clone();
        let mut new_data = old.clone();
        for (col_idx, value) in &assignments {
            let column = &def.columns[*col_idx];
            new_data[*col_idx] = if def.mergeable && !matches!(column.merge, crate::merge::MergeSpec::None) {
                merge(&column.merge, &old[*col_idx], value)
            } else {
                value.clone()
            };
        }

        let successor = RowVersion {
            row_id: table.versions[idx].row_id.clone(),
            tx_from: tx,
            tx_to: TX_INFINITY,
            valid_from: valid_from.clone(),
            valid_to: valid_to.clone(),
            data: new_data,
        };
        table.append_successor(idx, tx, successor);
        updated += 1;
    }

    debug!("UPDATE {} matched {} row(s) at tx {}", stmt.table, updated, tx);
    Ok(QueryResult::ok(format!("UPDATE {} row(s)", updated)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, TableDef};
    use crate::statement::{ColumnRef, CmpOp, Condition};
    use crate::value::ColumnType;
    use pretty_assertions::assert_eq;

    fn setup() -> Engine {
        let mut engine = Engine::new();
        let mut pk = Column::new("id", ColumnType::Int);
        pk.primary_key = true;
        engine.create_table(TableDef::new("t", vec![pk, Column::new("v", ColumnType::Int)])).unwrap();
        engine
    }

    #[test]
    fn update_creates_new_version_and_closes_old() {
        let mut engine = setup();
        crate::executor::insert::execute_insert(&mut engine, &crate::statement::InsertStmt {
            table: "t".to_string(),
            columns: vec!["id".to_string(), "v".to_string()],
            rows: vec![vec![Value::Int(1), Value::Int(10)]],
            on_conflict_merge: false,
        }).unwrap();

        execute_update(&mut engine, &UpdateStmt {
            table: "t".to_string(),
            assignments: vec![("v".to_string(), Value::Int(20))],
            where_clause: vec![Condition::Compare {
                column: ColumnRef::unqualified("id"),
                op: CmpOp::Eq,
                value: Value::Int(1),
            }],
            valid_period: None,
        }).unwrap();

        let table = engine.store.get("t").unwrap();
        assert_eq!(table.versions.len(), 2);
        assert_eq!(table.versions[0].tx_to, table.versions[1].tx_from);
        let live = table.live_versions().next().unwrap();
        assert_eq!(live.data[1], Value::Int(20));
    }

    #[test]
    fn valid_period_overrides_defaults() {
        let mut engine = setup();
        crate::executor::insert::execute_insert(&mut engine, &crate::statement::InsertStmt {
            table: "t".to_string(),
            columns: vec!["id".to_string(), "v".to_string()],
            rows: vec![vec![Value::Int(1), Value::Int(10)]],
            on_conflict_merge: false,
        }).unwrap();

        execute_update(&mut engine, &UpdateStmt {
            table: "t".to_string(),
            assignments: vec![("v".to_string(), Value::Int(20))],
            where_clause: vec![],
            valid_period: Some(("2020-01-01T00:00:00Z".to_string(), "2021-01-01T00:00:00Z".to_string())),
        }).unwrap();

        let table = engine.store.get("t").unwrap();
        let live = table.live_versions().next().unwrap();
        assert_eq!(live.valid_from, "2020-01-01T00:00:00Z");
        assert_eq!(live.valid_to, "2021-01-01T00:00:00Z");
    }
}
