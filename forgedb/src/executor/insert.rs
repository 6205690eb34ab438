//! `INSERT` execution (§4.5).

use log::debug;

use crate::engine::Engine;
use crate::error::{CResult, Error};
use crate::merge::{merge, MergeSpec};
use crate::row::{derive_row_id, RowVersion, TX_INFINITY};
use crate::statement::{InsertStmt, QueryResult};
use crate::time_source::DEFAULT_VALID_TO;
use crate::value::{coerce, Value};

pub fn execute_insert(engine: &mut Engine, stmt: &InsertStmt) -> CResult<QueryResult> {
    let def = engine.catalog.get(&stmt.table)?.clone();

    let pk_index = def.pk_index.ok_or_else(|| Error::Schema("PRIMARY KEY required".to_string()))?;

    for row in &stmt.rows {
        if row.len() != stmt.columns.len() {
            return Err(Error::Arity(format!(
                "INSERT into {}: {} values for {} columns",
                stmt.table,
                row.len(),
                stmt.columns.len()
            )));
        }
    }

    let col_positions: Vec<usize> = stmt
        .columns
        .iter()
        .map(|name| {
            def.column_index(name)
                .ok_or_else(|| Error::Schema(format!("unknown column '{}' in table '{}'", name, stmt.table)))
        })
        .collect::<CResult<_>>()?;

    let tx = engine.begin_tx();
    let now = engine.time_source.now_iso8601();
    let table = engine.store.get_mut(&stmt.table)?;
    let mut inserted = 0usize;

    for row in &stmt.rows {
        let mut new_data = vec![Value::Null; def.columns.len()];
        for (literal, &pos) in row.iter().zip(col_positions.iter()) {
            let column = &def.columns[pos];
            let coerced = coerce(literal, column.col_type);
            if coerced.is_null() && !literal.is_null() {
                return Err(Error::Type(format!(
                    "cannot coerce value for column '{}' in table '{}'",
                    column.name, stmt.table
                )));
            }
            new_data[pos] = coerced;
        }

        let pk_value = &new_data[pk_index];
        let row_id = derive_row_id(pk_value)
            .ok_or_else(|| Error::Type("primary key must be a non-null TEXT or INT value".to_string()))?;

        match table.live_index(&row_id) {
            Some(existing_idx) => {
                let old = table.versions[existing_idx].data.clone();
                let merged = if stmt.on_conflict_merge && def.mergeable {
                    merge_row(&def.columns.iter().map(|c| c.merge).collect::<Vec<_>>(), &old, &new_data)
                } else {
                    overlay_non_null(&old, &new_data)
                };
                let successor = RowVersion {
                    row_id: row_id.clone(),
                    tx_from: tx,
                    tx_to: TX_INFINITY,
                    valid_from: now.clone(),
                    valid_to: DEFAULT_VALID_TO.to_string(),
                    data: merged,
                };
                table.append_successor(existing_idx, tx, successor);
            }
            None => {
                let version = RowVersion {
                    row_id: row_id.clone(),
                    tx_from: tx,
                    tx_to: TX_INFINITY,
                    valid_from: now.clone(),
                    valid_to: DEFAULT_VALID_TO.to_string(),
                    data: new_data,
                };
                table.append_new(version);
            }
        }
        inserted += 1;
    }

    debug!("INSERT into {} wrote {} row(s) at tx {}", stmt.table, inserted, tx);
    Ok(QueryResult::ok(format!("INSERT {} row(s)", inserted)))
}

fn merge_row(specs: &[MergeSpec], old: &[Value], new: &[Value]) -> Vec<Value> {
    old.iter().zip(new.iter()).zip(specs.iter()).map(|((o, n), spec)| merge(spec, o, n)).collect()
}

fn overlay_non_null(old: &[Value], new: &[Value]) -> Vec<Value> {
    old.iter()
        .zip(new.iter())
        .map(|(o, n)| if n.is_null() { o.clone() } else { n.clone() })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, TableDef};
    use crate::value::ColumnType;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    fn setup_sum_bounded() -> Engine {
        let mut engine = Engine::new();
        let mut pk = Column::new("id", ColumnType::Text);
        pk.primary_key = true;
        let mut n = Column::new("n", ColumnType::Int);
        n.merge = MergeSpec::SumBounded(0, 100);
        engine.create_table(TableDef::new("c", vec![pk, n])).unwrap();
        engine
    }

    #[test]
    fn sum_bounded_merge_clamps() {
        let mut engine = setup_sum_bounded();
        execute_insert(&mut engine, &InsertStmt {
            table: "c".to_string(),
            columns: vec!["id".to_string(), "n".to_string()],
            rows: vec![vec![Value::Text("k".to_string()), Value::Int(30)]],
            on_conflict_merge: false,
        }).unwrap();

        execute_insert(&mut engine, &InsertStmt {
            table: "c".to_string(),
            columns: vec!["id".to_string(), "n".to_string()],
            rows: vec![vec![Value::Text("k".to_string()), Value::Int(80)]],
            on_conflict_merge: true,
        }).unwrap();

        let table = engine.store.get("c").unwrap();
        let live = table.live_versions().next().unwrap();
        assert_eq!(live.data[1], Value::Int(100));
    }

    #[test]
    fn gset_merge_unions_sets() {
        let mut engine = Engine::new();
        let mut pk = Column::new("id", ColumnType::Text);
        pk.primary_key = true;
        let mut tags = Column::new("tags", ColumnType::SetText);
        tags.merge = MergeSpec::Gset;
        engine.create_table(TableDef::new("s", vec![pk, tags])).unwrap();

        let mut ab = BTreeSet::new();
        ab.insert("a".to_string());
        ab.insert("b".to_string());
        execute_insert(&mut engine, &InsertStmt {
            table: "s".to_string(),
            columns: vec!["id".to_string(), "tags".to_string()],
            rows: vec![vec![Value::Text("x".to_string()), Value::SetText(ab)]],
            on_conflict_merge: false,
        }).unwrap();

        let mut bc = BTreeSet::new();
        bc.insert("b".to_string());
        bc.insert("c".to_string());
        execute_insert(&mut engine, &InsertStmt {
            table: "s".to_string(),
            columns: vec!["id".to_string(), "tags".to_string()],
            rows: vec![vec![Value::Text("x".to_string()), Value::SetText(bc)]],
            on_conflict_merge: true,
        }).unwrap();

        let table = engine.store.get("s").unwrap();
        let live = table.live_versions().next().unwrap();
        let mut expect = BTreeSet::new();
        expect.insert("a".to_string());
        expect.insert("b".to_string());
        expect.insert("c".to_string());
        assert_eq!(live.data[1], Value::SetText(expect));
    }

    #[test]
    fn arity_mismatch_is_rejected() {
        let mut engine = setup_sum_bounded();
        let result = execute_insert(&mut engine, &InsertStmt {
            table: "c".to_string(),
            columns: vec!["id".to_string(), "n".to_string()],
            rows: vec![vec![Value::Text("k".to_string())]],
            on_conflict_merge: false,
        });
        assert!(result.is_err());
    }

    #[test]
    fn insert_without_conflict_closes_nothing() {
        let mut engine = setup_sum_bounded();
        execute_insert(&mut engine, &InsertStmt {
            table: "c".to_string(),
            columns: vec!["id".to_string(), "n".to_string()],
            rows: vec![vec![Value::Text("k".to_string()), Value::Int(5)]],
            on_conflict_merge: false,
        }).unwrap();
        let table = engine.store.get("c").unwrap();
        assert_eq!(table.versions.len(), 1);
        assert_eq!(table.versions[0].tx_to, TX_INFINITY);
    }
}
