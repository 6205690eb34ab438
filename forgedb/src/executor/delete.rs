//! `DELETE` execution (§4.7).

use log::debug;

use crate::engine::Engine;
use crate::error::CResult;
use crate::executor::predicate::{matches_all, SingleRowResolver};
use crate::statement::{DeleteStmt, QueryResult};

pub fn execute_delete(engine: &mut Engine, stmt: &DeleteStmt) -> CResult<QueryResult> {
    let def = engine.catalog.get(&stmt.table)?.clone();
    let column_names: Vec<String> = def.columns.iter().map(|c| c.name.clone()).collect();

    let tx = engine.begin_tx();
    let table = engine.store.get_mut(&stmt.table)?;

    let matching: Vec<usize> = table
        .live_versions_indices()
        .filter(|&idx| {
            let resolver = SingleRowResolver { columns: &column_names, data: &table.versions[idx].data };
            matches_all(&stmt.where_clause, &resolver)
        })
        .collect();

    let deleted = matching.len();
    for idx in matching {
        table.close(idx, tx);
    }

    debug!("DELETE from {} closed {} row(s) at tx {}", stmt.table, deleted, tx);
    Ok(QueryResult::ok(format!("DELETE {} row(s)", deleted)))
}
