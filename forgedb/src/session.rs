//! Session-scoped state layered on top of the stateless [`Engine`]:
//! transaction staging (§4.9), the differential-privacy epsilon and its
//! seeded RNG (§4.10), and the single entry point that dispatches every
//! parsed [`Statement`].
//!
//! `BEGIN` opens a staging buffer; mutating statements issued while a
//! transaction is open are appended to it untouched rather than applied,
//! and `COMMIT` replays them against the engine in the order they were
//! issued. `ROLLBACK` simply discards the buffer — since nothing in it
//! was ever applied, there is nothing to undo. `SELECT` (and `SET`/
//! `SAVE`/`LOAD`) are never staged: they run immediately against
//! whatever the engine currently holds, transaction or not, so a
//! `SELECT` inside an open transaction does not see that transaction's
//! own uncommitted writes.

use log::{debug, info};
use rand::rngs::StdRng;

use crate::dp::{new_rng, DEFAULT_SEED};
use crate::engine::Engine;
use crate::error::{CResult, Error};
use crate::executor::delete::execute_delete;
use crate::executor::insert::execute_insert;
use crate::executor::select::execute_select;
use crate::executor::update::execute_update;
use crate::snapshot;
use crate::statement::{QueryResult, Statement};

pub struct Session {
    pub engine: Engine,
    in_tx: bool,
    staged: Vec<Statement>,
    dp_epsilon: f64,
    rng: StdRng,
}

impl Session {
    pub fn new() -> Self {
        Session { engine: Engine::new(), in_tx: false, staged: Vec::new(), dp_epsilon: 1.0, rng: new_rng(DEFAULT_SEED) }
    }

    pub fn with_seed(engine: Engine, seed: u64) -> Self {
        Session { engine, in_tx: false, staged: Vec::new(), dp_epsilon: 1.0, rng: new_rng(seed) }
    }

    pub fn in_transaction(&self) -> bool {
        self.in_tx
    }

    pub fn execute(&mut self, stmt: &Statement) -> CResult<QueryResult> {
        match stmt {
            Statement::Begin => self.begin(),
            Statement::Commit => self.commit(),
            Statement::Rollback => self.rollback(),
            Statement::Select(select) => execute_select(&self.engine, select, &mut self.rng, self.dp_epsilon),
            Statement::Set(set) => self.set(set),
            Statement::Save(save) => {
                snapshot::save(&self.engine, &save.path)?;
                Ok(QueryResult::ok(format!("SAVED {}", save.path)))
            }
            Statement::Load(load) => {
                snapshot::load(&mut self.engine, &load.path)?;
                Ok(QueryResult::ok(format!("LOADED {}", load.path)))
            }
            Statement::Exit => Ok(QueryResult::ok("bye")),
            Statement::Invalid(message) => Ok(QueryResult::err(message.clone())),
            mutation => {
                if self.in_tx {
                    self.staged.push(mutation.clone());
                    Ok(QueryResult::ok("staged"))
                } else {
                    execute_mutation(&mut self.engine, mutation)
                }
            }
        }
    }

    fn begin(&mut self) -> CResult<QueryResult> {
        if self.in_tx {
            return Err(Error::Transaction("BEGIN while a transaction is already open".to_string()));
        }
        self.in_tx = true;
        self.staged.clear();
        debug!("BEGIN");
        Ok(QueryResult::ok("BEGIN"))
    }

    fn commit(&mut self) -> CResult<QueryResult> {
        if !self.in_tx {
            return Err(Error::Transaction("COMMIT with no open transaction".to_string()));
        }
        let staged = std::mem::take(&mut self.staged);
        let applied = staged.len();
        for stmt in &staged {
            execute_mutation(&mut self.engine, stmt)?;
        }
        self.in_tx = false;
        info!("COMMIT replayed {} staged statement(s)", applied);
        Ok(QueryResult::ok(format!("COMMIT {} statement(s)", applied)))
    }

    fn rollback(&mut self) -> CResult<QueryResult> {
        if !self.in_tx {
            return Err(Error::Transaction("ROLLBACK with no open transaction".to_string()));
        }
        let discarded = self.staged.len();
        self.staged.clear();
        self.in_tx = false;
        debug!("ROLLBACK discarded {} staged statement(s)", discarded);
        Ok(QueryResult::ok("ROLLBACK"))
    }

    fn set(&mut self, set: &crate::statement::SetStmt) -> CResult<QueryResult> {
        if set.key.eq_ignore_ascii_case("DP_EPSILON") {
            self.dp_epsilon = set.value;
            Ok(QueryResult::ok(format!("SET DP_EPSILON = {}", set.value)))
        } else {
            Err(Error::Unsupported(format!("unknown session setting '{}'", set.key)))
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::new()
    }
}

/// Applies one non-transactional-control statement directly to the
/// engine, used both for immediate execution and for replaying a
/// committed transaction's staged statements.
fn execute_mutation(engine: &mut Engine, stmt: &Statement) -> CResult<QueryResult> {
    match stmt {
        Statement::Create(create) => {
            engine.create_table(crate::catalog::TableDef::new(create.table.clone(), create.columns.clone()))?;
            Ok(QueryResult::ok(format!("CREATE TABLE {}", create.table)))
        }
        Statement::Drop(drop) => {
            engine.drop_table(&drop.table)?;
            Ok(QueryResult::ok(format!("DROP TABLE {}", drop.table)))
        }
        Statement::Insert(insert) => execute_insert(engine, insert),
        Statement::Update(update) => execute_update(engine, update),
        Statement::Delete(delete) => execute_delete(engine, delete),
        other => Err(Error::Internal(format!("{:?} is not a mutating statement", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Column;
    use crate::statement::{ColumnRef, CmpOp, Condition, CreateStmt, InsertStmt, SelectStmt};
    use crate::value::{ColumnType, Value};
    use pretty_assertions::assert_eq;

    fn pk_table(name: &str) -> CreateStmt {
        let mut pk = Column::new("id", ColumnType::Int);
        pk.primary_key = true;
        CreateStmt { table: name.to_string(), columns: vec![pk, Column::new("v", ColumnType::Int)] }
    }

    fn select_all(table: &str) -> SelectStmt {
        SelectStmt {
            projections: vec![crate::statement::ProjectionItem::Star],
            table: table.to_string(),
            join: None,
            as_of_tx: None,
            where_clause: vec![],
            group_by: vec![],
            order_by: None,
            limit: None,
        }
    }

    #[test]
    fn rollback_discards_staged_writes_entirely() {
        let mut session = Session::new();
        session.execute(&Statement::Create(pk_table("t"))).unwrap();
        session.execute(&Statement::Begin).unwrap();
        session.execute(&Statement::Insert(InsertStmt {
            table: "t".to_string(),
            columns: vec!["id".to_string(), "v".to_string()],
            rows: vec![vec![Value::Int(1), Value::Int(9)]],
            on_conflict_merge: false,
        })).unwrap();
        session.execute(&Statement::Rollback).unwrap();

        let result = session.execute(&Statement::Select(select_all("t"))).unwrap();
        assert_eq!(result.rows.len(), 0);
    }

    #[test]
    fn commit_replays_staged_writes_in_order() {
        let mut session = Session::new();
        session.execute(&Statement::Create(pk_table("t"))).unwrap();
        session.execute(&Statement::Begin).unwrap();
        session.execute(&Statement::Insert(InsertStmt {
            table: "t".to_string(),
            columns: vec!["id".to_string(), "v".to_string()],
            rows: vec![vec![Value::Int(1), Value::Int(9)]],
            on_conflict_merge: false,
        })).unwrap();
        session.execute(&Statement::Commit).unwrap();

        let result = session.execute(&Statement::Select(select_all("t"))).unwrap();
        assert_eq!(result.rows.len(), 1);
    }

    #[test]
    fn select_inside_open_transaction_does_not_see_staged_writes() {
        let mut session = Session::new();
        session.execute(&Statement::Create(pk_table("t"))).unwrap();
        session.execute(&Statement::Begin).unwrap();
        session.execute(&Statement::Insert(InsertStmt {
            table: "t".to_string(),
            columns: vec!["id".to_string(), "v".to_string()],
            rows: vec![vec![Value::Int(1), Value::Int(9)]],
            on_conflict_merge: false,
        })).unwrap();

        let result = session.execute(&Statement::Select(select_all("t"))).unwrap();
        assert_eq!(result.rows.len(), 0);
        session.execute(&Statement::Rollback).unwrap();
    }

    #[test]
    fn double_begin_is_a_transaction_error() {
        let mut session = Session::new();
        session.execute(&Statement::Begin).unwrap();
        let err = session.execute(&Statement::Begin);
        assert!(err.is_err());
    }

    #[test]
    fn where_clause_survives_a_committed_transaction() {
        let mut session = Session::new();
        session.execute(&Statement::Create(pk_table("t"))).unwrap();
        session.execute(&Statement::Begin).unwrap();
        session.execute(&Statement::Insert(InsertStmt {
            table: "t".to_string(),
            columns: vec!["id".to_string(), "v".to_string()],
            rows: vec![vec![Value::Int(1), Value::Int(9)], vec![Value::Int(2), Value::Int(3)]],
            on_conflict_merge: false,
        })).unwrap();
        session.execute(&Statement::Commit).unwrap();

        let mut stmt = select_all("t");
        stmt.where_clause = vec![Condition::Compare { column: ColumnRef::unqualified("id"), op: CmpOp::Eq, value: Value::Int(2) }];
        let result = session.execute(&Statement::Select(stmt)).unwrap();
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0][1], Value::Int(3));
    }
}
