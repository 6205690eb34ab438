//! `forgedb` is an embeddable, single-node SQL engine: multi-version
//! row storage with application-level valid-time bounds, per-column
//! CRDT merge policies for convergent concurrent writes, fixed-
//! dimension vector columns with L2 distance predicates, and
//! differentially-private counting. It does no I/O beyond the text
//! snapshot format in [`snapshot`] — parsing SQL text and talking to a
//! terminal are the jobs of the `forgedb-sql` and `forgedb-cli` crates
//! built on top of it.
//!
//! ## Getting started
//!
//! ```rust
//! use forgedb::catalog::{Column, TableDef};
//! use forgedb::engine::Engine;
//! use forgedb::executor::insert::execute_insert;
//! use forgedb::statement::InsertStmt;
//! use forgedb::value::{ColumnType, Value};
//!
//! let mut engine = Engine::new();
//! let mut id = Column::new("id", ColumnType::Int);
//! id.primary_key = true;
//! engine.create_table(TableDef::new("t", vec![id, Column::new("v", ColumnType::Int)])).unwrap();
//!
//! execute_insert(&mut engine, &InsertStmt {
//!     table: "t".to_string(),
//!     columns: vec!["id".to_string(), "v".to_string()],
//!     rows: vec![vec![Value::Int(1), Value::Int(10)]],
//!     on_conflict_merge: false,
//! }).unwrap();
//! ```

pub mod catalog;
pub mod dp;
pub mod engine;
pub mod error;
pub mod executor;
pub mod merge;
pub mod row;
pub mod session;
pub mod snapshot;
pub mod statement;
pub mod store;
pub mod time_source;
pub mod value;
