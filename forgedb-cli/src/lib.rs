//! `forgedb-cli`: an interactive shell and batch runner for forgedb.
//!
//! ## Getting started
//!
//! ```doc
//! ❯ forgedb-cli
//!
//! ██  ██  █        █
//! ██ ██   ██      ██
//! ███      ██    ██
//! ██ ██     ██  ██
//! ██  ██     ████  forgedb
//!
//! Welcome to forgedb-cli.
//!
//! forgedb > CREATE TABLE t(id INT PRIMARY KEY, v TEXT);
//! CREATE TABLE t
//!
//! forgedb > INSERT INTO t(id,v) VALUES (1,'hello');
//! INSERT 1 row(s)
//!
//! forgedb > SELECT * FROM t;
//! id | v     | _tx_from | _tx_to | _valid_from | _valid_to
//! ---+-------+----------+--------+-------------+----------
//! 1  | hello | 1        | ...    | ...         | ...
//! ```

pub mod config;
pub mod rusty;
pub mod session;
pub mod show;
pub mod trace;
