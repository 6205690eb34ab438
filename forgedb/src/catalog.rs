//! The catalog: upper-cased table name -> table definition.

use std::collections::BTreeMap;

use serde_derive::{Deserialize, Serialize};

use crate::error::{CResult, Error};
use crate::merge::MergeSpec;
use crate::value::ColumnType;

/// A single declared column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub col_type: ColumnType,
    pub merge: MergeSpec,
    pub primary_key: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, col_type: ColumnType) -> Self {
        Column { name: name.into(), col_type, merge: MergeSpec::None, primary_key: false }
    }
}

/// A table definition: its ordered columns, the index of its (at most
/// one) primary-key column, and whether any column carries a merge
/// policy other than `NONE` (an "MR toggle off" table with no mergeable
/// columns behaves as plain replace even under `ON CONFLICT MERGE`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<Column>,
    pub pk_index: Option<usize>,
    pub mergeable: bool,
}

impl TableDef {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        let pk_index = columns.iter().position(|c| c.primary_key);
        let mergeable = columns.iter().any(|c| !matches!(c.merge, MergeSpec::None));
        TableDef { name: name.into(), columns, pk_index, mergeable }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.column_index(name).map(|i| &self.columns[i])
    }
}

/// Case-insensitive table lookup, keyed by upper-cased name. A `BTreeMap`
/// keeps table iteration (snapshot dump, catalog listing) in a
/// deterministic order.
#[derive(Default)]
pub struct Catalog {
    tables: BTreeMap<String, TableDef>,
}

impl Catalog {
    pub fn new() -> Self {
        Catalog { tables: BTreeMap::new() }
    }

    pub fn add_table(&mut self, def: TableDef) -> CResult<()> {
        let key = def.name.to_ascii_uppercase();
        if self.tables.contains_key(&key) {
            return Err(Error::Schema(format!("table '{}' already exists", def.name)));
        }
        self.tables.insert(key, def);
        Ok(())
    }

    pub fn has(&self, name: &str) -> bool {
        self.tables.contains_key(&name.to_ascii_uppercase())
    }

    pub fn get(&self, name: &str) -> CResult<&TableDef> {
        self.tables
            .get(&name.to_ascii_uppercase())
            .ok_or_else(|| Error::Schema(format!("unknown table '{}'", name)))
    }

    pub fn get_mut(&mut self, name: &str) -> CResult<&mut TableDef> {
        self.tables
            .get_mut(&name.to_ascii_uppercase())
            .ok_or_else(|| Error::Schema(format!("unknown table '{}'", name)))
    }

    pub fn drop_table(&mut self, name: &str) -> CResult<TableDef> {
        self.tables
            .remove(&name.to_ascii_uppercase())
            .ok_or_else(|| Error::Schema(format!("unknown table '{}'", name)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TableDef)> {
        self.tables.iter()
    }
}
