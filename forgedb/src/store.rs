//! The row-version store (§4.3): one `TableData` per table, owned
//! exclusively by the `Engine`. No secondary indexes — lookups are
//! linear scans over `versions`, except for the currently-live set,
//! which `TableData` keeps indexed (Design Notes §9's recommended
//! redesign).

use std::collections::BTreeMap;

use crate::catalog::TableDef;
use crate::error::{CResult, Error};
use crate::row::TableData;

#[derive(Default)]
pub struct Store {
    tables: BTreeMap<String, TableData>,
}

impl Store {
    pub fn new() -> Self {
        Store { tables: BTreeMap::new() }
    }

    pub fn create_table(&mut self, def: TableDef) {
        let key = def.name.to_ascii_uppercase();
        self.tables.insert(key, TableData::new(def));
    }

    /// Inserts an already-built `TableData` (its version history loaded
    /// wholesale from a snapshot), keyed by its own definition's name.
    pub fn create_table_data(&mut self, data: TableData) {
        let key = data.def.name.to_ascii_uppercase();
        self.tables.insert(key, data);
    }

    pub fn drop_table(&mut self, name: &str) {
        self.tables.remove(&name.to_ascii_uppercase());
    }

    pub fn get(&self, name: &str) -> CResult<&TableData> {
        self.tables
            .get(&name.to_ascii_uppercase())
            .ok_or_else(|| Error::Schema(format!("unknown table '{}'", name)))
    }

    pub fn get_mut(&mut self, name: &str) -> CResult<&mut TableData> {
        self.tables
            .get_mut(&name.to_ascii_uppercase())
            .ok_or_else(|| Error::Schema(format!("unknown table '{}'", name)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TableData)> {
        self.tables.iter()
    }

    pub fn clear(&mut self) {
        self.tables.clear();
    }
}
