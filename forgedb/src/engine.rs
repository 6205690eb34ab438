//! The database: exclusive owner of the catalog, the per-table row
//! stores, and the monotonically increasing transaction counter.

use log::info;

use crate::catalog::{Catalog, TableDef};
use crate::error::{CResult, Error};
use crate::row::TX_INFINITY;
use crate::store::Store;
use crate::time_source::{SystemTimeSource, TimeSource};

pub struct Engine {
    pub(crate) catalog: Catalog,
    pub(crate) store: Store,
    next_tx: i64,
    pub(crate) time_source: Box<dyn TimeSource>,
}

impl Engine {
    pub fn new() -> Self {
        Engine::with_time_source(Box::new(SystemTimeSource))
    }

    pub fn with_time_source(time_source: Box<dyn TimeSource>) -> Self {
        Engine { catalog: Catalog::new(), store: Store::new(), next_tx: 1, time_source }
    }

    /// Returns the next transaction id and increments the counter. Every
    /// `tx_from` written to the store comes from here, and the counter
    /// is the total order over effective writes (§5).
    pub fn begin_tx(&mut self) -> i64 {
        let tx = self.next_tx;
        self.next_tx += 1;
        tx
    }

    pub fn next_tx(&self) -> i64 {
        self.next_tx
    }

    pub fn create_table(&mut self, def: TableDef) -> CResult<()> {
        if self.catalog.has(&def.name) {
            return Err(Error::Schema(format!("table '{}' already exists", def.name)));
        }
        info!("CREATE TABLE {} ({} columns)", def.name, def.columns.len());
        self.catalog.add_table(def.clone())?;
        self.store.create_table(def);
        Ok(())
    }

    pub fn drop_table(&mut self, name: &str) -> CResult<()> {
        self.catalog.drop_table(name)?;
        self.store.drop_table(name);
        info!("DROP TABLE {}", name);
        Ok(())
    }

    /// Swaps in a freshly loaded catalog/store/transaction counter
    /// wholesale, used only by `LOAD` once its snapshot has parsed
    /// successfully (§6.4, §7).
    pub(crate) fn replace_state(&mut self, catalog: Catalog, store: Store, next_tx: i64) {
        self.catalog = catalog;
        self.store = store;
        self.next_tx = next_tx;
        info!("LOAD replaced engine state, next_tx = {}", next_tx);
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}

pub const INFINITY: i64 = TX_INFINITY;
