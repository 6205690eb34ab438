//! The per-table row-version store: an append-only sequence of row
//! versions tagged with transaction-time and valid-time bounds.

use std::collections::HashMap;

use serde_derive::{Deserialize, Serialize};

use crate::catalog::TableDef;
use crate::value::Value;

/// `tx_to = TX_INFINITY` marks the currently-live version of a row.
pub const TX_INFINITY: i64 = i64::MAX;

/// A single version of a row. `row_id` is derived from the primary-key
/// value at write time (§3): the column's text verbatim, or an integer's
/// canonical decimal representation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RowVersion {
    pub row_id: String,
    pub tx_from: i64,
    pub tx_to: i64,
    pub valid_from: String,
    pub valid_to: String,
    pub data: Vec<Value>,
}

impl RowVersion {
    pub fn is_live(&self) -> bool {
        self.tx_to == TX_INFINITY
    }

    /// Visible at `asof_tx` iff `tx_from <= asof_tx < tx_to` (§4.3).
    pub fn visible_at(&self, asof_tx: i64) -> bool {
        self.tx_from <= asof_tx && asof_tx < self.tx_to
    }
}

/// A table's definition plus its append-only version sequence. `live`
/// is the recommended redesign from the Design Notes: a `row_id -> index`
/// map of the currently-live version, kept in sync by every mutating
/// operation and rebuilt wholesale on `LOAD`. It accelerates "currently
/// live" lookups; historical (`FOR SYSTEM_TIME AS OF`) reads still scan
/// `versions` since the index only tracks the present.
pub struct TableData {
    pub def: TableDef,
    pub versions: Vec<RowVersion>,
    live: HashMap<String, usize>,
}

impl TableData {
    pub fn new(def: TableDef) -> Self {
        TableData { def, versions: Vec::new(), live: HashMap::new() }
    }

    /// The index of `row_id`'s currently-live version, if any.
    pub fn live_index(&self, row_id: &str) -> Option<usize> {
        self.live.get(row_id).copied()
    }

    /// Appends a brand-new version (new `row_id`, no predecessor).
    pub fn append_new(&mut self, version: RowVersion) -> usize {
        let row_id = version.row_id.clone();
        let idx = self.versions.len();
        self.versions.push(version);
        self.live.insert(row_id, idx);
        idx
    }

    /// Closes the predecessor (sets its `tx_to`) and appends the successor,
    /// updating the live index to point at the new version.
    pub fn append_successor(&mut self, predecessor_idx: usize, tx_to: i64, successor: RowVersion) -> usize {
        self.versions[predecessor_idx].tx_to = tx_to;
        let row_id = successor.row_id.clone();
        let idx = self.versions.len();
        self.versions.push(successor);
        self.live.insert(row_id, idx);
        idx
    }

    /// Closes a version without pushing a successor (`DELETE`), removing
    /// it from the live index.
    pub fn close(&mut self, idx: usize, tx_to: i64) {
        self.versions[idx].tx_to = tx_to;
        if let Some(row_id) = self.versions.get(idx).map(|v| v.row_id.clone()) {
            if self.live.get(&row_id) == Some(&idx) {
                self.live.remove(&row_id);
            }
        }
    }

    /// Rebuilds the live index from scratch (used on `LOAD`).
    pub fn reindex(&mut self) {
        self.live.clear();
        for (idx, version) in self.versions.iter().enumerate() {
            if version.is_live() {
                self.live.insert(version.row_id.clone(), idx);
            }
        }
    }

    /// The currently-live version of every row_id, for `asof_tx = +inf`.
    pub fn live_versions(&self) -> impl Iterator<Item = &RowVersion> {
        self.live.values().map(move |&idx| &self.versions[idx])
    }

    /// The `versions` indices of every currently-live row, in no
    /// particular order (callers that need determinism sort afterward).
    pub fn live_versions_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.live.values().copied()
    }

    /// All versions visible at `asof_tx`, one per row_id (§4.3).
    pub fn versions_asof(&self, asof_tx: i64) -> Vec<&RowVersion> {
        if asof_tx == TX_INFINITY {
            return self.live_versions().collect();
        }
        self.versions.iter().filter(|v| v.visible_at(asof_tx)).collect()
    }
}

/// Derives a row_id from a primary-key value, per §3: text verbatim, or
/// an integer's canonical decimal representation. Returns `None` for any
/// other type (including null), which the caller turns into a type error.
pub fn derive_row_id(pk_value: &Value) -> Option<String> {
    match pk_value {
        Value::Text(s) => Some(s.clone()),
        Value::Int(i) => Some(i.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Column;
    use crate::value::ColumnType;
    use pretty_assertions::assert_eq;

    fn def() -> TableDef {
        let mut pk = Column::new("id", ColumnType::Int);
        pk.primary_key = true;
        TableDef::new("t", vec![pk, Column::new("v", ColumnType::Int)])
    }

    fn version(row_id: &str, tx_from: i64, tx_to: i64, v: i64) -> RowVersion {
        RowVersion {
            row_id: row_id.to_string(),
            tx_from,
            tx_to,
            valid_from: "now".to_string(),
            valid_to: "later".to_string(),
            data: vec![Value::Int(row_id.parse().unwrap()), Value::Int(v)],
        }
    }

    #[test]
    fn append_new_tracks_live_index() {
        let mut t = TableData::new(def());
        t.append_new(version("1", 1, TX_INFINITY, 10));
        assert_eq!(t.live_index("1"), Some(0));
    }

    #[test]
    fn append_successor_closes_predecessor_and_advances_live() {
        let mut t = TableData::new(def());
        let first = t.append_new(version("1", 1, TX_INFINITY, 10));
        t.append_successor(first, 2, version("1", 2, TX_INFINITY, 20));
        assert_eq!(t.versions[first].tx_to, 2);
        assert_eq!(t.live_index("1"), Some(1));
    }

    #[test]
    fn close_removes_from_live_index() {
        let mut t = TableData::new(def());
        let idx = t.append_new(version("1", 1, TX_INFINITY, 10));
        t.close(idx, 2);
        assert_eq!(t.live_index("1"), None);
        assert_eq!(t.versions[idx].tx_to, 2);
    }

    #[test]
    fn versions_asof_selects_historical_snapshot() {
        let mut t = TableData::new(def());
        let first = t.append_new(version("1", 1, TX_INFINITY, 10));
        t.append_successor(first, 2, version("1", 2, TX_INFINITY, 20));

        let asof1 = t.versions_asof(1);
        assert_eq!(asof1.len(), 1);
        assert_eq!(asof1[0].data[1], Value::Int(10));

        let asof_now = t.versions_asof(TX_INFINITY);
        assert_eq!(asof_now.len(), 1);
        assert_eq!(asof_now[0].data[1], Value::Int(20));
    }

    #[test]
    fn derive_row_id_rejects_non_text_non_int() {
        assert_eq!(derive_row_id(&Value::Double(1.0)), None);
        assert_eq!(derive_row_id(&Value::Null), None);
        assert_eq!(derive_row_id(&Value::Int(7)), Some("7".to_string()));
        assert_eq!(derive_row_id(&Value::Text("k".to_string())), Some("k".to_string()));
    }
}
