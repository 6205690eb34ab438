//! `SAVE`/`LOAD`: the line-oriented, UTF-8 snapshot format of §6.4.
//! `LOAD` writes into a scratch [`Engine`] and only swaps it into place
//! once the whole file has parsed successfully, so a malformed file
//! never corrupts the live database (§7's recommended redesign).

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::catalog::{Catalog, Column, TableDef};
use crate::engine::Engine;
use crate::error::{CResult, Error};
use crate::merge::MergeSpec;
use crate::row::{RowVersion, TableData};
use crate::store::Store;
use crate::value::{ColumnType, Value};

const MAGIC: &str = "FORGEDB_SNAPSHOT_V1";

/// Escapes `\`, `|`, and newline by prefixing each with `\`.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' | '|' | '\n' => {
                out.push('\\');
                out.push(if ch == '\n' { 'n' } else { ch });
            }
            _ => out.push(ch),
        }
    }
    out
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(ch);
        }
    }
    out
}

fn encode_cell(value: &Value) -> String {
    match value {
        Value::Null => "N|".to_string(),
        Value::Int(i) => format!("I|{}", i),
        Value::Double(d) => format!("F|{}", d),
        Value::Text(s) => format!("S|{}", escape(s)),
        Value::SetText(set) => format!("G|{}", escape(&set.iter().cloned().collect::<Vec<_>>().join(","))),
        Value::Vector(v) => format!("V|{}", v.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(",")),
    }
}

fn decode_cell(line: &str) -> CResult<Value> {
    let (tag, payload) = line.split_once('|').ok_or_else(|| Error::Io(format!("malformed cell line: {}", line)))?;
    match tag {
        "N" => Ok(Value::Null),
        "I" => payload.parse::<i64>().map(Value::Int).map_err(|e| Error::Io(e.to_string())),
        "F" => payload.parse::<f64>().map(Value::Double).map_err(|e| Error::Io(e.to_string())),
        "S" => Ok(Value::Text(unescape(payload))),
        "G" => {
            let text = unescape(payload);
            let set = if text.is_empty() { Default::default() } else { text.split(',').map(|s| s.to_string()).collect() };
            Ok(Value::SetText(set))
        }
        "V" => {
            let text = unescape(payload);
            let nums = if text.is_empty() {
                Vec::new()
            } else {
                text.split(',')
                    .map(|s| s.parse::<f64>().map_err(|e| Error::Io(e.to_string())))
                    .collect::<CResult<Vec<f64>>>()?
            };
            Ok(Value::Vector(nums))
        }
        other => Err(Error::Io(format!("unknown cell tag '{}'", other))),
    }
}

/// Writes `engine`'s full state to `path` via a scratch file then
/// rename, so a crash mid-write never leaves a half-written snapshot
/// at the destination.
pub fn save(engine: &Engine, path: impl AsRef<Path>) -> CResult<()> {
    let path = path.as_ref();
    let mut out = String::new();
    out.push_str(MAGIC);
    out.push('\n');
    out.push_str(&format!("TX {}\n", engine.next_tx()));

    let tables: Vec<(&String, &TableData)> = engine.store.iter().collect();
    out.push_str(&format!("TABLES {}\n", tables.len()));

    for (name, data) in tables {
        out.push_str(&format!("T {}\n", name));
        out.push_str(&format!("C {}\n", data.def.columns.len()));
        for column in &data.def.columns {
            let (min, max) = match column.merge {
                MergeSpec::SumBounded(min, max) => (min, max),
                _ => (0, 0),
            };
            let vector_dim = match column.col_type {
                ColumnType::Vector(dim) => dim,
                _ => 0,
            };
            out.push_str(&format!(
                "COL {}|{}|{}|{}|{}|{}|{}\n",
                escape(&column.name),
                column.col_type.type_tag(),
                column.merge.kind_tag(),
                min,
                max,
                vector_dim,
                if column.primary_key { 1 } else { 0 },
            ));
        }
        out.push_str(&format!("V {}\n", data.versions.len()));
        for version in &data.versions {
            out.push_str(&format!(
                "R {}|{}|{}|{}|{}\n",
                escape(&version.row_id),
                version.tx_from,
                version.tx_to,
                escape(&version.valid_from),
                escape(&version.valid_to),
            ));
            out.push_str(&format!("D {}\n", version.data.len()));
            for cell in &version.data {
                out.push_str(&encode_cell(cell));
                out.push('\n');
            }
        }
    }

    let scratch = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&scratch)?;
        file.write_all(out.as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&scratch, path)?;
    Ok(())
}

struct Lines<'a> {
    inner: std::str::Lines<'a>,
}

impl<'a> Lines<'a> {
    fn next_line(&mut self) -> CResult<&'a str> {
        self.inner.next().ok_or_else(|| Error::Io("unexpected end of snapshot".to_string()))
    }
}

fn parse_header<'a>(line: &'a str, prefix: &str) -> CResult<&'a str> {
    line.strip_prefix(prefix).ok_or_else(|| Error::Io(format!("expected '{}' line, got '{}'", prefix.trim(), line)))
}

fn parse_usize(text: &str) -> CResult<usize> {
    text.trim().parse().map_err(|_| Error::Io(format!("expected integer, got '{}'", text)))
}

fn parse_i64(text: &str) -> CResult<i64> {
    text.trim().parse().map_err(|_| Error::Io(format!("expected integer, got '{}'", text)))
}

/// Parses `path` into a scratch catalog/store/next_tx triple without
/// touching `engine`. Splitting parse from swap is what makes `LOAD`
/// atomic on the caller's side.
fn parse_snapshot(text: &str) -> CResult<(Catalog, Store, i64)> {
    let mut lines = Lines { inner: text.lines() };

    let magic = lines.next_line()?;
    if magic.trim() != MAGIC {
        return Err(Error::Io(format!("not a forgedb snapshot (bad magic '{}')", magic)));
    }

    let next_tx = parse_i64(parse_header(lines.next_line()?, "TX ")?)?;
    let table_count = parse_usize(parse_header(lines.next_line()?, "TABLES ")?)?;

    let mut catalog = Catalog::new();
    let mut store = Store::new();

    for _ in 0..table_count {
        let name = parse_header(lines.next_line()?, "T ")?.to_string();
        let col_count = parse_usize(parse_header(lines.next_line()?, "C ")?)?;

        let mut columns = Vec::with_capacity(col_count);
        for _ in 0..col_count {
            let raw = parse_header(lines.next_line()?, "COL ")?;
            let parts: Vec<&str> = raw.split('|').collect();
            if parts.len() != 7 {
                return Err(Error::Io(format!("malformed COL line: {}", raw)));
            }
            let col_name = unescape(parts[0]);
            let type_tag: i32 = parts[1].parse().map_err(|_| Error::Io("bad type tag".to_string()))?;
            let merge_tag: i32 = parts[2].parse().map_err(|_| Error::Io("bad merge tag".to_string()))?;
            let min: i64 = parts[3].parse().map_err(|_| Error::Io("bad merge min".to_string()))?;
            let max: i64 = parts[4].parse().map_err(|_| Error::Io("bad merge max".to_string()))?;
            let vector_dim: usize = parts[5].parse().map_err(|_| Error::Io("bad vector dim".to_string()))?;
            let is_pk = parts[6].trim() == "1";

            let col_type = ColumnType::from_tag(type_tag, vector_dim)
                .ok_or_else(|| Error::Io(format!("unknown column type tag {}", type_tag)))?;
            let merge = match merge_tag {
                0 => MergeSpec::None,
                1 => MergeSpec::Lww,
                2 => MergeSpec::SumBounded(min, max),
                3 => MergeSpec::Gset,
                other => return Err(Error::Io(format!("unknown merge tag {}", other))),
            };

            columns.push(Column { name: col_name, col_type, merge, primary_key: is_pk });
        }

        let def = TableDef::new(name.clone(), columns);
        catalog.add_table(def.clone())?;
        let mut data = TableData::new(def);

        let row_count = parse_usize(parse_header(lines.next_line()?, "V ")?)?;
        for _ in 0..row_count {
            let raw = parse_header(lines.next_line()?, "R ")?;
            let parts: Vec<&str> = raw.split('|').collect();
            if parts.len() != 5 {
                return Err(Error::Io(format!("malformed R line: {}", raw)));
            }
            let row_id = unescape(parts[0]);
            let tx_from: i64 = parts[1].parse().map_err(|_| Error::Io("bad tx_from".to_string()))?;
            let tx_to: i64 = parts[2].parse().map_err(|_| Error::Io("bad tx_to".to_string()))?;
            let valid_from = unescape(parts[3]);
            let valid_to = unescape(parts[4]);

            let cell_count = parse_usize(parse_header(lines.next_line()?, "D ")?)?;
            let mut cells = Vec::with_capacity(cell_count);
            for _ in 0..cell_count {
                cells.push(decode_cell(lines.next_line()?)?);
            }

            data.versions.push(RowVersion { row_id, tx_from, tx_to, valid_from, valid_to, data: cells });
        }
        data.reindex();

        store.create_table_data(data);
    }

    Ok((catalog, store, next_tx))
}

/// Replaces `engine`'s catalog, store, and transaction counter with
/// `path`'s contents. On any parse failure the engine is left
/// untouched and the error propagates with `ok = false`.
pub fn load(engine: &mut Engine, path: impl AsRef<Path>) -> CResult<()> {
    let text = fs::read_to_string(path)?;
    let (catalog, store, next_tx) = parse_snapshot(&text)?;
    engine.replace_state(catalog, store, next_tx);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Column;
    use crate::executor::insert::execute_insert;
    use crate::statement::InsertStmt;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;
    use tempfile::tempdir;

    fn sample_engine() -> Engine {
        let mut engine = Engine::new();
        let mut pk = Column::new("id", ColumnType::Text);
        pk.primary_key = true;
        let mut tags = Column::new("tags", ColumnType::SetText);
        tags.merge = MergeSpec::Gset;
        engine.create_table(TableDef::new("s", vec![pk, tags, Column::new("score", ColumnType::Double)])).unwrap();

        let mut set = BTreeSet::new();
        set.insert("a|b".to_string());
        set.insert("c\\d".to_string());
        execute_insert(&mut engine, &InsertStmt {
            table: "s".to_string(),
            columns: vec!["id".to_string(), "tags".to_string(), "score".to_string()],
            rows: vec![vec![Value::Text("row\n1".to_string()), Value::SetText(set), Value::Double(2.5)]],
            on_conflict_merge: false,
        }).unwrap();
        engine
    }

    #[test]
    fn save_then_load_round_trips_escaped_values() {
        let engine = sample_engine();
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.snap");
        save(&engine, &path).unwrap();

        let mut restored = Engine::new();
        load(&mut restored, &path).unwrap();

        assert_eq!(restored.next_tx(), engine.next_tx());
        let original_table = engine.store.get("s").unwrap();
        let restored_table = restored.store.get("s").unwrap();
        assert_eq!(restored_table.versions.len(), original_table.versions.len());
        assert_eq!(restored_table.versions[0].row_id, original_table.versions[0].row_id);
        assert_eq!(restored_table.versions[0].data, original_table.versions[0].data);
        assert_eq!(restored_table.live_index(&original_table.versions[0].row_id), Some(0));
    }

    #[test]
    fn load_rejects_bad_magic_without_touching_engine() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.snap");
        fs::write(&path, "NOT A SNAPSHOT\n").unwrap();

        let mut engine = sample_engine();
        let before = engine.store.get("s").unwrap().versions.len();
        let result = load(&mut engine, &path);
        assert!(result.is_err());
        assert_eq!(engine.store.get("s").unwrap().versions.len(), before);
    }
}
