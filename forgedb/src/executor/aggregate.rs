//! Grouping and aggregation (§4.8, step 2), shared by the single-table
//! and join `SELECT` paths.

use std::collections::BTreeMap;

use crate::executor::predicate::ColumnResolver;
use crate::statement::{ColumnRef, ProjectionItem};
use crate::value::Value;

/// The separator joining multiple group-key/join-key column encodings;
/// a non-printable unit separator so it can never collide with a real
/// value's own canonical encoding (§4.8).
pub const KEY_SEPARATOR: char = '\u{1f}';

pub fn encode_key(values: &[Value]) -> String {
    values.iter().map(|v| v.canonical_encoding()).collect::<Vec<_>>().join(&KEY_SEPARATOR.to_string())
}

/// True iff any projection item is an aggregate (everything except
/// `Star`/`Column`).
pub fn has_aggregates(projections: &[ProjectionItem]) -> bool {
    projections.iter().any(|p| {
        matches!(
            p,
            ProjectionItem::Count
                | ProjectionItem::Sum(_)
                | ProjectionItem::Avg(_)
                | ProjectionItem::Min(_)
                | ProjectionItem::Max(_)
                | ProjectionItem::DpCount
        )
    })
}

#[derive(Clone)]
enum AggAcc {
    Count(i64),
    Sum { sum: f64, any: bool },
    Avg { sum: f64, count: i64 },
    Min(Option<f64>),
    Max(Option<f64>),
}

impl AggAcc {
    fn new(item: &ProjectionItem) -> Option<Self> {
        match item {
            ProjectionItem::Count => Some(AggAcc::Count(0)),
            ProjectionItem::Sum(_) => Some(AggAcc::Sum { sum: 0.0, any: false }),
            ProjectionItem::Avg(_) => Some(AggAcc::Avg { sum: 0.0, count: 0 }),
            ProjectionItem::Min(_) => Some(AggAcc::Min(None)),
            ProjectionItem::Max(_) => Some(AggAcc::Max(None)),
            _ => None,
        }
    }

    fn observe(&mut self, value: Option<&Value>) {
        match self {
            AggAcc::Count(c) => *c += 1,
            AggAcc::Sum { sum, any } => {
                if let Some(n) = value.and_then(|v| v.as_f64()) {
                    *sum += n;
                    *any = true;
                }
            }
            AggAcc::Avg { sum, count } => {
                if let Some(n) = value.and_then(|v| v.as_f64()) {
                    *sum += n;
                    *count += 1;
                }
            }
            AggAcc::Min(acc) => {
                if let Some(n) = value.and_then(|v| v.as_f64()) {
                    *acc = Some(acc.map_or(n, |m| m.min(n)));
                }
            }
            AggAcc::Max(acc) => {
                if let Some(n) = value.and_then(|v| v.as_f64()) {
                    *acc = Some(acc.map_or(n, |m| m.max(n)));
                }
            }
        }
    }

    fn finalize(&self) -> Value {
        match self {
            AggAcc::Count(c) => Value::Int(*c),
            AggAcc::Sum { sum, any } => if *any { Value::Double(*sum) } else { Value::Null },
            AggAcc::Avg { sum, count } => {
                Value::Double(if *count == 0 { 0.0 } else { sum / (*count as f64) })
            }
            AggAcc::Min(acc) => acc.map(Value::Double).unwrap_or(Value::Null),
            AggAcc::Max(acc) => acc.map(Value::Double).unwrap_or(Value::Null),
        }
    }
}

pub fn header_for(item: &ProjectionItem) -> String {
    match item {
        ProjectionItem::Star => "*".to_string(),
        ProjectionItem::Column(col) => col.name.clone(),
        ProjectionItem::Count => "COUNT(*)".to_string(),
        ProjectionItem::Sum(col) => format!("SUM({})", col.name),
        ProjectionItem::Avg(col) => format!("AVG({})", col.name),
        ProjectionItem::Min(col) => format!("MIN({})", col.name),
        ProjectionItem::Max(col) => format!("MAX({})", col.name),
        ProjectionItem::DpCount => "dp_count".to_string(),
    }
}

/// Forms groups keyed by the tuple of `group_by` columns (or the single
/// group `ALL` if `group_by` is empty), accumulating every aggregate
/// projection item per group, and emits one output row per group in
/// deterministic (sorted-by-key) order.
///
/// Bare `Column` projection items are resolved from the group key
/// itself (§4.12's resolution of the Design Notes' flagged quirk),
/// provided the column is one of the `group_by` columns; otherwise they
/// evaluate to `Null`, since a non-aggregated, non-grouped column has
/// no single well-defined value for the group.
pub fn compute_groups<'a>(
    rows: impl Iterator<Item = &'a dyn ColumnResolver>,
    group_by: &[String],
    projections: &[ProjectionItem],
) -> (Vec<String>, Vec<Vec<Value>>) {
    struct Group {
        key_values: Vec<Value>,
        accumulators: Vec<Option<AggAcc>>,
    }

    let mut groups: BTreeMap<String, Group> = BTreeMap::new();

    for resolver in rows {
        let key_values: Vec<Value> = group_by
            .iter()
            .map(|name| resolver.resolve(&ColumnRef::unqualified(name)).cloned().unwrap_or(Value::Null))
            .collect();
        let key = if group_by.is_empty() { "ALL".to_string() } else { encode_key(&key_values) };

        let entry = groups.entry(key).or_insert_with(|| Group {
            key_values: key_values.clone(),
            accumulators: projections.iter().map(AggAcc::new).collect(),
        });

        for (item, acc) in projections.iter().zip(entry.accumulators.iter_mut()) {
            if let Some(acc) = acc {
                let value = aggregate_source_value(item, resolver);
                acc.observe(value.as_ref());
            }
        }
    }

    // An aggregate query with no GROUP BY always yields exactly one row,
    // even over zero observed rows (§4.8 step 2: "the single group ALL").
    if group_by.is_empty() && groups.is_empty() {
        groups.insert(
            "ALL".to_string(),
            Group { key_values: Vec::new(), accumulators: projections.iter().map(AggAcc::new).collect() },
        );
    }

    let headers = projections.iter().map(header_for).collect();

    let result_rows = groups
        .into_values()
        .map(|group| {
            projections
                .iter()
                .zip(group.accumulators.iter())
                .map(|(item, acc)| match (item, acc) {
                    (_, Some(acc)) => acc.finalize(),
                    (ProjectionItem::Column(col), None) => {
                        match group_by.iter().position(|g| g.eq_ignore_ascii_case(&col.name)) {
                            Some(pos) => group.key_values[pos].clone(),
                            None => Value::Null,
                        }
                    }
                    _ => Value::Null,
                })
                .collect()
        })
        .collect();

    (headers, result_rows)
}

fn aggregate_source_value(item: &ProjectionItem, resolver: &dyn ColumnResolver) -> Option<Value> {
    match item {
        ProjectionItem::Sum(col) | ProjectionItem::Avg(col) | ProjectionItem::Min(col) | ProjectionItem::Max(col) => {
            resolver.resolve(col).cloned()
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::predicate::SingleRowResolver;
    use pretty_assertions::assert_eq;

    #[test]
    fn group_by_resolves_bare_column_from_key() {
        let cols = vec!["region".to_string(), "amt".to_string()];
        let rows_data = vec![
            vec![Value::Text("E".to_string()), Value::Int(5)],
            vec![Value::Text("E".to_string()), Value::Int(7)],
            vec![Value::Text("W".to_string()), Value::Int(3)],
        ];
        let resolvers: Vec<SingleRowResolver> =
            rows_data.iter().map(|data| SingleRowResolver { columns: &cols, data }).collect();
        let refs: Vec<&dyn ColumnResolver> = resolvers.iter().map(|r| r as &dyn ColumnResolver).collect();

        let projections = vec![
            ProjectionItem::Column(ColumnRef::unqualified("region")),
            ProjectionItem::Sum(ColumnRef::unqualified("amt")),
        ];
        let (headers, rows) = compute_groups(refs.into_iter(), &["region".to_string()], &projections);

        assert_eq!(headers, vec!["region".to_string(), "SUM(amt)".to_string()]);
        assert_eq!(rows, vec![
            vec![Value::Text("E".to_string()), Value::Double(12.0)],
            vec![Value::Text("W".to_string()), Value::Double(3.0)],
        ]);
    }

    #[test]
    fn count_star_counts_every_row_regardless_of_nulls() {
        let cols = vec!["v".to_string()];
        let rows_data = vec![vec![Value::Null], vec![Value::Int(1)]];
        let resolvers: Vec<SingleRowResolver> =
            rows_data.iter().map(|data| SingleRowResolver { columns: &cols, data }).collect();
        let refs: Vec<&dyn ColumnResolver> = resolvers.iter().map(|r| r as &dyn ColumnResolver).collect();

        let projections = vec![ProjectionItem::Count];
        let (_, rows) = compute_groups(refs.into_iter(), &[], &projections);
        assert_eq!(rows, vec![vec![Value::Int(2)]]);
    }

    #[test]
    fn aggregates_over_zero_rows_yield_one_row_not_none() {
        let empty: Vec<&dyn ColumnResolver> = Vec::new();
        let projections = vec![
            ProjectionItem::Count,
            ProjectionItem::Sum(ColumnRef::unqualified("v")),
            ProjectionItem::Avg(ColumnRef::unqualified("v")),
            ProjectionItem::Min(ColumnRef::unqualified("v")),
            ProjectionItem::Max(ColumnRef::unqualified("v")),
        ];
        let (_, rows) = compute_groups(empty.into_iter(), &[], &projections);
        assert_eq!(rows, vec![vec![
            Value::Int(0),
            Value::Null,
            Value::Double(0.0),
            Value::Null,
            Value::Null,
        ]]);
    }

    #[test]
    fn avg_ignores_non_numeric_contributors() {
        let cols = vec!["v".to_string()];
        let rows_data = vec![vec![Value::Int(10)], vec![Value::Text("x".to_string())], vec![Value::Int(20)]];
        let resolvers: Vec<SingleRowResolver> =
            rows_data.iter().map(|data| SingleRowResolver { columns: &cols, data }).collect();
        let refs: Vec<&dyn ColumnResolver> = resolvers.iter().map(|r| r as &dyn ColumnResolver).collect();

        let projections = vec![ProjectionItem::Avg(ColumnRef::unqualified("v"))];
        let (_, rows) = compute_groups(refs.into_iter(), &[], &projections);
        assert_eq!(rows, vec![vec![Value::Double(15.0)]]);
    }
}
