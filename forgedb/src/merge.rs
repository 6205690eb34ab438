//! Per-column CRDT merge policies and the `merge` contract they implement.

use serde_derive::{Deserialize, Serialize};

use crate::value::Value;

/// A per-column conflict resolution policy, attached at `CREATE TABLE`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum MergeSpec {
    /// Replace semantics: a non-null incoming value wins outright.
    None,
    /// Last-write-wins: identical to `None`'s replace behavior, but
    /// recorded as a distinct kind since future callers may special-case
    /// ordering; null always preserves the old value.
    Lww,
    /// Saturating integer addition, clamped to `[min, max]` after the add.
    SumBounded(i64, i64),
    /// Grow-only set union.
    Gset,
}

impl MergeSpec {
    /// The integer tag used by the snapshot format (§6.4), in the
    /// declaration order of this enum.
    pub fn kind_tag(&self) -> i32 {
        match self {
            MergeSpec::None => 0,
            MergeSpec::Lww => 1,
            MergeSpec::SumBounded(_, _) => 2,
            MergeSpec::Gset => 3,
        }
    }
}

/// `merge(spec, old, new) -> Value`, per §4.2.
///
/// `SUM_BOUNDED` is commutative and associative modulo clamping, which is
/// applied once after the add, never per operand. `GSET` is commutative
/// and associative (set union). `LWW`/`NONE` are not commutative by
/// design: the caller picks which operand is "new".
pub fn merge(spec: &MergeSpec, old: &Value, new: &Value) -> Value {
    match spec {
        MergeSpec::None | MergeSpec::Lww => {
            if new.is_null() {
                old.clone()
            } else {
                new.clone()
            }
        }
        MergeSpec::SumBounded(min, max) => {
            let old_n = match old {
                Value::Int(i) => *i as i128,
                _ => 0,
            };
            let new_n = match new {
                Value::Int(i) => *i as i128,
                _ => 0,
            };
            let sum = old_n + new_n;
            let clamped = sum.clamp(*min as i128, *max as i128);
            Value::Int(clamped as i64)
        }
        MergeSpec::Gset => {
            let mut union = match old {
                Value::SetText(s) => s.clone(),
                _ => Default::default(),
            };
            if let Value::SetText(s) = new {
                union.extend(s.iter().cloned());
            }
            Value::SetText(union)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    #[test]
    fn sum_bounded_clamps_after_add() {
        let spec = MergeSpec::SumBounded(0, 100);
        assert_eq!(merge(&spec, &Value::Int(30), &Value::Int(80)), Value::Int(100));
    }

    #[test]
    fn sum_bounded_is_order_independent() {
        let spec = MergeSpec::SumBounded(0, 100);
        let forward = merge(&spec, &merge(&spec, &Value::Int(0), &Value::Int(40)), &Value::Int(90));
        let backward = merge(&spec, &merge(&spec, &Value::Int(0), &Value::Int(90)), &Value::Int(40));
        assert_eq!(forward, backward);
    }

    #[test]
    fn gset_union_is_order_independent() {
        let spec = MergeSpec::Gset;
        let mut ab = BTreeSet::new();
        ab.insert("a".to_string());
        ab.insert("b".to_string());
        let mut bc = BTreeSet::new();
        bc.insert("b".to_string());
        bc.insert("c".to_string());

        let forward = merge(&spec, &Value::SetText(ab.clone()), &Value::SetText(bc.clone()));
        let backward = merge(&spec, &Value::SetText(bc), &Value::SetText(ab));
        assert_eq!(forward, backward);

        let mut expect = BTreeSet::new();
        expect.insert("a".to_string());
        expect.insert("b".to_string());
        expect.insert("c".to_string());
        assert_eq!(forward, Value::SetText(expect));
    }

    #[test]
    fn lww_null_preserves_old() {
        assert_eq!(merge(&MergeSpec::Lww, &Value::Int(5), &Value::Null), Value::Int(5));
    }
}
