//! Collector/context: per-record traversal state (spec §4.8).
//!
//! The spec's source carries a read-write lock here to serialize reads
//! against "late map materialization"; a single worker owns one record
//! for the whole pipeline traversal in this runtime (spec §3 Ownership:
//! "a collector/context object is exclusively owned by the single worker
//! processing a record"), so there is nothing else that could race with it
//! and no lock is needed (Open Question, resolved).

use crate::value::{get_field, Record, Value};
use crate::window::GroupKey;

/// Bound to exactly one record's traversal through filter → group →
/// aggregate. Not `Send`/shared: constructed, used, and dropped by the
/// same worker before the next record is dequeued.
pub struct RecordContext<'a> {
    record: &'a Record,
    group_key: Option<GroupKey>,
}

impl<'a> RecordContext<'a> {
    pub fn new(record: &'a Record) -> Self {
        RecordContext {
            record,
            group_key: None,
        }
    }

    pub fn record(&self) -> &'a Record {
        self.record
    }

    pub fn field(&self, name: &str) -> Value {
        get_field(self.record, name)
    }

    pub fn set_group_key(&mut self, key: GroupKey) {
        self.group_key = Some(key);
    }

    pub fn group_key(&self) -> Option<&GroupKey> {
        self.group_key.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    #[test]
    fn context_proxies_field_access_to_the_bound_record() {
        let mut record: Record = IndexMap::new();
        record.insert("temperature".into(), Value::Int(25));
        let ctx = RecordContext::new(&record);
        assert_eq!(ctx.field("temperature"), Value::Int(25));
        assert_eq!(ctx.field("missing"), Value::Null);
    }

    #[test]
    fn group_key_starts_unset_until_assigned() {
        let record: Record = IndexMap::new();
        let mut ctx = RecordContext::new(&record);
        assert!(ctx.group_key().is_none());
        ctx.set_group_key(vec![Value::Str("dev1".into())]);
        assert_eq!(ctx.group_key(), Some(&vec![Value::Str("dev1".into())]));
    }
}
