// Document store adapter: key-addressed collections of schema-flexible JSON
// documents with revision-based optimistic concurrency. Collections hand out
// cloneable handles that are injected into each controller at construction.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::{Map, Value};
use thiserror::Error;

/// Closed set of store failure conditions. Controllers match these variants
/// explicitly; anything outside an operation's handled set is fatal.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    DuplicateKey(String),
    #[error("{0}")]
    WriteConflict(String),
    #[error("{0}")]
    Other(String),
}

/// Store-assigned metadata for a written document, surfaced to clients as
/// the `_key` and `_rev` fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMeta {
    pub key: String,
    pub rev: String,
}

#[derive(Default)]
struct Documents {
    /// Keys in insertion order; `list_all` replays this.
    order: Vec<String>,
    docs: HashMap<String, Value>,
    next_key: u64,
    next_rev: u64,
}

/// Cloneable handle to one named collection.
#[derive(Clone)]
pub struct Collection {
    name: &'static str,
    inner: Arc<RwLock<Documents>>,
}

impl Collection {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: Arc::new(RwLock::new(Documents::default())),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Inserts a document. Honors an explicit non-empty `_key` string in the
    /// body; otherwise assigns the next generated key. The stored document
    /// carries the assigned `_key` and a fresh `_rev`.
    pub fn insert(&self, doc: &Value) -> Result<DocumentMeta, StoreError> {
        let body = as_object(doc, self.name)?;
        let mut inner = self.write()?;
        let key = match body.get("_key").and_then(Value::as_str) {
            Some(k) if !k.is_empty() => {
                if inner.docs.contains_key(k) {
                    return Err(StoreError::DuplicateKey(format!(
                        "unique constraint violated in collection '{}': key '{}' already exists",
                        self.name, k
                    )));
                }
                k.to_string()
            }
            _ => loop {
                inner.next_key += 1;
                let candidate = inner.next_key.to_string();
                if !inner.docs.contains_key(&candidate) {
                    break candidate;
                }
            },
        };
        inner.next_rev += 1;
        let rev = inner.next_rev.to_string();
        let mut stored = body.clone();
        stored.insert("_key".to_string(), Value::String(key.clone()));
        stored.insert("_rev".to_string(), Value::String(rev.clone()));
        inner.order.push(key.clone());
        inner.docs.insert(key.clone(), Value::Object(stored));
        Ok(DocumentMeta { key, rev })
    }

    pub fn fetch_by_key(&self, key: &str) -> Result<Value, StoreError> {
        let inner = self.read()?;
        inner
            .docs
            .get(key)
            .cloned()
            .ok_or_else(|| self.not_found(key))
    }

    /// Full overwrite. If the body carries a `_rev` that differs from the
    /// stored revision, the write is refused with a conflict.
    pub fn replace_by_key(&self, key: &str, doc: &Value) -> Result<DocumentMeta, StoreError> {
        let body = as_object(doc, self.name)?;
        let mut inner = self.write()?;
        let current_rev = match inner.docs.get(key) {
            Some(existing) => rev_of(existing),
            None => return Err(self.not_found(key)),
        };
        self.check_rev(key, body, &current_rev)?;
        inner.next_rev += 1;
        let rev = inner.next_rev.to_string();
        let mut stored = body.clone();
        stored.insert("_key".to_string(), Value::String(key.to_string()));
        stored.insert("_rev".to_string(), Value::String(rev.clone()));
        inner.docs.insert(key.to_string(), Value::Object(stored));
        Ok(DocumentMeta {
            key: key.to_string(),
            rev,
        })
    }

    /// Merge-update: object fields merge recursively, scalars and arrays
    /// overwrite, explicit nulls are kept. Returns only the new metadata;
    /// callers re-fetch if they need the merged document.
    pub fn patch_by_key(&self, key: &str, patch: &Value) -> Result<DocumentMeta, StoreError> {
        let patch = as_object(patch, self.name)?;
        let mut inner = self.write()?;
        let mut merged = match inner.docs.get(key) {
            Some(existing) => existing.as_object().cloned().unwrap_or_default(),
            None => return Err(self.not_found(key)),
        };
        let current_rev = merged
            .get("_rev")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        self.check_rev(key, patch, &current_rev)?;
        for (field, value) in patch {
            if matches!(field.as_str(), "_key" | "_rev") {
                continue;
            }
            match merged.get_mut(field) {
                Some(slot) => merge_value(slot, value),
                None => {
                    merged.insert(field.clone(), value.clone());
                }
            }
        }
        inner.next_rev += 1;
        let rev = inner.next_rev.to_string();
        merged.insert("_rev".to_string(), Value::String(rev.clone()));
        inner.docs.insert(key.to_string(), Value::Object(merged));
        Ok(DocumentMeta {
            key: key.to_string(),
            rev,
        })
    }

    pub fn remove_by_key(&self, key: &str) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        if inner.docs.remove(key).is_none() {
            return Err(self.not_found(key));
        }
        inner.order.retain(|k| k != key);
        Ok(())
    }

    /// All documents in insertion order.
    pub fn list_all(&self) -> Result<Vec<Value>, StoreError> {
        let inner = self.read()?;
        Ok(inner
            .order
            .iter()
            .filter_map(|k| inner.docs.get(k).cloned())
            .collect())
    }

    fn check_rev(
        &self,
        key: &str,
        body: &Map<String, Value>,
        current: &str,
    ) -> Result<(), StoreError> {
        if let Some(given) = body.get("_rev").and_then(Value::as_str) {
            if given != current {
                return Err(StoreError::WriteConflict(format!(
                    "conflict updating '{}/{}': _rev does not match",
                    self.name, key
                )));
            }
        }
        Ok(())
    }

    fn not_found(&self, key: &str) -> StoreError {
        StoreError::NotFound(format!("document '{}/{}' not found", self.name, key))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Documents>, StoreError> {
        self.inner.read().map_err(|_| self.unavailable())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Documents>, StoreError> {
        self.inner.write().map_err(|_| self.unavailable())
    }

    fn unavailable(&self) -> StoreError {
        StoreError::Other(format!("collection '{}' is unavailable", self.name))
    }
}

fn as_object<'a>(doc: &'a Value, collection: &str) -> Result<&'a Map<String, Value>, StoreError> {
    doc.as_object().ok_or_else(|| {
        StoreError::Other(format!(
            "collection '{}' only stores JSON objects",
            collection
        ))
    })
}

fn rev_of(doc: &Value) -> String {
    doc.get("_rev")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn merge_value(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(t), Value::Object(p)) => {
            for (k, v) in p {
                match t.get_mut(k) {
                    Some(slot) => merge_value(slot, v),
                    None => {
                        t.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (slot, v) => *slot = v.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn insert_assigns_key_and_rev() {
        let col = Collection::new("things");
        let meta = col.insert(&json!({"name": "a"})).unwrap();
        assert!(!meta.key.is_empty());
        let doc = col.fetch_by_key(&meta.key).unwrap();
        assert_eq!(doc["name"], "a");
        assert_eq!(doc["_key"], meta.key.as_str());
        assert_eq!(doc["_rev"], meta.rev.as_str());
    }

    #[test]
    fn insert_honors_explicit_key_once() {
        let col = Collection::new("things");
        let meta = col.insert(&json!({"_key": "alpha", "name": "a"})).unwrap();
        assert_eq!(meta.key, "alpha");
        let err = col
            .insert(&json!({"_key": "alpha", "name": "b"}))
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(_)));
        // first document untouched
        assert_eq!(col.fetch_by_key("alpha").unwrap()["name"], "a");
    }

    #[test]
    fn fetch_unknown_key_is_not_found() {
        let col = Collection::new("things");
        assert!(matches!(
            col.fetch_by_key("nope"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn replace_is_full_overwrite() {
        let col = Collection::new("things");
        let meta = col.insert(&json!({"name": "a", "extra": 1})).unwrap();
        col.replace_by_key(&meta.key, &json!({"name": "b"}))
            .unwrap();
        let doc = col.fetch_by_key(&meta.key).unwrap();
        assert_eq!(doc["name"], "b");
        assert!(doc.get("extra").is_none());
    }

    #[test]
    fn stale_rev_is_a_write_conflict() {
        let col = Collection::new("things");
        let meta = col.insert(&json!({"n": 1})).unwrap();
        let stale = meta.rev.clone();
        col.replace_by_key(&meta.key, &json!({"n": 2})).unwrap();
        let err = col
            .replace_by_key(&meta.key, &json!({"n": 3, "_rev": stale.clone()}))
            .unwrap_err();
        assert!(matches!(err, StoreError::WriteConflict(_)));
        let err = col
            .patch_by_key(&meta.key, &json!({"n": 3, "_rev": stale}))
            .unwrap_err();
        assert!(matches!(err, StoreError::WriteConflict(_)));
    }

    #[test]
    fn matching_rev_is_accepted() {
        let col = Collection::new("things");
        let meta = col.insert(&json!({"n": 1})).unwrap();
        col.replace_by_key(&meta.key, &json!({"n": 2, "_rev": meta.rev}))
            .unwrap();
        assert_eq!(col.fetch_by_key(&meta.key).unwrap()["n"], 2);
    }

    #[test]
    fn patch_merges_and_keeps_other_fields() {
        let col = Collection::new("things");
        let meta = col
            .insert(&json!({"name": "a", "nested": {"x": 1, "y": 2}}))
            .unwrap();
        let new_meta = col
            .patch_by_key(&meta.key, &json!({"nested": {"y": 3}, "flag": null}))
            .unwrap();
        assert_ne!(new_meta.rev, meta.rev);
        let doc = col.fetch_by_key(&meta.key).unwrap();
        assert_eq!(doc["name"], "a");
        assert_eq!(doc["nested"]["x"], 1);
        assert_eq!(doc["nested"]["y"], 3);
        assert!(doc["flag"].is_null());
    }

    #[test]
    fn remove_then_fetch_is_not_found() {
        let col = Collection::new("things");
        let meta = col.insert(&json!({"n": 1})).unwrap();
        col.remove_by_key(&meta.key).unwrap();
        assert!(matches!(
            col.fetch_by_key(&meta.key),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            col.remove_by_key(&meta.key),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn list_all_preserves_insertion_order() {
        let col = Collection::new("things");
        for n in ["first", "second", "third"] {
            col.insert(&json!({"name": n})).unwrap();
        }
        let names: Vec<_> = col
            .list_all()
            .unwrap()
            .into_iter()
            .map(|d| d["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, ["first", "second", "third"]);
    }
}
