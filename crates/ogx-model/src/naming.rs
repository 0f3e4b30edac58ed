//! The name registry.
//!
//! Maps object instances to stable, unique string names and back. Names are
//! the unit of cross-reference in the exported form: an object can only be
//! referenced from the stream if it is registered here.
//!
//! Invariants: a name maps to at most one object, and an object carries at
//! most one name. Fresh names are minted from the lowercased class short
//! name and a per-class counter; the counters themselves are part of the
//! exported state so that names minted after a reload never collide with
//! names already on disk.

use std::collections::{BTreeMap, HashMap};

use crate::error::{ModelError, Result};
use crate::instance::{ObjRef, obj_id};

/// Bidirectional name ↔ object registry with name-mint counters.
#[derive(Debug, Default)]
pub struct NameRegistry {
    objects: HashMap<String, ObjRef>,
    names: HashMap<usize, String>,
    counters: BTreeMap<String, i64>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The name of an object, if it has one.
    #[must_use]
    pub fn name_of(&self, obj: &ObjRef) -> Option<&str> {
        self.names.get(&obj_id(obj)).map(String::as_str)
    }

    /// The object registered under a name, if any.
    #[must_use]
    pub fn object_of(&self, name: &str) -> Option<ObjRef> {
        self.objects.get(name).cloned()
    }

    /// Number of registered objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Register an object under a caller-chosen name.
    pub fn register(&mut self, name: &str, obj: &ObjRef) -> Result<()> {
        if self.objects.contains_key(name) {
            return Err(ModelError::NameInUse(name.to_string()));
        }
        if let Some(existing) = self.names.get(&obj_id(obj)) {
            return Err(ModelError::AlreadyNamed(existing.clone()));
        }
        self.objects.insert(name.to_string(), obj.clone());
        self.names.insert(obj_id(obj), name.to_string());
        tracing::debug!(name, "registered object");
        Ok(())
    }

    /// Mint a fresh name for an object and register it.
    ///
    /// The name is the lowercased class short name followed by a counter;
    /// the counter is advanced past any name already taken.
    pub fn assign_name(&mut self, obj: &ObjRef) -> Result<String> {
        if let Some(existing) = self.names.get(&obj_id(obj)) {
            return Err(ModelError::AlreadyNamed(existing.clone()));
        }
        let base = {
            let inst = obj.borrow();
            let class = inst.class_name();
            class
                .rsplit('.')
                .next()
                .unwrap_or(class)
                .to_lowercase()
        };
        let mut next = self.counters.get(&base).copied().unwrap_or(0);
        let name = loop {
            let candidate = format!("{base}{next}");
            next += 1;
            if !self.objects.contains_key(&candidate) {
                break candidate;
            }
        };
        self.counters.insert(base, next);
        self.register(&name, obj)?;
        Ok(name)
    }

    /// The current name-mint counters, keyed by name base.
    #[must_use]
    pub fn counters(&self) -> &BTreeMap<String, i64> {
        &self.counters
    }

    /// Merge replayed counters into the current ones.
    ///
    /// Takes the maximum per key, so counters read from a stream can never
    /// wind a counter back below names minted in the meantime.
    pub fn update_counters(&mut self, counters: &BTreeMap<String, i64>) {
        for (base, &value) in counters {
            let slot = self.counters.entry(base.clone()).or_insert(0);
            if value > *slot {
                *slot = value;
            }
        }
    }
}
