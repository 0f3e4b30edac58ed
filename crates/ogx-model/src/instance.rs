//! Dynamic object instances.
//!
//! An [`Instance`] holds the per-object field storage the codec reads and
//! mutates through accessors. Objects are shared by `Rc<RefCell<_>>`; the
//! pointer is the object's identity for the duration of a session.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{ModelError, Result};
use crate::value::Value;

/// Shared handle to an object instance.
pub type ObjRef = Rc<RefCell<Instance>>;

/// Identity key of an object: stable for the lifetime of the `Rc`.
#[must_use]
pub fn obj_id(obj: &ObjRef) -> usize {
    Rc::as_ptr(obj) as usize
}

/// Storage for one field of an instance.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Scalar(Value),
    List(Vec<Value>),
    Set(Vec<Value>),
    Map(Vec<(Value, Value)>),
}

fn mismatch(class: &str, field: &str, expected: &'static str) -> ModelError {
    ModelError::KindMismatch {
        class: class.to_string(),
        field: field.to_string(),
        expected,
    }
}

/// One live object: class name plus named field slots.
///
/// Every mutating accessor bumps `version`, so a caller can observe whether
/// an operation touched the object at all. The importer relies on this
/// staying untouched when it skips an unchanged field.
#[derive(Debug)]
pub struct Instance {
    class: String,
    slots: HashMap<String, Slot>,
    version: u64,
}

impl Instance {
    /// Create an instance with the given slots, wrapped for sharing.
    pub fn create(class: &str, slots: Vec<(String, Slot)>) -> ObjRef {
        Rc::new(RefCell::new(Self {
            class: class.to_string(),
            slots: slots.into_iter().collect(),
            version: 0,
        }))
    }

    /// Fully-qualified class name.
    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class
    }

    /// Number of mutations applied to this instance.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    fn slot(&self, field: &str) -> Result<&Slot> {
        self.slots.get(field).ok_or_else(|| ModelError::UnknownField {
            class: self.class.clone(),
            field: field.to_string(),
        })
    }

    fn slot_mut(&mut self, field: &str) -> Result<&mut Slot> {
        let class = self.class.clone();
        self.slots.get_mut(field).ok_or(ModelError::UnknownField {
            class,
            field: field.to_string(),
        })
    }

    /// Read a scalar field.
    pub fn scalar(&self, field: &str) -> Result<&Value> {
        match self.slot(field)? {
            Slot::Scalar(value) => Ok(value),
            _ => Err(mismatch(&self.class, field, "scalar")),
        }
    }

    /// Write a scalar field.
    pub fn set_scalar(&mut self, field: &str, value: Value) -> Result<()> {
        let class = self.class.clone();
        match self.slot_mut(field)? {
            Slot::Scalar(slot) => *slot = value,
            _ => return Err(mismatch(&class, field, "scalar")),
        }
        self.version += 1;
        Ok(())
    }

    /// Read a list field.
    pub fn list(&self, field: &str) -> Result<&[Value]> {
        match self.slot(field)? {
            Slot::List(values) => Ok(values),
            _ => Err(mismatch(&self.class, field, "list")),
        }
    }

    /// Read a set field.
    pub fn set(&self, field: &str) -> Result<&[Value]> {
        match self.slot(field)? {
            Slot::Set(values) => Ok(values),
            _ => Err(mismatch(&self.class, field, "set")),
        }
    }

    /// Read a map field.
    pub fn map(&self, field: &str) -> Result<&[(Value, Value)]> {
        match self.slot(field)? {
            Slot::Map(entries) => Ok(entries),
            _ => Err(mismatch(&self.class, field, "map")),
        }
    }

    /// Append to a list field.
    pub fn push(&mut self, field: &str, value: Value) -> Result<()> {
        let class = self.class.clone();
        match self.slot_mut(field)? {
            Slot::List(values) => values.push(value),
            _ => return Err(mismatch(&class, field, "list")),
        }
        self.version += 1;
        Ok(())
    }

    /// Add to a set field; a value already present is left alone.
    pub fn add(&mut self, field: &str, value: Value) -> Result<()> {
        let class = self.class.clone();
        let changed = match self.slot_mut(field)? {
            Slot::Set(values) => {
                if values.contains(&value) {
                    false
                } else {
                    values.push(value);
                    true
                }
            }
            _ => return Err(mismatch(&class, field, "set")),
        };
        if changed {
            self.version += 1;
        }
        Ok(())
    }

    /// Put into a map field, replacing the entry for an equal key.
    pub fn put(&mut self, field: &str, key: Value, value: Value) -> Result<()> {
        let class = self.class.clone();
        match self.slot_mut(field)? {
            Slot::Map(entries) => {
                if let Some(entry) = entries.iter_mut().find(|(k, _)| *k == key) {
                    entry.1 = value;
                } else {
                    entries.push((key, value));
                }
            }
            _ => return Err(mismatch(&class, field, "map")),
        }
        self.version += 1;
        Ok(())
    }

    /// Clear and refill a list field.
    pub fn replace_list(&mut self, field: &str, values: Vec<Value>) -> Result<()> {
        let class = self.class.clone();
        match self.slot_mut(field)? {
            Slot::List(slot) => *slot = values,
            _ => return Err(mismatch(&class, field, "list")),
        }
        self.version += 1;
        Ok(())
    }

    /// Clear and refill a set field.
    pub fn replace_set(&mut self, field: &str, values: Vec<Value>) -> Result<()> {
        let class = self.class.clone();
        match self.slot_mut(field)? {
            Slot::Set(slot) => *slot = values,
            _ => return Err(mismatch(&class, field, "set")),
        }
        self.version += 1;
        Ok(())
    }

    /// Clear and refill a map field.
    pub fn replace_map(&mut self, field: &str, entries: Vec<(Value, Value)>) -> Result<()> {
        let class = self.class.clone();
        match self.slot_mut(field)? {
            Slot::Map(slot) => *slot = entries,
            _ => return Err(mismatch(&class, field, "map")),
        }
        self.version += 1;
        Ok(())
    }
}
