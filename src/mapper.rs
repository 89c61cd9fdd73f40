use std::collections::HashMap;

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};

use crate::platform::{RawObject, ShapeKind};

/// A field value in a canonical field set.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Text(String),
    Time(DateTime<Utc>),
    /// A platform sub-object (e.g. the message author) that
    /// `map_recursive` replaces with its own mapped fields.
    Raw(RawObject),
    Fields(Fields),
}

/// Canonical field set produced by a converter: field name to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(HashMap<&'static str, Value>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &'static str, value: Value) {
        self.0.insert(name, value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn int(&self, name: &str) -> Result<i64> {
        match self.get(name) {
            Some(Value::Int(v)) => Ok(*v),
            other => Err(anyhow!("field {name:?} is not an integer: {other:?}")),
        }
    }

    pub fn text(&self, name: &str) -> Result<&str> {
        match self.get(name) {
            Some(Value::Text(v)) => Ok(v),
            other => Err(anyhow!("field {name:?} is not text: {other:?}")),
        }
    }

    pub fn time(&self, name: &str) -> Result<DateTime<Utc>> {
        match self.get(name) {
            Some(Value::Time(v)) => Ok(*v),
            other => Err(anyhow!("field {name:?} is not a timestamp: {other:?}")),
        }
    }

    fn values_mut(&mut self) -> impl Iterator<Item = &mut Value> {
        self.0.values_mut()
    }
}

/// Converts one platform shape into canonical fields. Registered per shape
/// kind; called only for objects the registry resolved to that kind.
pub type Converter = fn(&RawObject) -> Fields;

/// Registry of shape converters, built once at startup and passed by
/// reference into the ingest pipeline. Resolution is by exact shape kind
/// first, then by the kind's immediate declared supertypes.
#[derive(Default)]
pub struct MapperRegistry {
    converters: HashMap<ShapeKind, Converter>,
}

impl MapperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: ShapeKind, converter: Converter) {
        self.converters.insert(kind, converter);
    }

    /// Exact kind, else exactly one registered supertype. More than one
    /// registered supertype is a configuration error and aborts: ambiguous
    /// registrations must never silently pick a winner.
    fn resolve(&self, kind: ShapeKind) -> Option<Converter> {
        if let Some(converter) = self.converters.get(&kind) {
            return Some(*converter);
        }
        let mut candidates = kind
            .supertypes()
            .iter()
            .filter_map(|super_kind| self.converters.get(super_kind));
        let first = candidates.next();
        if candidates.next().is_some() {
            panic!("ambiguous mapper registration for {kind:?}");
        }
        first.copied()
    }

    /// Maps a raw object to its canonical field set.
    pub fn map(&self, obj: &RawObject) -> Result<Fields> {
        match self.resolve(obj.kind()) {
            Some(converter) => Ok(converter(obj)),
            None => bail!("no mapper registered for {:?}", obj.kind()),
        }
    }

    /// Like `map`, but re-maps any field value that is itself a mappable
    /// platform object (e.g. an inbound author sub-object).
    pub fn map_recursive(&self, obj: &RawObject) -> Result<Fields> {
        let mut fields = self.map(obj)?;
        for value in fields.values_mut() {
            let mapped = match value {
                Value::Raw(sub) if self.resolve(sub.kind()).is_some() => {
                    self.map_recursive(sub)?
                }
                _ => continue,
            };
            *value = Value::Fields(mapped);
        }
        Ok(fields)
    }
}
