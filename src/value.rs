//! Runtime values: query variables, parameters, row cells and hydrated
//! entity objects.
use std::collections::BTreeMap;

use crate::schema::EntityType;

/// A runtime value bound to a query variable or read from a row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// A single entity instance.
    Object(Object),
    /// The collection of all instances of an entity; what a qualifier
    /// iterates over.
    Entities(EntityType),
    List(Vec<Value>),
}

/// One result row as decoded by an executor.
pub type Row = Vec<Value>;

/// A hydrated entity instance.
///
/// Reference attributes hold key-only stub objects of the target
/// entity; attributes that were never loaded are simply absent.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    entity: EntityType,
    values: BTreeMap<String, Value>,
}

impl Object {
    pub fn new(entity: EntityType) -> Self {
        Self {
            entity,
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, attr: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(attr, value);
        self
    }

    pub fn set(&mut self, attr: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(attr.into(), value.into());
    }

    pub fn entity(&self) -> &EntityType {
        &self.entity
    }

    pub fn get(&self, attr: &str) -> Option<&Value> {
        self.values.get(attr)
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// Primary key flattened to one value per key column. Key attributes
    /// that are themselves references contribute their target's key.
    pub fn raw_pk(&self) -> Vec<Value> {
        let mut raw = Vec::new();
        for attr in self.entity.pk_attrs() {
            match self.values.get(&attr.name) {
                Some(Value::Object(target)) => raw.extend(target.raw_pk()),
                Some(value) => raw.push(value.clone()),
                None => raw.extend(std::iter::repeat(Value::Null).take(attr.columns.len())),
            }
        }
        raw
    }

    /// JSON rendering of the loaded attributes. References render as
    /// their key values.
    pub fn to_json(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        for (name, value) in &self.values {
            obj.insert(name.clone(), value_to_json(value));
        }
        serde_json::Value::Object(obj)
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::from(*i),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Object(obj) => {
            let mut key: Vec<serde_json::Value> = obj.raw_pk().iter().map(value_to_json).collect();
            if key.len() == 1 {
                key.remove(0)
            } else {
                serde_json::Value::Array(key)
            }
        }
        Value::Entities(entity) => serde_json::Value::String(entity.name().to_string()),
        Value::List(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Object> for Value {
    fn from(v: Object) -> Self {
        Value::Object(v)
    }
}

impl From<EntityType> for Value {
    fn from(v: EntityType) -> Self {
        Value::Entities(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
