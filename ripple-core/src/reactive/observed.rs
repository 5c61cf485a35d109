//! Observed Objects
//!
//! Dynamic objects and arrays whose property reads and writes are tracked.
//!
//! An [`Object`] is the raw, shared data; it never tracks anything. An
//! [`Observed`] is the view of an object that calls into the property store:
//! reads link the property to the running subscriber, writes propagate to
//! the subscribers of that property.
//!
//! ```rust
//! use ripple_core::reactive::{observe, Effect, Object, Value};
//!
//! let state = observe(&Object::from_pairs([("count", Value::from(1))]));
//!
//! let effect = {
//!     let state = state.clone();
//!     Effect::new(move || state.get("count"))
//! };
//!
//! state.set("count", 2).unwrap();
//! assert_eq!(effect.run_count(), 2);
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use super::signal::Signal;
use super::store::{self, PropKey, Shape, TargetId, TriggerOp};
use crate::error::{ReactiveError, Result};

/// Arrays never grow past this many elements.
pub const MAX_ARRAY_LENGTH: usize = u32::MAX as usize;

/// A dynamically typed value held by an object property or a boxed cell.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    /// A raw object or array.
    Object(Object),
    /// A tracked view of an object or array.
    Observed(Observed),
    /// A reactive cell. Unwrapped automatically when read from an object.
    Boxed(Signal<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_observed(&self) -> Option<&Observed> {
        match self {
            Value::Observed(observed) => Some(observed),
            _ => None,
        }
    }

    /// The raw object behind an object-like value.
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(object) => Some(object),
            Value::Observed(observed) => Some(observed.raw()),
            _ => None,
        }
    }

    /// Snapshot the value as JSON without tracking anything.
    ///
    /// Cyclic objects cannot be represented and must not be serialized.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Strip the tracked view off object values before storing them.
    fn into_raw(self) -> Value {
        match self {
            Value::Observed(observed) => Value::Object(observed.0),
            other => other,
        }
    }

    /// Present a stored value to a tracked reader.
    fn into_observed(self) -> Value {
        match self {
            Value::Object(object) => Value::Observed(Observed(object)),
            Value::Boxed(cell) => cell.get().into_observed(),
            other => other,
        }
    }
}

/// Values compare like `Object.is`: numbers by value (NaN equals NaN, zeroes
/// keep their sign), objects and cells by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => {
                (a.is_nan() && b.is_nan()) || a.to_bits() == b.to_bits()
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Observed(a), Value::Observed(b)) => a == b,
            (Value::Boxed(a), Value::Boxed(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s.into())
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Value::Object(object)
    }
}

impl From<Observed> for Value {
    fn from(observed: Observed) -> Self {
        Value::Observed(observed)
    }
}

impl From<Signal<Value>> for Value {
    fn from(cell: Signal<Value>) -> Self {
        Value::Boxed(cell)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s),
            other => Value::Object(Object::from_json(other)),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER => {
                serializer.serialize_i64(*n as i64)
            }
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::String(s) => serializer.serialize_str(s),
            Value::Object(object) => object.serialize(serializer),
            Value::Observed(observed) => observed.raw().serialize(serializer),
            Value::Boxed(cell) => cell.borrow_untracked().serialize(serializer),
        }
    }
}

enum Data {
    Array(Vec<Value>),
    Map(IndexMap<Rc<str>, Value>),
}

struct ObjectData {
    id: TargetId,
    data: RefCell<Data>,
}

impl Drop for ObjectData {
    fn drop(&mut self) {
        store::release_target(self.id);
    }
}

/// A raw, shared object or array. Accessors on it are never tracked.
#[derive(Clone)]
pub struct Object(Rc<ObjectData>);

impl Object {
    fn with_data(data: Data) -> Self {
        Self(Rc::new(ObjectData {
            id: TargetId::new(),
            data: RefCell::new(data),
        }))
    }

    /// An empty object.
    pub fn new() -> Self {
        Self::with_data(Data::Map(IndexMap::new()))
    }

    /// An array holding `items`.
    pub fn array<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::with_data(Data::Array(
            items.into_iter().map(|v| v.into().into_raw()).collect(),
        ))
    }

    /// An object holding the given fields, in order.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Rc<str>>,
        V: Into<Value>,
    {
        Self::with_data(Data::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into().into_raw()))
                .collect(),
        ))
    }

    /// Build nested objects from JSON. Scalars become a one-element array.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Array(items) => Self::array(items.into_iter().map(Value::from)),
            serde_json::Value::Object(fields) => {
                Self::from_pairs(fields.into_iter().map(|(k, v)| (k, Value::from(v))))
            }
            scalar => Self::array([Value::from(scalar)]),
        }
    }

    pub fn target_id(&self) -> TargetId {
        self.0.id
    }

    pub fn shape(&self) -> Shape {
        match &*self.0.data.borrow() {
            Data::Array(_) => Shape::Array,
            Data::Map(_) => Shape::Object,
        }
    }

    /// Read a property without tracking. Stored values are returned as is.
    pub fn get_untracked(&self, key: &PropKey) -> Option<Value> {
        match (&*self.0.data.borrow(), key) {
            (Data::Array(items), PropKey::Index(i)) => items.get(*i).cloned(),
            (Data::Array(items), PropKey::Length) => Some(Value::Number(items.len() as f64)),
            (Data::Map(fields), PropKey::Field(name)) => fields.get(name).cloned(),
            _ => None,
        }
    }

    /// Number of elements or fields, untracked.
    pub fn len_untracked(&self) -> usize {
        match &*self.0.data.borrow() {
            Data::Array(items) => items.len(),
            Data::Map(fields) => fields.len(),
        }
    }

    /// Property keys in order, untracked.
    pub fn keys_untracked(&self) -> Vec<PropKey> {
        match &*self.0.data.borrow() {
            Data::Array(items) => (0..items.len()).map(PropKey::Index).collect(),
            Data::Map(fields) => fields.keys().cloned().map(PropKey::Field).collect(),
        }
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Objects may be cyclic; never recurse into them.
        f.debug_struct("Object")
            .field("id", &self.0.id)
            .field("shape", &self.shape())
            .field("len", &self.len_untracked())
            .finish()
    }
}

impl Serialize for Object {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match &*self.0.data.borrow() {
            Data::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Data::Map(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (key, value) in fields {
                    map.serialize_entry(&**key, value)?;
                }
                map.end()
            }
        }
    }
}

/// A tracked view of an [`Object`].
///
/// Views share the identity of their object: observing the same object twice
/// yields views that compare equal.
#[derive(Clone)]
pub struct Observed(Object);

impl Observed {
    /// The raw object behind this view.
    pub fn raw(&self) -> &Object {
        &self.0
    }

    pub fn target_id(&self) -> TargetId {
        self.0.target_id()
    }

    pub fn shape(&self) -> Shape {
        self.0.shape()
    }

    /// Read a property, tracking it.
    ///
    /// Objects come back observed, boxed values come back unwrapped, and
    /// missing properties read as [`Value::Null`].
    pub fn get(&self, key: impl Into<PropKey>) -> Value {
        let key = key.into();
        store::track(self.target_id(), key.clone());
        self.0
            .get_untracked(&key)
            .map(Value::into_observed)
            .unwrap_or_default()
    }

    /// Number of elements (arrays) or fields (objects), tracked.
    pub fn len(&self) -> usize {
        store::track(self.target_id(), self.size_key());
        self.0.len_untracked()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Property keys in order, tracked as an iteration.
    pub fn keys(&self) -> Vec<PropKey> {
        store::track(self.target_id(), self.size_key());
        self.0.keys_untracked()
    }

    fn size_key(&self) -> PropKey {
        match self.shape() {
            Shape::Array => PropKey::Length,
            Shape::Object => PropKey::Keys,
        }
    }

    /// Write a property and notify its readers.
    ///
    /// Writing a plain value over a boxed property writes through the box.
    /// Writing an array's [`PropKey::Length`] resizes it.
    pub fn set(&self, key: impl Into<PropKey>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        let value = value.into().into_raw();

        if key == PropKey::Length {
            let length = value.as_number().ok_or_else(|| self.invalid_key(&key))?;
            if length < 0.0 || length.fract() != 0.0 || length > MAX_ARRAY_LENGTH as f64 {
                return Err(self.invalid_length(length));
            }
            return self.set_len(length as usize);
        }

        let old = self.0.get_untracked(&key);
        if let Some(Value::Boxed(cell)) = &old {
            if !matches!(value, Value::Boxed(_)) {
                cell.set(value);
                return Ok(());
            }
        }

        let written = {
            let mut data = self.0 .0.data.borrow_mut();
            match (&mut *data, &key) {
                (Data::Array(items), PropKey::Index(i)) => {
                    if *i < items.len() || (*i < MAX_ARRAY_LENGTH && grow(items, *i + 1)) {
                        items[*i] = value.clone();
                        Ok(())
                    } else {
                        Err(Some(*i as f64 + 1.0))
                    }
                }
                (Data::Map(fields), PropKey::Field(name)) => {
                    fields.insert(name.clone(), value.clone());
                    Ok(())
                }
                _ => Err(None),
            }
        };
        match written {
            Ok(()) => {}
            Err(None) => return Err(self.invalid_key(&key)),
            Err(Some(length)) => return Err(self.invalid_length(length)),
        }

        match old {
            None => self.trigger(TriggerOp::Add, &key, None),
            Some(old) if old != value => self.trigger(TriggerOp::Set, &key, None),
            Some(_) => {}
        }
        Ok(())
    }

    /// Resize an array, notifying readers of its length and of every index
    /// at or past the new length.
    ///
    /// Lengths above [`MAX_ARRAY_LENGTH`], or that cannot be allocated, are
    /// rejected and leave the array as it was.
    pub fn set_len(&self, length: usize) -> Result<()> {
        let resized = match &mut *self.0 .0.data.borrow_mut() {
            Data::Array(items) if items.len() == length => Some(Ok(false)),
            Data::Array(items) if length < items.len() => {
                items.truncate(length);
                Some(Ok(true))
            }
            Data::Array(items) => {
                let grown = grow(items, length);
                Some(if grown { Ok(true) } else { Err(()) })
            }
            Data::Map(_) => None,
        };
        match resized {
            None => {
                tracing::warn!(target_id = ?self.target_id(), "length written on a plain object");
                return Err(ReactiveError::NotAnArray);
            }
            Some(Err(())) => return Err(self.invalid_length(length as f64)),
            Some(Ok(false)) => return Ok(()),
            Some(Ok(true)) => {}
        }

        self.trigger(TriggerOp::Set, &PropKey::Length, Some(length));
        Ok(())
    }

    /// Append to an array.
    pub fn push(&self, value: impl Into<Value>) -> Result<()> {
        if self.shape() != Shape::Array {
            return Err(ReactiveError::NotAnArray);
        }
        let end = self.0.len_untracked();
        self.set(end, value)
    }

    /// Remove and return the last element of an array.
    pub fn pop(&self) -> Result<Option<Value>> {
        if self.shape() != Shape::Array {
            return Err(ReactiveError::NotAnArray);
        }
        let length = self.0.len_untracked();
        if length == 0 {
            return Ok(None);
        }
        let last = self.0.get_untracked(&PropKey::Index(length - 1));
        self.set_len(length - 1)?;
        Ok(last)
    }

    /// Remove a field from an object. Returns the removed value.
    pub fn remove(&self, key: impl Into<PropKey>) -> Result<Option<Value>> {
        let key = key.into();
        let removed = match (&mut *self.0 .0.data.borrow_mut(), &key) {
            (Data::Map(fields), PropKey::Field(name)) => Some(fields.shift_remove(name)),
            _ => None,
        };
        let Some(removed) = removed else {
            return Err(self.invalid_key(&key));
        };

        if removed.is_some() {
            self.trigger(TriggerOp::Delete, &key, None);
        }
        Ok(removed)
    }

    fn trigger(&self, op: TriggerOp, key: &PropKey, new_length: Option<usize>) {
        store::trigger(self.target_id(), self.shape(), op, key, new_length);
    }

    fn invalid_key(&self, key: &PropKey) -> ReactiveError {
        let kind = match self.shape() {
            Shape::Array => "array",
            Shape::Object => "object",
        };
        tracing::warn!(
            target_id = ?self.target_id(),
            %key,
            kind,
            "write with invalid key dropped"
        );
        ReactiveError::InvalidKey {
            key: key.clone(),
            kind,
        }
    }

    fn invalid_length(&self, length: f64) -> ReactiveError {
        tracing::warn!(
            target_id = ?self.target_id(),
            length,
            "invalid array length, write dropped"
        );
        ReactiveError::InvalidLength(length)
    }
}

/// Pad `items` with nulls up to `length`. False if `length` is past
/// [`MAX_ARRAY_LENGTH`] or the allocation fails; `items` is untouched then.
fn grow(items: &mut Vec<Value>, length: usize) -> bool {
    if length > MAX_ARRAY_LENGTH || items.try_reserve_exact(length - items.len()).is_err() {
        return false;
    }
    items.resize(length, Value::Null);
    true
}

impl PartialEq for Observed {
    fn eq(&self, other: &Self) -> bool {
        self.0.ptr_eq(&other.0)
    }
}

impl fmt::Debug for Observed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Observed").field(&self.0).finish()
    }
}

/// A boxed view of one property of an observed object.
///
/// Reads and writes go straight to the object, so the property stays
/// tracked like any other.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRef {
    target: Observed,
    key: PropKey,
}

impl FieldRef {
    pub fn get(&self) -> Value {
        self.target.get(self.key.clone())
    }

    pub fn set(&self, value: impl Into<Value>) -> Result<()> {
        self.target.set(self.key.clone(), value)
    }

    pub fn key(&self) -> &PropKey {
        &self.key
    }

    pub fn target(&self) -> &Observed {
        &self.target
    }
}

/// Get the tracked view of `object`.
pub fn observe(object: &Object) -> Observed {
    Observed(object.clone())
}

/// Whether `value` is a tracked view.
pub fn is_observed(value: &Value) -> bool {
    matches!(value, Value::Observed(_))
}

/// Wrap a value in a reactive cell. A value that already is one is returned
/// unchanged.
pub fn boxed(value: impl Into<Value>) -> Signal<Value> {
    match value.into() {
        Value::Boxed(cell) => cell,
        other => Signal::new(other),
    }
}

/// Whether `value` is a reactive cell.
pub fn is_boxed(value: &Value) -> bool {
    matches!(value, Value::Boxed(_))
}

/// The content of a reactive cell (tracked), or the value itself.
pub fn unwrap_boxed(value: &Value) -> Value {
    match value {
        Value::Boxed(cell) => cell.get(),
        other => other.clone(),
    }
}

/// A boxed view of `key` on `target`.
pub fn to_ref(target: &Observed, key: impl Into<PropKey>) -> FieldRef {
    FieldRef {
        target: target.clone(),
        key: key.into(),
    }
}

/// A boxed view of every current property of `target`.
pub fn to_refs(target: &Observed) -> IndexMap<PropKey, FieldRef> {
    target
        .raw()
        .keys_untracked()
        .into_iter()
        .map(|key| (key.clone(), to_ref(target, key)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{store, Effect, Runtime};
    use serde_json::json;
    use std::cell::Cell;

    fn watch_runs(f: impl Fn() + 'static) -> (Effect, Rc<Cell<usize>>) {
        let runs = Rc::new(Cell::new(0));
        let effect = {
            let runs = runs.clone();
            Effect::new(move || {
                f();
                runs.set(runs.get() + 1);
            })
        };
        (effect, runs)
    }

    #[test]
    fn observing_twice_yields_the_same_view() {
        let object = Object::new();
        assert_eq!(observe(&object), observe(&object));
        assert_ne!(observe(&object), observe(&Object::new()));
    }

    #[test]
    fn property_write_reruns_readers() {
        let state = observe(&Object::from_pairs([("a", 1), ("b", 2)]));
        let (_effect, runs) = {
            let state = state.clone();
            watch_runs(move || {
                state.get("a");
            })
        };

        state.set("b", 3).unwrap();
        assert_eq!(runs.get(), 1);

        state.set("a", 1).unwrap();
        assert_eq!(runs.get(), 1);

        state.set("a", 5).unwrap();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn nested_objects_read_as_observed() {
        let state = observe(&Object::from_json(json!({ "a": { "b": 1 } })));
        let inner = state.get("a");
        assert!(is_observed(&inner));
        assert_eq!(inner.as_observed().unwrap().get("b"), Value::from(1));
    }

    #[test]
    fn boxed_properties_are_unwrapped_and_written_through() {
        let cell = boxed(1);
        let state = observe(&Object::from_pairs([("count", Value::from(cell.clone()))]));

        assert_eq!(state.get("count"), Value::from(1));

        state.set("count", 2).unwrap();
        assert_eq!(cell.get(), Value::from(2));
        assert!(is_boxed(&state.raw().get_untracked(&"count".into()).unwrap()));
    }

    #[test]
    fn boxing_a_boxed_value_returns_it() {
        let cell = boxed(1);
        assert!(boxed(cell.clone()).ptr_eq(&cell));
        assert_eq!(unwrap_boxed(&Value::from(cell)), Value::from(1));
        assert_eq!(unwrap_boxed(&Value::from(7)), Value::from(7));
    }

    #[test]
    fn shrinking_length_notifies_removed_indices() {
        let list = observe(&Object::array([1, 2, 3]));

        let (_index_effect, index_runs) = {
            let list = list.clone();
            watch_runs(move || {
                list.get(5);
            })
        };
        let (_length_effect, length_runs) = {
            let list = list.clone();
            watch_runs(move || {
                list.len();
            })
        };

        list.set_len(1).unwrap();

        assert_eq!(index_runs.get(), 2);
        assert_eq!(length_runs.get(), 2);
        assert_eq!(list.raw().len_untracked(), 1);
    }

    #[test]
    fn shrinking_skips_indices_still_present() {
        let list = observe(&Object::array([1, 2, 3]));
        let (_effect, runs) = {
            let list = list.clone();
            watch_runs(move || {
                list.get(0);
            })
        };

        list.set(PropKey::Length, 2).unwrap();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn adding_an_index_notifies_length_readers() {
        let list = observe(&Object::array([1]));
        let (_effect, runs) = {
            let list = list.clone();
            watch_runs(move || {
                list.len();
            })
        };

        list.push(2).unwrap();
        assert_eq!(runs.get(), 2);

        list.set(0, 10).unwrap();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn adding_and_removing_fields_notifies_iteration() {
        let state = observe(&Object::new());
        let (_effect, runs) = {
            let state = state.clone();
            watch_runs(move || {
                state.keys();
            })
        };

        state.set("x", 1).unwrap();
        assert_eq!(runs.get(), 2);

        state.set("x", 2).unwrap();
        assert_eq!(runs.get(), 2);

        assert_eq!(state.remove("x").unwrap(), Some(Value::from(2)));
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn untracked_properties_are_released() {
        let state = observe(&Object::from_pairs([("a", 1), ("b", 2)]));
        let use_b = Rc::new(Cell::new(true));
        let effect = {
            let (state, use_b) = (state.clone(), use_b.clone());
            Effect::new(move || {
                state.get("a");
                if use_b.get() {
                    state.get("b");
                }
            })
        };
        assert!(store::dependency(state.target_id(), &"b".into()).is_some());

        use_b.set(false);
        effect.run();

        assert!(store::dependency(state.target_id(), &"a".into()).is_some());
        assert!(store::dependency(state.target_id(), &"b".into()).is_none());

        effect.stop();
        assert!(!store::is_tracked(state.target_id()));
    }

    #[test]
    fn dropping_an_object_releases_its_properties() {
        let before = Runtime::node_count();
        let effect = {
            let state = observe(&Object::from_pairs([("a", 1)]));
            Effect::new(move || {
                state.get("a");
            })
        };
        assert_eq!(Runtime::node_count(), before + 2);

        drop(effect);
        assert_eq!(Runtime::node_count(), before);
    }

    #[test]
    fn invalid_writes_are_rejected() {
        let list = observe(&Object::array([1]));
        assert!(matches!(
            list.set("name", 1),
            Err(ReactiveError::InvalidKey { kind: "array", .. })
        ));

        let state = observe(&Object::new());
        assert_eq!(state.set_len(0), Err(ReactiveError::NotAnArray));
        assert!(state.remove(0).is_err());
    }

    #[test]
    fn oversized_index_and_length_are_rejected() {
        let list = observe(&Object::array([1, 2]));
        let (_effect, runs) = {
            let list = list.clone();
            watch_runs(move || {
                list.len();
            })
        };

        assert!(matches!(
            list.set(usize::MAX, 1),
            Err(ReactiveError::InvalidLength(_))
        ));
        assert!(matches!(
            list.set(MAX_ARRAY_LENGTH, 1),
            Err(ReactiveError::InvalidLength(_))
        ));
        assert_eq!(
            list.set(PropKey::Length, 1e30),
            Err(ReactiveError::InvalidLength(1e30))
        );
        assert_eq!(
            list.set(PropKey::Length, 1.5),
            Err(ReactiveError::InvalidLength(1.5))
        );
        assert_eq!(
            list.set_len(usize::MAX),
            Err(ReactiveError::InvalidLength(usize::MAX as f64))
        );

        assert_eq!(list.len(), 2);
        assert_eq!(runs.get(), 1);

        list.set(3, 4).unwrap();
        assert_eq!(list.len(), 4);
        assert!(list.get(2).is_null());
    }

    #[test]
    fn field_refs_delegate_to_the_object() {
        let state = observe(&Object::from_pairs([("a", 1), ("b", 2)]));
        let refs = to_refs(&state);
        assert_eq!(refs.len(), 2);

        let a = &refs[&PropKey::from("a")];
        let (_effect, runs) = {
            let a = a.clone();
            watch_runs(move || {
                a.get();
            })
        };

        state.set("a", 3).unwrap();
        assert_eq!(runs.get(), 2);

        a.set(4).unwrap();
        assert_eq!(state.get("a"), Value::from(4));
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn json_round_trip() {
        let source = json!({ "name": "ripple", "tags": ["a", "b"], "size": 1.5, "n": 3 });
        let object = Object::from_json(source.clone());
        assert_eq!(Value::from(object).to_json(), source);
    }

    #[test]
    fn values_compare_like_object_is() {
        assert_eq!(Value::from(f64::NAN), Value::from(f64::NAN));
        assert_ne!(Value::from(0.0), Value::from(-0.0));
        let object = Object::new();
        assert_eq!(Value::from(object.clone()), Value::from(object));
        assert_ne!(Value::from(Object::new()), Value::from(Object::new()));
    }
}
