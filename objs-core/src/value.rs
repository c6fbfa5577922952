/*!
Host value model.

Values flowing through the cloner, the comparer and the snapshotter are modelled
as a closed tagged variant. Arrays and objects are shared, interior-mutable
handles: cloning a handle shares the instance, which is what makes cycles and
shared sub-structure representable. Identity is the address of the shared
allocation.
*/

use crate::error::{InvalidArgument, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

/// Own properties of an object, in insertion order.
pub type Properties = IndexMap<String, Value>;

/// Signature of an opaque host callable.
pub type NativeFn = dyn Fn(&[Value]) -> Value;

/// A dynamically-typed host value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    /// An instant. Dates are plain values: copying one yields an independent instant.
    Date(DateTime<Utc>),
    Array(ArrayRef),
    /// Opaque callable, always shared and never copied.
    Function(FunctionRef),
    Object(ObjectRef),
}

impl Value {
    /// Create an object from `(name, value)` pairs, keeping their order.
    ///
    /// # Example
    /// ```rust
    /// use objs_core::Value;
    ///
    /// let point = Value::object([("x", 1), ("y", 2)]);
    /// assert_eq!(point.get("y").as_f64(), Some(2.0));
    /// ```
    pub fn object<I, K, V>(properties: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Value::Object(ObjectRef::from_parts(
            None,
            properties
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        ))
    }

    /// Create an object tagged with a class name.
    ///
    /// Objects of different classes are never of the same type.
    pub fn instance_of<C, I, K, V>(class: C, properties: I) -> Self
    where
        C: Into<String>,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Value::Object(ObjectRef::from_parts(
            Some(class.into()),
            properties
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        ))
    }

    /// Create an object without properties.
    pub fn empty_object() -> Self {
        Value::Object(ObjectRef::new())
    }

    /// Create an array from its elements.
    pub fn array<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::Array(ArrayRef::new(items.into_iter().map(Into::into).collect()))
    }

    /// Create a named opaque function.
    pub fn function<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&[Value]) -> Value + 'static,
    {
        Value::Function(FunctionRef::new(name, body))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Date(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionRef> {
        match self {
            Value::Function(function) => Some(function),
            _ => None,
        }
    }

    /// Read an own property, `Undefined` when absent or when this is not an object.
    pub fn get(&self, name: &str) -> Value {
        self.as_object()
            .and_then(|object| object.get(name))
            .unwrap_or_default()
    }

    /// Write an own property. Returns false when this is not an object.
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) -> bool {
        match self {
            Value::Object(object) => {
                object.set(name, value);
                true
            }
            _ => false,
        }
    }

    /// Address of the shared allocation for arrays, objects and functions.
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::Array(array) => Some(array.identity()),
            Value::Object(object) => Some(object.identity()),
            Value::Function(function) => Some(function.identity()),
            _ => None,
        }
    }

    /// Address of the shared allocation for mutable containers only.
    pub(crate) fn container_identity(&self) -> Option<usize> {
        match self {
            Value::Array(array) => Some(array.identity()),
            Value::Object(object) => Some(object.identity()),
            _ => None,
        }
    }

    /// Whether both values are the very same shared instance.
    pub fn same_instance(&self, other: &Value) -> bool {
        matches!((self.identity(), other.identity()), (Some(a), Some(b)) if a == b)
    }

    /// Serialize to JSON the way `JSON.stringify` would.
    ///
    /// `Undefined` and functions are dropped from objects and become `null` in
    /// arrays, non-finite numbers become `null` and dates become RFC 3339
    /// strings with millisecond precision.
    ///
    /// # Errors
    /// * `InvalidArgument::Circular` - If the graph contains a cycle
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(self.to_canonical_json()?.unwrap_or(serde_json::Value::Null))
    }

    /// Canonical JSON form, `None` when the value itself is not serializable.
    pub(crate) fn to_canonical_json(&self) -> Result<Option<serde_json::Value>> {
        let mut path = Vec::new();
        self.to_json_on_path(&mut path)
    }

    fn to_json_on_path(&self, path: &mut Vec<usize>) -> Result<Option<serde_json::Value>> {
        use serde_json::Value as Json;

        let json = match self {
            Value::Undefined | Value::Function(_) => return Ok(None),
            Value::Null => Json::Null,
            Value::Bool(value) => Json::Bool(*value),
            Value::Number(value) => number_to_json(*value),
            Value::Text(value) => Json::String(value.clone()),
            Value::Date(value) => Json::String(value.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Value::Array(array) => {
                let id = array.identity();
                if path.contains(&id) {
                    return Err(InvalidArgument::Circular.into());
                }
                path.push(id);
                let mut items = Vec::with_capacity(array.len());
                for item in array.items() {
                    items.push(item.to_json_on_path(path)?.unwrap_or(Json::Null));
                }
                path.pop();
                Json::Array(items)
            }
            Value::Object(object) => {
                let id = object.identity();
                if path.contains(&id) {
                    return Err(InvalidArgument::Circular.into());
                }
                path.push(id);
                let mut map = serde_json::Map::new();
                for (name, value) in object.entries() {
                    if let Some(json) = value.to_json_on_path(path)? {
                        map.insert(name, json);
                    }
                }
                path.pop();
                Json::Object(map)
            }
        };
        Ok(Some(json))
    }
}

// Integral numbers print without a fraction, as in JavaScript.
fn number_to_json(value: f64) -> serde_json::Value {
    const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

    if !value.is_finite() {
        return serde_json::Value::Null;
    }
    if value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER {
        return serde_json::Value::from(value as i64);
    }
    serde_json::Number::from_f64(value).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

/// Shared handle to a mutable sequence of values.
#[derive(Clone, Default)]
pub struct ArrayRef(Rc<RefCell<Vec<Value>>>);

impl ArrayRef {
    pub fn new(items: Vec<Value>) -> Self {
        Self(Rc::new(RefCell::new(items)))
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.borrow().get(index).cloned()
    }

    /// Write an element, padding with `Undefined` when writing past the end.
    pub fn set(&self, index: usize, value: impl Into<Value>) {
        let mut items = self.0.borrow_mut();
        if index >= items.len() {
            items.resize(index + 1, Value::Undefined);
        }
        items[index] = value.into();
    }

    pub fn push(&self, value: impl Into<Value>) {
        self.0.borrow_mut().push(value.into());
    }

    /// Copy of the element handles, detached from the borrow.
    pub fn items(&self) -> Vec<Value> {
        self.0.borrow().clone()
    }

    pub fn borrow(&self) -> Ref<'_, Vec<Value>> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Vec<Value>> {
        self.0.borrow_mut()
    }

    /// Truncate, then repopulate with the given elements, keeping this instance.
    pub(crate) fn replace_items(&self, items: Vec<Value>) {
        let mut current = self.0.borrow_mut();
        current.clear();
        current.extend(items);
    }

    pub fn ptr_eq(&self, other: &ArrayRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for ArrayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&Value::Array(self.clone()), f)
    }
}

/// Object payload: an optional class name and the own properties.
#[derive(Clone, Default)]
pub struct Object {
    class: Option<String>,
    properties: Properties,
}

impl Object {
    pub fn class(&self) -> Option<&str> {
        self.class.as_deref()
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut Properties {
        &mut self.properties
    }
}

/// Shared handle to a mutable property bag.
#[derive(Clone, Default)]
pub struct ObjectRef(Rc<RefCell<Object>>);

impl ObjectRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class(class: impl Into<String>) -> Self {
        Self::from_parts(Some(class.into()), Properties::new())
    }

    pub(crate) fn from_parts(class: Option<String>, properties: Properties) -> Self {
        Self(Rc::new(RefCell::new(Object { class, properties })))
    }

    pub fn class(&self) -> Option<String> {
        self.0.borrow().class.clone()
    }

    /// Whether both objects carry the same class name.
    pub fn same_class(&self, other: &ObjectRef) -> bool {
        self.ptr_eq(other) || self.0.borrow().class == other.0.borrow().class
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.0.borrow().properties.get(name).cloned()
    }

    /// Write an own property, returning the previous value.
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.borrow_mut().properties.insert(name.into(), value.into())
    }

    /// Delete an own property, keeping the order of the remaining ones.
    pub fn remove(&self, name: &str) -> Option<Value> {
        self.0.borrow_mut().properties.shift_remove(name)
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.0.borrow().properties.contains_key(name)
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.borrow().properties.keys().cloned().collect()
    }

    /// Copy of the `(name, value)` pairs, detached from the borrow.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0
            .borrow()
            .properties
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().properties.is_empty()
    }

    pub fn borrow(&self) -> Ref<'_, Object> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Object> {
        self.0.borrow_mut()
    }

    /// Make the own properties exactly `properties`: names missing from it are
    /// deleted, the others are assigned in order.
    pub(crate) fn sync_properties(&self, properties: Properties) {
        let mut object = self.0.borrow_mut();
        object
            .properties
            .retain(|name, _| properties.contains_key(name));
        for (name, value) in properties {
            object.properties.insert(name, value);
        }
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&Value::Object(self.clone()), f)
    }
}

struct Function {
    name: String,
    body: Box<NativeFn>,
}

/// Shared handle to an opaque host callable.
#[derive(Clone)]
pub struct FunctionRef(Rc<Function>);

impl FunctionRef {
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&[Value]) -> Value + 'static,
    {
        Self(Rc::new(Function {
            name: name.into(),
            body: Box::new(body),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn call(&self, arguments: &[Value]) -> Value {
        (self.0.body)(arguments)
    }

    pub fn ptr_eq(&self, other: &FunctionRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Function: {}]", self.0.name)
    }
}

/// Debug view that renders containers already on the print path as `[Circular]`.
struct Inspect<'a> {
    value: &'a Value,
    path: &'a RefCell<Vec<usize>>,
}

impl Inspect<'_> {
    fn enter(&self, id: usize) -> bool {
        let mut path = self.path.borrow_mut();
        if path.contains(&id) {
            return false;
        }
        path.push(id);
        true
    }

    fn leave(&self) {
        self.path.borrow_mut().pop();
    }
}

impl fmt::Debug for Inspect<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Number(value) => write!(f, "{value}"),
            Value::Text(value) => write!(f, "{value:?}"),
            Value::Date(value) => write!(
                f,
                "Date({})",
                value.to_rfc3339_opts(SecondsFormat::Millis, true)
            ),
            Value::Function(function) => fmt::Debug::fmt(function, f),
            Value::Array(array) => {
                if !self.enter(array.identity()) {
                    return f.write_str("[Circular]");
                }
                let items = array.items();
                let result = f
                    .debug_list()
                    .entries(items.iter().map(|value| Inspect {
                        value,
                        path: self.path,
                    }))
                    .finish();
                self.leave();
                result
            }
            Value::Object(object) => {
                if !self.enter(object.identity()) {
                    return f.write_str("[Circular]");
                }
                if let Some(class) = object.class() {
                    write!(f, "{class} ")?;
                }
                let entries = object.entries();
                let result = f
                    .debug_map()
                    .entries(entries.iter().map(|(name, value)| {
                        (
                            name,
                            Inspect {
                                value,
                                path: self.path,
                            },
                        )
                    }))
                    .finish();
                self.leave();
                result
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = RefCell::new(Vec::new());
        fmt::Debug::fmt(&Inspect { value: self, path: &path }, f)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(f64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Number(f64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Date(value)
    }
}

impl From<ArrayRef> for Value {
    fn from(value: ArrayRef) -> Self {
        Value::Array(value)
    }
}

impl From<ObjectRef> for Value {
    fn from(value: ObjectRef) -> Self {
        Value::Object(value)
    }
}

impl From<FunctionRef> for Value {
    fn from(value: FunctionRef) -> Self {
        Value::Function(value)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match json {
            Json::Null => Value::Null,
            Json::Bool(value) => Value::Bool(value),
            Json::Number(number) => Value::Number(number.as_f64().unwrap_or(f64::NAN)),
            Json::String(value) => Value::Text(value),
            Json::Array(items) => {
                Value::Array(ArrayRef::new(items.into_iter().map(Value::from).collect()))
            }
            Json::Object(map) => Value::Object(ObjectRef::from_parts(
                None,
                map.into_iter()
                    .map(|(name, value)| (name, Value::from(value)))
                    .collect(),
            )),
        }
    }
}
