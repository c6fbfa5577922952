/*!
Shallow and deep cloning of value graphs.

Shallow clones copy one level: the clone is a new container whose members are
the original member handles. Deep clones copy the whole reachable graph; a
pointer-keyed memo scoped to a single call maps every source container to its
clone, so cycles and shared sub-structure keep their shape in the copy.
Functions are never copied.
*/

use crate::comparer::Comparer;
use crate::error::{InvalidArgument, Result};
use crate::types::{Types, ValueKind};
use crate::value::{ArrayRef, ObjectRef, Properties, Value};
use rustc_hash::FxHashMap;

/// Entry points for cloning values.
pub struct Cloner;

impl Cloner {
    /// Performs a shallow clone of the given value.
    ///
    /// Cloning an array gives a new array of shallow clones of the original items.
    pub fn shallow_clone(value: &Value) -> Value {
        match value {
            Value::Array(array) => Value::Array(ArrayRef::new(
                array.items().iter().map(Self::shallow_clone_item).collect(),
            )),
            _ => Self::shallow_clone_item(value),
        }
    }

    /// Performs a deep clone of the given value.
    ///
    /// # Example
    /// ```rust
    /// use objs_core::{Cloner, Value};
    ///
    /// let root = Value::object([("name", "root")]);
    /// root.set("self", root.clone());
    ///
    /// let clone = Cloner::deep_clone(&root);
    /// assert!(!clone.same_instance(&root));
    /// assert!(clone.get("self").same_instance(&clone));
    /// ```
    pub fn deep_clone(value: &Value) -> Value {
        DeepCloner::new().clone_value(value)
    }

    /// Whether two values are clones of each other, using default comparison options.
    pub fn are_clones(value_a: &Value, value_b: &Value) -> bool {
        Comparer::are_equivalent(value_a, value_b)
    }

    /// Synchronize the given target with the given source by performing a shallow clone.
    ///
    /// The target keeps its identity: object targets lose the properties the
    /// source does not own and receive the source's property handles; array
    /// targets are truncated and refilled with shallow clones of the source items.
    ///
    /// # Errors
    /// Fails with an [`InvalidArgument`] before touching the target when the
    /// operands are undefined, of different types, primitive, immutable or the
    /// same instance.
    pub fn shallow_clone_to(source: &Value, target: &Value) -> Result<Value> {
        Self::check_sync_operands(source, target)?;

        match (source, target) {
            (Value::Array(source), Value::Array(target)) => {
                let items = source.items().iter().map(Self::shallow_clone_item).collect();
                target.replace_items(items);
            }
            (Value::Object(source), Value::Object(target)) => {
                let properties: Properties = source.entries().into_iter().collect();
                target.sync_properties(properties);
            }
            _ => return Err(InvalidArgument::TypeMismatch.into()),
        }
        Ok(target.clone())
    }

    /// Synchronize the given target with the given source by performing a deep clone.
    ///
    /// References to the source root found inside the source graph are
    /// redirected to the target, so a self-referential source yields a
    /// self-referential target.
    ///
    /// # Errors
    /// Same validation as [`Cloner::shallow_clone_to`].
    pub fn deep_clone_to(source: &Value, target: &Value) -> Result<Value> {
        Self::check_sync_operands(source, target)?;

        let mut cloner = DeepCloner::new();
        cloner.register(source, target.clone());

        match (source, target) {
            (Value::Array(source), Value::Array(target)) => {
                let items = source
                    .items()
                    .iter()
                    .map(|item| cloner.clone_value(item))
                    .collect();
                target.replace_items(items);
            }
            (Value::Object(source), Value::Object(target)) => {
                let properties: Properties = source
                    .entries()
                    .into_iter()
                    .map(|(name, value)| {
                        let clone = cloner.clone_value(&value);
                        (name, clone)
                    })
                    .collect();
                target.sync_properties(properties);
            }
            _ => return Err(InvalidArgument::TypeMismatch.into()),
        }
        Ok(target.clone())
    }

    /// Validate the operands of an in-place synchronization.
    pub(crate) fn check_sync_operands(source: &Value, target: &Value) -> Result<()> {
        if !Types::is_defined(source) {
            return Err(InvalidArgument::NotDefined("source").into());
        }
        if !Types::is_defined(target) {
            return Err(InvalidArgument::NotDefined("target").into());
        }
        if !Types::are_same_types(source, target) {
            return Err(InvalidArgument::TypeMismatch.into());
        }
        if Types::is_primitive(source) || Types::is_primitive(target) {
            return Err(InvalidArgument::Primitive.into());
        }
        let kind = Types::kind_of(target);
        if matches!(kind, ValueKind::Date | ValueKind::Function) {
            return Err(InvalidArgument::Immutable(kind).into());
        }
        if source.same_instance(target) {
            return Err(InvalidArgument::SameInstance.into());
        }
        Ok(())
    }

    // One level copy: nested arrays get new arrays holding the same item handles.
    fn shallow_clone_item(value: &Value) -> Value {
        match value {
            Value::Array(array) => Value::Array(ArrayRef::new(array.items())),
            Value::Object(object) => {
                let class = object.class();
                let properties: Properties = object.entries().into_iter().collect();
                Value::Object(ObjectRef::from_parts(class, properties))
            }
            Value::Text(text) => Value::Text(text.clone()),
            _ => value.clone(),
        }
    }
}

/// Deep clone state for one call: source container address to its clone.
struct DeepCloner {
    memory: FxHashMap<usize, Value>,
}

impl DeepCloner {
    fn new() -> Self {
        Self {
            memory: FxHashMap::default(),
        }
    }

    fn register(&mut self, source: &Value, clone: Value) {
        if let Some(id) = source.container_identity() {
            self.memory.insert(id, clone);
        }
    }

    fn clone_value(&mut self, value: &Value) -> Value {
        match value {
            Value::Array(array) => self.clone_array(array),
            Value::Object(object) => self.clone_object(object),
            // Dates and primitives are values, functions are shared
            _ => value.clone(),
        }
    }

    fn clone_array(&mut self, array: &ArrayRef) -> Value {
        if let Some(cloned) = self.memory.get(&array.identity()) {
            return cloned.clone();
        }

        // Register the shell before cloning the items
        let clone = ArrayRef::new(Vec::with_capacity(array.len()));
        self.memory
            .insert(array.identity(), Value::Array(clone.clone()));

        for item in array.items() {
            let cloned_item = self.clone_value(&item);
            clone.push(cloned_item);
        }
        Value::Array(clone)
    }

    fn clone_object(&mut self, object: &ObjectRef) -> Value {
        if let Some(cloned) = self.memory.get(&object.identity()) {
            return cloned.clone();
        }

        let clone = ObjectRef::from_parts(object.class(), Properties::new());
        self.memory
            .insert(object.identity(), Value::Object(clone.clone()));

        for (name, value) in object.entries() {
            let cloned_value = self.clone_value(&value);
            clone.set(name, cloned_value);
        }
        Value::Object(clone)
    }
}
