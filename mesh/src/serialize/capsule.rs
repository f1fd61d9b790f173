//! Output and input capsules.
//!
//! An [`OutputCapsule`] accumulates the named fields of one savable object
//! and is backed by an [`Exporter`], which tracks shared savables by pointer
//! identity across the whole export. An [`InputCapsule`] gives field-by-field
//! access to one object's data and is backed by an [`Importer`], which caches
//! shared savables so that every back-reference resolves to the same instance.
//!
//! Every read names a default: an absent field (or an explicit
//! [`Value::Null`]) is never an error. Writes mirror this by omitting values
//! equal to their default.
//!
//! Shared savables must be read back in the order they were written: the
//! first occurrence carries the data, later ones only its ID.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use super::error::{DeserializeError, SerializeError};
use super::value::Value;

/// An object that can be written to and read from a capsule.
pub trait Savable: Sized {
    /// Write this object's fields into `out`.
    fn write(&self, out: &mut OutputCapsule<'_>) -> Result<(), SerializeError>;

    /// Reconstruct an object from the fields of `input`.
    fn read(input: &mut InputCapsule<'_>) -> Result<Self, DeserializeError>;

    /// Pointer identity of a shared savable.
    ///
    /// Savables returning `Some` are written once per [`Exporter`] and
    /// back-referenced on every later occurrence. Plain values return `None`
    /// and are written inline every time.
    fn shared_identity(&self) -> Option<SharedIdentity> {
        None
    }
}

/// The allocation behind a shared savable.
///
/// An [`Exporter`] holds on to every identity it has assigned an ID, so an
/// address is never reused for a different object within one export.
#[derive(Debug, Clone)]
pub struct SharedIdentity(Arc<dyn Any + Send + Sync>);

impl SharedIdentity {
    pub fn of<T: Send + Sync + 'static>(shared: &Arc<T>) -> Self {
        Self(shared.clone())
    }

    fn address(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

/// An enumeration persisted by variant name.
pub trait CapsuleEnum: Copy + PartialEq + 'static {
    /// Stable variant name written to the capsule.
    fn name(self) -> &'static str;

    /// Parse a variant name; `None` if unrecognized.
    fn from_name(name: &str) -> Option<Self>;
}

// ---------------------------------------------------------------------------
// Exporter / OutputCapsule
// ---------------------------------------------------------------------------

/// Export session state shared by all capsules of one object tree.
#[derive(Debug, Default)]
pub struct Exporter {
    shared_ids: HashMap<usize, (u32, SharedIdentity)>,
    next_shared_id: u32,
}

impl Exporter {
    /// Create a new export session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a savable into a fresh capsule and return it as a [`Value`].
    pub fn save<T: Savable>(&mut self, savable: &T) -> Result<Value, SerializeError> {
        let mut out = OutputCapsule::new(self);
        savable.write(&mut out)?;
        Ok(out.finish())
    }
}

/// Field sink for one savable object.
pub struct OutputCapsule<'e> {
    exporter: &'e mut Exporter,
    fields: Vec<(String, Value)>,
}

impl<'e> OutputCapsule<'e> {
    /// Create an empty capsule backed by `exporter`.
    pub fn new(exporter: &'e mut Exporter) -> Self {
        Self {
            exporter,
            fields: Vec::new(),
        }
    }

    /// Finish the capsule and return the accumulated fields as a Value.
    pub fn finish(self) -> Value {
        Value::Map(self.fields)
    }

    /// Write a pre-built Value for a field.
    pub fn write_field(&mut self, name: &str, value: Value) {
        self.fields.push((name.to_owned(), value));
    }

    pub fn write_int(&mut self, name: &str, value: i32, default: i32) {
        if value != default {
            self.write_field(name, Value::Int(value));
        }
    }

    pub fn write_float(&mut self, name: &str, value: f32, default: f32) {
        if value != default {
            self.write_field(name, Value::Float(value));
        }
    }

    pub fn write_bool(&mut self, name: &str, value: bool, default: bool) {
        if value != default {
            self.write_field(name, Value::Bool(value));
        }
    }

    pub fn write_enum<E: CapsuleEnum>(&mut self, name: &str, value: E, default: E) {
        if value != default {
            self.write_field(name, Value::String(value.name().to_owned()));
        }
    }

    pub fn write_int_array(&mut self, name: &str, value: Option<&[i32]>) {
        if let Some(values) = value {
            self.write_field(name, Value::IntArray(values.to_vec()));
        }
    }

    pub fn write_float_array(&mut self, name: &str, value: Option<&[f32]>) {
        if let Some(values) = value {
            self.write_field(name, Value::FloatArray(values.to_vec()));
        }
    }

    pub fn write_bytes(&mut self, name: &str, value: Option<&[u8]>) {
        if let Some(bytes) = value {
            self.write_field(name, Value::Bytes(bytes.to_vec()));
        }
    }

    /// Write a nested savable, or nothing if `value` is `None`.
    pub fn write_savable<T: Savable>(
        &mut self,
        name: &str,
        value: Option<&T>,
    ) -> Result<(), SerializeError> {
        if let Some(savable) = value {
            let value = self.savable_value(name, savable)?;
            self.write_field(name, value);
        }
        Ok(())
    }

    /// Write a list of savables, or nothing if `value` is `None`.
    pub fn write_savable_list<T: Savable>(
        &mut self,
        name: &str,
        value: Option<&[T]>,
    ) -> Result<(), SerializeError> {
        if let Some(items) = value {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(self.savable_value(name, item)?);
            }
            self.write_field(name, Value::List(values));
        }
        Ok(())
    }

    /// Write an integer-keyed map of savables, or nothing if `entries` is `None`.
    ///
    /// Entries are stored in iteration order.
    pub fn write_savable_int_map<'a, T, I>(
        &mut self,
        name: &str,
        entries: Option<I>,
    ) -> Result<(), SerializeError>
    where
        T: Savable + 'a,
        I: IntoIterator<Item = (i32, &'a T)>,
    {
        if let Some(entries) = entries {
            let mut values = Vec::new();
            for (key, item) in entries {
                values.push((key, self.savable_value(name, item)?));
            }
            self.write_field(name, Value::IntMap(values));
        }
        Ok(())
    }

    fn savable_value<T: Savable>(&mut self, name: &str, savable: &T) -> Result<Value, SerializeError> {
        let Some(identity) = savable.shared_identity() else {
            return self.nested(name, savable);
        };
        let address = identity.address();
        if let Some(&(id, _)) = self.exporter.shared_ids.get(&address) {
            return Ok(Value::SharedRef(id));
        }
        let inner = self.nested(name, savable)?;
        let id = self.exporter.next_shared_id;
        self.exporter.next_shared_id += 1;
        self.exporter.shared_ids.insert(address, (id, identity));
        Ok(Value::Shared {
            id,
            inner: Box::new(inner),
        })
    }

    fn nested<T: Savable>(&mut self, name: &str, savable: &T) -> Result<Value, SerializeError> {
        self.exporter
            .save(savable)
            .map_err(|e| match e {
                SerializeError::FieldError { field, message } => SerializeError::FieldError {
                    field: format!("{name}.{field}"),
                    message,
                },
                other => other,
            })
    }
}

// ---------------------------------------------------------------------------
// Importer / InputCapsule
// ---------------------------------------------------------------------------

/// Import session state shared by all capsules of one object tree.
#[derive(Default)]
pub struct Importer {
    shared: HashMap<u32, Box<dyn Any>>,
}

impl Importer {
    /// Create a new import session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a savable from a capsule value.
    pub fn load<T: Savable>(&mut self, value: Value) -> Result<T, DeserializeError> {
        let mut input = InputCapsule::new(self, value)?;
        T::read(&mut input)
    }
}

impl std::fmt::Debug for Importer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Importer")
            .field("shared", &self.shared.len())
            .finish()
    }
}

/// Field source for one savable object.
pub struct InputCapsule<'i> {
    importer: &'i mut Importer,
    fields: HashMap<String, Value>,
}

impl<'i> InputCapsule<'i> {
    /// Open a capsule over `value`, which must be a [`Value::Map`].
    pub fn new(importer: &'i mut Importer, value: Value) -> Result<Self, DeserializeError> {
        match value {
            Value::Map(entries) => Ok(Self {
                importer,
                fields: entries.into_iter().collect(),
            }),
            other => Err(DeserializeError::mismatch("<capsule>", "Map", &other)),
        }
    }

    /// Check whether a field is present (and not null).
    pub fn has_field(&self, name: &str) -> bool {
        matches!(self.fields.get(name), Some(v) if *v != Value::Null)
    }

    /// Take a raw field value; `None` if absent or null.
    pub fn read_field(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name).filter(|v| *v != Value::Null)
    }

    pub fn read_int(&mut self, name: &str, default: i32) -> Result<i32, DeserializeError> {
        match self.read_field(name) {
            None => Ok(default),
            Some(Value::Int(v)) => Ok(v),
            Some(other) => Err(DeserializeError::mismatch(name, "Int", &other)),
        }
    }

    pub fn read_float(&mut self, name: &str, default: f32) -> Result<f32, DeserializeError> {
        match self.read_field(name) {
            None => Ok(default),
            Some(Value::Float(v)) => Ok(v),
            Some(other) => Err(DeserializeError::mismatch(name, "Float", &other)),
        }
    }

    pub fn read_bool(&mut self, name: &str, default: bool) -> Result<bool, DeserializeError> {
        match self.read_field(name) {
            None => Ok(default),
            Some(Value::Bool(v)) => Ok(v),
            Some(other) => Err(DeserializeError::mismatch(name, "Bool", &other)),
        }
    }

    /// Read an enum by variant name. Unrecognized names fall back to `default`.
    pub fn read_enum<E: CapsuleEnum>(&mut self, name: &str, default: E) -> Result<E, DeserializeError> {
        match self.read_field(name) {
            None => Ok(default),
            Some(Value::String(s)) => Ok(E::from_name(&s).unwrap_or_else(|| {
                log::warn!(
                    "unrecognized value '{s}' for field '{name}', using '{}'",
                    default.name()
                );
                default
            })),
            Some(other) => Err(DeserializeError::mismatch(name, "String", &other)),
        }
    }

    pub fn read_int_array(&mut self, name: &str) -> Result<Option<Vec<i32>>, DeserializeError> {
        match self.read_field(name) {
            None => Ok(None),
            Some(Value::IntArray(v)) => Ok(Some(v)),
            Some(other) => Err(DeserializeError::mismatch(name, "IntArray", &other)),
        }
    }

    pub fn read_float_array(&mut self, name: &str) -> Result<Option<Vec<f32>>, DeserializeError> {
        match self.read_field(name) {
            None => Ok(None),
            Some(Value::FloatArray(v)) => Ok(Some(v)),
            Some(other) => Err(DeserializeError::mismatch(name, "FloatArray", &other)),
        }
    }

    pub fn read_bytes(&mut self, name: &str) -> Result<Option<Vec<u8>>, DeserializeError> {
        match self.read_field(name) {
            None => Ok(None),
            Some(Value::Bytes(v)) => Ok(Some(v)),
            Some(other) => Err(DeserializeError::mismatch(name, "Bytes", &other)),
        }
    }

    /// Read a nested savable; `None` if absent.
    pub fn read_savable<T: Savable + Clone + 'static>(
        &mut self,
        name: &str,
    ) -> Result<Option<T>, DeserializeError> {
        match self.read_field(name) {
            None => Ok(None),
            Some(value) => self.savable_from_value(name, value).map(Some),
        }
    }

    /// Read a list of savables; `None` if absent.
    pub fn read_savable_list<T: Savable + Clone + 'static>(
        &mut self,
        name: &str,
    ) -> Result<Option<Vec<T>>, DeserializeError> {
        match self.read_field(name) {
            None => Ok(None),
            Some(Value::List(items)) => items
                .into_iter()
                .map(|item| self.savable_from_value(name, item))
                .collect::<Result<Vec<_>, DeserializeError>>()
                .map(Some),
            Some(other) => Err(DeserializeError::mismatch(name, "List", &other)),
        }
    }

    /// Read an integer-keyed map of savables in stored order; `None` if absent.
    pub fn read_savable_int_map<T: Savable + Clone + 'static>(
        &mut self,
        name: &str,
    ) -> Result<Option<Vec<(i32, T)>>, DeserializeError> {
        match self.read_field(name) {
            None => Ok(None),
            Some(Value::IntMap(entries)) => entries
                .into_iter()
                .map(|(key, item)| Ok((key, self.savable_from_value(name, item)?)))
                .collect::<Result<Vec<_>, DeserializeError>>()
                .map(Some),
            Some(other) => Err(DeserializeError::mismatch(name, "IntMap", &other)),
        }
    }

    fn savable_from_value<T: Savable + Clone + 'static>(
        &mut self,
        name: &str,
        value: Value,
    ) -> Result<T, DeserializeError> {
        match value {
            Value::Shared { id, inner } => {
                let savable: T = self.importer.load(*inner)?;
                self.importer.shared.insert(id, Box::new(savable.clone()));
                Ok(savable)
            }
            Value::SharedRef(id) => {
                let cached = self
                    .importer
                    .shared
                    .get(&id)
                    .ok_or(DeserializeError::InvalidSharedRef { id })?;
                cached
                    .downcast_ref::<T>()
                    .cloned()
                    .ok_or_else(|| DeserializeError::TypeMismatch {
                        field: name.to_owned(),
                        expected: std::any::type_name::<T>().to_owned(),
                        found: "shared savable of a different type".into(),
                    })
            }
            Value::Map(_) => self.importer.load(value),
            other => Err(DeserializeError::mismatch(name, "Map", &other)),
        }
    }
}
