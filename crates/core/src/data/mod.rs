//! Record data model exchanged with the surrounding pipeline
//!
//! A [`Record`] is the pipeline's unit of data exchange: an ordered
//! mapping from field name to a [`TypedValue`]. Records delivered by the
//! upstream pipeline are read-only to the bridge; records produced from
//! inference results are built field by field in array order.

use std::fmt;

/// A single immutable field value, tagged with its scalar type
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    /// Boolean value
    Boolean(bool),
    /// Signed 8-bit integer
    Byte(i8),
    /// Raw byte payload (e.g. a byte-array tensor output)
    ByteArray(Vec<u8>),
    /// Signed 16-bit integer
    Short(i16),
    /// Signed 32-bit integer
    Integer(i32),
    /// Signed 64-bit integer
    Long(i64),
    /// 32-bit float
    Float(f32),
    /// 64-bit float
    Double(f64),
    /// UTF-8 string (the only accepted tensor input encoding is a JSON
    /// array literal carried in a `String` field)
    String(String),
}

impl TypedValue {
    /// Name of this value's type tag, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            TypedValue::Boolean(_) => "Boolean",
            TypedValue::Byte(_) => "Byte",
            TypedValue::ByteArray(_) => "ByteArray",
            TypedValue::Short(_) => "Short",
            TypedValue::Integer(_) => "Integer",
            TypedValue::Long(_) => "Long",
            TypedValue::Float(_) => "Float",
            TypedValue::Double(_) => "Double",
            TypedValue::String(_) => "String",
        }
    }

    /// Borrow the payload as a string if this is a `String` value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Boolean(v) => write!(f, "{}", v),
            TypedValue::Byte(v) => write!(f, "{}", v),
            TypedValue::ByteArray(v) => write!(f, "<{} bytes>", v.len()),
            TypedValue::Short(v) => write!(f, "{}", v),
            TypedValue::Integer(v) => write!(f, "{}", v),
            TypedValue::Long(v) => write!(f, "{}", v),
            TypedValue::Float(v) => write!(f, "{}", v),
            TypedValue::Double(v) => write!(f, "{}", v),
            TypedValue::String(v) => write!(f, "{}", v),
        }
    }
}

/// An ordered mapping from field name to [`TypedValue`]
///
/// Field names are unique within a record; inserting an existing name
/// replaces the value in place, preserving the original position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, TypedValue)>,
}

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Insert a field, replacing any existing field with the same name
    pub fn insert(&mut self, name: impl Into<String>, value: TypedValue) {
        let name = name.into();
        if let Some(slot) = self.fields.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.fields.push((name, value));
        }
    }

    /// Look up a field by name
    pub fn get(&self, name: &str) -> Option<&TypedValue> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Iterate fields in insertion order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &TypedValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, TypedValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, TypedValue)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (name, value) in iter {
            record.insert(name, value);
        }
        record
    }
}
