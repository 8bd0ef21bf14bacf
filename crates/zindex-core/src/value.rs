use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    fmt,
};

///
/// Value
///
/// Dynamic field value handed to the index maintainer and the range resolver.
/// `None` models an absent field (an unset optional); absent fields have no
/// index entry.
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub enum Value {
    Bool(bool),
    Float(f64),
    Int(i64),
    #[default]
    None,
    Text(String),
    Uint(u64),
}

impl Value {
    /// Short, stable label for the value's variant, used in error messages.
    #[must_use]
    pub const fn kind_label(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Float(_) => "float",
            Self::Int(_) => "int",
            Self::None => "none",
            Self::Text(_) => "text",
            Self::Uint(_) => "uint",
        }
    }

    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Treat `Value::None` as "no value" so callers can chain on presence.
    #[must_use]
    pub const fn as_present(&self) -> Option<&Self> {
        match self {
            Self::None => None,
            _ => Some(self),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::None => f.write_str("none"),
            Self::Text(v) => write!(f, "{v:?}"),
            Self::Uint(v) => write!(f, "{v}"),
        }
    }
}

macro_rules! impl_value_from {
    ($($ty:ty => $variant:ident as $cast:ty),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Self::$variant(<$cast>::from(v))
                }
            }
        )*
    };
}

impl_value_from! {
    bool => Bool as bool,
    f32 => Float as f64,
    f64 => Float as f64,
    i8 => Int as i64,
    i16 => Int as i64,
    i32 => Int as i64,
    i64 => Int as i64,
    u8 => Uint as u64,
    u16 => Uint as u64,
    u32 => Uint as u64,
    u64 => Uint as u64,
    String => Text as String,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::None, Into::into)
    }
}

///
/// FieldValues
///
/// Read access to a record's field values by field name.
/// Implemented by whatever the record-save path uses to snapshot a record.
///

pub trait FieldValues {
    fn get_value(&self, field: &str) -> Option<Value>;
}

impl FieldValues for BTreeMap<String, Value> {
    fn get_value(&self, field: &str) -> Option<Value> {
        self.get(field).cloned()
    }
}

impl FieldValues for HashMap<String, Value> {
    fn get_value(&self, field: &str) -> Option<Value> {
        self.get(field).cloned()
    }
}

impl FieldValues for [(&str, Value)] {
    fn get_value(&self, field: &str) -> Option<Value> {
        self.iter()
            .find(|(name, _)| *name == field)
            .map(|(_, value)| value.clone())
    }
}

impl<const N: usize> FieldValues for [(&str, Value); N] {
    fn get_value(&self, field: &str) -> Option<Value> {
        self.as_slice().get_value(field)
    }
}
