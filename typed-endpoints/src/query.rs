//! Query-string binding
//!
//! Binds a multi-valued query mapping onto a query model. The model is any
//! struct deriving `Deserialize` whose fields hold strings; each field is
//! looked up under its external (serde) name, not its Rust identifier.
//!
//! # Example
//!
//! ```rust
//! use serde::Deserialize;
//! use typed_endpoints::query::{bind_query, QueryParams};
//!
//! #[derive(Debug, Deserialize)]
//! struct StudentQuery {
//!     #[serde(rename = "id")]
//!     student_id: String,
//!     #[serde(rename = "class")]
//!     class_name: Option<String>,
//! }
//!
//! let params = QueryParams::parse("id=s-42&unused=1");
//! let query: StudentQuery = bind_query(&params).unwrap();
//! assert_eq!(query.student_id, "s-42");
//! assert_eq!(query.class_name, None);
//! ```
//!
//! Binding rules per declared field:
//!
//! - no value: the field keeps its zero value (`""`, or `None` for options)
//! - one value: the value is assigned
//! - more than one value: [`BindingError::RepeatedParameter`]
//!
//! Fields that cannot hold a string (numbers, booleans, nested records) fail
//! with [`BindingError::UnsupportedField`]; nothing is coerced.

use std::collections::HashMap;

use serde::de::{
    self, value::StrDeserializer, DeserializeOwned, DeserializeSeed, IntoDeserializer, MapAccess,
    Visitor,
};
use url::form_urlencoded;

use crate::error::BindingError;

/// Parsed query string: external name to every value supplied for it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(HashMap<String, Vec<String>>);

impl QueryParams {
    /// Create an empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an `application/x-www-form-urlencoded` query string
    ///
    /// Values are percent-decoded, `+` decodes to a space and a key without
    /// `=` carries the empty string. Repeated keys keep every value in order.
    pub fn parse(query: &str) -> Self {
        form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect()
    }

    /// All values supplied for `key`, in order of appearance
    pub fn values(&self, key: &str) -> &[String] {
        self.0.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Append a value for `key`
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.entry(key.into()).or_default().push(value.into());
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no key was supplied
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for QueryParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

impl From<HashMap<String, Vec<String>>> for QueryParams {
    fn from(map: HashMap<String, Vec<String>>) -> Self {
        Self(map)
    }
}

/// Bind `params` onto a fresh query model
pub fn bind_query<Q>(params: &QueryParams) -> Result<Q, BindingError>
where
    Q: DeserializeOwned,
{
    Q::deserialize(RecordDeserializer { params })
}

/// Parse `query` and bind it onto a fresh query model
pub fn from_query_str<Q>(query: &str) -> Result<Q, BindingError>
where
    Q: DeserializeOwned,
{
    bind_query(&QueryParams::parse(query))
}

/// Top-level deserializer; accepts only structs with named fields
struct RecordDeserializer<'a> {
    params: &'a QueryParams,
}

impl<'de> de::Deserializer<'de> for RecordDeserializer<'_> {
    type Error = BindingError;

    fn deserialize_any<V>(self, _visitor: V) -> Result<V::Value, BindingError>
    where
        V: Visitor<'de>,
    {
        Err(BindingError::NotARecord)
    }

    fn deserialize_struct<V>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, BindingError>
    where
        V: Visitor<'de>,
    {
        visitor.visit_map(FieldAccess {
            params: self.params,
            fields: fields.iter(),
            current: None,
        })
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct newtype_struct seq tuple
        tuple_struct map enum identifier ignored_any
    }
}

/// Walks the model's declared fields, not the query keys
struct FieldAccess<'a> {
    params: &'a QueryParams,
    fields: std::slice::Iter<'static, &'static str>,
    current: Option<&'static str>,
}

impl<'de> MapAccess<'de> for FieldAccess<'_> {
    type Error = BindingError;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>, BindingError>
    where
        K: DeserializeSeed<'de>,
    {
        let Some(&field) = self.fields.next() else {
            return Ok(None);
        };
        self.current = Some(field);
        let key: StrDeserializer<'_, BindingError> = field.into_deserializer();
        seed.deserialize(key).map(Some)
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value, BindingError>
    where
        V: DeserializeSeed<'de>,
    {
        let field = self
            .current
            .take()
            .ok_or_else(|| BindingError::Custom("value requested before key".to_string()))?;

        let value = match self.params.values(field) {
            [] => None,
            [single] => Some(single.clone()),
            _ => return Err(BindingError::RepeatedParameter(field.to_string())),
        };

        seed.deserialize(FieldDeserializer { field, value })
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.fields.len())
    }
}

/// Deserializer for one field; yields strings and nothing else
struct FieldDeserializer {
    field: &'static str,
    value: Option<String>,
}

impl FieldDeserializer {
    fn unsupported<T>(&self) -> Result<T, BindingError> {
        Err(BindingError::UnsupportedField(self.field.to_string()))
    }
}

macro_rules! reject_non_string {
    ($l:lifetime; $($method:ident)*) => {
        $(
            fn $method<V>(self, _visitor: V) -> Result<V::Value, BindingError>
            where
                V: Visitor<$l>,
            {
                self.unsupported()
            }
        )*
    };
}

impl<'de> de::Deserializer<'de> for FieldDeserializer {
    type Error = BindingError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, BindingError>
    where
        V: Visitor<'de>,
    {
        visitor.visit_string(self.value.unwrap_or_default())
    }

    fn deserialize_str<V>(self, visitor: V) -> Result<V::Value, BindingError>
    where
        V: Visitor<'de>,
    {
        visitor.visit_string(self.value.unwrap_or_default())
    }

    fn deserialize_string<V>(self, visitor: V) -> Result<V::Value, BindingError>
    where
        V: Visitor<'de>,
    {
        visitor.visit_string(self.value.unwrap_or_default())
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, BindingError>
    where
        V: Visitor<'de>,
    {
        if self.value.is_some() {
            visitor.visit_some(self)
        } else {
            visitor.visit_none()
        }
    }

    fn deserialize_newtype_struct<V>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, BindingError>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_ignored_any<V>(self, visitor: V) -> Result<V::Value, BindingError>
    where
        V: Visitor<'de>,
    {
        visitor.visit_unit()
    }

    reject_non_string! {
        'de;
        deserialize_bool deserialize_i8 deserialize_i16 deserialize_i32
        deserialize_i64 deserialize_i128 deserialize_u8 deserialize_u16
        deserialize_u32 deserialize_u64 deserialize_u128 deserialize_f32
        deserialize_f64 deserialize_char deserialize_bytes deserialize_byte_buf
        deserialize_unit deserialize_seq deserialize_map deserialize_identifier
    }

    fn deserialize_unit_struct<V>(
        self,
        _name: &'static str,
        _visitor: V,
    ) -> Result<V::Value, BindingError>
    where
        V: Visitor<'de>,
    {
        self.unsupported()
    }

    fn deserialize_tuple<V>(self, _len: usize, _visitor: V) -> Result<V::Value, BindingError>
    where
        V: Visitor<'de>,
    {
        self.unsupported()
    }

    fn deserialize_tuple_struct<V>(
        self,
        _name: &'static str,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value, BindingError>
    where
        V: Visitor<'de>,
    {
        self.unsupported()
    }

    fn deserialize_struct<V>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, BindingError>
    where
        V: Visitor<'de>,
    {
        self.unsupported()
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, BindingError>
    where
        V: Visitor<'de>,
    {
        self.unsupported()
    }
}
