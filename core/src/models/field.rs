//! A named, typed column value
//!
//! A field is known by exactly one authoritative representation: its decoded
//! value, its encoded bytes, or (when the value is withheld) its field hash.
//! The other forms are derived on demand and cached; every setter drops the
//! caches it invalidates.

use std::fmt::{Debug, Formatter, Result as FmtResult};

use crate::crypto::{keccak256, keccak256_concat};
use crate::error::{CoreError, Result};
use crate::tag::Tag;
use crate::types::{Value, ValueCodec, ValueType};

/// Which representation of a field is the source of truth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    /// The decoded value
    Value,
    /// The encoded bytes
    Bytes,
    /// Only the field hash is known
    Hash,
}

/// One column of a record
#[derive(Clone)]
pub struct Field {
    name: String,
    value_type: ValueType,
    computed: bool,
    codec: ValueCodec,
    authority: Representation,
    value: Option<Value>,
    bytes: Option<Vec<u8>>,
    hash: Option<[u8; 32]>,
}

impl Field {
    fn empty(name: &str, value_type: ValueType, authority: Representation) -> Self {
        Self {
            name: name.to_string(),
            value_type,
            computed: false,
            codec: ValueCodec::default(),
            authority,
            value: None,
            bytes: None,
            hash: None,
        }
    }

    /// A field holding a decoded value
    pub fn from_value(name: &str, value_type: ValueType, value: Value) -> Self {
        let mut field = Self::empty(name, value_type, Representation::Value);
        field.value = Some(value);
        field
    }

    /// A field holding encoded bytes
    pub fn from_bytes(name: &str, value_type: ValueType, bytes: Vec<u8>) -> Self {
        let mut field = Self::empty(name, value_type, Representation::Bytes);
        field.bytes = Some(bytes);
        field
    }

    /// A field whose value is withheld, known only by its field hash
    pub fn from_hash(name: &str, value_type: ValueType, hash: [u8; 32]) -> Self {
        let mut field = Self::empty(name, value_type, Representation::Hash);
        field.hash = Some(hash);
        field
    }

    /// Use `codec` for value conversions
    pub fn with_codec(mut self, codec: ValueCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Mark the field as a computed result column
    pub fn computed(mut self, computed: bool) -> Self {
        self.computed = computed;
        self
    }

    /// Field name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Logical type
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Whether the field is a computed result column
    pub fn is_computed(&self) -> bool {
        self.computed
    }

    /// Current source of truth
    pub fn authority(&self) -> Representation {
        self.authority
    }

    /// Whether the value (decoded or encoded) is available
    pub fn has_value(&self) -> bool {
        self.value.is_some() || self.bytes.is_some()
    }

    /// Replace the value; drops cached bytes and hash
    pub fn set_value(&mut self, value: Value) {
        self.authority = Representation::Value;
        self.value = Some(value);
        self.bytes = None;
        self.hash = None;
    }

    /// Replace the encoded bytes; drops cached value and hash
    pub fn set_bytes(&mut self, bytes: Vec<u8>) {
        self.authority = Representation::Bytes;
        self.bytes = Some(bytes);
        self.value = None;
        self.hash = None;
    }

    /// Withhold the value, keeping only the field hash
    pub fn set_hash(&mut self, hash: [u8; 32]) {
        self.authority = Representation::Hash;
        self.hash = Some(hash);
        self.value = None;
        self.bytes = None;
    }

    fn withheld(&self) -> CoreError {
        CoreError::InvalidValue(format!("Field {} does not carry its value", self.name))
    }

    /// Decoded value, decoding and caching the bytes if needed
    pub fn value(&mut self) -> Result<&Value> {
        if self.value.is_none() {
            let bytes = self.bytes.as_deref().ok_or_else(|| self.withheld())?;
            self.value = Some(self.codec.decode(self.value_type, bytes)?);
        }
        self.value.as_ref().ok_or_else(|| self.withheld())
    }

    /// Encoded bytes, encoding and caching the value if needed
    pub fn bytes(&mut self) -> Result<&[u8]> {
        if self.bytes.is_none() {
            let value = self.value.as_ref().ok_or_else(|| self.withheld())?;
            self.bytes = Some(self.codec.encode(self.value_type, value)?);
        }
        self.bytes.as_deref().ok_or_else(|| self.withheld())
    }

    /// keccak256 of the encoded bytes
    pub fn content_hash(&mut self) -> Result<[u8; 32]> {
        Ok(keccak256(self.bytes()?))
    }

    /// Hash that represents this field in the entry's fields hash:
    /// `keccak256(name ‖ bytes)`, or the stored hash of a withheld field
    pub fn field_hash(&mut self) -> Result<[u8; 32]> {
        if let Some(hash) = self.hash {
            return Ok(hash);
        }
        let bytes = self.bytes()?.to_vec();
        let hash = keccak256_concat(&[self.name.as_bytes(), &bytes]);
        self.hash = Some(hash);
        Ok(hash)
    }

    /// Read a `Field` or `ComputeField` tag
    pub fn from_tag(tag: &Tag, codec: ValueCodec) -> Result<Self> {
        let name = tag.child_text("FieldName")?;
        let value_type: ValueType = tag.child_text("FieldType")?.parse()?;

        let field = if let Some(value) = tag.child("FieldValue") {
            Self::from_bytes(&name, value_type, value.data()?.into_owned())
        } else if let Some(hash) = tag.child("FieldHash") {
            let data = hash.data()?;
            let hash = <[u8; 32]>::try_from(&data[..]).map_err(|_| {
                CoreError::Parse(format!("FieldHash of {} must be 32 bytes", name))
            })?;
            Self::from_hash(&name, value_type, hash)
        } else {
            return Err(CoreError::Parse(format!(
                "{} {} has neither FieldValue nor FieldHash",
                tag.name(),
                name
            )));
        };

        Ok(field
            .with_codec(codec)
            .computed(tag.name() == "ComputeField"))
    }

    /// Wire form: name, type, and the value or, if withheld, the hash
    pub fn to_tag(&mut self) -> Result<Tag> {
        let mut tag = Tag::new("Field")?;
        tag.add_value("FieldName", self.name.as_str())?;
        tag.add_value("FieldType", self.value_type.as_str())?;
        if self.has_value() {
            let bytes = self.bytes()?.to_vec();
            tag.add_data("FieldValue", bytes)?;
        } else {
            let hash = self.field_hash()?;
            tag.add_data("FieldHash", hash.to_vec())?;
        }
        Ok(tag)
    }
}

impl Debug for Field {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let mut s = f.debug_struct("Field");
        s.field("name", &self.name).field("type", &self.value_type);
        if self.computed {
            s.field("computed", &true);
        }
        match self.authority {
            Representation::Value => s.field("value", &self.value),
            Representation::Bytes => s.field("bytes", &self.bytes.as_ref().map(hex::encode)),
            Representation::Hash => s.field("hash", &self.hash.map(hex::encode)),
        };
        s.finish()
    }
}
