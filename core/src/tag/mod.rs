//! Tag tree
//!
//! A [`Tag`] is one node of a protocol message: either a container holding
//! ordered children, or a leaf holding a payload. A leaf payload is kept in
//! one authoritative form (raw bytes as read from the wire, or a typed value
//! set by the caller); the other form is derived on demand and can be cached
//! with [`Tag::ensure_data`].

pub mod codec;
pub mod vint;

pub use codec::{decode, encode};

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter, Result as FmtResult};

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};

use crate::error::{to_value_error, CoreError, Result};
use crate::schema::{definition, TagDefinition, TagType};
use crate::types::numeric::{
    decode_decimal, decode_signed, decode_unsigned, encode_decimal, encode_signed, encode_unsigned,
};
use crate::types::time::{decode_time, encode_time, TimeUnit};

/// Typed payload of a leaf tag
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    /// Unsigned integer
    Unsigned(u64),
    /// Signed integer
    Signed(i64),
    /// Raw bytes
    Binary(Vec<u8>),
    /// UTF-8 or ASCII text
    Text(String),
    /// Date
    Date(DateTime<Utc>),
    /// Scaled decimal
    Decimal(BigDecimal),
}

impl From<u64> for TagValue {
    fn from(value: u64) -> Self {
        TagValue::Unsigned(value)
    }
}

impl From<i64> for TagValue {
    fn from(value: i64) -> Self {
        TagValue::Signed(value)
    }
}

impl From<Vec<u8>> for TagValue {
    fn from(value: Vec<u8>) -> Self {
        TagValue::Binary(value)
    }
}

impl From<&[u8]> for TagValue {
    fn from(value: &[u8]) -> Self {
        TagValue::Binary(value.to_vec())
    }
}

impl From<&str> for TagValue {
    fn from(value: &str) -> Self {
        TagValue::Text(value.to_string())
    }
}

impl From<String> for TagValue {
    fn from(value: String) -> Self {
        TagValue::Text(value)
    }
}

impl From<DateTime<Utc>> for TagValue {
    fn from(value: DateTime<Utc>) -> Self {
        TagValue::Date(value)
    }
}

impl From<BigDecimal> for TagValue {
    fn from(value: BigDecimal) -> Self {
        TagValue::Decimal(value)
    }
}

/// Encode a typed payload for a leaf of `tag_type`
pub fn encode_leaf(tag_type: TagType, value: &TagValue) -> Result<Vec<u8>> {
    let data = match (tag_type, value) {
        (TagType::Unsigned, TagValue::Unsigned(v)) => encode_unsigned(*v),
        (TagType::Signed, TagValue::Signed(v)) => encode_signed(*v),
        (TagType::Binary, TagValue::Binary(v)) => v.clone(),
        (TagType::Utf8, TagValue::Text(v)) => v.as_bytes().to_vec(),
        (TagType::Ascii, TagValue::Text(v)) if v.is_ascii() => v.as_bytes().to_vec(),
        (TagType::Date, TagValue::Date(v)) => encode_time(v, TimeUnit::Milliseconds)?,
        (TagType::Decimal, TagValue::Decimal(v)) => encode_decimal(v)?,
        (tag_type, value) => {
            return Err(CoreError::InvalidValue(format!(
                "{:?} cannot be stored in a {:?} tag",
                value, tag_type
            )))
        }
    };
    Ok(data)
}

/// Decode the payload of a leaf of `tag_type`
pub fn decode_leaf(tag_type: TagType, data: &[u8]) -> Result<TagValue> {
    let value = match tag_type {
        TagType::Container => {
            return Err(CoreError::Schema("Containers carry no payload".to_string()))
        }
        TagType::Unsigned => TagValue::Unsigned(decode_unsigned(data)?),
        TagType::Signed => TagValue::Signed(decode_signed(data)?),
        TagType::Binary => TagValue::Binary(data.to_vec()),
        TagType::Utf8 => TagValue::Text(String::from_utf8(data.to_vec()).map_err(to_value_error)?),
        TagType::Ascii => {
            if !data.is_ascii() {
                return Err(CoreError::InvalidValue("Non-ASCII bytes in ascii tag".to_string()));
            }
            TagValue::Text(String::from_utf8(data.to_vec()).map_err(to_value_error)?)
        }
        TagType::Date => TagValue::Date(decode_time(data, TimeUnit::Milliseconds)?),
        TagType::Decimal => TagValue::Decimal(decode_decimal(data)?),
    };
    Ok(value)
}

#[derive(Clone)]
enum Payload {
    Container,
    Data { data: Vec<u8>, value: Option<TagValue> },
    Value { value: TagValue, data: Option<Vec<u8>> },
}

/// A node of a protocol message
#[derive(Clone)]
pub struct Tag {
    definition: &'static TagDefinition,
    payload: Payload,
    children: Vec<Tag>,
    index: HashMap<&'static str, Vec<usize>>,
}

impl Tag {
    /// Create an empty tag by name; fails for names the schema does not know
    pub fn new(name: &str) -> Result<Self> {
        Ok(Self::from_definition(definition(name)?))
    }

    /// Create an empty tag for a definition
    pub fn from_definition(definition: &'static TagDefinition) -> Self {
        let payload = if definition.tag_type.is_container() {
            Payload::Container
        } else {
            Payload::Data {
                data: Vec::new(),
                value: None,
            }
        };
        Self {
            definition,
            payload,
            children: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub(crate) fn from_raw(definition: &'static TagDefinition, data: Vec<u8>) -> Self {
        Self {
            definition,
            payload: Payload::Data { data, value: None },
            children: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Create a leaf whose typed value is authoritative
    pub fn with_value(name: &str, value: impl Into<TagValue>) -> Result<Self> {
        let mut tag = Self::new(name)?;
        tag.set_value(value.into())?;
        Ok(tag)
    }

    /// Create a leaf whose raw bytes are authoritative
    pub fn with_data(name: &str, data: Vec<u8>) -> Result<Self> {
        let mut tag = Self::new(name)?;
        tag.set_data(data)?;
        Ok(tag)
    }

    /// Tag name
    pub fn name(&self) -> &'static str {
        self.definition.name
    }

    /// Schema entry of the tag
    pub fn definition(&self) -> &'static TagDefinition {
        self.definition
    }

    /// Payload type of the tag
    pub fn tag_type(&self) -> TagType {
        self.definition.tag_type
    }

    /// Whether the tag holds children
    pub fn is_container(&self) -> bool {
        self.definition.tag_type.is_container()
    }

    fn require_container(&self) -> Result<()> {
        if self.is_container() {
            Ok(())
        } else {
            Err(CoreError::Schema(format!("{} is not a container", self.name())))
        }
    }

    fn require_leaf(&self) -> Result<()> {
        if self.is_container() {
            Err(CoreError::Schema(format!("{} is a container", self.name())))
        } else {
            Ok(())
        }
    }

    /// Append a child, validating it may appear under this tag
    pub fn add_child(&mut self, child: Tag) -> Result<&mut Tag> {
        self.require_container()?;
        if !child.definition.allowed_under(self.name()) {
            return Err(CoreError::Schema(format!(
                "{} is not allowed under {}",
                child.name(),
                self.name()
            )));
        }
        Ok(self.push_child(child))
    }

    /// Append a child whose context has already been validated
    pub(crate) fn push_child(&mut self, child: Tag) -> &mut Tag {
        let position = self.children.len();
        self.index.entry(child.name()).or_default().push(position);
        self.children.push(child);
        &mut self.children[position]
    }

    /// Append an empty child container
    pub fn add_container(&mut self, name: &str) -> Result<&mut Tag> {
        self.add_child(Tag::new(name)?)
    }

    /// Append a leaf from a typed value
    pub fn add_value(&mut self, name: &str, value: impl Into<TagValue>) -> Result<&mut Tag> {
        self.add_child(Tag::with_value(name, value)?)
    }

    /// Append a leaf from raw bytes
    pub fn add_data(&mut self, name: &str, data: Vec<u8>) -> Result<&mut Tag> {
        self.add_child(Tag::with_data(name, data)?)
    }

    /// Children in wire order
    pub fn children(&self) -> &[Tag] {
        &self.children
    }

    /// First child with `name`
    pub fn child(&self, name: &str) -> Option<&Tag> {
        self.index
            .get(name)
            .and_then(|positions| positions.first())
            .map(|position| &self.children[*position])
    }

    /// Mutable access to the first child with `name`
    pub fn child_mut(&mut self, name: &str) -> Option<&mut Tag> {
        let position = *self.index.get(name)?.first()?;
        self.children.get_mut(position)
    }

    /// All children with `name`, in wire order
    pub fn children_named<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a Tag> + 'a {
        self.index
            .get(name)
            .into_iter()
            .flatten()
            .map(move |position| &self.children[*position])
    }

    /// First child with `name`, or a parse error naming what is missing
    pub fn required_child(&self, name: &str) -> Result<&Tag> {
        self.child(name)
            .ok_or_else(|| CoreError::Parse(format!("{} has no {}", self.name(), name)))
    }

    /// Remove every child with `name`, returning them in wire order
    pub fn remove_children(&mut self, name: &str) -> Vec<Tag> {
        let (removed, kept): (Vec<Tag>, Vec<Tag>) = std::mem::take(&mut self.children)
            .into_iter()
            .partition(|child| child.name() == name);
        self.children = kept;
        self.rebuild_index();
        removed
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        for (position, child) in self.children.iter().enumerate() {
            self.index.entry(child.name()).or_default().push(position);
        }
    }

    /// Raw payload bytes, encoding the typed value if bytes are not cached
    pub fn data(&self) -> Result<Cow<'_, [u8]>> {
        match &self.payload {
            Payload::Container => Err(CoreError::Schema(format!(
                "{} is a container and carries no data",
                self.name()
            ))),
            Payload::Data { data, .. } => Ok(Cow::Borrowed(data)),
            Payload::Value { data: Some(data), .. } => Ok(Cow::Borrowed(data)),
            Payload::Value { value, data: None } => {
                Ok(Cow::Owned(encode_leaf(self.tag_type(), value)?))
            }
        }
    }

    /// Typed payload, decoding the raw bytes if the value is not cached
    pub fn value(&self) -> Result<Cow<'_, TagValue>> {
        match &self.payload {
            Payload::Container => Err(CoreError::Schema(format!(
                "{} is a container and carries no value",
                self.name()
            ))),
            Payload::Value { value, .. } => Ok(Cow::Borrowed(value)),
            Payload::Data { value: Some(value), .. } => Ok(Cow::Borrowed(value)),
            Payload::Data { data, value: None } => {
                Ok(Cow::Owned(decode_leaf(self.tag_type(), data)?))
            }
        }
    }

    /// Materialize and cache the raw bytes of this leaf, or of every leaf below
    /// this container
    pub fn ensure_data(&mut self) -> Result<()> {
        let tag_type = self.tag_type();
        match &mut self.payload {
            Payload::Container => {
                for child in &mut self.children {
                    child.ensure_data()?;
                }
            }
            Payload::Data { .. } => {}
            Payload::Value { value, data } => {
                if data.is_none() {
                    *data = Some(encode_leaf(tag_type, value)?);
                }
            }
        }
        Ok(())
    }

    /// Make raw bytes authoritative, dropping any cached value
    pub fn set_data(&mut self, data: Vec<u8>) -> Result<()> {
        self.require_leaf()?;
        self.payload = Payload::Data { data, value: None };
        Ok(())
    }

    /// Make a typed value authoritative, dropping any cached bytes
    pub fn set_value(&mut self, value: TagValue) -> Result<()> {
        self.require_leaf()?;
        // Validate now so a bad value fails where it is set, not at encode time
        encode_leaf(self.tag_type(), &value)?;
        self.payload = Payload::Value { value, data: None };
        Ok(())
    }

    /// Payload as an unsigned integer
    pub fn unsigned(&self) -> Result<u64> {
        match self.value()?.as_ref() {
            TagValue::Unsigned(v) => Ok(*v),
            other => Err(self.type_mismatch("unsigned", other)),
        }
    }

    /// Payload as a signed integer
    pub fn signed(&self) -> Result<i64> {
        match self.value()?.as_ref() {
            TagValue::Signed(v) => Ok(*v),
            other => Err(self.type_mismatch("signed", other)),
        }
    }

    /// Payload as text
    pub fn text(&self) -> Result<String> {
        match self.value()?.into_owned() {
            TagValue::Text(v) => Ok(v),
            other => Err(self.type_mismatch("text", &other)),
        }
    }

    /// Payload as a date
    pub fn date(&self) -> Result<DateTime<Utc>> {
        match self.value()?.as_ref() {
            TagValue::Date(v) => Ok(*v),
            other => Err(self.type_mismatch("date", other)),
        }
    }

    fn type_mismatch(&self, expected: &str, found: &TagValue) -> CoreError {
        CoreError::Schema(format!("{} holds {:?}, not {}", self.name(), found, expected))
    }

    /// Raw bytes of the first child with `name`
    pub fn child_data(&self, name: &str) -> Result<Vec<u8>> {
        Ok(self.required_child(name)?.data()?.into_owned())
    }

    /// Text of the first child with `name`
    pub fn child_text(&self, name: &str) -> Result<String> {
        self.required_child(name)?.text()
    }

    /// Unsigned value of the first child with `name`
    pub fn child_unsigned(&self, name: &str) -> Result<u64> {
        self.required_child(name)?.unsigned()
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        if self.definition != other.definition {
            return false;
        }
        if self.is_container() {
            return self.children == other.children;
        }
        match (self.data(), other.data()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl Debug for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match &self.payload {
            Payload::Container => f.debug_tuple(self.name()).field(&self.children).finish(),
            Payload::Data { data, .. } => write!(f, "{}({})", self.name(), hex::encode(data)),
            Payload::Value { value, .. } => write!(f, "{}({:?})", self.name(), value),
        }
    }
}
