//! clipcards - Clipboard content data models
//!
//! Defines payloads and the (payload, format) pairs that make up a clip

use std::fmt;
use std::ops::Add;

use image::RgbaImage;

use super::clip::{Clip, Item};
use super::format::Format;

/// Clipboard payload
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Text
    Text(String),
    /// Opaque binary data
    Bytes(Vec<u8>),
    /// Integer value
    Integer(i64),
    /// In-memory RGBA image
    Image(RgbaImage),
    /// Nested list kept as a single payload
    List(Vec<Payload>),
}

/// Shape of a payload, used as the inference registry key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Text,
    Bytes,
    Integer,
    Image,
    List,
}

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Text(_) => PayloadKind::Text,
            Payload::Bytes(_) => PayloadKind::Bytes,
            Payload::Integer(_) => PayloadKind::Integer,
            Payload::Image(_) => PayloadKind::Image,
            Payload::List(_) => PayloadKind::List,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Payload::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<&RgbaImage> {
        match self {
            Payload::Image(image) => Some(image),
            _ => None,
        }
    }

    /// Textual rendering, used when a payload goes to a text format
    pub fn to_text(&self) -> String {
        self.to_string()
    }

    fn fmt_nested(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Text(text) => write!(f, "'{}'", text),
            other => write!(f, "{}", other),
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Text(text) => f.write_str(text),
            Payload::Bytes(bytes) => write!(f, "b'{}'", bytes.escape_ascii()),
            Payload::Integer(value) => write!(f, "{}", value),
            Payload::Image(image) => write!(f, "<image {}x{}>", image.width(), image.height()),
            Payload::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.fmt_nested(f)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Payload::Bytes(bytes.to_vec())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(bytes)
    }
}

impl From<i64> for Payload {
    fn from(value: i64) -> Self {
        Payload::Integer(value)
    }
}

impl From<i32> for Payload {
    fn from(value: i32) -> Self {
        Payload::Integer(value.into())
    }
}

impl From<RgbaImage> for Payload {
    fn from(image: RgbaImage) -> Self {
        Payload::Image(image)
    }
}

/// How an inferred format is obtained
#[derive(Debug, Clone, Copy)]
enum FormatRule {
    Standard(u32),
    Registered(&'static str),
}

impl FormatRule {
    fn format(self) -> Format {
        match self {
            FormatRule::Standard(id) => Format::new(id),
            FormatRule::Registered(name) => Format::registered(name),
        }
    }
}

/// Payload kind to format, for datums built without an explicit format.
/// New payload kinds get one entry here.
const INFERENCE_RULES: &[(PayloadKind, FormatRule)] = &[
    (PayloadKind::Text, FormatRule::Standard(Format::UNICODETEXT)),
    (PayloadKind::Image, FormatRule::Registered(Format::PNG_NAME)),
];

/// Rule for kinds with no entry: carry them as text
const FALLBACK_RULE: FormatRule = FormatRule::Standard(Format::UNICODETEXT);

/// Format implied by the shape of `payload`; `None` maps to the null format
pub fn infer_format(payload: Option<&Payload>) -> Format {
    let Some(payload) = payload else {
        return Format::null();
    };
    let kind = payload.kind();
    INFERENCE_RULES
        .iter()
        .find(|(rule_kind, _)| *rule_kind == kind)
        .map(|(_, rule)| *rule)
        .unwrap_or(FALLBACK_RULE)
        .format()
}

/// A single clipboard (payload, format) pair
#[derive(Debug, Clone, PartialEq)]
pub struct Datum {
    /// Payload; `None` for a null datum
    pub data: Option<Payload>,
    pub format: Format,
}

impl Datum {
    /// Datum with a format inferred from the payload
    pub fn new(data: impl Into<Payload>) -> Self {
        Self::from_data(Some(data.into()))
    }

    /// Datum with a format inferred from an optional payload
    pub fn from_data(data: Option<Payload>) -> Self {
        let format = infer_format(data.as_ref());
        Self { data, format }
    }

    /// Datum with an explicit format
    ///
    /// Unsupported formats degrade to a null datum.
    pub fn with_format(data: Option<Payload>, format: impl Into<Format>) -> Self {
        let format = format.into();
        if !format.is_supported() {
            log::warn!("[Datum] Format {} is not supported, substituting null", format);
            return Self::null();
        }
        Self { data, format }
    }

    pub fn null() -> Self {
        Self {
            data: None,
            format: Format::null(),
        }
    }

    pub fn is_null(&self) -> bool {
        self.data.is_none()
    }

    pub fn data(&self) -> Option<&Payload> {
        self.data.as_ref()
    }

    pub fn format(&self) -> &Format {
        &self.format
    }

    /// Text rendering of the payload, cut to `length` characters
    pub fn preview(&self, length: usize) -> String {
        let text = match &self.data {
            Some(payload) => payload.to_string(),
            None => "None".to_string(),
        };
        text.chars().take(length).collect()
    }
}

impl Default for Datum {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} '{}'>", self.format, self.preview(40))
    }
}

impl<T: Into<Item>> Add<T> for Datum {
    type Output = Clip;

    fn add(self, other: T) -> Clip {
        Clip::from(self) + other
    }
}
