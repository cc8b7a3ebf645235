//! clipcards - Clips
//!
//! A clip holds everything on one clipboard: ordered datums sharing a
//! single sequence id.

use std::fmt;
use std::ops::{Add, Index, IndexMut, Range};
use std::sync::atomic::{AtomicI64, Ordering};

use blake3::Hasher;
use image::RgbaImage;

use super::format::Format;
use super::models::{Datum, Payload};
use crate::error::{ClipboardError, Result};

/// Placeholder ids for clips not (yet) stamped by the OS; OS ids are positive
static RUNNING_ID: AtomicI64 = AtomicI64::new(-1);

fn next_placeholder() -> i64 {
    RUNNING_ID.fetch_sub(1, Ordering::Relaxed)
}

/// Anything that can be appended to a clip, resolved once per call
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    /// Nothing; appending it is a no-op
    None,
    /// Appended as-is
    Datum(Datum),
    /// Items are spliced in
    Clip(Clip),
    /// Flattened one level at the outermost append only
    List(Vec<Item>),
    /// Wrapped in a new datum with an inferred format
    Value(Payload),
}

impl Item {
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Item>,
    {
        Item::List(items.into_iter().map(Into::into).collect())
    }

    /// Collapse into a single payload; nested nulls are dropped
    fn into_payload(self) -> Option<Payload> {
        match self {
            Item::None => None,
            Item::Datum(datum) => datum.data,
            Item::Clip(clip) => Some(Payload::List(
                clip.items.into_iter().filter_map(|datum| datum.data).collect(),
            )),
            Item::List(items) => Some(Payload::List(
                items.into_iter().filter_map(Item::into_payload).collect(),
            )),
            Item::Value(payload) => Some(payload),
        }
    }

    fn into_datum(self) -> Datum {
        match self {
            Item::Datum(datum) => datum,
            Item::Value(payload) => Datum::new(payload),
            other => Datum::from_data(other.into_payload()),
        }
    }
}

impl From<Datum> for Item {
    fn from(datum: Datum) -> Self {
        Item::Datum(datum)
    }
}

impl From<Clip> for Item {
    fn from(clip: Clip) -> Self {
        Item::Clip(clip)
    }
}

impl From<Payload> for Item {
    fn from(payload: Payload) -> Self {
        Item::Value(payload)
    }
}

impl From<&str> for Item {
    fn from(text: &str) -> Self {
        Item::Value(text.into())
    }
}

impl From<String> for Item {
    fn from(text: String) -> Self {
        Item::Value(text.into())
    }
}

impl From<&[u8]> for Item {
    fn from(bytes: &[u8]) -> Self {
        Item::Value(bytes.into())
    }
}

impl From<Vec<u8>> for Item {
    fn from(bytes: Vec<u8>) -> Self {
        Item::Value(bytes.into())
    }
}

impl From<i64> for Item {
    fn from(value: i64) -> Self {
        Item::Value(value.into())
    }
}

impl From<i32> for Item {
    fn from(value: i32) -> Self {
        Item::Value(value.into())
    }
}

impl From<RgbaImage> for Item {
    fn from(image: RgbaImage) -> Self {
        Item::Value(image.into())
    }
}

impl<T: Into<Item>> From<Option<T>> for Item {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Item::None)
    }
}

/// One format or an ordered list of acceptable formats, best first
pub trait FormatPriority {
    fn into_priorities(self) -> Vec<Format>;
}

impl FormatPriority for u32 {
    fn into_priorities(self) -> Vec<Format> {
        vec![Format::new(self)]
    }
}

impl FormatPriority for Format {
    fn into_priorities(self) -> Vec<Format> {
        vec![self]
    }
}

impl FormatPriority for &Format {
    fn into_priorities(self) -> Vec<Format> {
        vec![self.clone()]
    }
}

impl<const N: usize> FormatPriority for [u32; N] {
    fn into_priorities(self) -> Vec<Format> {
        self.into_iter().map(Format::new).collect()
    }
}

impl FormatPriority for &[u32] {
    fn into_priorities(self) -> Vec<Format> {
        self.iter().copied().map(Format::new).collect()
    }
}

impl FormatPriority for Vec<u32> {
    fn into_priorities(self) -> Vec<Format> {
        self.into_iter().map(Format::new).collect()
    }
}

impl<const N: usize> FormatPriority for [Format; N] {
    fn into_priorities(self) -> Vec<Format> {
        self.into()
    }
}

impl FormatPriority for &[Format] {
    fn into_priorities(self) -> Vec<Format> {
        self.to_vec()
    }
}

impl FormatPriority for Vec<Format> {
    fn into_priorities(self) -> Vec<Format> {
        self
    }
}

/// The contents of one clipboard
///
/// Two clips are equal only when both the sequence id and the items match:
/// identical content captured at different times is a different event.
#[derive(Debug, Clone)]
pub struct Clip {
    seq: i64,
    items: Vec<Datum>,
}

impl Clip {
    /// Empty clip with a fresh placeholder sequence id
    pub fn new() -> Self {
        Self {
            seq: next_placeholder(),
            items: Vec::new(),
        }
    }

    /// Clip holding `item`; a clip passed in is returned unchanged
    pub fn from_item(item: impl Into<Item>) -> Self {
        match item.into() {
            Item::Clip(clip) => clip,
            other => {
                let mut clip = Self::new();
                clip.append(other);
                clip
            }
        }
    }

    /// Empty clip stamped with an OS sequence number
    pub fn with_sequence(seq: u32) -> Self {
        Self {
            seq: i64::from(seq),
            items: Vec::new(),
        }
    }

    pub fn sequence(&self) -> i64 {
        self.seq
    }

    /// Whether this clip was built locally rather than read from the OS
    pub fn is_placeholder(&self) -> bool {
        self.seq < 0
    }

    /// Append one item, flattening a list by exactly one level
    pub fn append(&mut self, item: impl Into<Item>) {
        self.append_item(item.into(), true);
    }

    fn append_item(&mut self, item: Item, flatten_lists: bool) {
        match item {
            Item::None => {}
            Item::Datum(datum) => self.items.push(datum),
            Item::Clip(clip) => self.items.extend(clip.items),
            Item::List(items) if flatten_lists => {
                for item in items {
                    self.append_item(item, false);
                }
            }
            other => self.items.push(other.into_datum()),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Datum] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Datum> {
        self.items.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Datum> {
        self.items.get(index)
    }

    pub fn formats(&self) -> Vec<Format> {
        self.items.iter().map(|datum| datum.format.clone()).collect()
    }

    /// Replace the datum at `index`, wrapping the value as a datum
    pub fn set(&mut self, index: usize, value: impl Into<Item>) -> Result<()> {
        let len = self.items.len();
        let slot = self
            .items
            .get_mut(index)
            .ok_or(ClipboardError::IndexOutOfRange { index, len })?;
        *slot = value.into().into_datum();
        Ok(())
    }

    /// Replace a range of datums, wrapping every value as a datum
    pub fn set_range<I, T>(&mut self, range: Range<usize>, values: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<Item>,
    {
        self.check_range(&range)?;
        let datums: Vec<Datum> = values.into_iter().map(|value| value.into().into_datum()).collect();
        self.items.splice(range, datums);
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<Datum> {
        let len = self.items.len();
        if index >= len {
            return Err(ClipboardError::IndexOutOfRange { index, len });
        }
        Ok(self.items.remove(index))
    }

    pub fn remove_range(&mut self, range: Range<usize>) -> Result<Vec<Datum>> {
        self.check_range(&range)?;
        Ok(self.items.drain(range).collect())
    }

    fn check_range(&self, range: &Range<usize>) -> Result<()> {
        let len = self.items.len();
        if range.start > range.end {
            return Err(ClipboardError::IndexOutOfRange { index: range.start, len });
        }
        if range.end > len {
            return Err(ClipboardError::IndexOutOfRange { index: range.end, len });
        }
        Ok(())
    }

    /// First datum matching the best available priority
    ///
    /// Each priority is tried in order; within one, the earliest item wins.
    pub fn find(&self, priorities: impl FormatPriority) -> Result<&Datum> {
        let wanted = priorities.into_priorities();
        wanted
            .iter()
            .find_map(|format| self.items.iter().find(|datum| datum.format == *format))
            .ok_or_else(|| ClipboardError::FormatNotFound {
                wanted: wanted.iter().map(|format| format.id().unwrap_or(0)).collect(),
            })
    }

    /// Content fingerprint over formats and payloads, ignoring the sequence id
    pub fn digest(&self) -> String {
        let mut hasher = Hasher::new();
        for datum in &self.items {
            hasher.update(&datum.format.id().unwrap_or(0).to_le_bytes());
            match &datum.data {
                Some(payload) => hash_payload(&mut hasher, payload),
                None => {
                    hasher.update(&[0]);
                }
            }
        }
        hasher.finalize().to_hex().to_string()
    }
}

fn hash_payload(hasher: &mut Hasher, payload: &Payload) {
    match payload {
        Payload::Text(text) => {
            hasher.update(&[1]);
            hasher.update(&(text.len() as u64).to_le_bytes());
            hasher.update(text.as_bytes());
        }
        Payload::Bytes(bytes) => {
            hasher.update(&[2]);
            hasher.update(&(bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        }
        Payload::Integer(value) => {
            hasher.update(&[3]);
            hasher.update(&value.to_le_bytes());
        }
        Payload::Image(image) => {
            hasher.update(&[4]);
            hasher.update(&image.width().to_le_bytes());
            hasher.update(&image.height().to_le_bytes());
            hasher.update(image.as_raw());
        }
        Payload::List(items) => {
            hasher.update(&[5]);
            hasher.update(&(items.len() as u64).to_le_bytes());
            for item in items {
                hash_payload(hasher, item);
            }
        }
    }
}

impl Default for Clip {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Clip {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq && self.items == other.items
    }
}

impl fmt::Display for Clip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Clip {}; {} element(s), first element ", self.seq, self.items.len())?;
        match self.items.first() {
            Some(first) => write!(f, "{}", first),
            None => f.write_str("None"),
        }
    }
}

impl From<Datum> for Clip {
    fn from(datum: Datum) -> Self {
        Self::from_item(datum)
    }
}

impl From<Payload> for Clip {
    fn from(payload: Payload) -> Self {
        Self::from_item(payload)
    }
}

impl<T: Into<Item>> Add<T> for Clip {
    type Output = Clip;

    /// Appends `other`, keeping this clip's sequence id
    fn add(mut self, other: T) -> Clip {
        self.append(other);
        self
    }
}

impl Index<usize> for Clip {
    type Output = Datum;

    fn index(&self, index: usize) -> &Datum {
        &self.items[index]
    }
}

impl IndexMut<usize> for Clip {
    fn index_mut(&mut self, index: usize) -> &mut Datum {
        &mut self.items[index]
    }
}

impl IntoIterator for Clip {
    type Item = Datum;
    type IntoIter = std::vec::IntoIter<Datum>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Clip {
    type Item = &'a Datum;
    type IntoIter = std::slice::Iter<'a, Datum>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
