//! clipcards - In-memory clipboard backend
//!
//! Behaves like the Windows clipboard closely enough to exercise the access
//! core: one shared store, per-endpoint session ownership, and a sequence
//! counter bumped by every empty and every successful set.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{NativeClipboard, NativeError};

static NEXT_ENDPOINT: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
struct Store {
    entries: Vec<(u32, Vec<u8>)>,
    sequence: u32,
    open_by: Option<u64>,
    denied_opens: u32,
    unavailable: HashSet<u32>,
    rejected: HashSet<u32>,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            sequence: 1,
            open_by: None,
            denied_opens: 0,
            unavailable: HashSet::new(),
            rejected: HashSet::new(),
        }
    }
}

/// Shared in-memory clipboard; each [`connect`](Self::connect)ed endpoint
/// acts as a separate owner of the same store
#[derive(Debug)]
pub struct MemoryClipboard {
    endpoint: u64,
    store: Arc<Mutex<Store>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self {
            endpoint: NEXT_ENDPOINT.fetch_add(1, Ordering::Relaxed),
            store: Arc::new(Mutex::new(Store::default())),
        }
    }

    /// New owner endpoint on the same clipboard store
    pub fn connect(&self) -> Self {
        Self {
            endpoint: NEXT_ENDPOINT.fetch_add(1, Ordering::Relaxed),
            store: Arc::clone(&self.store),
        }
    }

    /// Replace the contents the way another process would, bypassing sessions
    ///
    /// A repeated format keeps its first position and its last data.
    pub fn external_write<D: AsRef<[u8]>>(&self, entries: &[(u32, D)]) {
        let mut store = self.store.lock();
        store.entries.clear();
        store.sequence += 1;
        for (format, data) in entries {
            let data = data.as_ref().to_vec();
            match store.entries.iter_mut().find(|(id, _)| id == format) {
                Some(entry) => entry.1 = data,
                None => store.entries.push((*format, data)),
            }
            store.sequence += 1;
        }
    }

    /// Snapshot of the raw stored entries
    pub fn contents(&self) -> Vec<(u32, Vec<u8>)> {
        self.store.lock().entries.clone()
    }

    pub fn is_open(&self) -> bool {
        self.store.lock().open_by.is_some()
    }

    /// Close whatever session is open, as if its owner went away
    pub fn drop_session(&self) {
        self.store.lock().open_by = None;
    }

    /// Fail the next `count` open calls with access denied
    pub fn deny_opens(&self, count: u32) {
        self.store.lock().denied_opens = count;
    }

    /// Keep advertising `format` but fail every fetch of it
    pub fn make_unavailable(&self, format: u32) {
        self.store.lock().unavailable.insert(format);
    }

    /// Fail every set of `format` with an invalid handle
    pub fn reject(&self, format: u32) {
        self.store.lock().rejected.insert(format);
    }

    fn require_open(&self, store: &Store) -> Result<(), NativeError> {
        match store.open_by {
            Some(owner) if owner == self.endpoint => Ok(()),
            _ => Err(NativeError::NotOpen),
        }
    }
}

impl Default for MemoryClipboard {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeClipboard for MemoryClipboard {
    fn open(&mut self) -> Result<(), NativeError> {
        let mut store = self.store.lock();
        if store.denied_opens > 0 {
            store.denied_opens -= 1;
            return Err(NativeError::AccessDenied);
        }
        match store.open_by {
            Some(owner) if owner != self.endpoint => Err(NativeError::AccessDenied),
            _ => {
                store.open_by = Some(self.endpoint);
                Ok(())
            }
        }
    }

    fn close(&mut self) -> Result<(), NativeError> {
        let mut store = self.store.lock();
        self.require_open(&store)?;
        store.open_by = None;
        Ok(())
    }

    fn empty(&mut self) -> Result<(), NativeError> {
        let mut store = self.store.lock();
        self.require_open(&store)?;
        store.entries.clear();
        store.sequence += 1;
        Ok(())
    }

    fn next_format(&self, after: u32) -> Option<u32> {
        let store = self.store.lock();
        self.require_open(&store).ok()?;
        let start = if after == 0 {
            0
        } else {
            store.entries.iter().position(|(format, _)| *format == after)? + 1
        };
        store.entries.get(start).map(|(format, _)| *format)
    }

    fn get(&self, format: u32) -> Result<Vec<u8>, NativeError> {
        let store = self.store.lock();
        self.require_open(&store)?;
        if store.unavailable.contains(&format) {
            return Err(NativeError::FormatUnavailable(format));
        }
        store
            .entries
            .iter()
            .find(|(id, _)| *id == format)
            .map(|(_, data)| data.clone())
            .ok_or(NativeError::FormatUnavailable(format))
    }

    fn set(&mut self, format: u32, data: &[u8]) -> Result<(), NativeError> {
        let mut store = self.store.lock();
        self.require_open(&store)?;
        if store.rejected.contains(&format) {
            return Err(NativeError::InvalidHandle);
        }
        match store.entries.iter_mut().find(|(id, _)| *id == format) {
            Some(entry) => entry.1 = data.to_vec(),
            None => store.entries.push((format, data.to_vec())),
        }
        store.sequence += 1;
        Ok(())
    }

    fn sequence(&self) -> u32 {
        self.store.lock().sequence
    }

    fn owner(&self) -> Option<isize> {
        self.store.lock().open_by.map(|owner| owner as isize)
    }
}
