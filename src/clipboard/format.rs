//! clipcards - Clipboard formats
//!
//! A format is an OS clipboard format id plus a readable name. Standard ids
//! resolve from a static table; private ids resolve through the process-wide
//! registered-name table.
//! Reference: https://learn.microsoft.com/windows/win32/dataxchg/standard-clipboard-formats

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use once_cell::sync::Lazy;
use parking_lot::RwLock;

/// Standard clipboard formats, named without their `CF_` prefix
const STANDARD_FORMATS: &[(u32, &str)] = &[
    (1, "TEXT"),
    (2, "BITMAP"),
    (3, "METAFILEPICT"),
    (4, "SYLK"),
    (5, "DIF"),
    (6, "TIFF"),
    (7, "OEMTEXT"),
    (8, "DIB"),
    (9, "PALETTE"),
    (10, "PENDATA"),
    (11, "RIFF"),
    (12, "WAVE"),
    (13, "UNICODETEXT"),
    (14, "ENHMETAFILE"),
    (15, "HDROP"),
    (16, "LOCALE"),
    (17, "DIBV5"),
    (0x0080, "OWNERDISPLAY"),
    (0x0081, "DSPTEXT"),
    (0x0082, "DSPBITMAP"),
    (0x0083, "DSPMETAFILEPICT"),
    (0x008E, "DSPENHMETAFILE"),
    (0x0200, "PRIVATEFIRST"),
    (0x02FF, "PRIVATELAST"),
    (0x0300, "GDIOBJFIRST"),
    (0x03FF, "GDIOBJLAST"),
];

/// Formats the native bridge cannot transport
const UNSUPPORTED_FORMATS: &[u32] = &[Format::METAFILEPICT];

/// First id of the OS range for registered formats
const REGISTERED_FIRST: u32 = 0xC000;

const UNKNOWN_NAME: &str = "UNKNOWN";
const NULL_NAME: &str = "NULL";

/// Registered format names seen by this process
struct Registered {
    by_name: HashMap<String, u32>,
    by_id: HashMap<u32, String>,
    #[cfg_attr(windows, allow(dead_code))]
    next: u32,
}

static REGISTERED: Lazy<RwLock<Registered>> = Lazy::new(|| {
    RwLock::new(Registered {
        by_name: HashMap::new(),
        by_id: HashMap::new(),
        next: REGISTERED_FIRST,
    })
});

/// Register (or look up) a private format name, returning its id
pub fn register(name: &str) -> Option<u32> {
    if let Some(id) = REGISTERED.read().by_name.get(name) {
        return Some(*id);
    }

    let mut registered = REGISTERED.write();
    if let Some(id) = registered.by_name.get(name) {
        return Some(*id);
    }

    #[cfg(windows)]
    let id = super::native::win32::register_format(name)?;
    #[cfg(not(windows))]
    let id = {
        let id = registered.next;
        registered.next += 1;
        id
    };

    log::debug!("[Format] Registered '{}' as {}", name, id);
    registered.by_name.insert(name.to_string(), id);
    registered.by_id.insert(id, name.to_string());
    Some(id)
}

/// Name registered for a private format id
pub fn registered_name(id: u32) -> Option<String> {
    if let Some(name) = REGISTERED.read().by_id.get(&id) {
        return Some(name.clone());
    }

    #[cfg(windows)]
    {
        let name = super::native::win32::format_name(id)?;
        let mut registered = REGISTERED.write();
        registered.by_name.insert(name.clone(), id);
        registered.by_id.insert(id, name.clone());
        Some(name)
    }
    #[cfg(not(windows))]
    {
        None
    }
}

/// One clipboard content encoding
///
/// Equality and hashing consider only the id; the name is informational.
#[derive(Debug, Clone)]
pub struct Format {
    id: Option<u32>,
    name: String,
}

impl Format {
    pub const TEXT: u32 = 1;
    pub const BITMAP: u32 = 2;
    pub const METAFILEPICT: u32 = 3;
    pub const OEMTEXT: u32 = 7;
    pub const DIB: u32 = 8;
    pub const UNICODETEXT: u32 = 13;
    pub const HDROP: u32 = 15;

    /// Registered name used for PNG-encoded images
    pub const PNG_NAME: &'static str = "PNG";
    /// Registered name used for HTML fragments
    pub const HTML_NAME: &'static str = "HTML Format";

    /// Format for an OS id, with its name resolved
    pub fn new(id: u32) -> Self {
        let name = Self::resolve(id).unwrap_or_else(|| UNKNOWN_NAME.to_string());
        Self { id: Some(id), name }
    }

    /// The absent format of a null datum
    pub fn null() -> Self {
        Self {
            id: None,
            name: NULL_NAME.to_string(),
        }
    }

    /// Format for a registered (private) name, registering it if needed
    pub fn registered(name: &str) -> Self {
        match register(name) {
            Some(id) => Self {
                id: Some(id),
                name: name.to_string(),
            },
            None => {
                log::warn!("[Format] Could not register format '{}'", name);
                Self {
                    id: None,
                    name: name.to_string(),
                }
            }
        }
    }

    pub fn png() -> Self {
        Self::registered(Self::PNG_NAME)
    }

    pub fn html() -> Self {
        Self::registered(Self::HTML_NAME)
    }

    /// Readable name for `id`: the standard table first, then the registry
    pub fn resolve(id: u32) -> Option<String> {
        STANDARD_FORMATS
            .iter()
            .find(|(standard, _)| *standard == id)
            .map(|(_, name)| name.to_string())
            .or_else(|| registered_name(id))
    }

    pub fn id(&self) -> Option<u32> {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Override the informational name; equality is unaffected
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.set_name(name);
        self
    }

    pub fn is_null(&self) -> bool {
        self.id.is_none()
    }

    /// Whether payloads of this format can cross the native bridge
    pub fn is_supported(&self) -> bool {
        match self.id {
            Some(id) => !UNSUPPORTED_FORMATS.contains(&id),
            None => true,
        }
    }

    /// Whether this is the registered format called `name`
    pub fn is_named(&self, name: &str) -> bool {
        match self.id {
            Some(id) if id >= REGISTERED_FIRST => register(name) == Some(id),
            _ => false,
        }
    }
}

impl Default for Format {
    fn default() -> Self {
        Self::null()
    }
}

impl From<u32> for Format {
    fn from(id: u32) -> Self {
        Self::new(id)
    }
}

impl From<&Format> for Format {
    fn from(format: &Format) -> Self {
        format.clone()
    }
}

impl PartialEq for Format {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Format {}

impl PartialEq<u32> for Format {
    fn eq(&self, other: &u32) -> bool {
        self.id == Some(*other)
    }
}

impl Hash for Format {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "{} ({})", self.name, id),
            None => write!(f, "{} (0)", NULL_NAME),
        }
    }
}
