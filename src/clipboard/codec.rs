//! clipcards - Payload encoding
//!
//! Converts payloads to and from the raw bytes the native clipboard stores,
//! one codec per format. Formats without a codec travel as raw bytes.

use std::borrow::Cow;
use std::io::Cursor;

use super::format::{register, Format};
use super::models::Payload;

type Decode = fn(&[u8]) -> Payload;
type Encode = fn(&Payload) -> Option<Vec<u8>>;

/// Which formats a codec handles
#[derive(Debug, Clone, Copy)]
enum FormatKey {
    Standard(u32),
    Registered(&'static str),
}

impl FormatKey {
    fn matches(self, format: &Format) -> bool {
        match (self, format.id()) {
            (FormatKey::Standard(id), Some(format_id)) => id == format_id,
            (FormatKey::Registered(name), Some(format_id)) => register(name) == Some(format_id),
            (_, None) => false,
        }
    }
}

struct Codec {
    key: FormatKey,
    decode: Decode,
    encode: Encode,
}

const CODECS: &[Codec] = &[
    Codec {
        key: FormatKey::Standard(Format::UNICODETEXT),
        decode: decode_utf16,
        encode: encode_utf16,
    },
    Codec {
        key: FormatKey::Standard(Format::TEXT),
        decode: decode_narrow,
        encode: encode_narrow,
    },
    Codec {
        key: FormatKey::Standard(Format::OEMTEXT),
        decode: decode_narrow,
        encode: encode_narrow,
    },
    Codec {
        key: FormatKey::Registered(Format::PNG_NAME),
        decode: decode_png,
        encode: encode_png,
    },
    Codec {
        key: FormatKey::Registered(Format::HTML_NAME),
        decode: decode_utf8,
        encode: encode_utf8,
    },
];

static FALLBACK: Codec = Codec {
    key: FormatKey::Standard(0),
    decode: decode_raw,
    encode: encode_raw,
};

fn codec_for(format: &Format) -> &'static Codec {
    CODECS
        .iter()
        .find(|codec| codec.key.matches(format))
        .unwrap_or(&FALLBACK)
}

/// Payload for the raw bytes of `format`
pub fn decode(format: &Format, bytes: &[u8]) -> Payload {
    (codec_for(format).decode)(bytes)
}

/// Raw bytes of `payload` for `format`; `None` if it has no such rendering
pub fn encode(payload: &Payload, format: &Format) -> Option<Vec<u8>> {
    (codec_for(format).encode)(payload)
}

fn text_of(payload: &Payload) -> Cow<'_, str> {
    match payload {
        Payload::Text(text) => Cow::Borrowed(text),
        Payload::Bytes(bytes) => String::from_utf8_lossy(bytes),
        other => Cow::Owned(other.to_text()),
    }
}

fn until_nul(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|byte| *byte == 0) {
        Some(end) => &bytes[..end],
        None => bytes,
    }
}

fn decode_utf16(bytes: &[u8]) -> Payload {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|unit| *unit != 0)
        .collect();
    Payload::Text(String::from_utf16_lossy(&units))
}

fn encode_utf16(payload: &Payload) -> Option<Vec<u8>> {
    let mut out: Vec<u8> = text_of(payload)
        .encode_utf16()
        .flat_map(|unit| unit.to_le_bytes())
        .collect();
    out.extend_from_slice(&[0, 0]);
    Some(out)
}

fn decode_narrow(bytes: &[u8]) -> Payload {
    Payload::Text(String::from_utf8_lossy(until_nul(bytes)).into_owned())
}

fn encode_narrow(payload: &Payload) -> Option<Vec<u8>> {
    let mut out = text_of(payload).into_owned().into_bytes();
    out.push(0);
    Some(out)
}

fn decode_utf8(bytes: &[u8]) -> Payload {
    Payload::Text(String::from_utf8_lossy(until_nul(bytes)).into_owned())
}

fn encode_utf8(payload: &Payload) -> Option<Vec<u8>> {
    Some(text_of(payload).into_owned().into_bytes())
}

fn decode_png(bytes: &[u8]) -> Payload {
    match image::load_from_memory_with_format(bytes, image::ImageFormat::Png) {
        Ok(img) => Payload::Image(img.into_rgba8()),
        Err(e) => {
            log::warn!("[Codec] Failed to decode PNG data: {}", e);
            Payload::Bytes(bytes.to_vec())
        }
    }
}

fn encode_png(payload: &Payload) -> Option<Vec<u8>> {
    match payload {
        Payload::Image(img) => {
            let mut png_data = Vec::new();
            let mut cursor = Cursor::new(&mut png_data);
            if let Err(e) = img.write_to(&mut cursor, image::ImageFormat::Png) {
                log::error!("[Codec] Failed to write PNG data: {}", e);
                return None;
            }
            Some(png_data)
        }
        Payload::Bytes(bytes) => Some(bytes.clone()),
        _ => None,
    }
}

fn decode_raw(bytes: &[u8]) -> Payload {
    Payload::Bytes(bytes.to_vec())
}

fn encode_raw(payload: &Payload) -> Option<Vec<u8>> {
    match payload {
        Payload::Bytes(bytes) => Some(bytes.clone()),
        Payload::Text(text) => Some(text.as_bytes().to_vec()),
        Payload::Integer(value) => Some(value.to_string().into_bytes()),
        Payload::Image(_) => encode_png(payload),
        Payload::List(_) => None,
    }
}
