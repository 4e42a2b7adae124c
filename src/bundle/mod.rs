// src/bundle/mod.rs

//! In-memory model of the game's asset-bundle container.
//!
//! A container is an ordered sequence of named entries behind a fixed header
//! and table of contents. Downstream tooling addresses entries by table index,
//! so decode preserves order and encode re-emits entries exactly as ordered in
//! the handle. Payloads live behind `Arc<[u8]>`: replacing one entry never
//! copies the bytes of its neighbours.

mod codec;

pub use codec::{decode, encode};

use crate::error::{Error, Result};
use std::sync::Arc;

/// Container magic.
pub const MAGIC: [u8; 4] = *b"BND2";

/// The one format version this engine understands.
pub const FORMAT_VERSION: u32 = 1;

/// Fixed header size: magic + version + entry count + total size + CRC.
pub const HEADER_SIZE: usize = 4 + 4 + 4 + 8 + 4;

/// Texture payloads open with width, height and pixel format words.
pub const TEXTURE_HEADER_SIZE: usize = 12;

/// RGBA, 8 bits per channel - the only pixel format the game ships.
pub const PIXEL_FORMAT_RGBA32: u32 = 0;

/// Entry type tags as stored in the table of contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Opaque payload the engine carries through untouched.
    Raw,
    /// Texture pixels with a [`TextureHeader`] prefix.
    Texture,
    /// Spine atlas region table (text).
    Atlas,
    /// Spine binary skeleton.
    Skeleton,
}

impl EntryKind {
    pub fn tag(&self) -> u8 {
        match self {
            EntryKind::Raw => 0,
            EntryKind::Texture => 1,
            EntryKind::Atlas => 2,
            EntryKind::Skeleton => 3,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(EntryKind::Raw),
            1 => Ok(EntryKind::Texture),
            2 => Ok(EntryKind::Atlas),
            3 => Ok(EntryKind::Skeleton),
            other => Err(Error::MalformedContainer(format!(
                "unknown entry type tag {other}"
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EntryKind::Raw => "raw",
            EntryKind::Texture => "texture",
            EntryKind::Atlas => "atlas",
            EntryKind::Skeleton => "skeleton",
        }
    }
}

/// One addressable unit inside a container.
#[derive(Debug, Clone)]
pub struct Entry {
    pub name: String,
    pub kind: EntryKind,
    /// Byte offset recorded in the source container. Informational; encode
    /// rederives the real offset from the table.
    pub offset: u64,
    /// Payload length in bytes.
    pub length: u64,
    pub payload: Arc<[u8]>,
}

impl Entry {
    /// Build a fresh entry; offset is assigned at encode time.
    pub fn new(name: impl Into<String>, kind: EntryKind, payload: Vec<u8>) -> Self {
        let payload: Arc<[u8]> = payload.into();
        Entry {
            name: name.into(),
            kind,
            offset: 0,
            length: payload.len() as u64,
            payload,
        }
    }

    /// Replace the payload, keeping name and kind. Length is updated; offset
    /// goes stale until the next encode.
    pub fn with_payload(&self, payload: Vec<u8>) -> Self {
        let payload: Arc<[u8]> = payload.into();
        Entry {
            name: self.name.clone(),
            kind: self.kind,
            offset: self.offset,
            length: payload.len() as u64,
            payload,
        }
    }
}

/// Decoded container handle.
#[derive(Debug, Clone)]
pub struct Bundle {
    pub version: u32,
    pub entries: Vec<Entry>,
}

impl Bundle {
    pub fn new(entries: Vec<Entry>) -> Self {
        Bundle {
            version: FORMAT_VERSION,
            entries,
        }
    }

    /// Index of the entry with the given name, if present.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    pub fn entry(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Structural equality: same version, same order, same names/kinds and
    /// payload bytes. Offsets are layout detail and excluded.
    pub fn structurally_eq(&self, other: &Bundle) -> bool {
        self.version == other.version
            && self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .zip(&other.entries)
                .all(|(a, b)| a.name == b.name && a.kind == b.kind && a.payload == b.payload)
    }
}

/// Parsed prefix of a texture entry payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureHeader {
    pub width: u32,
    pub height: u32,
    pub pixel_format: u32,
}

impl TextureHeader {
    /// Read the header off a texture payload.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() < TEXTURE_HEADER_SIZE {
            return Err(Error::MalformedContainer(format!(
                "texture payload of {} bytes is shorter than its header",
                payload.len()
            )));
        }
        let width = u32::from_be_bytes(payload[0..4].try_into().unwrap());
        let height = u32::from_be_bytes(payload[4..8].try_into().unwrap());
        let pixel_format = u32::from_be_bytes(payload[8..12].try_into().unwrap());

        let header = TextureHeader {
            width,
            height,
            pixel_format,
        };
        let expected = header.payload_len();
        if payload.len() != expected {
            return Err(Error::MalformedContainer(format!(
                "texture payload is {} bytes, header implies {expected}",
                payload.len()
            )));
        }
        Ok(header)
    }

    /// Total payload length implied by the header.
    pub fn payload_len(&self) -> usize {
        TEXTURE_HEADER_SIZE + (self.width as usize) * (self.height as usize) * 4
    }

    /// Assemble a full texture payload from RGBA pixel bytes.
    pub fn build_payload(width: u32, height: u32, rgba: &[u8]) -> Vec<u8> {
        let mut payload = Vec::with_capacity(TEXTURE_HEADER_SIZE + rgba.len());
        payload.extend_from_slice(&width.to_be_bytes());
        payload.extend_from_slice(&height.to_be_bytes());
        payload.extend_from_slice(&PIXEL_FORMAT_RGBA32.to_be_bytes());
        payload.extend_from_slice(rgba);
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_kind_tags_round_trip() {
        for kind in [
            EntryKind::Raw,
            EntryKind::Texture,
            EntryKind::Atlas,
            EntryKind::Skeleton,
        ] {
            assert_eq!(EntryKind::from_tag(kind.tag()).unwrap(), kind);
        }
        assert!(EntryKind::from_tag(9).is_err());
    }

    #[test]
    fn texture_header_round_trips() {
        let rgba = vec![0u8; 2 * 3 * 4];
        let payload = TextureHeader::build_payload(2, 3, &rgba);
        let header = TextureHeader::parse(&payload).unwrap();
        assert_eq!(header.width, 2);
        assert_eq!(header.height, 3);
        assert_eq!(header.pixel_format, PIXEL_FORMAT_RGBA32);
        assert_eq!(header.payload_len(), payload.len());
    }

    #[test]
    fn truncated_texture_payload_is_rejected() {
        let payload = TextureHeader::build_payload(4, 4, &vec![0u8; 64]);
        assert!(TextureHeader::parse(&payload[..payload.len() - 1]).is_err());
        assert!(TextureHeader::parse(&payload[..8]).is_err());
    }

    #[test]
    fn with_payload_updates_length_only() {
        let entry = Entry::new("char000101.atlas", EntryKind::Atlas, b"old".to_vec());
        let replaced = entry.with_payload(b"longer payload".to_vec());
        assert_eq!(replaced.name, entry.name);
        assert_eq!(replaced.kind, entry.kind);
        assert_eq!(replaced.length, 14);
    }

    #[test]
    fn structural_equality_ignores_offsets() {
        let a = Bundle::new(vec![Entry::new("x", EntryKind::Raw, vec![1, 2, 3])]);
        let mut b = a.clone();
        b.entries[0].offset = 999;
        assert!(a.structurally_eq(&b));

        let c = Bundle::new(vec![Entry::new("x", EntryKind::Raw, vec![9])]);
        assert!(!a.structurally_eq(&c));
    }
}
