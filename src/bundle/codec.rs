// src/bundle/codec.rs

//! Binary codec for the asset-bundle container.
//!
//! Layout, all integers big-endian:
//!
//! ```text
//! header   : magic "BND2" | version u32 | entry_count u32
//!            | total_size u64 | payload_crc32 u32          (24 bytes)
//! toc      : entry_count x { name_len u16 | name utf-8
//!            | type_tag u8 | flags u8 | offset u64 | length u64 }
//! payloads : at recorded offsets, 4-byte aligned, zero padding
//! ```
//!
//! The CRC covers entry payload bytes in table order, so it is independent of
//! padding. Encode rederives every offset, the total size and the CRC from the
//! entry table; decode followed by encode reproduces a canonical container
//! byte-for-byte.

use super::{Bundle, Entry, EntryKind, FORMAT_VERSION, HEADER_SIZE, MAGIC};
use crate::error::{Error, Result};
use std::sync::Arc;

/// Payloads are aligned to this boundary, padded with zeros.
const PAYLOAD_ALIGN: usize = 4;

/// Per-entry fixed table cost: name_len + tag + flags + offset + length.
const TOC_FIXED: usize = 2 + 1 + 1 + 8 + 8;

fn align_up(value: usize, align: usize) -> usize {
    value.div_ceil(align) * align
}

fn payload_crc(entries: &[Entry]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    for entry in entries {
        hasher.update(&entry.payload);
    }
    hasher.finalize()
}

/// Bounds-checked big-endian reads against the container buffer.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Reader { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or_else(|| {
            Error::MalformedContainer("length overflow in table".to_string())
        })?;
        if end > self.bytes.len() {
            return Err(Error::MalformedContainer(format!(
                "table runs past the container: need {end} bytes, have {}",
                self.bytes.len()
            )));
        }
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.take(2)?.try_into().unwrap()))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }
}

/// Decode a container into a [`Bundle`] handle.
///
/// Structural violations - bad magic, unsupported version, a table
/// inconsistent with the declared entry count, out-of-bounds offsets, a total
/// size disagreeing with the byte length, or a CRC mismatch - surface as
/// [`Error::MalformedContainer`].
pub fn decode(bytes: &[u8]) -> Result<Bundle> {
    if bytes.len() < HEADER_SIZE {
        return Err(Error::MalformedContainer(format!(
            "{} bytes is shorter than the container header",
            bytes.len()
        )));
    }

    let mut reader = Reader::new(bytes);
    let magic = reader.take(4)?;
    if magic != MAGIC {
        return Err(Error::MalformedContainer(format!(
            "bad magic {:02x?}",
            magic
        )));
    }

    let version = reader.u32()?;
    if version != FORMAT_VERSION {
        return Err(Error::MalformedContainer(format!(
            "unsupported format version {version}"
        )));
    }

    let entry_count = reader.u32()? as usize;
    let total_size = reader.u64()?;
    let declared_crc = reader.u32()?;

    if total_size != bytes.len() as u64 {
        return Err(Error::MalformedContainer(format!(
            "declared size {total_size} but container is {} bytes",
            bytes.len()
        )));
    }

    let mut records = Vec::with_capacity(entry_count.min(1024));
    for index in 0..entry_count {
        let name_len = reader.u16()? as usize;
        let name_bytes = reader.take(name_len)?;
        let name = std::str::from_utf8(name_bytes)
            .map_err(|_| {
                Error::MalformedContainer(format!("entry {index} name is not UTF-8"))
            })?
            .to_string();

        let kind = EntryKind::from_tag(reader.u8()?)?;
        let flags = reader.u8()?;
        if flags != 0 {
            return Err(Error::MalformedContainer(format!(
                "entry '{name}' carries unknown flags {flags:#04x}"
            )));
        }

        let offset = reader.u64()?;
        let length = reader.u64()?;

        let end = offset.checked_add(length).ok_or_else(|| {
            Error::MalformedContainer(format!("entry '{name}' offset overflows"))
        })?;
        if end > total_size {
            return Err(Error::MalformedContainer(format!(
                "entry '{name}' spans {offset}..{end}, past the container end"
            )));
        }

        records.push((name, kind, offset, length));
    }

    let table_end = reader.pos as u64;
    let mut entries = Vec::with_capacity(records.len());
    for (name, kind, offset, length) in records {
        if offset < table_end {
            return Err(Error::MalformedContainer(format!(
                "entry '{name}' payload overlaps the table"
            )));
        }
        let start = offset as usize;
        let payload: Arc<[u8]> = Arc::from(&bytes[start..start + length as usize]);
        entries.push(Entry {
            name,
            kind,
            offset,
            length,
            payload,
        });
    }

    let actual_crc = payload_crc(&entries);
    if actual_crc != declared_crc {
        return Err(Error::MalformedContainer(format!(
            "payload CRC mismatch: header says {declared_crc:#010x}, computed {actual_crc:#010x}"
        )));
    }

    Ok(Bundle { version, entries })
}

/// Encode a [`Bundle`] back into container bytes.
///
/// Every offset/length field, the total size and the payload CRC are
/// rederived from the entry table; untouched payloads are written back
/// byte-for-byte. Encoding a freshly decoded canonical container reproduces
/// the input exactly.
pub fn encode(bundle: &Bundle) -> Result<Vec<u8>> {
    let mut table_size = 0usize;
    for entry in &bundle.entries {
        if entry.name.len() > u16::MAX as usize {
            return Err(Error::EncodeFailure(format!(
                "entry name of {} bytes exceeds the table limit",
                entry.name.len()
            )));
        }
        table_size += TOC_FIXED + entry.name.len();
    }

    // Lay out payloads after the table, each aligned.
    let mut offsets = Vec::with_capacity(bundle.entries.len());
    let mut cursor = align_up(HEADER_SIZE + table_size, PAYLOAD_ALIGN);
    for entry in &bundle.entries {
        offsets.push(cursor as u64);
        cursor = align_up(cursor + entry.payload.len(), PAYLOAD_ALIGN);
    }
    // No padding after the last payload: total size is exact.
    let total_size = match bundle.entries.last() {
        Some(last) => offsets[offsets.len() - 1] as usize + last.payload.len(),
        None => HEADER_SIZE,
    };

    let crc = payload_crc(&bundle.entries);

    let mut out = Vec::with_capacity(total_size);
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&bundle.version.to_be_bytes());
    out.extend_from_slice(&(bundle.entries.len() as u32).to_be_bytes());
    out.extend_from_slice(&(total_size as u64).to_be_bytes());
    out.extend_from_slice(&crc.to_be_bytes());

    for (entry, offset) in bundle.entries.iter().zip(&offsets) {
        out.extend_from_slice(&(entry.name.len() as u16).to_be_bytes());
        out.extend_from_slice(entry.name.as_bytes());
        out.push(entry.kind.tag());
        out.push(0); // flags
        out.extend_from_slice(&offset.to_be_bytes());
        out.extend_from_slice(&(entry.payload.len() as u64).to_be_bytes());
    }

    for (entry, offset) in bundle.entries.iter().zip(&offsets) {
        // Zero padding up to the assigned offset.
        out.resize(*offset as usize, 0);
        out.extend_from_slice(&entry.payload);
    }

    if out.len() != total_size {
        return Err(Error::EncodeFailure(format!(
            "laid out {total_size} bytes but wrote {}",
            out.len()
        )));
    }

    Ok(out)
}
