//! GLB binary container
//!
//! Layout: a 12-byte header (magic, version, total length) followed by
//! chunks of `(u32 length, u32 type, payload)`. The first chunk must be JSON;
//! an optional BIN chunk follows. Unknown chunk types are skipped.

use std::io::Cursor;

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::LoadError;

/// `glTF` in little-endian
pub const GLB_MAGIC: u32 = 0x4654_6C67;
pub const GLB_VERSION: u32 = 2;
pub const CHUNK_JSON: u32 = 0x4E4F_534A;
pub const CHUNK_BIN: u32 = 0x004E_4942;

const HEADER_LENGTH: usize = 12;

/// Borrowed chunks of a GLB file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Glb<'a> {
    pub json: &'a [u8],
    pub bin: Option<&'a [u8]>,
}

/// True when `bytes` starts with the GLB magic
pub fn is_glb(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && LittleEndian::read_u32(&bytes[..4]) == GLB_MAGIC
}

fn glb_error(message: impl Into<String>) -> LoadError {
    LoadError::Glb(message.into())
}

/// Split a GLB file into its JSON and BIN chunks
pub fn parse_glb(bytes: &[u8]) -> Result<Glb<'_>, LoadError> {
    if bytes.len() < HEADER_LENGTH {
        return Err(glb_error("file is shorter than the 12-byte header"));
    }
    let mut cursor = Cursor::new(bytes);
    let magic = read_u32(&mut cursor)?;
    if magic != GLB_MAGIC {
        return Err(glb_error(format!("bad magic {:#010x}", magic)));
    }
    let version = read_u32(&mut cursor)?;
    if version != GLB_VERSION {
        return Err(glb_error(format!("unsupported container version {}", version)));
    }
    let total_length = read_u32(&mut cursor)? as usize;
    if total_length > bytes.len() {
        return Err(glb_error(format!(
            "header declares {} bytes but the file has {}",
            total_length,
            bytes.len()
        )));
    }

    let mut json = None;
    let mut bin = None;
    let mut offset = HEADER_LENGTH;
    while offset + 8 <= total_length {
        cursor.set_position(offset as u64);
        let length = read_u32(&mut cursor)? as usize;
        let ty = read_u32(&mut cursor)?;
        let start = offset + 8;
        let end = start
            .checked_add(length)
            .filter(|&end| end <= total_length)
            .ok_or_else(|| glb_error(format!("chunk at offset {} is truncated", offset)))?;
        let payload = &bytes[start..end];

        match ty {
            CHUNK_JSON if json.is_none() => json = Some(payload),
            CHUNK_BIN if bin.is_none() => bin = Some(payload),
            CHUNK_JSON | CHUNK_BIN => tracing::warn!("Ignoring repeated GLB chunk {:#010x}", ty),
            other => tracing::debug!("Skipping unknown GLB chunk {:#010x}", other),
        }
        // Chunks are 4-byte aligned
        offset = end.next_multiple_of(4);
    }

    let json = json.ok_or_else(|| glb_error("missing JSON chunk"))?;
    Ok(Glb { json, bin })
}

fn read_u32(cursor: &mut Cursor<&[u8]>) -> Result<u32, LoadError> {
    cursor
        .read_u32::<LittleEndian>()
        .map_err(|e| glb_error(e.to_string()))
}

/// Assemble a GLB file from JSON and an optional BIN payload, padding both chunks
pub fn write_glb(json: &[u8], bin: Option<&[u8]>) -> Vec<u8> {
    let padded = |len: usize| len.next_multiple_of(4);
    let json_length = padded(json.len());
    let bin_length = bin.map(|b| padded(b.len()));
    let total = HEADER_LENGTH + 8 + json_length + bin_length.map_or(0, |l| l + 8);

    let mut out = Vec::with_capacity(total);
    // Writes into a Vec cannot fail
    let _ = out.write_u32::<LittleEndian>(GLB_MAGIC);
    let _ = out.write_u32::<LittleEndian>(GLB_VERSION);
    let _ = out.write_u32::<LittleEndian>(total as u32);

    let _ = out.write_u32::<LittleEndian>(json_length as u32);
    let _ = out.write_u32::<LittleEndian>(CHUNK_JSON);
    out.extend_from_slice(json);
    out.resize(HEADER_LENGTH + 8 + json_length, b' ');

    if let (Some(bin), Some(bin_length)) = (bin, bin_length) {
        let _ = out.write_u32::<LittleEndian>(bin_length as u32);
        let _ = out.write_u32::<LittleEndian>(CHUNK_BIN);
        out.extend_from_slice(bin);
        out.resize(total, 0);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn written_container_parses_back() {
        let json = br#"{"asset":{"version":"2.0"}}"#;
        let bin = [1u8, 2, 3, 4, 5];
        let bytes = write_glb(json, Some(&bin));

        assert!(is_glb(&bytes));
        assert_eq!(bytes.len() % 4, 0);
        let glb = parse_glb(&bytes).unwrap();
        assert_eq!(&glb.json[..json.len()], json);
        assert!(glb.json[json.len()..].iter().all(|&b| b == b' '));
        assert_eq!(&glb.bin.unwrap()[..5], &bin);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut bytes = write_glb(b"{}", None);
        bytes[0] = b'x';
        assert!(!is_glb(&bytes));
        assert!(matches!(parse_glb(&bytes), Err(LoadError::Glb(_))));
    }

    #[test]
    fn version_one_is_rejected() {
        let mut bytes = write_glb(b"{}", None);
        bytes[4] = 1;
        let err = parse_glb(&bytes).unwrap_err();
        assert!(err.to_string().contains("version 1"));
    }

    #[test]
    fn truncated_chunk_is_rejected() {
        let mut bytes = write_glb(b"{}", Some(&[0; 8]));
        // Claim a BIN chunk longer than the file
        let bin_header = bytes.len() - 16;
        bytes[bin_header..bin_header + 4].copy_from_slice(&64u32.to_le_bytes());
        let err = parse_glb(&bytes).unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn missing_json_chunk_is_rejected() {
        let mut bytes = write_glb(b"{}", None);
        bytes[16..20].copy_from_slice(&0x1234_5678u32.to_le_bytes());
        let err = parse_glb(&bytes).unwrap_err();
        assert!(err.to_string().contains("missing JSON chunk"));
    }
}
