//! Whole-state snapshots.
//!
//! A snapshot is the value table followed by the expiry table, each written as a checksummed
//! blob. The same bytes are stored on disk and shipped to a replica on attach. All integers are
//! little-endian.
//!
//! ```text
//! [RKVS magic: 4B][format version: 1B]
//! [values blob]
//! [expiries blob]
//!
//! blob     := [len: 4B][payload][crc32(payload): 4B]
//! values   := [db_count: 4B] { [db name][key_count: 4B] { [key][tag: 1B][value] } }
//! expiries := [db_count: 4B] { [db name][key_count: 4B] { [key][deadline unix ms: 8B] } }
//! ```
//!
//! Strings and byte values are `[len: 4B][bytes]`. Lists and sets are `[count: 4B]` followed by
//! that many byte values.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use bytes::{Buf, BufMut, Bytes};
use itertools::Itertools;
use thiserror::Error;

use crate::store::Value;

pub const SNAPSHOT_MAGIC: &[u8; 4] = b"RKVS";

pub const FORMAT_VERSION: u8 = 1;

const TAG_STRING: u8 = 0;
const TAG_LIST: u8 = 1;
const TAG_SET: u8 = 2;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("unexpected end of data")]
    UnexpectedEof,

    #[error("invalid magic bytes")]
    InvalidMagic,

    #[error("unsupported format version: {0}")]
    UnsupportedVersion(u8),

    #[error("crc32 mismatch (expected {expected:#010x}, got {actual:#010x})")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("unknown value tag: {0}")]
    UnknownTag(u8),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("length {0} does not fit in a 4 byte prefix")]
    TooLong(usize),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Value and expiry tables of every database, with deadlines as absolute unix milliseconds.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    pub values: BTreeMap<String, HashMap<String, Value>>,
    pub expires: BTreeMap<String, HashMap<String, u64>>,
}

impl Snapshot {
    pub fn encode(&self) -> Result<Bytes, FormatError> {
        let mut out = Vec::new();
        out.put_slice(SNAPSHOT_MAGIC);
        out.put_u8(FORMAT_VERSION);

        let mut values = Vec::new();
        put_len(&mut values, self.values.len())?;
        for (db, keys) in &self.values {
            put_bytes(&mut values, db.as_bytes())?;
            put_len(&mut values, keys.len())?;
            for (key, value) in keys.iter().sorted_by(|a, b| a.0.cmp(b.0)) {
                put_bytes(&mut values, key.as_bytes())?;
                put_value(&mut values, value)?;
            }
        }
        put_blob(&mut out, &values)?;

        let mut expires = Vec::new();
        put_len(&mut expires, self.expires.len())?;
        for (db, keys) in &self.expires {
            put_bytes(&mut expires, db.as_bytes())?;
            put_len(&mut expires, keys.len())?;
            for (key, deadline) in keys.iter().sorted_by(|a, b| a.0.cmp(b.0)) {
                put_bytes(&mut expires, key.as_bytes())?;
                expires.put_u64_le(*deadline);
            }
        }
        put_blob(&mut out, &expires)?;

        Ok(Bytes::from(out))
    }

    pub fn decode(mut src: &[u8]) -> Result<Snapshot, FormatError> {
        let buf = &mut src;
        let magic = take(buf, SNAPSHOT_MAGIC.len())?;
        if magic != SNAPSHOT_MAGIC {
            return Err(FormatError::InvalidMagic);
        }
        let version = get_u8(buf)?;
        if version != FORMAT_VERSION {
            return Err(FormatError::UnsupportedVersion(version));
        }

        let mut payload = get_blob(buf)?;
        let payload = &mut payload;
        let mut values = BTreeMap::new();
        for _ in 0..get_count(payload)? {
            let db = get_string(payload)?;
            let count = get_count(payload)?;
            let mut keys = HashMap::with_capacity(capped_capacity(count));
            for _ in 0..count {
                let key = get_string(payload)?;
                let value = get_value(payload)?;
                keys.insert(key, value);
            }
            values.insert(db, keys);
        }

        let mut payload = get_blob(buf)?;
        let payload = &mut payload;
        let mut expires = BTreeMap::new();
        for _ in 0..get_count(payload)? {
            let db = get_string(payload)?;
            let count = get_count(payload)?;
            let mut keys = HashMap::with_capacity(capped_capacity(count));
            for _ in 0..count {
                let key = get_string(payload)?;
                let deadline = get_u64(payload)?;
                keys.insert(key, deadline);
            }
            expires.insert(db, keys);
        }

        Ok(Snapshot { values, expires })
    }
}

/// Writes `data` to `path` through a temporary file that is renamed into place, so a crash
/// mid-write leaves the previous snapshot intact.
pub fn write_file(path: &Path, data: &[u8]) -> Result<(), FormatError> {
    let tmp_path = path.with_extension("tmp");
    let result = (|| {
        let mut file = File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    Ok(result?)
}

pub fn read_file(path: &Path) -> Result<Snapshot, FormatError> {
    let data = fs::read(path)?;
    Snapshot::decode(&data)
}

pub(crate) fn put_len(buf: &mut Vec<u8>, len: usize) -> Result<(), FormatError> {
    let len = u32::try_from(len).map_err(|_| FormatError::TooLong(len))?;
    buf.put_u32_le(len);
    Ok(())
}

pub(crate) fn put_bytes(buf: &mut Vec<u8>, data: &[u8]) -> Result<(), FormatError> {
    put_len(buf, data.len())?;
    buf.put_slice(data);
    Ok(())
}

pub(crate) fn put_blob(buf: &mut Vec<u8>, payload: &[u8]) -> Result<(), FormatError> {
    put_bytes(buf, payload)?;
    buf.put_u32_le(crc32fast::hash(payload));
    Ok(())
}

fn put_value(buf: &mut Vec<u8>, value: &Value) -> Result<(), FormatError> {
    match value {
        Value::String(data) => {
            buf.put_u8(TAG_STRING);
            put_bytes(buf, data)?;
        }
        Value::List(items) => {
            buf.put_u8(TAG_LIST);
            put_len(buf, items.len())?;
            for item in items {
                put_bytes(buf, item)?;
            }
        }
        Value::Set(members) => {
            buf.put_u8(TAG_SET);
            put_len(buf, members.len())?;
            for member in members {
                put_bytes(buf, member)?;
            }
        }
    }
    Ok(())
}

fn get_value(buf: &mut &[u8]) -> Result<Value, FormatError> {
    match get_u8(buf)? {
        TAG_STRING => Ok(Value::String(get_bytes(buf)?)),
        TAG_LIST => {
            let count = get_count(buf)?;
            let mut items = VecDeque::with_capacity(capped_capacity(count));
            for _ in 0..count {
                items.push_back(get_bytes(buf)?);
            }
            Ok(Value::List(items))
        }
        TAG_SET => {
            let mut members = BTreeSet::new();
            for _ in 0..get_count(buf)? {
                members.insert(get_bytes(buf)?);
            }
            Ok(Value::Set(members))
        }
        tag => Err(FormatError::UnknownTag(tag)),
    }
}

fn take<'a>(buf: &mut &'a [u8], len: usize) -> Result<&'a [u8], FormatError> {
    if buf.remaining() < len {
        return Err(FormatError::UnexpectedEof);
    }
    let (head, tail) = buf.split_at(len);
    *buf = tail;
    Ok(head)
}

pub(crate) fn get_u8(buf: &mut &[u8]) -> Result<u8, FormatError> {
    Ok(take(buf, 1)?[0])
}

pub(crate) fn get_u32(buf: &mut &[u8]) -> Result<u32, FormatError> {
    Ok(take(buf, 4)?.get_u32_le())
}

pub(crate) fn get_u64(buf: &mut &[u8]) -> Result<u64, FormatError> {
    Ok(take(buf, 8)?.get_u64_le())
}

pub(crate) fn get_i64(buf: &mut &[u8]) -> Result<i64, FormatError> {
    Ok(take(buf, 8)?.get_i64_le())
}

/// Reads an element count. Every element takes at least its 4 byte length prefix, so a count the
/// remaining bytes cannot hold is rejected before anything is read or reserved.
pub(crate) fn get_count(buf: &mut &[u8]) -> Result<u32, FormatError> {
    let count = get_u32(buf)?;
    if count as usize > buf.remaining() / 4 {
        return Err(FormatError::InvalidData(format!(
            "count {count} exceeds the remaining {} bytes",
            buf.remaining()
        )));
    }
    Ok(count)
}

/// Caps up-front reservation for a decoded count.
pub(crate) fn capped_capacity(count: u32) -> usize {
    (count as usize).min(65_536)
}

pub(crate) fn get_bytes(buf: &mut &[u8]) -> Result<Bytes, FormatError> {
    let len = get_u32(buf)? as usize;
    Ok(Bytes::copy_from_slice(take(buf, len)?))
}

pub(crate) fn get_string(buf: &mut &[u8]) -> Result<String, FormatError> {
    let bytes = get_bytes(buf)?;
    String::from_utf8(bytes.to_vec())
        .map_err(|_| FormatError::InvalidData("name is not valid UTF-8".to_string()))
}

/// Reads one checksummed blob and returns its verified payload.
pub(crate) fn get_blob<'a>(buf: &mut &'a [u8]) -> Result<&'a [u8], FormatError> {
    let len = get_u32(buf)? as usize;
    let payload = take(buf, len)?;
    let expected = get_u32(buf)?;
    let actual = crc32fast::hash(payload);
    if expected != actual {
        return Err(FormatError::ChecksumMismatch { expected, actual });
    }
    Ok(payload)
}
