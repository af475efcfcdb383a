//! Typed value encoding for cache entries.
//!
//! Every entry is stored as `[shape tag][compression marker][payload]`. The
//! shape tag is one of `s` (scalar), `l` (list), `t` (set) or `m` (map). The
//! marker is `-` for a payload stored as-is and `z` for raw deflate. Short
//! payloads are never compressed: the cache holds many tiny values and the
//! deflate overhead would dominate them.
//!
//! A non-empty list or set payload starts with the separator, so that an
//! empty collection and a collection holding one empty string differ.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::error::CacheError;

/// Separates the elements of list and set values. Forbidden in stored names.
pub const LIST_SEPARATOR: char = '\u{1f}';

/// Payloads up to this many bytes are stored uncompressed.
pub const COMPRESSION_THRESHOLD: usize = 64;

const COMPRESSION_LEVEL: u32 = 6;

const MARKER_STORED: u8 = b'-';
const MARKER_DEFLATE: u8 = b'z';

/// A typed cache value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// A single string.
    Scalar(String),
    /// An ordered list of strings.
    List(Vec<String>),
    /// A set of strings, stored sorted.
    Set(BTreeSet<String>),
    /// A string-keyed map of arbitrary JSON values.
    Map(BTreeMap<String, serde_json::Value>),
}

impl Value {
    /// The one-byte shape tag of this value.
    pub fn shape_tag(&self) -> u8 {
        match self {
            Value::Scalar(_) => b's',
            Value::List(_) => b'l',
            Value::Set(_) => b't',
            Value::Map(_) => b'm',
        }
    }

    /// Human-readable shape name.
    pub fn shape_name(&self) -> &'static str {
        match self {
            Value::Scalar(_) => "scalar",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::Map(_) => "map",
        }
    }

    /// The scalar string, if this is a scalar.
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Consumes the value, returning the list if this is a list.
    pub fn into_list(self) -> Option<Vec<String>> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// Consumes the value, returning the set if this is a set.
    pub fn into_set(self) -> Option<BTreeSet<String>> {
        match self {
            Value::Set(s) => Some(s),
            _ => None,
        }
    }

    /// Consumes the value, returning the map if this is a map.
    pub fn into_map(self) -> Option<BTreeMap<String, serde_json::Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    fn to_payload(&self) -> Result<String, CacheError> {
        Ok(match self {
            Value::Scalar(s) => s.clone(),
            Value::List(items) => join_items(items.iter()),
            Value::Set(items) => join_items(items.iter()),
            Value::Map(map) => {
                serde_json::to_string(map).map_err(|e| CacheError::Serialization {
                    reason: e.to_string(),
                })?
            }
        })
    }

    fn from_payload(tag: u8, payload: String) -> Result<Self, CacheError> {
        match tag {
            b's' => Ok(Value::Scalar(payload)),
            b'l' => Ok(Value::List(split_items(&payload)?)),
            b't' => Ok(Value::Set(split_items(&payload)?.into_iter().collect())),
            b'm' => serde_json::from_str(&payload)
                .map(Value::Map)
                .map_err(|e| CacheError::InvalidValue {
                    reason: format!("map payload: {e}"),
                }),
            other => Err(CacheError::InvalidValue {
                reason: format!("unknown shape tag {:?}", other as char),
            }),
        }
    }
}

fn join_items<'a>(items: impl Iterator<Item = &'a String>) -> String {
    let mut payload = String::new();
    for item in items {
        payload.push(LIST_SEPARATOR);
        payload.push_str(item);
    }
    payload
}

fn split_items(payload: &str) -> Result<Vec<String>, CacheError> {
    if payload.is_empty() {
        return Ok(Vec::new());
    }
    let rest = payload
        .strip_prefix(LIST_SEPARATOR)
        .ok_or_else(|| CacheError::InvalidValue {
            reason: "list payload does not start with the separator".to_string(),
        })?;
    Ok(rest.split(LIST_SEPARATOR).map(str::to_string).collect())
}

/// Encodes a value into its on-disk byte representation.
pub fn encode(value: &Value) -> Result<Vec<u8>, CacheError> {
    let payload = value.to_payload()?;
    let mut out = Vec::with_capacity(payload.len() + 2);
    out.push(value.shape_tag());
    if payload.len() <= COMPRESSION_THRESHOLD {
        out.push(MARKER_STORED);
        out.extend_from_slice(payload.as_bytes());
    } else {
        out.push(MARKER_DEFLATE);
        let mut encoder = DeflateEncoder::new(out, Compression::new(COMPRESSION_LEVEL));
        encoder
            .write_all(payload.as_bytes())
            .map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })?;
        out = encoder.finish().map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
    }
    Ok(out)
}

/// Decodes bytes produced by [`encode`].
pub fn decode(bytes: &[u8]) -> Result<Value, CacheError> {
    let [tag, marker, body @ ..] = bytes else {
        return Err(CacheError::InvalidValue {
            reason: format!("entry too short ({} bytes)", bytes.len()),
        });
    };
    let payload = match *marker {
        MARKER_STORED => String::from_utf8(body.to_vec()).map_err(|e| CacheError::InvalidValue {
            reason: e.to_string(),
        })?,
        MARKER_DEFLATE => {
            let mut text = String::new();
            DeflateDecoder::new(body)
                .read_to_string(&mut text)
                .map_err(|e| CacheError::InvalidValue {
                    reason: format!("deflate payload: {e}"),
                })?;
            text
        }
        other => {
            return Err(CacheError::InvalidValue {
                reason: format!("unknown compression marker {:?}", other as char),
            })
        }
    };
    Value::from_payload(*tag, payload)
}
