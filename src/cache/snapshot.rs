//! Snapshot Codec Module
//!
//! Line-delimited JSON encoding of `(key, value, expires_at)` records.
//!
//! Each line is one record:
//! `{"key":"k","value":{"kind":"i64","data":5},"expires_at":null}`.
//! A record whose value kind this build cannot decode is skipped; a line
//! that is not a record at all fails the whole stream.

use std::io::{BufRead, BufReader, BufWriter, Read, Write};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cache::{Item, Value};
use crate::error::{CacheError, Result};

#[derive(Serialize)]
struct RecordRef<'a> {
    key: &'a str,
    value: &'a Value,
    expires_at: Option<i64>,
}

// The value stays untyped until the record itself is known to be well formed.
#[derive(Deserialize)]
struct RawRecord {
    key: String,
    value: serde_json::Value,
    expires_at: Option<i64>,
}

// == Write ==
/// Writes every item as one line. Returns the number of records written.
pub fn write_items<'a, W, I>(writer: W, items: I) -> Result<usize>
where
    W: Write,
    I: IntoIterator<Item = (&'a String, &'a Item)>,
{
    let mut out = BufWriter::new(writer);
    let mut written = 0;

    for (key, item) in items {
        let record = RecordRef {
            key,
            value: &item.value,
            expires_at: item.expires_at,
        };
        serde_json::to_writer(&mut out, &record)?;
        out.write_all(b"\n")?;
        written += 1;
    }

    out.flush()?;
    Ok(written)
}

// == Read ==
/// Decodes a whole stream into memory before returning.
///
/// Callers insert only after this succeeds, so a corrupt stream never
/// leaves partially restored state behind. Expired records are returned
/// too; filtering is up to the caller.
pub fn read_items<R: Read>(reader: R) -> Result<Vec<(String, Item)>> {
    let reader = BufReader::new(reader);
    let mut items = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let raw: RawRecord = serde_json::from_str(&line).map_err(|e| {
            CacheError::Serialization(format!("malformed record on line {}: {}", index + 1, e))
        })?;

        match serde_json::from_value::<Value>(raw.value) {
            Ok(value) => items.push((raw.key, Item::with_deadline(value, raw.expires_at))),
            Err(e) => {
                warn!("Skipping snapshot record {:?}: undecodable value ({})", raw.key, e);
            }
        }
    }

    Ok(items)
}
