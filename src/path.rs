//! Dotted-path addressing into a document.
//!
//! A path such as `analytics.requests.all` is split on `.` and walked one
//! segment at a time. There is no escaping: a key containing `.` cannot be
//! addressed.
//!
//! A segment made only of ASCII digits is a sequence index when the
//! container it is applied to is a sequence. Applied to a mapping it is an
//! ordinary key, so `items.0` reads `{"items": {"0": ..}}` as well as
//! `{"items": [..]}`.
//!
//! Writes create an empty mapping for every missing intermediate segment and
//! never create sequences.
//!
//! A write may address an existing element of a sequence (`i < len`) or the
//! slot just past its end (`i == len`, which appends). Anything further out
//! is rejected with `IndexOutOfRange` before the document is touched; a
//! sequence never grows by more than one element per write.

use serde_json::{Map, Value};

use crate::error::StoreError;
use crate::Document;

/// The hierarchy separator.
pub const SEPARATOR: char = '.';

/// Parse a purely numeric segment as a sequence index.
fn index(segment: &str) -> Option<usize> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

fn child<'a>(node: &'a Value, segment: &str) -> Option<&'a Value> {
    match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => index(segment).and_then(|i| items.get(i)),
        _ => None,
    }
}

fn child_mut<'a>(node: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match node {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(items) => index(segment).and_then(move |i| items.get_mut(i)),
        _ => None,
    }
}

/// Return the slot `segment` names inside `node`, creating it if needed.
///
/// A scalar, a `null`, or a sequence addressed by a non-numeric segment is
/// replaced by an empty mapping first. An index at or past the end of a
/// sequence appends one element; [`check_bounds`] has already ruled out
/// anything beyond `len`.
fn slot<'a>(node: &'a mut Value, segment: &str) -> &'a mut Value {
    match (node, index(segment)) {
        (Value::Array(items), Some(i)) => {
            let i = if i < items.len() {
                i
            } else {
                items.push(Value::Null);
                items.len() - 1
            };
            &mut items[i]
        }
        (Value::Object(map), _) => map.entry(segment).or_insert(Value::Null),
        (other, _) => {
            *other = Value::Object(Map::new());
            slot(other, segment)
        }
    }
}

/// Read the value at `path`.
///
/// `None` when any segment is missing or an intermediate value is not a
/// container.
pub fn get<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split(SEPARATOR);
    let mut node = doc.get(segments.next()?)?;
    for segment in segments {
        node = child(node, segment)?;
    }
    Some(node)
}

/// Mutable counterpart of [`get`]. Never creates anything.
pub fn get_mut<'a>(doc: &'a mut Document, path: &str) -> Option<&'a mut Value> {
    let mut segments = path.split(SEPARATOR);
    let mut node = doc.get_mut(segments.next()?)?;
    for segment in segments {
        node = child_mut(node, segment)?;
    }
    Some(node)
}

/// Walk the existing part of `path` and reject any index that lies beyond
/// the end of the sequence it addresses.
fn check_bounds(doc: &Document, path: &str) -> Result<(), StoreError> {
    let mut segments = path.split(SEPARATOR);
    let Some(mut node) = segments.next().and_then(|first| doc.get(first)) else {
        return Ok(());
    };

    for segment in segments {
        if let (Value::Array(items), Some(i)) = (node, index(segment)) {
            if i > items.len() {
                return Err(StoreError::IndexOutOfRange {
                    index: i,
                    len: items.len(),
                });
            }
        }
        // Past this point everything is created fresh as mappings.
        match child(node, segment) {
            Some(next) => node = next,
            None => return Ok(()),
        }
    }
    Ok(())
}

/// Write `value` at `path`, overwriting whatever was there.
///
/// Fails with `IndexOutOfRange`, leaving `doc` unchanged, when a segment
/// indexes more than one past the end of an existing sequence.
pub fn set(doc: &mut Document, path: &str, value: Value) -> Result<(), StoreError> {
    check_bounds(doc, path)?;

    let mut segments = path.split(SEPARATOR);
    let Some(first) = segments.next() else {
        return Ok(());
    };

    let mut node = doc.entry(first).or_insert(Value::Null);
    for segment in segments {
        node = slot(node, segment);
    }
    *node = value;
    Ok(())
}

/// Remove the entry at `path`. Returns whether it existed.
///
/// Ancestors left empty are kept. Removing a sequence element shifts the
/// elements after it down by one.
pub fn delete(doc: &mut Document, path: &str) -> bool {
    let Some((parent, last)) = path.rsplit_once(SEPARATOR) else {
        return doc.shift_remove(path).is_some();
    };

    match get_mut(doc, parent) {
        Some(Value::Object(map)) => map.shift_remove(last).is_some(),
        Some(Value::Array(items)) => match index(last) {
            Some(i) if i < items.len() => {
                items.remove(i);
                true
            }
            _ => false,
        },
        _ => false,
    }
}
