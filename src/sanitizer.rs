//! Filtering of externally supplied key/value data.
//!
//! Allowed characters are tab, CR, LF, printable ASCII and everything from U+00A0 upwards. A key
//! outside this class drops its whole entry, a scalar value has the offending characters
//! removed. Binary mode disables filtering.

use std::borrow::Cow;

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::files::{FileNode, FileTree, FileUpload, UploadError};
use crate::url::{Param, Params};

fn is_allowed(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | ' '..='~') || c >= '\u{A0}'
}

/// Check that every character of `value` is in the allowed class
pub fn is_valid(value: &str) -> bool {
    value.chars().all(is_allowed)
}

/// Remove characters outside of the allowed class
///
/// # Example
/// ```
/// use trusted_request::sanitizer::strip_invalid;
///
/// assert_eq!(strip_invalid("be\u{7}ll"), "bell");
/// assert_eq!(strip_invalid("žluťoučký"), "žluťoučký");
/// ```
pub fn strip_invalid(value: &str) -> Cow<'_, str> {
    if is_valid(value) {
        Cow::Borrowed(value)
    } else {
        Cow::Owned(value.chars().filter(|c| is_allowed(*c)).collect())
    }
}

/// Pending entries of a map being converted
struct Frame {
    entries: std::vec::IntoIter<(String, Value)>,
    /// keys of a JSON list are indexes and never filtered
    is_list: bool,
    /// key in the parent frame, `None` for the root
    key: Option<String>,
    path: String,
    out: Params,
}

impl Frame {
    fn new(value: Value, key: Option<String>, path: String) -> Self {
        let (entries, is_list) = match value {
            Value::Object(map) => (map.into_iter().collect::<Vec<_>>(), false),
            Value::Array(list) => (
                list.into_iter()
                    .enumerate()
                    .map(|(index, value)| (index.to_string(), value))
                    .collect(),
                true,
            ),
            _ => (Vec::new(), false),
        };

        Self {
            entries: entries.into_iter(),
            is_list,
            key,
            path,
            out: Params::new(),
        }
    }
}

/// Input filter for query, post, cookie and file maps
#[derive(Debug, Clone, Copy, Default)]
pub struct Sanitizer {
    binary: bool,
}

impl Sanitizer {
    /// A sanitizer, filtering disabled when `binary` is set
    pub fn new(binary: bool) -> Self {
        Self { binary }
    }

    pub fn is_binary(&self) -> bool {
        self.binary
    }

    fn key_allowed(&self, key: &str) -> bool {
        self.binary || is_valid(key)
    }

    fn scalar(&self, value: String) -> String {
        if self.binary || is_valid(&value) {
            value
        } else {
            strip_invalid(&value).into_owned()
        }
    }

    /// Convert and filter a raw input map (post data, cookies, ...)
    ///
    /// Nested objects and lists become nested [`Params`], numbers and booleans become strings.
    /// `null` is not a valid input value and fails with [`Error::InvalidInputType`] unless binary
    /// mode is enabled, in which case the entry is skipped. `source` prefixes the reported key.
    pub fn input(&self, source: &str, raw: Map<String, Value>) -> Result<Params> {
        let mut stack = vec![Frame::new(Value::Object(raw), None, source.to_string())];

        while let Some(frame) = stack.last_mut() {
            let Some((key, value)) = frame.entries.next() else {
                let Some(done) = stack.pop() else {
                    break;
                };
                match (done.key, stack.last_mut()) {
                    (Some(key), Some(parent)) => {
                        parent.out.insert(key, Param::Array(done.out));
                        continue;
                    }
                    _ => return Ok(done.out),
                }
            };

            let path = format!("{}[{}]", frame.path, key);
            if !frame.is_list && !self.key_allowed(&key) {
                tracing::trace!(key = %path, "dropping input entry with invalid key");
                continue;
            }

            match value {
                Value::String(value) => {
                    frame.out.insert(key, Param::Scalar(self.scalar(value)));
                }
                Value::Number(number) => {
                    frame.out.insert(key, Param::Scalar(number.to_string()));
                }
                Value::Bool(flag) => {
                    let value = if flag { "1" } else { "" };
                    frame.out.insert(key, Param::Scalar(value.to_string()));
                }
                Value::Null if self.binary => {
                    tracing::trace!(key = %path, "skipping null input entry");
                }
                Value::Null => return Err(Error::InvalidInputType { key: path }),
                nested => stack.push(Frame::new(nested, Some(key), path)),
            }
        }

        Ok(Params::new())
    }

    /// Filter already structured parameters, such as a parsed query string
    pub fn params(&self, mut params: Params) -> Params {
        if self.binary {
            return params;
        }

        {
            let mut stack = vec![&mut params];

            while let Some(map) = stack.pop() {
                map.retain(|key, _| {
                    let keep = is_valid(key);
                    if !keep {
                        tracing::trace!(key = %key.escape_debug(), "dropping parameter with invalid key");
                    }
                    keep
                });

                for (_, value) in map {
                    match value {
                        Param::Scalar(scalar) => {
                            if !is_valid(scalar) {
                                *scalar = strip_invalid(scalar).into_owned();
                            }
                        }
                        Param::Array(nested) => stack.push(nested),
                    }
                }
            }
        }

        params
    }

    /// Build the uploaded files tree from a raw files map
    ///
    /// Each top level entry holds `name`, `type`, `size`, `tmp_name` and `error`. When `name` is
    /// a nested map (`field[]` or `field[key]` uploads), the other fields share its shape and are
    /// walked key by key. Entries reporting no uploaded file are skipped.
    pub fn files(&self, raw: Map<String, Value>) -> FileTree {
        let mut pending: Vec<(Vec<String>, RawUpload)> = Vec::new();

        for (key, value) in raw.into_iter().rev() {
            if !self.key_allowed(&key) {
                tracing::trace!(field = %key.escape_debug(), "dropping upload with invalid field name");
                continue;
            }
            match RawUpload::from_value(value) {
                Some(upload) => pending.push((vec![key], upload)),
                None => tracing::trace!(field = %key, "ignoring incomplete upload entry"),
            }
        }

        let mut tree = FileTree::new();

        while let Some((path, mut upload)) = pending.pop() {
            let children = match &upload.name {
                Value::Object(map) => Some(
                    map.keys()
                        .filter(|key| self.key_allowed(key))
                        .cloned()
                        .collect::<Vec<_>>(),
                ),
                Value::Array(list) => Some((0..list.len()).map(|i| i.to_string()).collect()),
                _ => None,
            };

            match children {
                // pushed in reverse so that the tree keeps the submitted order
                Some(keys) => {
                    for key in keys.into_iter().rev() {
                        let child = upload.take_child(&key);
                        let mut child_path = path.clone();
                        child_path.push(key);
                        pending.push((child_path, child));
                    }
                }
                None => {
                    if let Some(file) = self.upload(upload) {
                        insert_file(&mut tree, &path, file);
                    }
                }
            }
        }

        tree
    }

    fn upload(&self, upload: RawUpload) -> Option<FileUpload> {
        let name = match upload.name {
            Value::String(name) => name,
            Value::Number(number) => number.to_string(),
            _ => return None,
        };
        let size = as_integer(&upload.size).and_then(|size| u64::try_from(size).ok())?;
        let temporary_file = match upload.tmp_name {
            Value::String(path) => path,
            _ => return None,
        };
        let error = UploadError::from(as_integer(&upload.error)?);
        if error == UploadError::NoFile {
            return None;
        }

        let content_type = match upload.content_type {
            Value::String(content_type) if !content_type.is_empty() => Some(content_type),
            _ => None,
        };

        Some(FileUpload {
            name: self.scalar(name),
            content_type,
            size,
            temporary_file,
            error,
        })
    }
}

/// One upload entry, fields may be nested maps of the same shape
struct RawUpload {
    name: Value,
    content_type: Value,
    size: Value,
    tmp_name: Value,
    error: Value,
}

impl RawUpload {
    fn from_value(value: Value) -> Option<Self> {
        let Value::Object(mut map) = value else {
            return None;
        };

        Some(Self {
            name: map.remove("name")?,
            content_type: map.remove("type")?,
            size: map.remove("size")?,
            tmp_name: map.remove("tmp_name")?,
            error: map.remove("error")?,
        })
    }

    fn take_child(&mut self, key: &str) -> Self {
        Self {
            name: take_child(&mut self.name, key),
            content_type: take_child(&mut self.content_type, key),
            size: take_child(&mut self.size, key),
            tmp_name: take_child(&mut self.tmp_name, key),
            error: take_child(&mut self.error, key),
        }
    }
}

fn take_child(value: &mut Value, key: &str) -> Value {
    let slot = match value {
        Value::Object(map) => map.get_mut(key),
        Value::Array(list) => key.parse::<usize>().ok().and_then(|index| list.get_mut(index)),
        _ => None,
    };

    slot.map(Value::take).unwrap_or(Value::Null)
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn insert_file(tree: &mut FileTree, path: &[String], file: FileUpload) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };

    let mut current = tree;
    for key in parents {
        let node = current
            .entry(key.clone())
            .or_insert_with(|| FileNode::Tree(FileTree::new()));
        if matches!(*node, FileNode::File(_)) {
            *node = FileNode::Tree(FileTree::new());
        }
        let FileNode::Tree(next) = node else {
            return;
        };
        current = next;
    }

    current.insert(last.clone(), FileNode::File(file));
}
