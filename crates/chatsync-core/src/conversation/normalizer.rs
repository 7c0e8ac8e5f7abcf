//! Message normalization.
//!
//! Stored message records come in several shapes: the current one
//! (`isUser` flag), a legacy one (`sender: "user" | "assistant"`), records
//! with a compressed body, and records with fields missing altogether.
//! [`MessageNormalizer`] classifies each record into a [`RawRecord`] at the
//! boundary and produces a canonical [`Message`]; nothing downstream
//! branches on record shape.
//!
//! Normalization is pure: it never writes back to storage and never fails.
//! A record that cannot be interpreted degrades to a flagged message.

use super::message::{Message, MessageContext};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// Decompresses message bodies stored with the `compressed` marker.
pub trait Decompressor: Send + Sync {
    /// Returns the plain text for a compressed body.
    fn decompress(&self, compressed: &str) -> Result<String>;
}

/// How a stored record identifies its author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SenderField {
    /// Current shape: `isUser: bool`
    Flag(bool),
    /// Legacy shape: `sender: "user" | ...`
    Legacy(String),
    /// Neither field present
    Absent,
}

impl SenderField {
    /// Resolves the user flag.
    ///
    /// A legacy sender counts as the user only when it is exactly `"user"`.
    /// A record with no sender information at all is treated as an
    /// assistant message.
    pub fn is_user(&self) -> bool {
        match self {
            SenderField::Flag(flag) => *flag,
            SenderField::Legacy(name) => name == "user",
            SenderField::Absent => false,
        }
    }
}

/// The body of a stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    Plain(String),
    Compressed(String),
}

/// A stored record classified by shape, before canonicalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRecord {
    /// `null` or otherwise absent entry
    Missing,
    /// Not an object; carries a best-effort rendering of the value
    Unreadable { text: String, reason: String },
    /// An object record
    Record(Box<RecordFields>),
}

/// Fields extracted from an object record.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordFields {
    pub id: Option<String>,
    pub body: MessageBody,
    pub sender: SenderField,
    pub timestamp: Option<String>,
    pub analysis: Option<String>,
    pub context: Option<MessageContext>,
    pub code_blocks: Vec<String>,
    pub security_insights: Option<String>,
    pub is_error: bool,
    pub original_compressed_text: Option<String>,
    pub internal_error: Option<String>,
}

impl RawRecord {
    /// Classifies a stored value.
    pub fn classify(value: &Value) -> Self {
        match value {
            Value::Null => RawRecord::Missing,
            Value::Object(map) => RawRecord::Record(Box::new(RecordFields::from_map(map))),
            Value::String(text) => RawRecord::Unreadable {
                text: text.clone(),
                reason: "record is a bare string".to_string(),
            },
            other => RawRecord::Unreadable {
                text: other.to_string(),
                reason: "record is not an object".to_string(),
            },
        }
    }
}

impl RecordFields {
    fn from_map(map: &Map<String, Value>) -> Self {
        let text = match map.get("text") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
        };

        let body = if map.get("compressed").and_then(Value::as_bool) == Some(true) {
            MessageBody::Compressed(text)
        } else {
            MessageBody::Plain(text)
        };

        let sender = match (map.get("isUser"), map.get("sender")) {
            (Some(Value::Bool(flag)), _) => SenderField::Flag(*flag),
            (_, Some(Value::String(name))) => SenderField::Legacy(name.clone()),
            _ => SenderField::Absent,
        };

        let id = match map.get("id") {
            Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };

        Self {
            id,
            body,
            sender,
            timestamp: map.get("timestamp").and_then(timestamp_to_rfc3339),
            analysis: string_field(map, "analysis"),
            context: map.get("context").and_then(context_from_value),
            code_blocks: map
                .get("codeBlocks")
                .or_else(|| map.get("code_blocks"))
                .and_then(Value::as_array)
                .map(|blocks| {
                    blocks
                        .iter()
                        .filter_map(|b| b.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default(),
            security_insights: string_field(map, "securityInsights")
                .or_else(|| string_field(map, "security_insights")),
            is_error: map.get("isError").and_then(Value::as_bool).unwrap_or(false),
            original_compressed_text: string_field(map, "originalCompressedText"),
            internal_error: string_field(map, "internalError"),
        }
    }
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}

fn context_from_value(value: &Value) -> Option<MessageContext> {
    let map = value.as_object()?;
    let context = MessageContext {
        emotion: string_field(map, "emotion"),
        topics: map
            .get("topics")
            .and_then(Value::as_array)
            .map(|topics| {
                topics
                    .iter()
                    .filter_map(|t| t.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default(),
    };
    (!context.is_empty()).then_some(context)
}

/// Accepts RFC 3339 strings, epoch milliseconds, and `{seconds, nanoseconds}` objects.
fn timestamp_to_rfc3339(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|dt| dt.to_rfc3339()),
        Value::Object(map) => {
            let seconds = map.get("seconds").and_then(Value::as_i64)?;
            let nanos = match map.get("nanoseconds") {
                Some(n) => u32::try_from(n.as_u64()?).ok()?,
                None => 0,
            };
            DateTime::<Utc>::from_timestamp(seconds, nanos).map(|dt| dt.to_rfc3339())
        }
        _ => None,
    }
}

/// Converts stored message records into canonical [`Message`]s.
#[derive(Clone, Default)]
pub struct MessageNormalizer {
    decompressor: Option<Arc<dyn Decompressor>>,
}

impl std::fmt::Debug for MessageNormalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageNormalizer")
            .field("has_decompressor", &self.decompressor.is_some())
            .finish()
    }
}

impl MessageNormalizer {
    /// A normalizer without a decompressor; compressed bodies pass through.
    pub fn new() -> Self {
        Self::default()
    }

    /// A normalizer that decompresses marked bodies with `decompressor`.
    pub fn with_decompressor(decompressor: Arc<dyn Decompressor>) -> Self {
        Self {
            decompressor: Some(decompressor),
        }
    }

    /// Normalizes a whole record list.
    ///
    /// Produces exactly one message per input record, in order.
    pub fn normalize(&self, records: &[Value]) -> Vec<Message> {
        records
            .iter()
            .enumerate()
            .map(|(index, record)| self.normalize_record(index, record))
            .collect()
    }

    /// Normalizes a stored `messages` value, or `None` if it isn't a list.
    pub fn normalize_value(&self, messages: &Value) -> Option<Vec<Message>> {
        messages.as_array().map(|records| self.normalize(records))
    }

    /// Normalizes a single record at position `index`.
    pub fn normalize_record(&self, index: usize, record: &Value) -> Message {
        match RawRecord::classify(record) {
            RawRecord::Missing => {
                tracing::debug!("[MessageNormalizer] record {} missing, substituting", index);
                Message::placeholder(index)
            }
            RawRecord::Unreadable { text, reason } => {
                tracing::warn!("[MessageNormalizer] record {} unreadable: {}", index, reason);
                let mut message = Message::placeholder(index);
                message.id = format!("unreadable-{index}");
                message.text = text;
                message.is_error = false;
                message.internal_error = Some(reason);
                message
            }
            RawRecord::Record(fields) => self.canonicalize(index, *fields),
        }
    }

    fn canonicalize(&self, index: usize, fields: RecordFields) -> Message {
        let is_user = fields.sender.is_user();
        let mut internal_error = fields.internal_error;
        let mut original_compressed_text = fields.original_compressed_text;
        let mut compressed = false;

        let text = match fields.body {
            MessageBody::Plain(text) => text,
            MessageBody::Compressed(stored) => match &self.decompressor {
                None => {
                    compressed = true;
                    stored
                }
                Some(decompressor) => {
                    let outcome =
                        catch_unwind(AssertUnwindSafe(|| decompressor.decompress(&stored)));
                    match outcome {
                        Ok(Ok(plain)) => {
                            original_compressed_text = Some(stored);
                            plain
                        }
                        Ok(Err(err)) => {
                            tracing::warn!(
                                "[MessageNormalizer] record {} failed to decompress: {}",
                                index,
                                err
                            );
                            compressed = true;
                            internal_error = Some(format!("decompression failed: {err}"));
                            stored
                        }
                        Err(_) => {
                            tracing::warn!(
                                "[MessageNormalizer] record {} decompressor panicked",
                                index
                            );
                            compressed = true;
                            internal_error = Some("decompression panicked".to_string());
                            stored
                        }
                    }
                }
            },
        };

        Message {
            id: fields.id.unwrap_or_else(|| format!("legacy-{index}")),
            text,
            is_user,
            timestamp: fields.timestamp.unwrap_or_default(),
            analysis: fields.analysis,
            context: fields.context,
            code_blocks: fields.code_blocks,
            security_insights: fields.security_insights,
            is_error: fields.is_error,
            compressed,
            original_compressed_text,
            internal_error,
        }
    }
}
