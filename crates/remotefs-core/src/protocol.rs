use std::fmt;

use bytes::{Buf, BufMut};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;

/// Header size: 4 (total length) + 4 (json length) + 1 (type) = 9 bytes
pub const HEADER_SIZE: usize = 9;

/// Maximum payload size (64 MB), json and binary combined
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024 * 1024;

/// Largest WebSocket message a single frame can occupy
pub const MAX_FRAME_SIZE: usize = HEADER_SIZE + MAX_PAYLOAD_SIZE;

/// WebSocket limits large enough for any frame the codec accepts. The
/// transport defaults stop well short of `MAX_PAYLOAD_SIZE`.
pub fn websocket_config() -> WebSocketConfig {
    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(MAX_FRAME_SIZE);
    config.max_frame_size = Some(MAX_FRAME_SIZE);
    config
}

// --- Envelope field names ---

pub const COMMAND_FIELD: &str = "command";
pub const COMMAND_ID_FIELD: &str = "commandId";
pub const SUCCESS_FIELD: &str = "success";
pub const ERROR_FIELD: &str = "error";
pub const EVENT_FIELD: &str = "event";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Command = 0,
    Response = 1,
    Event = 2,
}

impl TryFrom<u8> for MessageType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MessageType::Command),
            1 => Ok(MessageType::Response),
            2 => Ok(MessageType::Event),
            other => Err(ProtocolError::InvalidType(other)),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::Command => f.write_str("command"),
            MessageType::Response => f.write_str("response"),
            MessageType::Event => f.write_str("event"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("buffer too short: need {need} bytes, have {have}")]
    BufferTooShort { need: usize, have: usize },
    #[error("payload too large: {size} bytes (max {MAX_PAYLOAD_SIZE})")]
    PayloadTooLarge { size: usize },
    #[error("frame declares {declared} payload bytes but carries {actual}")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("json length {json} exceeds total payload length {total}")]
    JsonLengthExceedsTotal { json: usize, total: usize },
    #[error("invalid message type: 0x{0:02x}")]
    InvalidType(u8),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("json payload is not an object")]
    NotAnObject,
    #[error("{message_type} message has a missing or mistyped `{field}` field")]
    InvalidEnvelope {
        message_type: MessageType,
        field: &'static str,
    },
}

/// Raw frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub total_length: u32,
    pub json_length: u32,
    pub message_type: u8,
}

impl Header {
    pub fn parse(buf: &[u8]) -> Result<Header, ProtocolError> {
        if buf.len() < HEADER_SIZE {
            return Err(ProtocolError::BufferTooShort {
                need: HEADER_SIZE,
                have: buf.len(),
            });
        }

        let mut cursor = buf;
        Ok(Header {
            total_length: cursor.get_u32(),
            json_length: cursor.get_u32(),
            message_type: cursor.get_u8(),
        })
    }

    fn write(&self, buf: &mut Vec<u8>) {
        buf.put_u32(self.total_length);
        buf.put_u32(self.json_length);
        buf.put_u8(self.message_type);
    }

    pub fn binary_length(&self) -> usize {
        (self.total_length as usize).saturating_sub(self.json_length as usize)
    }
}

/// A decoded protocol message: a JSON envelope plus optional raw bytes.
///
/// An empty binary payload cannot be told apart from an absent one on the
/// wire, so constructors normalize `Some(vec![])` to `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub message_type: MessageType,
    pub json: Map<String, Value>,
    pub binary: Option<Vec<u8>>,
}

impl Message {
    pub fn new(message_type: MessageType, json: Map<String, Value>, binary: Option<Vec<u8>>) -> Self {
        Self {
            message_type,
            json,
            binary: binary.filter(|b| !b.is_empty()),
        }
    }

    pub fn command(json: Map<String, Value>, binary: Option<Vec<u8>>) -> Self {
        Self::new(MessageType::Command, json, binary)
    }

    pub fn response(json: Map<String, Value>, binary: Option<Vec<u8>>) -> Self {
        Self::new(MessageType::Response, json, binary)
    }

    pub fn event(json: Map<String, Value>) -> Self {
        Self::new(MessageType::Event, json, None)
    }

    /// The `commandId` carried by commands and responses
    pub fn command_id(&self) -> Option<&str> {
        self.json.get(COMMAND_ID_FIELD).and_then(Value::as_str)
    }

    /// Pull `commandId` out of a response frame that failed to decode, so
    /// the waiting caller can be told. `None` if the header is not a
    /// response header or the JSON cannot be read.
    pub fn recover_response_id(buf: &[u8]) -> Option<String> {
        let header = Header::parse(buf).ok()?;
        if header.message_type != MessageType::Response as u8 {
            return None;
        }
        let json_end = HEADER_SIZE.checked_add(header.json_length as usize)?;
        let json = buf.get(HEADER_SIZE..json_end)?;
        let value: Value = serde_json::from_slice(json).ok()?;
        value
            .get(COMMAND_ID_FIELD)?
            .as_str()
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    }

    /// Encode this message into a single frame
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let json = serde_json::to_vec(&self.json)?;
        let binary = self.binary.as_deref().unwrap_or_default();
        let total = json.len() + binary.len();
        if total > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge { size: total });
        }

        let header = Header {
            total_length: total as u32,
            json_length: json.len() as u32,
            message_type: self.message_type as u8,
        };

        let mut buf = Vec::with_capacity(HEADER_SIZE + total);
        header.write(&mut buf);
        buf.extend_from_slice(&json);
        buf.extend_from_slice(binary);
        Ok(buf)
    }

    /// Decode exactly one frame. The buffer must hold the whole frame and
    /// nothing else.
    pub fn decode(buf: &[u8]) -> Result<Message, ProtocolError> {
        let header = Header::parse(buf)?;

        let total = header.total_length as usize;
        let json_len = header.json_length as usize;

        if total > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge { size: total });
        }

        let actual = buf.len() - HEADER_SIZE;
        if total != actual {
            return Err(ProtocolError::LengthMismatch {
                declared: total,
                actual,
            });
        }

        if json_len > total {
            return Err(ProtocolError::JsonLengthExceedsTotal {
                json: json_len,
                total,
            });
        }

        let message_type = MessageType::try_from(header.message_type)?;

        let json_end = HEADER_SIZE + json_len;
        let json = match serde_json::from_slice::<Value>(&buf[HEADER_SIZE..json_end])? {
            Value::Object(map) => map,
            _ => return Err(ProtocolError::NotAnObject),
        };

        let binary = if header.binary_length() > 0 {
            Some(buf[json_end..].to_vec())
        } else {
            None
        };

        let msg = Message {
            message_type,
            json,
            binary,
        };
        msg.validate_envelope()?;
        Ok(msg)
    }

    /// Check the fields every message of this type must carry. Operation
    /// specific validation happens in the schema layer.
    fn validate_envelope(&self) -> Result<(), ProtocolError> {
        let missing = |field| ProtocolError::InvalidEnvelope {
            message_type: self.message_type,
            field,
        };

        match self.message_type {
            MessageType::Command => {
                if !self.json.get(COMMAND_FIELD).is_some_and(Value::is_string) {
                    return Err(missing(COMMAND_FIELD));
                }
                if !self.command_id().is_some_and(|id| !id.is_empty()) {
                    return Err(missing(COMMAND_ID_FIELD));
                }
            }
            MessageType::Response => {
                if !self.command_id().is_some_and(|id| !id.is_empty()) {
                    return Err(missing(COMMAND_ID_FIELD));
                }
                if !self.json.get(SUCCESS_FIELD).is_some_and(Value::is_boolean) {
                    return Err(missing(SUCCESS_FIELD));
                }
            }
            MessageType::Event => {
                if !self.json.get(EVENT_FIELD).is_some_and(Value::is_string) {
                    return Err(missing(EVENT_FIELD));
                }
            }
        }
        Ok(())
    }
}
