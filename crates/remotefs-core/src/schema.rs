//! Typed commands and responses carried inside protocol messages.
//!
//! Every operation has exactly one command shape and one response family.
//! Decoding is strict: unknown operations, missing or mistyped fields, extra
//! fields, unexpected binary payloads and error codes an operation cannot
//! produce are all rejected with a [`SchemaError`].

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use remotefs_platform::filesystem::{DirEntry, FileErrorCode, FileStat, FileType};

use crate::protocol::{
    Message, MessageType, COMMAND_FIELD, COMMAND_ID_FIELD, ERROR_FIELD, SUCCESS_FIELD,
};

/// Correlates a response with the command that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(String);

impl CommandId {
    /// A fresh random identifier (UUID v4)
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CommandId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for CommandId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Status,
    ReadDirectory,
    CreateDirectory,
    ReadFile,
    WriteFile,
    Delete,
    Rename,
    Copy,
    Watch,
}

impl Operation {
    pub const ALL: [Operation; 9] = [
        Operation::Status,
        Operation::ReadDirectory,
        Operation::CreateDirectory,
        Operation::ReadFile,
        Operation::WriteFile,
        Operation::Delete,
        Operation::Rename,
        Operation::Copy,
        Operation::Watch,
    ];

    /// Name used in the `command` field
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Status => "status",
            Operation::ReadDirectory => "readDirectory",
            Operation::CreateDirectory => "createDirectory",
            Operation::ReadFile => "readFile",
            Operation::WriteFile => "writeFile",
            Operation::Delete => "delete",
            Operation::Rename => "rename",
            Operation::Copy => "copy",
            Operation::Watch => "watch",
        }
    }

    pub fn from_name(name: &str) -> Option<Operation> {
        Self::ALL.into_iter().find(|op| op.as_str() == name)
    }

    /// Whether a failure response for this operation may carry `code`
    pub fn allows(self, code: FileErrorCode) -> bool {
        use FileErrorCode::*;
        match self {
            Operation::Status | Operation::ReadFile | Operation::ReadDirectory | Operation::Delete => {
                matches!(code, FileNotFound | FileIsADirectory | NoPermissions)
            }
            Operation::CreateDirectory
            | Operation::WriteFile
            | Operation::Rename
            | Operation::Copy => {
                matches!(code, FileNotFound | FileExists | FileIsADirectory | NoPermissions)
            }
            Operation::Watch => matches!(code, NoPermissions),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("expected a {expected} message, got {actual}")]
    WrongMessageType {
        expected: MessageType,
        actual: MessageType,
    },
    #[error("missing or mistyped `{0}` field")]
    MissingField(&'static str),
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("invalid {operation} fields: {source}")]
    InvalidFields {
        operation: Operation,
        source: serde_json::Error,
    },
    #[error("{operation} does not carry a binary payload here")]
    UnexpectedBinary { operation: Operation },
    #[error("unknown error code: {0}")]
    UnknownErrorCode(String),
    #[error("{operation} cannot fail with {code}")]
    IllegalErrorCode {
        operation: Operation,
        code: FileErrorCode,
    },
}

// --- Per-operation field sets ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct PathFields {
    path: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct WriteFileFields {
    path: String,
    create: bool,
    overwrite: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RenameFields {
    old_path: String,
    new_path: String,
    overwrite: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct CopyFields {
    source_path: String,
    destination_path: String,
    overwrite: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct WatchFields {
    path: String,
    recursive: bool,
    excludes: Vec<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct NoFields {}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ErrorFields {
    error: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct StatFields {
    #[serde(rename = "type")]
    file_type: FileType,
    ctime: u64,
    mtime: u64,
    size: u64,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct EntryFields {
    name: String,
    #[serde(rename = "type")]
    file_type: FileType,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct EntriesFields {
    entries: Vec<EntryFields>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CreatedFields {
    created: bool,
}

fn parse_fields<T: DeserializeOwned>(
    operation: Operation,
    fields: Map<String, Value>,
) -> Result<T, SchemaError> {
    serde_json::from_value(Value::Object(fields))
        .map_err(|source| SchemaError::InvalidFields { operation, source })
}

fn take_command_id(fields: &mut Map<String, Value>) -> Result<CommandId, SchemaError> {
    match fields.remove(COMMAND_ID_FIELD) {
        Some(Value::String(id)) if !id.is_empty() => Ok(CommandId(id)),
        _ => Err(SchemaError::MissingField(COMMAND_ID_FIELD)),
    }
}

// --- Commands ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Status {
        path: String,
    },
    ReadDirectory {
        path: String,
    },
    CreateDirectory {
        path: String,
    },
    ReadFile {
        path: String,
    },
    WriteFile {
        path: String,
        create: bool,
        overwrite: bool,
        content: Vec<u8>,
    },
    Delete {
        path: String,
    },
    Rename {
        old_path: String,
        new_path: String,
        overwrite: bool,
    },
    Copy {
        source_path: String,
        destination_path: String,
        overwrite: bool,
    },
    Watch {
        path: String,
        recursive: bool,
        excludes: Vec<String>,
    },
}

impl Request {
    pub fn operation(&self) -> Operation {
        match self {
            Request::Status { .. } => Operation::Status,
            Request::ReadDirectory { .. } => Operation::ReadDirectory,
            Request::CreateDirectory { .. } => Operation::CreateDirectory,
            Request::ReadFile { .. } => Operation::ReadFile,
            Request::WriteFile { .. } => Operation::WriteFile,
            Request::Delete { .. } => Operation::Delete,
            Request::Rename { .. } => Operation::Rename,
            Request::Copy { .. } => Operation::Copy,
            Request::Watch { .. } => Operation::Watch,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub command_id: CommandId,
    pub request: Request,
}

impl Command {
    /// Wrap a request with a freshly generated command id
    pub fn new(request: Request) -> Self {
        Self {
            command_id: CommandId::new(),
            request,
        }
    }

    pub fn operation(&self) -> Operation {
        self.request.operation()
    }

    pub fn into_message(self) -> Message {
        let operation = self.operation();
        let mut json = Map::new();
        json.insert(COMMAND_FIELD.into(), operation.as_str().into());
        json.insert(COMMAND_ID_FIELD.into(), self.command_id.0.into());

        let mut binary = None;
        match self.request {
            Request::Status { path }
            | Request::ReadDirectory { path }
            | Request::CreateDirectory { path }
            | Request::ReadFile { path }
            | Request::Delete { path } => {
                json.insert("path".into(), path.into());
            }
            Request::WriteFile {
                path,
                create,
                overwrite,
                content,
            } => {
                json.insert("path".into(), path.into());
                json.insert("create".into(), create.into());
                json.insert("overwrite".into(), overwrite.into());
                binary = Some(content);
            }
            Request::Rename {
                old_path,
                new_path,
                overwrite,
            } => {
                json.insert("oldPath".into(), old_path.into());
                json.insert("newPath".into(), new_path.into());
                json.insert("overwrite".into(), overwrite.into());
            }
            Request::Copy {
                source_path,
                destination_path,
                overwrite,
            } => {
                json.insert("sourcePath".into(), source_path.into());
                json.insert("destinationPath".into(), destination_path.into());
                json.insert("overwrite".into(), overwrite.into());
            }
            Request::Watch {
                path,
                recursive,
                excludes,
            } => {
                json.insert("path".into(), path.into());
                json.insert("recursive".into(), recursive.into());
                json.insert("excludes".into(), excludes.into());
            }
        }

        Message::command(json, binary)
    }

    pub fn from_message(msg: Message) -> Result<Command, SchemaError> {
        if msg.message_type != MessageType::Command {
            return Err(SchemaError::WrongMessageType {
                expected: MessageType::Command,
                actual: msg.message_type,
            });
        }

        let mut fields = msg.json;
        let name = match fields.remove(COMMAND_FIELD) {
            Some(Value::String(name)) => name,
            _ => return Err(SchemaError::MissingField(COMMAND_FIELD)),
        };
        let command_id = take_command_id(&mut fields)?;
        let operation = Operation::from_name(&name).ok_or(SchemaError::UnknownCommand(name))?;

        if msg.binary.is_some() && operation != Operation::WriteFile {
            return Err(SchemaError::UnexpectedBinary { operation });
        }

        let request = match operation {
            Operation::Status => {
                let f: PathFields = parse_fields(operation, fields)?;
                Request::Status { path: f.path }
            }
            Operation::ReadDirectory => {
                let f: PathFields = parse_fields(operation, fields)?;
                Request::ReadDirectory { path: f.path }
            }
            Operation::CreateDirectory => {
                let f: PathFields = parse_fields(operation, fields)?;
                Request::CreateDirectory { path: f.path }
            }
            Operation::ReadFile => {
                let f: PathFields = parse_fields(operation, fields)?;
                Request::ReadFile { path: f.path }
            }
            Operation::WriteFile => {
                let f: WriteFileFields = parse_fields(operation, fields)?;
                Request::WriteFile {
                    path: f.path,
                    create: f.create,
                    overwrite: f.overwrite,
                    content: msg.binary.unwrap_or_default(),
                }
            }
            Operation::Delete => {
                let f: PathFields = parse_fields(operation, fields)?;
                Request::Delete { path: f.path }
            }
            Operation::Rename => {
                let f: RenameFields = parse_fields(operation, fields)?;
                Request::Rename {
                    old_path: f.old_path,
                    new_path: f.new_path,
                    overwrite: f.overwrite,
                }
            }
            Operation::Copy => {
                let f: CopyFields = parse_fields(operation, fields)?;
                Request::Copy {
                    source_path: f.source_path,
                    destination_path: f.destination_path,
                    overwrite: f.overwrite,
                }
            }
            Operation::Watch => {
                let f: WatchFields = parse_fields(operation, fields)?;
                Request::Watch {
                    path: f.path,
                    recursive: f.recursive,
                    excludes: f.excludes,
                }
            }
        };

        Ok(Command {
            command_id,
            request,
        })
    }
}

// --- Responses ---

/// Successful result of an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Status(FileStat),
    ReadDirectory(Vec<DirEntry>),
    CreateDirectory,
    ReadFile(Vec<u8>),
    WriteFile { created: bool },
    Delete,
    Rename,
    Copy,
    Watch,
}

impl Reply {
    pub fn operation(&self) -> Operation {
        match self {
            Reply::Status(_) => Operation::Status,
            Reply::ReadDirectory(_) => Operation::ReadDirectory,
            Reply::CreateDirectory => Operation::CreateDirectory,
            Reply::ReadFile(_) => Operation::ReadFile,
            Reply::WriteFile { .. } => Operation::WriteFile,
            Reply::Delete => Operation::Delete,
            Reply::Rename => Operation::Rename,
            Reply::Copy => Operation::Copy,
            Reply::Watch => Operation::Watch,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub command_id: CommandId,
    pub outcome: Result<Reply, FileErrorCode>,
}

impl Response {
    pub fn success(command_id: CommandId, reply: Reply) -> Self {
        Self {
            command_id,
            outcome: Ok(reply),
        }
    }

    pub fn failure(command_id: CommandId, code: FileErrorCode) -> Self {
        Self {
            command_id,
            outcome: Err(code),
        }
    }

    pub fn into_message(self) -> Message {
        let mut json = Map::new();
        json.insert(COMMAND_ID_FIELD.into(), self.command_id.0.into());
        json.insert(SUCCESS_FIELD.into(), self.outcome.is_ok().into());

        let mut binary = None;
        match self.outcome {
            Err(code) => {
                json.insert(ERROR_FIELD.into(), code.as_str().into());
            }
            Ok(Reply::Status(stat)) => {
                json.insert("type".into(), stat.file_type.bits().into());
                json.insert("ctime".into(), stat.ctime.into());
                json.insert("mtime".into(), stat.mtime.into());
                json.insert("size".into(), stat.size.into());
            }
            Ok(Reply::ReadDirectory(entries)) => {
                let entries: Vec<Value> = entries
                    .into_iter()
                    .map(|entry| {
                        let mut item = Map::new();
                        item.insert("name".into(), entry.name.into());
                        item.insert("type".into(), entry.file_type.bits().into());
                        Value::Object(item)
                    })
                    .collect();
                json.insert("entries".into(), Value::Array(entries));
            }
            Ok(Reply::ReadFile(content)) => {
                binary = Some(content);
            }
            Ok(Reply::WriteFile { created }) => {
                json.insert("created".into(), created.into());
            }
            Ok(Reply::CreateDirectory | Reply::Delete | Reply::Rename | Reply::Copy | Reply::Watch) => {}
        }

        Message::response(json, binary)
    }

    /// Validate a response against the schema of the operation that the
    /// matching command requested.
    pub fn from_message(msg: Message, operation: Operation) -> Result<Response, SchemaError> {
        if msg.message_type != MessageType::Response {
            return Err(SchemaError::WrongMessageType {
                expected: MessageType::Response,
                actual: msg.message_type,
            });
        }

        let mut fields = msg.json;
        let command_id = take_command_id(&mut fields)?;
        let success = match fields.remove(SUCCESS_FIELD) {
            Some(Value::Bool(success)) => success,
            _ => return Err(SchemaError::MissingField(SUCCESS_FIELD)),
        };

        if !success {
            if msg.binary.is_some() {
                return Err(SchemaError::UnexpectedBinary { operation });
            }
            let f: ErrorFields = parse_fields(operation, fields)?;
            let code: FileErrorCode = f
                .error
                .parse()
                .map_err(|_| SchemaError::UnknownErrorCode(f.error.clone()))?;
            if !operation.allows(code) {
                return Err(SchemaError::IllegalErrorCode { operation, code });
            }
            return Ok(Response::failure(command_id, code));
        }

        if msg.binary.is_some() && operation != Operation::ReadFile {
            return Err(SchemaError::UnexpectedBinary { operation });
        }

        let reply = match operation {
            Operation::Status => {
                let f: StatFields = parse_fields(operation, fields)?;
                Reply::Status(FileStat {
                    file_type: f.file_type,
                    ctime: f.ctime,
                    mtime: f.mtime,
                    size: f.size,
                })
            }
            Operation::ReadDirectory => {
                let f: EntriesFields = parse_fields(operation, fields)?;
                Reply::ReadDirectory(
                    f.entries
                        .into_iter()
                        .map(|e| DirEntry {
                            name: e.name,
                            file_type: e.file_type,
                        })
                        .collect(),
                )
            }
            Operation::WriteFile => {
                let f: CreatedFields = parse_fields(operation, fields)?;
                Reply::WriteFile { created: f.created }
            }
            Operation::ReadFile => {
                parse_fields::<NoFields>(operation, fields)?;
                Reply::ReadFile(msg.binary.unwrap_or_default())
            }
            Operation::CreateDirectory => {
                parse_fields::<NoFields>(operation, fields)?;
                Reply::CreateDirectory
            }
            Operation::Delete => {
                parse_fields::<NoFields>(operation, fields)?;
                Reply::Delete
            }
            Operation::Rename => {
                parse_fields::<NoFields>(operation, fields)?;
                Reply::Rename
            }
            Operation::Copy => {
                parse_fields::<NoFields>(operation, fields)?;
                Reply::Copy
            }
            Operation::Watch => {
                parse_fields::<NoFields>(operation, fields)?;
                Reply::Watch
            }
        };

        Ok(Response::success(command_id, reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn command_message(value: Value, binary: Option<Vec<u8>>) -> Message {
        match value {
            Value::Object(json) => Message::command(json, binary),
            _ => panic!("not an object"),
        }
    }

    fn response_message(value: Value, binary: Option<Vec<u8>>) -> Message {
        match value {
            Value::Object(json) => Message::response(json, binary),
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_command_id_is_uuid() {
        let id = CommandId::new();
        assert!(Uuid::parse_str(id.as_str()).is_ok());
        assert_ne!(id, CommandId::new());
    }

    #[test]
    fn test_operation_names() {
        for op in Operation::ALL {
            assert_eq!(Operation::from_name(op.as_str()), Some(op));
        }
        assert_eq!(Operation::from_name("chmod"), None);
    }

    #[test]
    fn test_write_file_command_through_frame() {
        let command = Command::new(Request::WriteFile {
            path: "/a.txt".to_string(),
            create: true,
            overwrite: false,
            content: b"hi".to_vec(),
        });
        let frame = command.clone().into_message().encode().unwrap();
        let decoded = Command::from_message(Message::decode(&frame).unwrap()).unwrap();
        assert_eq!(decoded, command);
    }

    #[test]
    fn test_rename_command_wire_fields() {
        let command = Command {
            command_id: CommandId::from("abc"),
            request: Request::Rename {
                old_path: "/a".to_string(),
                new_path: "/b".to_string(),
                overwrite: true,
            },
        };
        let msg = command.into_message();
        assert_eq!(
            Value::Object(msg.json),
            json!({
                "command": "rename",
                "commandId": "abc",
                "oldPath": "/a",
                "newPath": "/b",
                "overwrite": true,
            })
        );
    }

    #[test]
    fn test_watch_command_parses() {
        let msg = command_message(
            json!({
                "command": "watch",
                "commandId": "w1",
                "path": "/",
                "recursive": true,
                "excludes": ["**/node_modules"],
            }),
            None,
        );
        let command = Command::from_message(msg).unwrap();
        assert_eq!(
            command.request,
            Request::Watch {
                path: "/".to_string(),
                recursive: true,
                excludes: vec!["**/node_modules".to_string()],
            }
        );
    }

    #[test]
    fn test_command_rejects_extra_field() {
        let msg = command_message(
            json!({ "command": "status", "commandId": "c1", "path": "/", "force": true }),
            None,
        );
        assert!(matches!(
            Command::from_message(msg),
            Err(SchemaError::InvalidFields { operation: Operation::Status, .. })
        ));
    }

    #[test]
    fn test_command_rejects_missing_and_mistyped_fields() {
        let missing = command_message(
            json!({ "command": "writeFile", "commandId": "c1", "path": "/a", "create": true }),
            None,
        );
        assert!(matches!(
            Command::from_message(missing),
            Err(SchemaError::InvalidFields { operation: Operation::WriteFile, .. })
        ));

        let mistyped = command_message(
            json!({ "command": "readFile", "commandId": "c1", "path": 42 }),
            None,
        );
        assert!(Command::from_message(mistyped).is_err());
    }

    #[test]
    fn test_command_rejects_unknown_operation() {
        let msg = command_message(json!({ "command": "chmod", "commandId": "c1" }), None);
        assert!(matches!(
            Command::from_message(msg),
            Err(SchemaError::UnknownCommand(name)) if name == "chmod"
        ));
    }

    #[test]
    fn test_command_rejects_unexpected_binary() {
        let msg = command_message(
            json!({ "command": "readFile", "commandId": "c1", "path": "/a" }),
            Some(vec![1, 2, 3]),
        );
        assert!(matches!(
            Command::from_message(msg),
            Err(SchemaError::UnexpectedBinary { operation: Operation::ReadFile })
        ));
    }

    #[test]
    fn test_write_file_without_binary_is_empty() {
        let msg = command_message(
            json!({
                "command": "writeFile",
                "commandId": "c1",
                "path": "/empty",
                "create": true,
                "overwrite": true,
            }),
            None,
        );
        match Command::from_message(msg).unwrap().request {
            Request::WriteFile { content, .. } => assert!(content.is_empty()),
            other => panic!("unexpected request: {:?}", other),
        }
    }

    #[test]
    fn test_status_response_shape() {
        let stat = FileStat {
            file_type: FileType::FILE,
            ctime: 10,
            mtime: 20,
            size: 2,
        };
        let msg = Response::success(CommandId::from("s1"), Reply::Status(stat)).into_message();
        assert_eq!(
            Value::Object(msg.json.clone()),
            json!({ "commandId": "s1", "success": true, "type": 1, "ctime": 10, "mtime": 20, "size": 2 })
        );

        let decoded = Response::from_message(msg, Operation::Status).unwrap();
        assert_eq!(decoded.outcome, Ok(Reply::Status(stat)));
    }

    #[test]
    fn test_read_file_response_carries_binary() {
        let msg = Response::success(CommandId::from("r1"), Reply::ReadFile(b"hello".to_vec()))
            .into_message();
        assert_eq!(msg.binary.as_deref(), Some(&b"hello"[..]));

        let frame = msg.encode().unwrap();
        let decoded = Response::from_message(Message::decode(&frame).unwrap(), Operation::ReadFile).unwrap();
        assert_eq!(decoded.outcome, Ok(Reply::ReadFile(b"hello".to_vec())));
    }

    #[test]
    fn test_read_directory_response() {
        let entries = vec![
            DirEntry {
                name: "dir".to_string(),
                file_type: FileType::DIRECTORY,
            },
            DirEntry {
                name: "a.txt".to_string(),
                file_type: FileType::FILE,
            },
        ];
        let msg = Response::success(CommandId::from("d1"), Reply::ReadDirectory(entries.clone()))
            .into_message();
        let decoded = Response::from_message(msg, Operation::ReadDirectory).unwrap();
        assert_eq!(decoded.outcome, Ok(Reply::ReadDirectory(entries)));
    }

    #[test]
    fn test_failure_response_roundtrip() {
        let msg = Response::failure(CommandId::from("f1"), FileErrorCode::FileNotFound).into_message();
        assert_eq!(msg.json.get("error"), Some(&json!("FileNotFound")));
        assert!(msg.binary.is_none());

        let decoded = Response::from_message(msg, Operation::ReadFile).unwrap();
        assert_eq!(decoded.outcome, Err(FileErrorCode::FileNotFound));
    }

    #[test]
    fn test_response_rejects_unknown_error_code() {
        let msg = response_message(
            json!({ "commandId": "f1", "success": false, "error": "DiskOnFire" }),
            None,
        );
        assert!(matches!(
            Response::from_message(msg, Operation::ReadFile),
            Err(SchemaError::UnknownErrorCode(code)) if code == "DiskOnFire"
        ));
    }

    #[test]
    fn test_response_rejects_illegal_error_code() {
        let msg = Response::failure(CommandId::from("f1"), FileErrorCode::FileExists).into_message();
        assert!(matches!(
            Response::from_message(msg, Operation::ReadFile),
            Err(SchemaError::IllegalErrorCode {
                operation: Operation::ReadFile,
                code: FileErrorCode::FileExists,
            })
        ));
    }

    #[test]
    fn test_response_rejects_wrong_shape() {
        let extra = response_message(
            json!({ "commandId": "x", "success": true, "created": true, "bonus": 1 }),
            None,
        );
        assert!(Response::from_message(extra, Operation::WriteFile).is_err());

        let missing = response_message(json!({ "commandId": "x", "success": true }), None);
        assert!(Response::from_message(missing, Operation::WriteFile).is_err());

        let binary = response_message(json!({ "commandId": "x", "success": true }), Some(vec![1]));
        assert!(matches!(
            Response::from_message(binary, Operation::Delete),
            Err(SchemaError::UnexpectedBinary { operation: Operation::Delete })
        ));
    }

    #[test]
    fn test_response_rejects_command_message() {
        let msg = command_message(json!({ "command": "status", "commandId": "c", "path": "/" }), None);
        assert!(matches!(
            Response::from_message(msg, Operation::Status),
            Err(SchemaError::WrongMessageType { .. })
        ));
    }
}
