use std::fmt;
use std::ops::BitOr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Entry kind as a bit set, so a symbolic link can also be a file or directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileType(u32);

impl FileType {
    pub const UNKNOWN: FileType = FileType(0);
    pub const FILE: FileType = FileType(1);
    pub const DIRECTORY: FileType = FileType(2);
    pub const SYMBOLIC_LINK: FileType = FileType(64);

    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: FileType) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn is_file(self) -> bool {
        self.contains(Self::FILE)
    }

    pub fn is_directory(self) -> bool {
        self.contains(Self::DIRECTORY)
    }
}

impl BitOr for FileType {
    type Output = FileType;

    fn bitor(self, rhs: FileType) -> FileType {
        FileType(self.0 | rhs.0)
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_directory() {
            "directory"
        } else if self.is_file() {
            "file"
        } else {
            "unknown"
        };
        if self.contains(Self::SYMBOLIC_LINK) {
            write!(f, "symlink ({})", kind)
        } else {
            f.write_str(kind)
        }
    }
}

/// Metadata for a single entry. Timestamps are milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStat {
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub ctime: u64,
    pub mtime: u64,
    /// Byte length for files, child count for directories
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
}

/// The closed set of filesystem error codes shared by the tree, the wire
/// protocol and host integrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileErrorCode {
    FileNotFound,
    FileExists,
    FileIsADirectory,
    NoPermissions,
    Unauthorized,
}

impl FileErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            FileErrorCode::FileNotFound => "FileNotFound",
            FileErrorCode::FileExists => "FileExists",
            FileErrorCode::FileIsADirectory => "FileIsADirectory",
            FileErrorCode::NoPermissions => "NoPermissions",
            FileErrorCode::Unauthorized => "Unauthorized",
        }
    }
}

impl fmt::Display for FileErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteOptions {
    pub create: bool,
    pub overwrite: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenameOptions {
    pub overwrite: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The remote filesystem answered with an error code
    #[error("{0}")]
    Code(FileErrorCode),
    /// The request never produced a filesystem result (transport or protocol fault)
    #[error("remote filesystem unavailable: {0}")]
    Unavailable(String),
}

impl From<FileErrorCode> for ProviderError {
    fn from(code: FileErrorCode) -> Self {
        ProviderError::Code(code)
    }
}

/// What an editor integration needs from a mounted remote tree.
#[async_trait]
pub trait FileSystemProvider: Send + Sync {
    /// Open the underlying connection if it is not already open
    async fn ensure_connected(&self) -> Result<(), ProviderError>;

    async fn stat(&self, path: &str) -> Result<FileStat, ProviderError>;
    async fn read_directory(&self, path: &str) -> Result<Vec<DirEntry>, ProviderError>;
    async fn create_directory(&self, path: &str) -> Result<(), ProviderError>;
    async fn read_file(&self, path: &str) -> Result<Vec<u8>, ProviderError>;

    /// Returns whether the file was newly created
    async fn write_file(
        &self,
        path: &str,
        content: Vec<u8>,
        options: WriteOptions,
    ) -> Result<bool, ProviderError>;

    async fn delete(&self, path: &str) -> Result<(), ProviderError>;
    async fn rename(
        &self,
        old_path: &str,
        new_path: &str,
        options: RenameOptions,
    ) -> Result<(), ProviderError>;
}

#[derive(Debug, Error)]
#[error("unknown file error code: {0}")]
pub struct UnknownErrorCode(pub String);

impl std::str::FromStr for FileErrorCode {
    type Err = UnknownErrorCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FileNotFound" => Ok(FileErrorCode::FileNotFound),
            "FileExists" => Ok(FileErrorCode::FileExists),
            "FileIsADirectory" => Ok(FileErrorCode::FileIsADirectory),
            "NoPermissions" => Ok(FileErrorCode::NoPermissions),
            "Unauthorized" => Ok(FileErrorCode::Unauthorized),
            other => Err(UnknownErrorCode(other.to_string())),
        }
    }
}
