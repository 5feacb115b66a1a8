//! In-memory hierarchical filesystem served by the reference server.
//!
//! The tree owns a single root directory. Every other entry is owned by
//! exactly one parent directory, keyed by its name, so sibling names are
//! unique by construction. Sizes are derived from content length and child
//! count, so they can never go stale.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

use remotefs_platform::filesystem::{
    DirEntry, FileErrorCode, FileStat, FileType, RenameOptions, WriteOptions,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FsError {
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("file exists: {0}")]
    Exists(String),
    #[error("is a directory: {0}")]
    IsADirectory(String),
    #[error("not a directory: {0}")]
    NotADirectory(String),
    #[error("operation not permitted: {0}")]
    NoPermissions(String),
}

impl FsError {
    /// Wire error code for this failure. Both kinds of wrong-kind access map
    /// to `FileIsADirectory`.
    pub fn code(&self) -> FileErrorCode {
        match self {
            FsError::NotFound(_) => FileErrorCode::FileNotFound,
            FsError::Exists(_) => FileErrorCode::FileExists,
            FsError::IsADirectory(_) | FsError::NotADirectory(_) => FileErrorCode::FileIsADirectory,
            FsError::NoPermissions(_) => FileErrorCode::NoPermissions,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CopyOptions {
    pub overwrite: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    name: String,
    ctime: u64,
    mtime: u64,
    data: Vec<u8>,
}

impl File {
    fn new(name: &str, data: Vec<u8>, now: u64) -> Self {
        Self {
            name: name.to_string(),
            ctime: now,
            mtime: now,
            data,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn stat(&self) -> FileStat {
        FileStat {
            file_type: FileType::FILE,
            ctime: self.ctime,
            mtime: self.mtime,
            size: self.size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    name: String,
    ctime: u64,
    mtime: u64,
    entries: HashMap<String, Entry>,
}

impl Directory {
    fn new(name: &str, now: u64) -> Self {
        Self {
            name: name.to_string(),
            ctime: now,
            mtime: now,
            entries: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of direct children
    pub fn size(&self) -> u64 {
        self.entries.len() as u64
    }

    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.entries.get(name)
    }

    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    pub fn stat(&self) -> FileStat {
        FileStat {
            file_type: FileType::DIRECTORY,
            ctime: self.ctime,
            mtime: self.mtime,
            size: self.size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    File(File),
    Directory(Directory),
}

impl Entry {
    pub fn name(&self) -> &str {
        match self {
            Entry::File(f) => f.name(),
            Entry::Directory(d) => d.name(),
        }
    }

    pub fn file_type(&self) -> FileType {
        match self {
            Entry::File(_) => FileType::FILE,
            Entry::Directory(_) => FileType::DIRECTORY,
        }
    }

    pub fn stat(&self) -> FileStat {
        match self {
            Entry::File(f) => f.stat(),
            Entry::Directory(d) => d.stat(),
        }
    }

    fn rename_to(&mut self, name: &str, now: u64) {
        match self {
            Entry::File(f) => {
                f.name = name.to_string();
                f.mtime = now;
            }
            Entry::Directory(d) => {
                d.name = name.to_string();
                d.mtime = now;
            }
        }
    }
}

/// Split a `/`-delimited path into its non-empty segments
fn segments(path: &str) -> Vec<&str> {
    path.split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect()
}

/// Split a path into its parent segments and final name. `None` for the root.
fn split_parent(path: &str) -> Option<(Vec<&str>, &str)> {
    let mut segs = segments(path);
    let name = segs.pop()?;
    Some((segs, name))
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Wall-clock milliseconds, forced to increase on every call so that each
/// mutation gets a distinct timestamp. Only called once a mutation is known
/// to succeed.
fn tick(last_tick: &mut u64) -> u64 {
    let now = now_millis().max(*last_tick + 1);
    *last_tick = now;
    now
}

fn directory_mut<'a>(root: &'a mut Entry, segs: &[&str], path: &str) -> Result<&'a mut Directory, FsError> {
    match walk_mut(root, segs, path)? {
        Entry::Directory(dir) => Ok(dir),
        Entry::File(_) => Err(FsError::NotADirectory(path.to_string())),
    }
}

fn walk<'a>(mut node: &'a Entry, segs: &[&str], path: &str) -> Result<&'a Entry, FsError> {
    for seg in segs {
        node = match node {
            Entry::Directory(dir) => dir
                .entries
                .get(*seg)
                .ok_or_else(|| FsError::NotFound(path.to_string()))?,
            Entry::File(_) => return Err(FsError::NotADirectory(path.to_string())),
        };
    }
    Ok(node)
}

fn walk_mut<'a>(mut node: &'a mut Entry, segs: &[&str], path: &str) -> Result<&'a mut Entry, FsError> {
    for seg in segs {
        node = match node {
            Entry::Directory(dir) => dir
                .entries
                .get_mut(*seg)
                .ok_or_else(|| FsError::NotFound(path.to_string()))?,
            Entry::File(_) => return Err(FsError::NotADirectory(path.to_string())),
        };
    }
    Ok(node)
}

/// In-memory tree. Not persisted.
#[derive(Debug, Clone)]
pub struct MemoryTree {
    root: Entry,
    last_tick: u64,
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTree {
    pub fn new() -> Self {
        let now = now_millis();
        Self {
            root: Entry::Directory(Directory::new("", now)),
            last_tick: now,
        }
    }

    fn directory_at(&self, segs: &[&str], path: &str) -> Result<&Directory, FsError> {
        match walk(&self.root, segs, path)? {
            Entry::Directory(dir) => Ok(dir),
            Entry::File(_) => Err(FsError::NotADirectory(path.to_string())),
        }
    }

    pub fn lookup(&self, path: &str) -> Option<&Entry> {
        walk(&self.root, &segments(path), path).ok()
    }

    pub fn lookup_file(&self, path: &str) -> Result<&File, FsError> {
        match walk(&self.root, &segments(path), path)? {
            Entry::File(file) => Ok(file),
            Entry::Directory(_) => Err(FsError::IsADirectory(path.to_string())),
        }
    }

    pub fn lookup_directory(&self, path: &str) -> Result<&Directory, FsError> {
        self.directory_at(&segments(path), path)
    }

    pub fn stat(&self, path: &str) -> Result<FileStat, FsError> {
        walk(&self.root, &segments(path), path).map(Entry::stat)
    }

    /// Children of a directory, directories first, then by name
    pub fn read_directory(&self, path: &str) -> Result<Vec<DirEntry>, FsError> {
        let dir = self.lookup_directory(path)?;
        let mut entries: Vec<DirEntry> = dir
            .entries()
            .map(|entry| DirEntry {
                name: entry.name().to_string(),
                file_type: entry.file_type(),
            })
            .collect();
        entries.sort_by(|a, b| {
            b.file_type
                .is_directory()
                .cmp(&a.file_type.is_directory())
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(entries)
    }

    pub fn read_file(&self, path: &str) -> Result<&[u8], FsError> {
        self.lookup_file(path).map(File::data)
    }

    /// Create or replace a file. Returns whether the file was newly created.
    pub fn write_file(&mut self, path: &str, content: Vec<u8>, options: WriteOptions) -> Result<bool, FsError> {
        let (parent_segs, name) =
            split_parent(path).ok_or_else(|| FsError::IsADirectory(path.to_string()))?;
        let parent = directory_mut(&mut self.root, &parent_segs, path)?;

        match parent.entries.get_mut(name) {
            Some(Entry::Directory(_)) => Err(FsError::IsADirectory(path.to_string())),
            Some(Entry::File(_)) if options.create && !options.overwrite => {
                Err(FsError::Exists(path.to_string()))
            }
            Some(Entry::File(file)) => {
                file.data = content;
                file.mtime = tick(&mut self.last_tick);
                Ok(false)
            }
            None if !options.create => Err(FsError::NotFound(path.to_string())),
            None => {
                let now = tick(&mut self.last_tick);
                parent
                    .entries
                    .insert(name.to_string(), Entry::File(File::new(name, content, now)));
                parent.mtime = now;
                Ok(true)
            }
        }
    }

    pub fn create_directory(&mut self, path: &str) -> Result<(), FsError> {
        let (parent_segs, name) =
            split_parent(path).ok_or_else(|| FsError::Exists(path.to_string()))?;
        let parent = directory_mut(&mut self.root, &parent_segs, path)?;

        if parent.entries.contains_key(name) {
            return Err(FsError::Exists(path.to_string()));
        }
        let now = tick(&mut self.last_tick);
        parent
            .entries
            .insert(name.to_string(), Entry::Directory(Directory::new(name, now)));
        parent.mtime = now;
        Ok(())
    }

    /// Remove an entry, including everything below it
    pub fn delete(&mut self, path: &str) -> Result<(), FsError> {
        let (parent_segs, name) =
            split_parent(path).ok_or_else(|| FsError::NoPermissions(path.to_string()))?;
        let parent = directory_mut(&mut self.root, &parent_segs, path)?;

        parent
            .entries
            .remove(name)
            .ok_or_else(|| FsError::NotFound(path.to_string()))?;
        parent.mtime = tick(&mut self.last_tick);
        Ok(())
    }

    /// Move an entry. Every check runs before the entry is detached, so a
    /// failed rename leaves the tree untouched.
    pub fn rename(&mut self, old_path: &str, new_path: &str, options: RenameOptions) -> Result<(), FsError> {
        let (old_parent, old_name) =
            split_parent(old_path).ok_or_else(|| FsError::NoPermissions(old_path.to_string()))?;
        let (new_parent, new_name) =
            split_parent(new_path).ok_or_else(|| FsError::NoPermissions(new_path.to_string()))?;

        let old_segs = segments(old_path);
        let new_segs = segments(new_path);

        walk(&self.root, &old_segs, old_path)?;
        if old_segs == new_segs {
            return Ok(());
        }
        if new_segs.starts_with(&old_segs) {
            return Err(FsError::NoPermissions(new_path.to_string()));
        }

        let destination = self.directory_at(&new_parent, new_path)?;
        if destination.entries.contains_key(new_name) && !options.overwrite {
            return Err(FsError::Exists(new_path.to_string()));
        }

        let now = tick(&mut self.last_tick);
        let source = directory_mut(&mut self.root, &old_parent, old_path)?;
        let mut entry = source
            .entries
            .remove(old_name)
            .ok_or_else(|| FsError::NotFound(old_path.to_string()))?;
        source.mtime = now;
        entry.rename_to(new_name, now);

        match directory_mut(&mut self.root, &new_parent, new_path) {
            Ok(destination) => {
                destination.entries.insert(new_name.to_string(), entry);
                destination.mtime = now;
                Ok(())
            }
            Err(e) => {
                // Put the entry back where it came from
                entry.rename_to(old_name, now);
                if let Ok(source) = directory_mut(&mut self.root, &old_parent, old_path) {
                    source.entries.insert(old_name.to_string(), entry);
                }
                Err(e)
            }
        }
    }

    /// Copy a single file. Directory copy is not supported.
    pub fn copy(&mut self, source_path: &str, destination_path: &str, options: CopyOptions) -> Result<(), FsError> {
        let (dest_parent, dest_name) = split_parent(destination_path)
            .ok_or_else(|| FsError::IsADirectory(destination_path.to_string()))?;
        let data = self.lookup_file(source_path)?.data.clone();

        if segments(source_path) == segments(destination_path) {
            return if options.overwrite {
                Ok(())
            } else {
                Err(FsError::Exists(destination_path.to_string()))
            };
        }

        let parent = directory_mut(&mut self.root, &dest_parent, destination_path)?;
        if parent.entries.contains_key(dest_name) && !options.overwrite {
            return Err(FsError::Exists(destination_path.to_string()));
        }
        let now = tick(&mut self.last_tick);
        parent
            .entries
            .insert(dest_name.to_string(), Entry::File(File::new(dest_name, data, now)));
        parent.mtime = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CREATE: WriteOptions = WriteOptions {
        create: true,
        overwrite: false,
    };
    const OVERWRITE: WriteOptions = WriteOptions {
        create: true,
        overwrite: true,
    };

    fn names(tree: &MemoryTree, path: &str) -> Vec<String> {
        tree.read_directory(path)
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect()
    }

    #[test]
    fn test_write_file_create_then_exists_then_overwrite() {
        let mut tree = MemoryTree::new();
        assert!(tree.write_file("/a.txt", b"hi".to_vec(), CREATE).unwrap());
        assert_eq!(
            tree.write_file("/a.txt", b"hi".to_vec(), CREATE),
            Err(FsError::Exists("/a.txt".to_string()))
        );
        assert!(!tree.write_file("/a.txt", b"bye!".to_vec(), OVERWRITE).unwrap());
        assert_eq!(tree.read_file("/a.txt").unwrap(), b"bye!");
        assert_eq!(tree.stat("/a.txt").unwrap().size, 4);
    }

    #[test]
    fn test_write_file_without_create() {
        let mut tree = MemoryTree::new();
        let update = WriteOptions {
            create: false,
            overwrite: false,
        };
        assert!(matches!(
            tree.write_file("/a.txt", vec![], update),
            Err(FsError::NotFound(_))
        ));
        tree.write_file("/a.txt", b"1".to_vec(), CREATE).unwrap();
        assert!(!tree.write_file("/a.txt", b"2".to_vec(), update).unwrap());
        assert_eq!(tree.read_file("/a.txt").unwrap(), b"2");
    }

    #[test]
    fn test_write_file_errors() {
        let mut tree = MemoryTree::new();
        tree.create_directory("/dir").unwrap();
        assert_eq!(
            tree.write_file("/dir", vec![], OVERWRITE).unwrap_err().code(),
            FileErrorCode::FileIsADirectory
        );
        assert_eq!(
            tree.write_file("/missing/a.txt", vec![], OVERWRITE).unwrap_err().code(),
            FileErrorCode::FileNotFound
        );
        assert_eq!(
            tree.write_file("/", vec![], OVERWRITE).unwrap_err().code(),
            FileErrorCode::FileIsADirectory
        );
    }

    #[test]
    fn test_read_missing_file() {
        let tree = MemoryTree::new();
        assert_eq!(
            tree.read_file("/missing.txt"),
            Err(FsError::NotFound("/missing.txt".to_string()))
        );
        assert!(tree.lookup("/missing.txt").is_none());
    }

    #[test]
    fn test_lookup_kind_mismatch() {
        let mut tree = MemoryTree::new();
        tree.create_directory("/dir").unwrap();
        tree.write_file("/file", b"x".to_vec(), CREATE).unwrap();

        assert!(matches!(tree.lookup_file("/dir"), Err(FsError::IsADirectory(_))));
        assert!(matches!(tree.lookup_directory("/file"), Err(FsError::NotADirectory(_))));
        assert!(matches!(tree.lookup("/file/child"), None));
        assert!(matches!(
            tree.write_file("/file/child", vec![], CREATE),
            Err(FsError::NotADirectory(_))
        ));
        assert!(tree.lookup_directory("/").is_ok());
    }

    #[test]
    fn test_create_directory() {
        let mut tree = MemoryTree::new();
        tree.create_directory("/a").unwrap();
        tree.create_directory("/a/b").unwrap();
        assert_eq!(tree.create_directory("/a"), Err(FsError::Exists("/a".to_string())));
        assert!(matches!(tree.create_directory("/x/y"), Err(FsError::NotFound(_))));
        assert!(matches!(tree.create_directory("/"), Err(FsError::Exists(_))));

        let stat = tree.stat("/a").unwrap();
        assert_eq!(stat.file_type, FileType::DIRECTORY);
        assert_eq!(stat.size, 1);
        assert_eq!(tree.stat("/a/b").unwrap().size, 0);
    }

    #[test]
    fn test_read_directory_sorted() {
        let mut tree = MemoryTree::new();
        tree.write_file("/b.txt", vec![], CREATE).unwrap();
        tree.write_file("/a.txt", vec![], CREATE).unwrap();
        tree.create_directory("/z").unwrap();
        assert_eq!(names(&tree, "/"), vec!["z", "a.txt", "b.txt"]);
        assert_eq!(tree.stat("/").unwrap().size, 3);
    }

    #[test]
    fn test_delete() {
        let mut tree = MemoryTree::new();
        tree.create_directory("/dir").unwrap();
        tree.write_file("/dir/a.txt", b"a".to_vec(), CREATE).unwrap();
        assert_eq!(tree.stat("/dir").unwrap().size, 1);

        tree.delete("/dir/a.txt").unwrap();
        assert_eq!(tree.stat("/dir").unwrap().size, 0);
        assert!(matches!(tree.delete("/dir/a.txt"), Err(FsError::NotFound(_))));

        tree.write_file("/dir/b.txt", b"b".to_vec(), CREATE).unwrap();
        tree.delete("/dir").unwrap();
        assert!(tree.lookup("/dir/b.txt").is_none());
        assert!(matches!(tree.delete("/"), Err(FsError::NoPermissions(_))));
    }

    #[test]
    fn test_rename_into_directory() {
        let mut tree = MemoryTree::new();
        tree.write_file("/a.txt", b"hi".to_vec(), CREATE).unwrap();
        tree.create_directory("/dir").unwrap();

        tree.rename("/a.txt", "/dir/a.txt", RenameOptions { overwrite: false })
            .unwrap();

        let listing = tree.read_directory("/dir").unwrap();
        assert_eq!(
            listing,
            vec![DirEntry {
                name: "a.txt".to_string(),
                file_type: FileType::FILE,
            }]
        );
        assert_eq!(names(&tree, "/"), vec!["dir"]);
        assert_eq!(tree.read_file("/dir/a.txt").unwrap(), b"hi");
    }

    #[test]
    fn test_rename_existing_destination() {
        let mut tree = MemoryTree::new();
        tree.write_file("/a", b"a".to_vec(), CREATE).unwrap();
        tree.write_file("/b", b"b".to_vec(), CREATE).unwrap();

        assert_eq!(
            tree.rename("/a", "/b", RenameOptions { overwrite: false }),
            Err(FsError::Exists("/b".to_string()))
        );
        assert_eq!(tree.read_file("/a").unwrap(), b"a");
        assert_eq!(tree.read_file("/b").unwrap(), b"b");

        tree.rename("/a", "/b", RenameOptions { overwrite: true }).unwrap();
        assert!(tree.lookup("/a").is_none());
        assert_eq!(tree.read_file("/b").unwrap(), b"a");
        assert_eq!(tree.lookup("/b").unwrap().name(), "b");
        assert_eq!(tree.stat("/").unwrap().size, 1);
    }

    #[test]
    fn test_rename_failures_leave_tree_untouched() {
        let mut tree = MemoryTree::new();
        tree.create_directory("/dir").unwrap();
        tree.write_file("/dir/a", b"a".to_vec(), CREATE).unwrap();
        let before = tree.clone();

        assert!(matches!(
            tree.rename("/dir", "/dir/sub/dir", RenameOptions { overwrite: true }),
            Err(FsError::NoPermissions(_))
        ));
        assert!(matches!(
            tree.rename("/dir/a", "/nowhere/a", RenameOptions { overwrite: true }),
            Err(FsError::NotFound(_))
        ));
        assert!(matches!(
            tree.rename("/missing", "/b", RenameOptions { overwrite: true }),
            Err(FsError::NotFound(_))
        ));
        assert!(matches!(
            tree.rename("/", "/b", RenameOptions { overwrite: true }),
            Err(FsError::NoPermissions(_))
        ));
        assert_eq!(tree.root, before.root);
    }

    #[test]
    fn test_rename_same_path_is_noop() {
        let mut tree = MemoryTree::new();
        tree.write_file("/a", b"a".to_vec(), CREATE).unwrap();
        tree.rename("/a", "//a", RenameOptions { overwrite: false }).unwrap();
        assert_eq!(tree.read_file("/a").unwrap(), b"a");
    }

    #[test]
    fn test_rename_directory_moves_subtree() {
        let mut tree = MemoryTree::new();
        tree.create_directory("/src").unwrap();
        tree.create_directory("/dst").unwrap();
        tree.write_file("/src/f", b"f".to_vec(), CREATE).unwrap();

        tree.rename("/src", "/dst/moved", RenameOptions::default()).unwrap();
        assert_eq!(tree.read_file("/dst/moved/f").unwrap(), b"f");
        assert_eq!(names(&tree, "/"), vec!["dst"]);
        assert_eq!(tree.lookup_directory("/dst/moved").unwrap().name(), "moved");
    }

    #[test]
    fn test_copy_file() {
        let mut tree = MemoryTree::new();
        tree.write_file("/a", b"data".to_vec(), CREATE).unwrap();
        tree.create_directory("/dir").unwrap();

        tree.copy("/a", "/dir/b", CopyOptions::default()).unwrap();
        assert_eq!(tree.read_file("/dir/b").unwrap(), b"data");
        assert_eq!(tree.read_file("/a").unwrap(), b"data");

        assert!(matches!(
            tree.copy("/a", "/dir/b", CopyOptions::default()),
            Err(FsError::Exists(_))
        ));
        assert!(matches!(
            tree.copy("/dir", "/dir2", CopyOptions { overwrite: true }),
            Err(FsError::IsADirectory(_))
        ));
        assert!(matches!(
            tree.copy("/missing", "/c", CopyOptions::default()),
            Err(FsError::NotFound(_))
        ));
    }

    #[test]
    fn test_mtime_follows_mutations() {
        let mut tree = MemoryTree::new();
        tree.write_file("/a", b"1".to_vec(), CREATE).unwrap();
        let created = tree.stat("/a").unwrap();
        assert_eq!(created.ctime, created.mtime);

        tree.write_file("/a", b"22".to_vec(), OVERWRITE).unwrap();
        let updated = tree.stat("/a").unwrap();
        assert!(updated.mtime > created.mtime);
        assert_eq!(updated.ctime, created.ctime);
        assert_eq!(updated.size, 2);

        let root_before = tree.stat("/").unwrap().mtime;
        tree.create_directory("/d").unwrap();
        assert!(tree.stat("/").unwrap().mtime > root_before);
    }

    #[test]
    fn test_failed_mutations_leave_clock_alone() {
        let mut tree = MemoryTree::new();
        tree.write_file("/a", b"1".to_vec(), CREATE).unwrap();
        tree.create_directory("/d").unwrap();
        let before = tree.last_tick;

        assert!(tree.write_file("/a", b"2".to_vec(), CREATE).is_err());
        assert!(tree.write_file("/d", b"2".to_vec(), OVERWRITE).is_err());
        assert!(tree.write_file("/missing/a", b"2".to_vec(), CREATE).is_err());
        assert!(tree.create_directory("/d").is_err());
        assert!(tree.delete("/nope").is_err());
        assert!(tree.copy("/a", "/d", CopyOptions::default()).is_err());
        assert!(tree.rename("/nope", "/x", RenameOptions::default()).is_err());

        assert_eq!(tree.last_tick, before);
        assert_eq!(tree.read_file("/a").unwrap(), b"1");
    }

    fn assert_consistent(dir: &Directory) {
        for (key, entry) in &dir.entries {
            assert_eq!(key, entry.name());
            if let Entry::Directory(child) = entry {
                assert_eq!(child.size(), child.entries.len() as u64);
                assert_consistent(child);
            }
        }
    }

    #[test]
    fn test_keys_match_names_after_mixed_operations() {
        let mut tree = MemoryTree::new();
        tree.create_directory("/a").unwrap();
        tree.create_directory("/a/b").unwrap();
        tree.write_file("/a/b/f", b"1".to_vec(), CREATE).unwrap();
        tree.write_file("/g", b"2".to_vec(), CREATE).unwrap();
        tree.rename("/a/b/f", "/a/f2", RenameOptions::default()).unwrap();
        tree.rename("/g", "/a/f2", RenameOptions { overwrite: true }).unwrap();
        tree.copy("/a/f2", "/a/b/f3", CopyOptions::default()).unwrap();
        tree.rename("/a/b", "/c", RenameOptions::default()).unwrap();
        tree.delete("/a/f2").unwrap();

        match &tree.root {
            Entry::Directory(root) => assert_consistent(root),
            Entry::File(_) => panic!("root must be a directory"),
        }
        assert_eq!(names(&tree, "/"), vec!["a", "c"]);
        assert_eq!(tree.read_file("/c/f3").unwrap(), b"2");
        assert_eq!(tree.stat("/a").unwrap().size, 0);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(FsError::NotFound("/".into()).code(), FileErrorCode::FileNotFound);
        assert_eq!(FsError::Exists("/".into()).code(), FileErrorCode::FileExists);
        assert_eq!(FsError::NotADirectory("/".into()).code(), FileErrorCode::FileIsADirectory);
        assert_eq!(FsError::NoPermissions("/".into()).code(), FileErrorCode::NoPermissions);
    }
}
