//! Workspace resources: files and folders under an analysis root.
//!
//! The [`Workspace`] exclusively owns its [`Resource`] handles, addressed by
//! root-relative `/`-separated paths. Resources own their on-disk text
//! projections: reads decode according to the file's declared encoding and
//! writes re-encode with the same declaration, so round-tripping a file
//! never changes its byte-level encoding.
//!
//! Source enumeration excludes dot-prefixed folders and byte-compile
//! artifacts, and returns paths in sorted order for deterministic analysis.
//!
//! Change observers registered on the workspace run synchronously on the
//! caller's thread when a file is written, removed or moved.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::{OnceLock, RwLock};
use std::time::SystemTime;

use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::debug;
use walkdir::WalkDir;

use crate::config::WorkspaceConfig;
use crate::error::{HawserError, HawserResult};

// ============================================================================
// Content Hash
// ============================================================================

/// SHA-256 over file bytes, hex encoded.
///
/// The module cache keys on (path, content hash): two files with identical
/// bytes share analysis identity, and an edit is detected even when the
/// modification time is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash(pub String);

impl ContentHash {
    /// Compute the hash of `data`.
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentHash(hex::encode(hasher.finalize()))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Resource
// ============================================================================

/// Kind of a workspace resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    File,
    Folder,
}

/// A file or folder under the workspace root.
///
/// Resources are value handles: the workspace is the authority on their
/// existence and contents. The path is root-relative with `/` separators;
/// the empty path is the root folder itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Resource {
    path: String,
    kind: ResourceKind,
}

impl Resource {
    pub(crate) fn new(path: impl Into<String>, kind: ResourceKind) -> Self {
        Resource {
            path: path.into(),
            kind,
        }
    }

    /// Root-relative `/`-separated path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Final path segment.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or("")
    }

    /// True for folders.
    pub fn is_folder(&self) -> bool {
        self.kind == ResourceKind::Folder
    }

    /// Path of the containing folder (empty string for the root's children).
    pub fn parent_path(&self) -> &str {
        match self.path.rfind('/') {
            Some(i) => &self.path[..i],
            None => "",
        }
    }
}

// ============================================================================
// Encoding
// ============================================================================

/// Encodings the workspace decodes natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Utf8,
    Latin1,
    Ascii,
}

fn encoding_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"coding[=:]\s*([-\w.]+)").unwrap())
}

/// Sniff the declared encoding from the first two lines of `data`.
///
/// Returns `None` when no declaration is present (UTF-8 governs). Unknown
/// declared codings degrade to UTF-8 with lossy decoding.
fn conclude_encoding(data: &[u8]) -> Option<Encoding> {
    let mut end = data.len();
    let mut newlines = 0;
    for (i, &b) in data.iter().enumerate() {
        if b == b'\n' {
            newlines += 1;
            if newlines == 2 {
                end = i;
                break;
            }
        }
    }
    let head = String::from_utf8_lossy(&data[..end]);
    let declared = encoding_pattern().captures(&head)?.get(1)?.as_str();
    match declared.to_ascii_lowercase().as_str() {
        "utf-8" | "utf8" => Some(Encoding::Utf8),
        "latin-1" | "latin1" | "iso-8859-1" => Some(Encoding::Latin1),
        "ascii" | "us-ascii" => Some(Encoding::Ascii),
        _ => None,
    }
}

fn decode(data: &[u8]) -> String {
    match conclude_encoding(data) {
        Some(Encoding::Latin1) => data.iter().map(|&b| b as char).collect(),
        // ASCII is a UTF-8 subset; lossy decoding covers stray high bytes.
        _ => String::from_utf8_lossy(data).into_owned(),
    }
}

fn encode(text: &str) -> Vec<u8> {
    match conclude_encoding(text.as_bytes()) {
        Some(Encoding::Latin1) => text
            .chars()
            .map(|c| if (c as u32) < 256 { c as u8 } else { b'?' })
            .collect(),
        _ => text.as_bytes().to_vec(),
    }
}

// ============================================================================
// Workspace
// ============================================================================

/// Observer called synchronously when a file resource changes.
pub type ChangeObserver = Rc<dyn Fn(&Resource)>;

/// The root container owning file resources.
pub struct Workspace {
    root: PathBuf,
    config: WorkspaceConfig,
    observers: RefCell<Vec<ChangeObserver>>,
    /// Interned resource handles, path-keyed; sorted iteration order.
    resources: RefCell<BTreeMap<String, Resource>>,
    /// Generation bumped on every observed change, for coarse invalidation.
    generation: RwLock<u64>,
}

impl fmt::Debug for Workspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workspace")
            .field("root", &self.root)
            .finish()
    }
}

impl Workspace {
    /// Open a workspace rooted at `root`, creating the directory if absent.
    pub fn open(root: impl Into<PathBuf>) -> HawserResult<Self> {
        Workspace::with_config(root, WorkspaceConfig::default())
    }

    /// Open a workspace with explicit configuration.
    pub fn with_config(root: impl Into<PathBuf>, config: WorkspaceConfig) -> HawserResult<Self> {
        let root = root.into();
        if !root.exists() {
            fs::create_dir_all(&root)?;
        } else if !root.is_dir() {
            return Err(HawserError::workspace(format!(
                "workspace root {} exists and is not a directory",
                root.display()
            )));
        }
        Ok(Workspace {
            root,
            config,
            observers: RefCell::new(Vec::new()),
            resources: RefCell::new(BTreeMap::new()),
            generation: RwLock::new(0),
        })
    }

    /// The configuration this workspace was opened with.
    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    /// Absolute filesystem root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Monotonic change counter; bumped on every write/remove/move.
    pub fn generation(&self) -> u64 {
        *self.generation.read().unwrap()
    }

    fn bump_generation(&self) {
        *self.generation.write().unwrap() += 1;
    }

    fn real_path(&self, path: &str) -> PathBuf {
        let mut real = self.root.clone();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            real.push(part);
        }
        real
    }

    /// Look up the resource at `path`, failing with `ResourceNotFound` when
    /// nothing exists there.
    pub fn resource(&self, path: &str) -> HawserResult<Resource> {
        if let Some(existing) = self.resources.borrow().get(path) {
            return Ok(existing.clone());
        }
        let real = self.real_path(path);
        let kind = if real.is_file() {
            ResourceKind::File
        } else if real.is_dir() {
            ResourceKind::Folder
        } else {
            return Err(HawserError::resource_not_found(path));
        };
        let resource = Resource::new(path, kind);
        self.resources
            .borrow_mut()
            .insert(path.to_string(), resource.clone());
        Ok(resource)
    }

    /// True when `path` corresponds to an existing resource.
    pub fn has_resource(&self, path: &str) -> bool {
        self.real_path(path).exists()
    }

    /// Create an empty file at `path`.
    ///
    /// Fails with a workspace error when the file already exists or a
    /// folder occupies the path.
    pub fn create_file(&self, path: &str) -> HawserResult<Resource> {
        let real = self.real_path(path);
        if real.is_file() {
            return Err(HawserError::workspace(format!("file already exists: {}", path)));
        }
        if real.is_dir() {
            return Err(HawserError::workspace(format!(
                "a folder with the same name as this file already exists: {}",
                path
            )));
        }
        if let Some(parent) = real.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&real, b"")?;
        self.resource(path)
    }

    /// Create a folder at `path`.
    pub fn create_folder(&self, path: &str) -> HawserResult<Resource> {
        let real = self.real_path(path);
        if real.is_dir() {
            return Err(HawserError::workspace(format!("folder already exists: {}", path)));
        }
        if real.is_file() {
            return Err(HawserError::workspace(format!(
                "a file with the same name as this folder already exists: {}",
                path
            )));
        }
        fs::create_dir_all(&real)?;
        self.resource(path)
    }

    /// Read a file resource, honoring its declared encoding.
    pub fn read(&self, resource: &Resource) -> HawserResult<String> {
        if resource.is_folder() {
            return Err(HawserError::workspace(format!(
                "cannot read folder {}",
                resource.path()
            )));
        }
        let data = fs::read(self.real_path(resource.path()))
            .map_err(|_| HawserError::resource_not_found(resource.path()))?;
        Ok(decode(&data))
    }

    /// Write a file resource, preserving its declared encoding, and fire
    /// change observers synchronously.
    pub fn write(&self, resource: &Resource, contents: &str) -> HawserResult<()> {
        if resource.is_folder() {
            return Err(HawserError::workspace(format!(
                "cannot write folder {}",
                resource.path()
            )));
        }
        fs::write(self.real_path(resource.path()), encode(contents))?;
        self.bump_generation();
        self.fire_changed(resource);
        Ok(())
    }

    /// Remove a resource (recursively for folders) and fire observers.
    pub fn remove(&self, resource: &Resource) -> HawserResult<()> {
        let real = self.real_path(resource.path());
        if resource.is_folder() {
            fs::remove_dir_all(&real)?;
        } else {
            fs::remove_file(&real)?;
        }
        self.resources.borrow_mut().remove(resource.path());
        self.bump_generation();
        self.fire_changed(resource);
        Ok(())
    }

    /// Move a file resource to a new root-relative path.
    pub fn move_resource(&self, resource: &Resource, destination: &str) -> HawserResult<Resource> {
        let dest_real = self.real_path(destination);
        if let Some(parent) = dest_real.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(self.real_path(resource.path()), &dest_real)?;
        self.resources.borrow_mut().remove(resource.path());
        self.bump_generation();
        self.fire_changed(resource);
        self.resource(destination)
    }

    /// Modification time of a resource, used as the cheap validation
    /// indicator before hashing.
    pub fn mtime(&self, resource: &Resource) -> HawserResult<SystemTime> {
        let meta = fs::metadata(self.real_path(resource.path()))
            .map_err(|_| HawserError::resource_not_found(resource.path()))?;
        Ok(meta.modified()?)
    }

    /// Content hash of a file resource's current bytes.
    pub fn content_hash(&self, resource: &Resource) -> HawserResult<ContentHash> {
        let data = fs::read(self.real_path(resource.path()))
            .map_err(|_| HawserError::resource_not_found(resource.path()))?;
        Ok(ContentHash::compute(&data))
    }

    /// Immediate children of a folder resource, sorted by name.
    pub fn children(&self, folder: &Resource) -> HawserResult<Vec<Resource>> {
        if !folder.is_folder() {
            return Err(HawserError::workspace(format!(
                "{} is not a folder",
                folder.path()
            )));
        }
        let real = self.real_path(folder.path());
        let mut result = Vec::new();
        for entry in fs::read_dir(&real)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let child_path = if folder.path().is_empty() {
                name
            } else {
                format!("{}/{}", folder.path(), name)
            };
            result.push(self.resource(&child_path)?);
        }
        result.sort_by(|a, b| a.path().cmp(b.path()));
        Ok(result)
    }

    /// Enumerate source files under the root, sorted by path.
    ///
    /// Dot-prefixed folders and byte-compile artifacts (`.pyc`) are
    /// excluded from analysis.
    pub fn source_files(&self) -> HawserResult<Vec<Resource>> {
        let mut result = Vec::new();
        for entry in WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            let rel = match path.strip_prefix(&self.root) {
                Ok(p) => p,
                Err(_) => continue,
            };
            if rel
                .components()
                .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
            {
                continue;
            }
            if !path.is_file() {
                continue;
            }
            let name = rel.to_string_lossy().replace(std::path::MAIN_SEPARATOR, "/");
            if name.ends_with(".pyc") || !name.ends_with(".py") {
                continue;
            }
            result.push(self.resource(&name)?);
        }
        result.sort_by(|a, b| a.path().cmp(b.path()));
        debug!(count = result.len(), "enumerated source files");
        Ok(result)
    }

    /// Register a change observer; it runs synchronously on the caller's
    /// thread whenever a file resource changes.
    pub fn add_change_observer(&self, observer: ChangeObserver) {
        self.observers.borrow_mut().push(observer);
    }

    fn fire_changed(&self, resource: &Resource) {
        // Snapshot the list so observers may register further observers.
        let observers: Vec<ChangeObserver> = self.observers.borrow().clone();
        for observer in observers {
            observer(resource);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
