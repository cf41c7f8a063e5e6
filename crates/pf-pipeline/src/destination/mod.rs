//! Output destinations.
//!
//! A [`Destination`] creates a new named file with a declared media type and
//! hands back a writable sink. A file whose copy failed can be discarded
//! again. Two backends exist:
//!
//! - [`DirectoryDestination`]: a plain filesystem directory.
//! - [`TreeDestination`]: a permission-scoped document tree that accepts
//!   only bare display names and picks the final name itself.
//!
//! The user's choice is persisted as a [`DestinationToken`] string.

mod directory;
mod tree;

pub use directory::DirectoryDestination;
pub use tree::TreeDestination;

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use pf_core::TargetFormat;

/// Token prefix selecting the document-tree backend.
const TREE_PREFIX: &str = "tree:";
const FILE_SCHEME: &str = "file://";

/// A file freshly created at a destination.
pub struct CreatedFile {
    /// Where the file can be found again (path or document locator).
    pub locator: String,
    /// Local path, when the backend exposes one.
    pub path: Option<PathBuf>,
    /// Media type the file was registered with.
    pub media_type: String,
    /// Sink receiving the file's bytes.
    pub sink: Box<dyn Write + Send>,
}

impl fmt::Debug for CreatedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreatedFile")
            .field("locator", &self.locator)
            .field("path", &self.path)
            .field("media_type", &self.media_type)
            .finish_non_exhaustive()
    }
}

/// Capability to create new named files.
pub trait Destination: Send + Sync {
    /// Human-readable description for logs.
    fn describe(&self) -> String;

    /// Create a new file called `name` associated with `media_type`.
    ///
    /// Never overwrites an existing file.
    fn create(&self, name: &str, media_type: &str) -> pf_core::Result<CreatedFile>;

    /// Remove a file returned by [`create`](Destination::create) whose
    /// contents never completed. The sink is closed first.
    fn discard(&self, created: CreatedFile) -> pf_core::Result<()>;

    /// Local directory files end up in, when there is one.
    fn local_root(&self) -> Option<&Path> {
        None
    }
}

/// Persisted reference to a destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestinationToken {
    /// `file://<dir>` or a plain path.
    Directory(PathBuf),
    /// `tree:<dir>`.
    Tree(PathBuf),
}

impl DestinationToken {
    /// Instantiate the backend this token refers to.
    pub fn open(&self) -> pf_core::Result<Arc<dyn Destination>> {
        Ok(match self {
            DestinationToken::Directory(dir) => Arc::new(DirectoryDestination::new(dir.clone())?),
            DestinationToken::Tree(root) => Arc::new(TreeDestination::open(root.clone())?),
        })
    }
}

impl FromStr for DestinationToken {
    type Err = pf_core::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        type Ctor = fn(PathBuf) -> DestinationToken;
        let (ctor, rest): (Ctor, &str) = if let Some(rest) = s.strip_prefix(TREE_PREFIX) {
            (DestinationToken::Tree, rest)
        } else if let Some(rest) = s.strip_prefix(FILE_SCHEME) {
            (DestinationToken::Directory, rest)
        } else {
            (DestinationToken::Directory, s)
        };

        if rest.is_empty() {
            return Err(pf_core::Error::validation(format!(
                "destination token '{s}' has no directory"
            )));
        }
        Ok(ctor(PathBuf::from(rest)))
    }
}

impl fmt::Display for DestinationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DestinationToken::Directory(dir) => write!(f, "{}", dir.display()),
            DestinationToken::Tree(root) => write!(f, "{TREE_PREFIX}{}", root.display()),
        }
    }
}

/// Append the media type's extension to `name` unless it already has it.
///
/// Unknown media types leave the name untouched.
pub(crate) fn with_extension_for(name: &str, media_type: &str) -> String {
    let Some(format) = TargetFormat::from_media_type(media_type) else {
        return name.to_string();
    };
    let ext = format.extension();
    let has_ext = name
        .rsplit_once('.')
        .is_some_and(|(stem, e)| !stem.is_empty() && e.eq_ignore_ascii_case(ext));
    if has_ext {
        name.to_string()
    } else {
        format!("{name}.{ext}")
    }
}

/// Reject anything that is not a single path component.
pub(crate) fn check_bare_name(name: &str) -> pf_core::Result<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
    {
        return Err(pf_core::Error::destination(format!(
            "'{name}' is not a valid file name"
        )));
    }
    Ok(())
}
