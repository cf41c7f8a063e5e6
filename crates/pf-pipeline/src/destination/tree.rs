use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{BufWriter, ErrorKind};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::directory::remove_if_present;
use super::{check_bare_name, with_extension_for, CreatedFile, Destination, TREE_PREFIX};

/// Records the media type of every document created through the tree.
const MANIFEST_NAME: &str = ".pixforge-documents.json";

/// Upper bound on ` (n)` suffixes tried before giving up.
const MAX_DUPLICATES: u32 = 10_000;

/// Permission-scoped document tree.
///
/// Behaves like a document provider: callers supply a display name and a
/// media type, the tree decides the final name (adding the extension and a
/// ` (n)` suffix on collision) and records the media type alongside the
/// document. The root must already exist; the tree never creates it.
#[derive(Debug)]
pub struct TreeDestination {
    root: PathBuf,
    manifest_lock: Mutex<()>,
}

impl TreeDestination {
    pub fn open(root: PathBuf) -> pf_core::Result<Self> {
        if !root.is_dir() {
            return Err(pf_core::Error::destination(format!(
                "document tree {} is not accessible",
                root.display()
            )));
        }
        Ok(Self {
            root,
            manifest_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Media type recorded for a document, if it was created through the tree.
    pub fn media_type_of(&self, name: &str) -> pf_core::Result<Option<String>> {
        let _guard = self.manifest_lock.lock();
        Ok(self.read_manifest()?.remove(name))
    }

    fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_NAME)
    }

    fn read_manifest(&self) -> pf_core::Result<BTreeMap<String, String>> {
        match std::fs::read_to_string(self.manifest_path()) {
            Ok(text) => serde_json::from_str(&text).map_err(|e| {
                pf_core::Error::destination(format!("corrupt document manifest: {e}"))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_manifest(&self, manifest: &BTreeMap<String, String>) -> pf_core::Result<()> {
        let json = serde_json::to_string_pretty(manifest)
            .map_err(|e| pf_core::Error::Internal(format!("manifest serialize: {e}")))?;
        std::fs::write(self.manifest_path(), json)?;
        Ok(())
    }
}

/// `name (n).ext` for the n-th duplicate of `name`.
fn duplicate_name(name: &str, n: u32) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem} ({n}).{ext}"),
        _ => format!("{name} ({n})"),
    }
}

impl Destination for TreeDestination {
    fn describe(&self) -> String {
        format!("document tree {}", self.root.display())
    }

    fn create(&self, name: &str, media_type: &str) -> pf_core::Result<CreatedFile> {
        check_bare_name(name)?;
        if name == MANIFEST_NAME {
            return Err(pf_core::Error::destination(format!(
                "'{name}' is reserved"
            )));
        }

        let display_name = with_extension_for(name, media_type);

        let _guard = self.manifest_lock.lock();
        let mut attempt = 0;
        let (final_name, file) = loop {
            let candidate = if attempt == 0 {
                display_name.clone()
            } else {
                duplicate_name(&display_name, attempt)
            };
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.root.join(&candidate))
            {
                Ok(file) => break (candidate, file),
                Err(e) if e.kind() == ErrorKind::AlreadyExists && attempt < MAX_DUPLICATES => {
                    attempt += 1;
                }
                Err(e) => {
                    return Err(pf_core::Error::destination(format!(
                        "cannot create '{candidate}' in {}: {e}",
                        self.root.display()
                    )))
                }
            }
        };

        if final_name != display_name {
            tracing::debug!("'{display_name}' exists in tree; created '{final_name}'");
        }

        let path = self.root.join(&final_name);
        let recorded = self.read_manifest().and_then(|mut manifest| {
            manifest.insert(final_name.clone(), media_type.to_string());
            self.write_manifest(&manifest)
        });
        if let Err(e) = recorded {
            drop(file);
            if let Err(cleanup) = remove_if_present(&path) {
                tracing::warn!("Leaving unregistered '{final_name}' behind: {cleanup}");
            }
            return Err(e);
        }

        Ok(CreatedFile {
            locator: format!("{TREE_PREFIX}{}/{final_name}", self.root.display()),
            path: Some(path),
            media_type: media_type.to_string(),
            sink: Box::new(BufWriter::new(file)),
        })
    }

    fn discard(&self, created: CreatedFile) -> pf_core::Result<()> {
        let CreatedFile { path, sink, .. } = created;
        drop(sink);
        let Some(path) = path else {
            return Ok(());
        };

        let _guard = self.manifest_lock.lock();
        remove_if_present(&path)?;
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            let mut manifest = self.read_manifest()?;
            if manifest.remove(name).is_some() {
                self.write_manifest(&manifest)?;
            }
        }
        Ok(())
    }

    fn local_root(&self) -> Option<&Path> {
        Some(&self.root)
    }
}
