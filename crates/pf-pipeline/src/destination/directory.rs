use std::fs::OpenOptions;
use std::io::{BufWriter, ErrorKind};
use std::path::{Path, PathBuf};

use super::{check_bare_name, with_extension_for, CreatedFile, Destination};

/// Plain filesystem directory. Created on first use if missing.
#[derive(Debug, Clone)]
pub struct DirectoryDestination {
    dir: PathBuf,
}

impl DirectoryDestination {
    pub fn new(dir: PathBuf) -> pf_core::Result<Self> {
        std::fs::create_dir_all(&dir).map_err(|e| {
            pf_core::Error::destination(format!("cannot create {}: {e}", dir.display()))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Destination for DirectoryDestination {
    fn describe(&self) -> String {
        format!("directory {}", self.dir.display())
    }

    fn create(&self, name: &str, media_type: &str) -> pf_core::Result<CreatedFile> {
        check_bare_name(name)?;
        // The extension is the only media-type association a plain
        // directory has.
        let name = with_extension_for(name, media_type);
        let path = self.dir.join(&name);

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| {
                pf_core::Error::destination(format!("cannot create {}: {e}", path.display()))
            })?;

        Ok(CreatedFile {
            locator: path.to_string_lossy().into_owned(),
            path: Some(path),
            media_type: media_type.to_string(),
            sink: Box::new(BufWriter::new(file)),
        })
    }

    fn discard(&self, created: CreatedFile) -> pf_core::Result<()> {
        let CreatedFile { path, sink, .. } = created;
        drop(sink);
        if let Some(path) = path {
            remove_if_present(&path)?;
        }
        Ok(())
    }

    fn local_root(&self) -> Option<&Path> {
        Some(&self.dir)
    }
}

pub(super) fn remove_if_present(path: &Path) -> pf_core::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(pf_core::Error::destination(format!(
            "cannot remove {}: {e}",
            path.display()
        ))),
    }
}
