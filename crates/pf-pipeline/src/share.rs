//! Share step: hand a published file to another program.
//!
//! Sharing is separate from publishing and is only attempted after the copy
//! succeeded. A share failure does not undo the publish.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use pf_av::ToolCommand;

/// How long an opener may take to accept a file.
const SHARE_TIMEOUT: Duration = Duration::from_secs(30);

/// Offers a published file to other consumers.
#[async_trait]
pub trait Share: Send + Sync {
    /// Share the file at `locator`. `path` is its local path when the
    /// destination exposes one.
    async fn share(&self, locator: &str, path: Option<&Path>, media_type: &str)
        -> pf_core::Result<()>;

    /// Whether this share step does anything. Disabled steps emit no events.
    fn enabled(&self) -> bool {
        true
    }
}

/// Share step that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoShare;

#[async_trait]
impl Share for NoShare {
    async fn share(
        &self,
        _locator: &str,
        _path: Option<&Path>,
        _media_type: &str,
    ) -> pf_core::Result<()> {
        Ok(())
    }

    fn enabled(&self) -> bool {
        false
    }
}

/// Runs a configured opener (`xdg-open`, `open`, a sync client...) with the
/// published file as its last argument.
#[derive(Debug, Clone)]
pub struct CommandShare {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandShare {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn command(&self, target: String) -> ToolCommand {
        let mut cmd = ToolCommand::new(self.program.clone());
        cmd.args(self.args.iter().cloned())
            .arg(target)
            .timeout(SHARE_TIMEOUT);
        cmd
    }
}

#[async_trait]
impl Share for CommandShare {
    async fn share(
        &self,
        locator: &str,
        path: Option<&Path>,
        media_type: &str,
    ) -> pf_core::Result<()> {
        let target = match path {
            Some(p) => p.to_string_lossy().into_owned(),
            None => locator.to_string(),
        };
        tracing::debug!("Sharing {target} ({media_type}) via {}", self.program.display());
        self.command(target).execute().await?;
        Ok(())
    }
}
