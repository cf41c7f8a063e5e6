//! Result publisher: copies a staged encode into the destination.

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::destination::Destination;
use crate::invoker::EncodeResult;

/// What happened when a result was published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PublishOutcome {
    /// The file now exists at the destination.
    Published {
        locator: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        path: Option<PathBuf>,
        media_type: String,
        bytes: u64,
    },
    /// The encode failed; nothing was copied. `log` is the encoder's
    /// diagnostic text, unchanged.
    EncodeFailed { log: String },
    /// The encode succeeded but the copy did not.
    PublishFailed { error: String },
}

impl PublishOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, PublishOutcome::Published { .. })
    }
}

/// Publish one encode result.
///
/// Blocking; run it off the async executor.
pub fn publish(result: &EncodeResult, destination: &dyn Destination) -> PublishOutcome {
    let produced = match (&result.produced_file, result.success) {
        (Some(path), true) => path,
        _ => {
            return PublishOutcome::EncodeFailed {
                log: result.log_text.clone(),
            }
        }
    };

    let job = &result.job;
    match copy_into(produced, &job.output_file_name, job.media_type(), destination) {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!(
                job_id = %job.id,
                "Publishing {} to {} failed: {e}",
                job.output_file_name,
                destination.describe()
            );
            PublishOutcome::PublishFailed {
                error: e.to_string(),
            }
        }
    }
}

fn copy_into(
    produced: &Path,
    name: &str,
    media_type: &str,
    destination: &dyn Destination,
) -> pf_core::Result<PublishOutcome> {
    // Open the source first so a vanished scratch file leaves no empty
    // document behind.
    let mut reader = BufReader::new(File::open(produced)?);
    let mut created = destination.create(name, media_type)?;

    let copied = io::copy(&mut reader, &mut created.sink).and_then(|bytes| {
        created.sink.flush()?;
        Ok(bytes)
    });
    let bytes = match copied {
        Ok(bytes) => bytes,
        Err(e) => {
            let locator = created.locator.clone();
            if let Err(cleanup) = destination.discard(created) {
                tracing::warn!("Could not remove incomplete {locator}: {cleanup}");
            }
            return Err(e.into());
        }
    };

    tracing::info!("Published {} ({bytes} bytes)", created.locator);

    Ok(PublishOutcome::Published {
        locator: created.locator,
        path: created.path,
        media_type: created.media_type,
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::{CreatedFile, DirectoryDestination};
    use pf_core::{EncodeSettings, SourceImage, WebpQuality};

    struct RefusingDestination;

    impl Destination for RefusingDestination {
        fn describe(&self) -> String {
            "refusing".into()
        }

        fn create(&self, _name: &str, _media_type: &str) -> pf_core::Result<CreatedFile> {
            Err(pf_core::Error::destination("permission revoked"))
        }

        fn discard(&self, _created: CreatedFile) -> pf_core::Result<()> {
            unreachable!("nothing was created")
        }
    }

    /// Accepts `limit` bytes, then fails like a full disk.
    struct ShortWrite {
        inner: Box<dyn Write + Send>,
        remaining: usize,
    }

    impl Write for ShortWrite {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.remaining == 0 {
                return Err(io::Error::other("No space left on device"));
            }
            let n = self.inner.write(&buf[..buf.len().min(self.remaining)])?;
            self.remaining -= n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            self.inner.flush()
        }
    }

    /// Directory whose files fill up after `limit` bytes.
    struct FullDisk {
        dir: DirectoryDestination,
        limit: usize,
    }

    impl Destination for FullDisk {
        fn describe(&self) -> String {
            "full disk".into()
        }

        fn create(&self, name: &str, media_type: &str) -> pf_core::Result<CreatedFile> {
            let mut created = self.dir.create(name, media_type)?;
            created.sink = Box::new(ShortWrite {
                inner: created.sink,
                remaining: self.limit,
            });
            Ok(created)
        }

        fn discard(&self, created: CreatedFile) -> pf_core::Result<()> {
            self.dir.discard(created)
        }
    }

    fn result_with(produced: Option<PathBuf>, success: bool, log: &str) -> EncodeResult {
        let job = crate::builder::job_for(
            SourceImage::new("/in/a.png"),
            &EncodeSettings::Webp {
                quality: WebpQuality::default(),
            },
        );
        EncodeResult {
            job,
            success,
            log_text: log.to_string(),
            produced_file: produced,
            return_code: Some(if success { 0 } else { 1 }),
            cancelled: false,
        }
    }

    #[test]
    fn copies_bytes_identically() {
        let tmp = tempfile::tempdir().unwrap();
        let staged = tmp.path().join("staged.webp");
        let payload: Vec<u8> = (0..=255u8).cycle().take(70_000).collect();
        std::fs::write(&staged, &payload).unwrap();

        let out_dir = tmp.path().join("out");
        let dest = DirectoryDestination::new(out_dir.clone()).unwrap();
        let result = result_with(Some(staged), true, "");

        match publish(&result, &dest) {
            PublishOutcome::Published {
                path,
                bytes,
                media_type,
                ..
            } => {
                assert_eq!(bytes, payload.len() as u64);
                assert_eq!(media_type, "image/webp");
                let path = path.unwrap();
                assert_eq!(path, out_dir.join(&result.job.output_file_name));
                assert_eq!(std::fs::read(path).unwrap(), payload);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn encode_failure_forwards_log_without_copy() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = DirectoryDestination::new(tmp.path().to_path_buf()).unwrap();
        let result = result_with(None, false, "Conversion failed!\n");

        assert_eq!(
            publish(&result, &dest),
            PublishOutcome::EncodeFailed {
                log: "Conversion failed!\n".into()
            }
        );
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn destination_error_is_publish_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let staged = tmp.path().join("staged.webp");
        std::fs::write(&staged, b"data").unwrap();

        let outcome = publish(&result_with(Some(staged), true, ""), &RefusingDestination);
        match outcome {
            PublishOutcome::PublishFailed { error } => {
                assert!(error.contains("permission revoked"))
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn failed_copy_leaves_no_partial_file() {
        let tmp = tempfile::tempdir().unwrap();
        let staged = tmp.path().join("staged.webp");
        std::fs::write(&staged, vec![7u8; 70_000]).unwrap();

        let out = tmp.path().join("out");
        let dest = FullDisk {
            dir: DirectoryDestination::new(out.clone()).unwrap(),
            limit: 10_000,
        };

        let outcome = publish(&result_with(Some(staged), true, ""), &dest);
        match outcome {
            PublishOutcome::PublishFailed { error } => assert!(error.contains("No space left")),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(std::fs::read_dir(out).unwrap().count(), 0);
    }

    #[test]
    fn missing_staged_file_creates_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("out");
        let dest = DirectoryDestination::new(out.clone()).unwrap();

        let gone = tmp.path().join("gone.webp");
        let outcome = publish(&result_with(Some(gone), true, ""), &dest);
        assert!(matches!(outcome, PublishOutcome::PublishFailed { .. }));
        assert_eq!(std::fs::read_dir(out).unwrap().count(), 0);
    }
}
