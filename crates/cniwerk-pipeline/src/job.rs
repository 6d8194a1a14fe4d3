// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Verification jobs and their private scratch directories.
//
// Each job gets its own temporary directory holding the uploaded PDF and
// every intermediate file the tools produce.  The directory is removed when
// the workspace is dropped, whatever the outcome.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use cniwerk_core::error::{CniError, Result};
use cniwerk_core::integrity::fingerprint;
use cniwerk_core::types::{JobId, OcrLanguage};

/// File name of the uploaded document inside a workspace.
pub const INPUT_FILE: &str = "input.pdf";

/// A per-job temporary directory.
#[derive(Debug)]
pub struct JobWorkspace {
    dir: tempfile::TempDir,
}

impl JobWorkspace {
    /// Create a fresh directory under the system temp dir.
    pub fn create(job_id: &JobId) -> Result<Self> {
        Self::create_in(std::env::temp_dir(), job_id)
    }

    /// Create a fresh directory under `base`.
    pub fn create_in(base: impl AsRef<Path>, job_id: &JobId) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("cniwerk-{job_id}-"))
            .tempdir_in(base)?;
        debug!(path = %dir.path().display(), "job workspace created");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of `name` inside the workspace.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Remove the directory now, logging instead of failing.
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!(path = %path.display(), error = %e, "failed to remove job workspace");
        }
    }
}

/// One uploaded document going through the pipeline.
#[derive(Debug)]
pub struct VerificationJob {
    pub id: JobId,
    /// The uploaded bytes, already known to start with `%PDF`.
    pub input: Vec<u8>,
    /// Where the upload was written inside `workspace`.
    pub input_path: PathBuf,
    pub workspace: JobWorkspace,
    pub lang: OcrLanguage,
    /// Attach raw OCR text to rejections.
    pub debug: bool,
    /// Short content hash for log correlation.
    pub fingerprint: String,
}

impl VerificationJob {
    /// Create the workspace and write the upload into it.
    pub async fn prepare(input: Vec<u8>, lang: OcrLanguage, debug: bool) -> Result<Self> {
        Self::prepare_in(std::env::temp_dir(), input, lang, debug).await
    }

    pub async fn prepare_in(
        base: impl AsRef<Path>,
        input: Vec<u8>,
        lang: OcrLanguage,
        debug: bool,
    ) -> Result<Self> {
        if input.is_empty() {
            return Err(CniError::MissingFile);
        }
        let id = JobId::new();
        let base = base.as_ref().to_path_buf();
        let workspace = tokio::task::spawn_blocking(move || JobWorkspace::create_in(base, &id))
            .await
            .map_err(|e| CniError::Io(std::io::Error::other(format!("workspace task: {e}"))))??;
        let input_path = workspace.file(INPUT_FILE);
        tokio::fs::write(&input_path, &input).await?;

        Ok(Self {
            fingerprint: fingerprint(&input),
            id,
            input,
            input_path,
            workspace,
            lang,
            debug,
        })
    }

    /// Tear down the workspace off the async worker threads.
    pub async fn finish(self) {
        let id = self.id;
        if let Err(e) = tokio::task::spawn_blocking(move || self.workspace.close()).await {
            warn!(job_id = %id, error = %e, "workspace cleanup task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn prepare_writes_the_upload() {
        let base = tempfile::tempdir().unwrap();
        let job = VerificationJob::prepare_in(
            base.path(),
            b"%PDF-1.4 test".to_vec(),
            OcrLanguage::default(),
            false,
        )
        .await
        .unwrap();

        assert!(job.input_path.starts_with(base.path()));
        assert_eq!(std::fs::read(&job.input_path).unwrap(), b"%PDF-1.4 test");
        assert_eq!(job.fingerprint.len(), 12);
    }

    #[tokio::test]
    async fn workspace_is_removed_when_finished() {
        let base = tempfile::tempdir().unwrap();
        let job = VerificationJob::prepare_in(
            base.path(),
            b"%PDF".to_vec(),
            OcrLanguage::default(),
            false,
        )
        .await
        .unwrap();
        let dir = job.workspace.path().to_path_buf();
        assert!(dir.exists());

        job.finish().await;
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn unusable_base_directory_is_an_io_error() {
        let base = tempfile::tempdir().unwrap();
        let missing = base.path().join("gone");
        let err = VerificationJob::prepare_in(&missing, b"%PDF".to_vec(), OcrLanguage::default(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, CniError::Io(_)));
        assert_eq!(err.http_status(), 500);
    }

    #[tokio::test]
    async fn workspace_is_removed_on_drop() {
        let base = tempfile::tempdir().unwrap();
        let dir = {
            let ws = JobWorkspace::create_in(base.path(), &JobId::new()).unwrap();
            std::fs::write(ws.file("scratch.png"), b"x").unwrap();
            ws.path().to_path_buf()
        };
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn empty_upload_is_refused() {
        let base = tempfile::tempdir().unwrap();
        let err = VerificationJob::prepare_in(base.path(), Vec::new(), OcrLanguage::default(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, CniError::MissingFile));
    }
}
