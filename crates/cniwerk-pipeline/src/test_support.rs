// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shared fixtures for the pipeline's unit tests.

use std::path::Path;

use cniwerk_core::types::OcrLanguage;

use crate::job::VerificationJob;

/// A job over a tiny PDF-signed upload in a fresh temp workspace.
pub(crate) async fn pdf_job() -> VerificationJob {
    VerificationJob::prepare(b"%PDF-1.4\n% fixture\n".to_vec(), OcrLanguage::default(), false)
        .await
        .expect("job workspace")
}

/// Write an executable `sh` script named `name` into `dir` and return its
/// path as a tool binary string.
#[cfg(unix)]
pub(crate) fn fake_tool(dir: &Path, name: &str, body: &str) -> String {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write fake tool");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("chmod fake tool");
    path.display().to_string()
}
