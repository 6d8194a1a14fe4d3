// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF inspection: page counting with `lopdf`, falling back to Poppler's
// `pdfinfo` for files lopdf cannot parse.

use std::path::Path;
use std::time::Duration;

use lopdf::Document;
use tracing::{debug, instrument, warn};

use cniwerk_core::error::{CniError, Result};

use crate::process::ProcessInvocation;

/// Count pages of an in-memory PDF with `lopdf`.
pub fn page_count_from_bytes(data: &[u8]) -> Result<usize> {
    let document = Document::load_mem(data)
        .map_err(|e| CniError::PdfError(format!("failed to load PDF from memory: {e}")))?;
    Ok(document.get_pages().len())
}

/// Parse the `Pages:` line of `pdfinfo` output.
pub fn parse_pdfinfo_pages(output: &str) -> Option<usize> {
    output
        .lines()
        .find_map(|line| line.strip_prefix("Pages:"))
        .and_then(|rest| rest.trim().parse().ok())
}

/// Page counter with an external fallback.
#[derive(Debug, Clone)]
pub struct PdfInspector {
    pdfinfo: String,
    timeout: Duration,
}

impl PdfInspector {
    pub fn new(pdfinfo: impl Into<String>, timeout: Duration) -> Self {
        Self {
            pdfinfo: pdfinfo.into(),
            timeout,
        }
    }

    /// Page count of `path`, whose content is `data`.
    #[instrument(skip_all, fields(path = %path.display(), bytes_len = data.len()))]
    pub async fn page_count(&self, data: &[u8], path: &Path) -> Result<usize> {
        let owned = data.to_vec();
        let parsed = tokio::task::spawn_blocking(move || page_count_from_bytes(&owned))
            .await
            .map_err(|e| CniError::PdfError(format!("page count task: {e}")))?;

        match parsed {
            Ok(pages) => {
                debug!(pages, "page count from lopdf");
                Ok(pages)
            }
            Err(e) => {
                warn!(error = %e, "lopdf could not parse document, asking pdfinfo");
                self.page_count_with_pdfinfo(path).await
            }
        }
    }

    async fn page_count_with_pdfinfo(&self, path: &Path) -> Result<usize> {
        let output = ProcessInvocation::new(&self.pdfinfo, self.timeout)
            .arg(path)
            .run()
            .await?;
        parse_pdfinfo_pages(&output.stdout_text())
            .ok_or_else(|| CniError::tool(&self.pdfinfo, "no `Pages:` line in output"))
    }
}
