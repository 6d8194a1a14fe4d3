// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Secondary engine: OCRmyPDF adds a text layer, Poppler's `pdftotext`
// reads it back.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, instrument};

use cniwerk_core::error::Result;
use cniwerk_core::types::OcrLanguage;

use super::SecondaryEngine;
use crate::job::VerificationJob;
use crate::process::ProcessInvocation;

/// File name of the OCRed copy inside a job workspace.
pub const OCR_OUTPUT_FILE: &str = "ocr.pdf";

/// How OCRmyPDF treats pages that already carry text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrMode {
    /// Rasterize and OCR every page, discarding existing text.
    Force,
    /// Leave pages with text alone.
    SkipText,
}

impl OcrMode {
    fn flag(self) -> &'static str {
        match self {
            Self::Force => "--force-ocr",
            Self::SkipText => "--skip-text",
        }
    }
}

#[derive(Debug, Clone)]
pub struct OcrMyPdf {
    ocrmypdf: String,
    pdftotext: String,
    timeout: Duration,
}

impl OcrMyPdf {
    pub fn new(ocrmypdf: impl Into<String>, pdftotext: impl Into<String>, timeout: Duration) -> Self {
        Self {
            ocrmypdf: ocrmypdf.into(),
            pdftotext: pdftotext.into(),
            timeout,
        }
    }

    /// Write a searchable copy of `input` to `output`.
    #[instrument(skip_all, fields(lang = %lang, mode = ?mode))]
    pub async fn ocr(
        &self,
        input: &Path,
        output: &Path,
        lang: &OcrLanguage,
        mode: OcrMode,
    ) -> Result<()> {
        ProcessInvocation::new(&self.ocrmypdf, self.timeout)
            .args([mode.flag(), "-q", "-l", lang.as_str(), "--output-type", "pdf"])
            .arg(input)
            .arg(output)
            .run()
            .await?;
        debug!("text layer written");
        Ok(())
    }

    /// Text of every page, layout preserved.
    pub async fn text(&self, pdf: &Path) -> Result<String> {
        let output = ProcessInvocation::new(&self.pdftotext, self.timeout)
            .args(["-layout", "-enc", "UTF-8"])
            .arg(pdf)
            .arg("-")
            .run()
            .await?;
        Ok(output.stdout_text())
    }
}

impl SecondaryEngine for OcrMyPdf {
    async fn extract_text(&self, job: &VerificationJob) -> Result<String> {
        let ocred = job.workspace.file(OCR_OUTPUT_FILE);
        self.ocr(&job.input_path, &ocred, &job.lang, OcrMode::Force)
            .await?;
        let text = self.text(&ocred).await?;
        debug!(job_id = %job.id, chars = text.len(), "secondary text extracted");
        Ok(text)
    }
}
