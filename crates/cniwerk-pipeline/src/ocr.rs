// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Plain document OCR: text plus page count, and optionally the searchable
// PDF OCRmyPDF produced.

use tracing::{info, instrument};

use cniwerk_core::error::Result;

use crate::engine::{OcrMode, OcrMyPdf, TextNativeEngine};
use crate::engine::ocrmypdf::OCR_OUTPUT_FILE;
use crate::job::VerificationJob;
use crate::pdf::PdfInspector;

/// Result of a document OCR run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrDocument {
    pub text: String,
    pub page_count: usize,
    /// The searchable PDF, when requested.
    pub pdf: Option<Vec<u8>>,
}

/// OCRmyPDF-backed document OCR.
#[derive(Debug, Clone)]
pub struct DocumentOcr {
    engine: OcrMyPdf,
    inspector: PdfInspector,
}

impl DocumentOcr {
    pub fn new(engine: OcrMyPdf, inspector: PdfInspector) -> Self {
        Self { engine, inspector }
    }

    /// OCR pages that have no text layer yet and read everything back.
    #[instrument(skip_all, fields(job_id = %job.id, doc = %job.fingerprint, return_pdf = return_pdf))]
    pub async fn run(&self, job: &VerificationJob, return_pdf: bool) -> Result<OcrDocument> {
        let output = job.workspace.file(OCR_OUTPUT_FILE);
        self.engine
            .ocr(&job.input_path, &output, &job.lang, OcrMode::SkipText)
            .await?;
        let text = self.engine.text(&output).await?;
        let page_count = self.inspector.page_count(&job.input, &job.input_path).await?;

        let pdf = if return_pdf {
            Some(tokio::fs::read(&output).await?)
        } else {
            None
        };

        info!(pages = page_count, chars = text.len(), "document OCR finished");
        Ok(OcrDocument {
            text,
            page_count,
            pdf,
        })
    }
}

/// Document OCR through a text-native engine.  No PDF is produced.
pub async fn run_text_native<E: TextNativeEngine>(
    engine: &E,
    job: &VerificationJob,
) -> Result<OcrDocument> {
    let recognized = engine.recognize(&job.input_path).await?;
    Ok(OcrDocument {
        text: recognized.text,
        page_count: recognized.page_count,
        pdf: None,
    })
}
