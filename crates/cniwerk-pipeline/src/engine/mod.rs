// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OCR engine seams.
//
// The orchestrator only sees these traits.  Production implementations
// shell out to external tools; tests substitute in-process fakes.

pub mod ocrmypdf;
pub mod passport_eye;

use std::future::Future;
use std::path::Path;

use cniwerk_core::error::Result;

use crate::job::VerificationJob;

pub use ocrmypdf::{OcrMode, OcrMyPdf};
pub use passport_eye::{PassportEye, PrimaryFields};

/// Structured MRZ extractor: returns decoded fields, not text.
pub trait PrimaryEngine: Send + Sync {
    /// `Ok(None)` when the engine ran but located no MRZ.
    fn read_mrz(
        &self,
        job: &VerificationJob,
    ) -> impl Future<Output = Result<Option<PrimaryFields>>> + Send;
}

/// Full-page OCR producing unstructured text.
pub trait SecondaryEngine: Send + Sync {
    fn extract_text(&self, job: &VerificationJob) -> impl Future<Output = Result<String>> + Send;
}

/// Text recognized by a text-native engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizedText {
    pub text: String,
    pub page_count: usize,
}

/// OCR engine that reads PDFs directly and returns plain text.
pub trait TextNativeEngine: Send + Sync {
    fn recognize(&self, pdf_path: &Path) -> impl Future<Output = Result<RecognizedText>> + Send;
}
