// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// cniwerk-pipeline: admission control, external OCR tools and the
// primary/secondary verification fallback.

pub mod engine;
pub mod job;
pub mod limiter;
pub mod normalizer;
pub mod ocr;
pub mod orchestrator;
pub mod pdf;
pub mod process;
pub mod worker;

#[cfg(test)]
mod test_support;

pub use engine::{OcrMyPdf, PassportEye, PrimaryEngine, SecondaryEngine, TextNativeEngine};
pub use job::{JobWorkspace, VerificationJob};
pub use limiter::{JobLimiter, JobPermit};
pub use ocr::{DocumentOcr, OcrDocument};
pub use orchestrator::{MrzTextVerifier, Orchestrator};
pub use pdf::PdfInspector;
pub use process::{ProcessError, ProcessInvocation, ProcessOutput};
pub use worker::OcrWorker;
