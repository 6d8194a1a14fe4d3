// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the CNI verification service.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CniError, Result};

/// Unique identifier for a verification or OCR job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tesseract language codes the service accepts.
pub const SUPPORTED_LANGUAGES: &[&str] = &["fra", "eng", "deu", "spa", "ita", "por", "nld"];

/// A validated OCR language hint such as `fra` or `fra+eng`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OcrLanguage(String);

impl OcrLanguage {
    /// Parse a `+`-joined list of language codes, each of which must be in
    /// [`SUPPORTED_LANGUAGES`].
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(CniError::UnsupportedLanguage(raw.to_owned()));
        }
        for code in normalized.split('+') {
            if !SUPPORTED_LANGUAGES.contains(&code) {
                return Err(CniError::UnsupportedLanguage(raw.to_owned()));
            }
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for OcrLanguage {
    fn default() -> Self {
        Self("fra".into())
    }
}

impl TryFrom<String> for OcrLanguage {
    type Error = CniError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<OcrLanguage> for String {
    fn from(lang: OcrLanguage) -> Self {
        lang.0
    }
}

impl std::fmt::Display for OcrLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which engine produced a verification result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyMethod {
    /// Structured MRZ-field extractor on the rasterized first page.
    Primary,
    /// Full-text OCR with regex extraction and card-number cross-check.
    Secondary,
    /// Text-native OCR engine whose lines went through the TD1 parser.
    MrzText,
}

impl VerifyMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::MrzText => "mrz_text",
        }
    }
}

/// Machine-readable reason attached to every rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// The OCR engine produced no text at all.
    EmptyOcrOutput,
    /// No 12-digit card number anywhere in the text.
    CardNumberNotFound,
    /// No line shaped like MRZ line 2.
    #[serde(rename = "mrz_line2_not_found")]
    MrzLine2NotFound,
    /// The card number does not occur in MRZ line 2.
    CardNumberMrzMismatch,
    /// No TD1 block could be located in the text.
    MrzNotFound,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyOcrOutput => "empty_ocr_output",
            Self::CardNumberNotFound => "card_number_not_found",
            Self::MrzLine2NotFound => "mrz_line2_not_found",
            Self::CardNumberMrzMismatch => "card_number_mrz_mismatch",
            Self::MrzNotFound => "mrz_not_found",
        }
    }

    /// Human-readable explanation returned next to the reason code.
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::EmptyOcrOutput => "OCR produced no text for this document.",
            Self::CardNumberNotFound => "No 12-digit card number could be found on the document.",
            Self::MrzLine2NotFound => {
                "The card number was found but the machine-readable zone could not be read."
            }
            Self::CardNumberMrzMismatch => {
                "The card number does not match the machine-readable zone."
            }
            Self::MrzNotFound => "No machine-readable zone could be located in the text.",
        }
    }
}

/// Coarse confidence bucket used by the text-native path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    /// MRZ decoded and every check digit matches.
    High,
    /// MRZ structurally found but at least one check digit fails.
    Medium,
}

/// Confidence attached to a verified result.
///
/// Serialized untagged: a number for the primary engine, a string bucket
/// for the text-native path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Confidence {
    /// 0–100, where 100 means every internal checksum passed.
    Score(u8),
    Level(ConfidenceLevel),
}

/// Check-digit verdicts for one MRZ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumResult {
    pub date_of_birth_ok: bool,
    pub expiration_ok: bool,
    pub composite_ok: bool,
    pub all_ok: bool,
}

impl ChecksumResult {
    /// Build a result; `all_ok` is always the conjunction of the three.
    pub fn new(date_of_birth_ok: bool, expiration_ok: bool, composite_ok: bool) -> Self {
        Self {
            date_of_birth_ok,
            expiration_ok,
            composite_ok,
            all_ok: date_of_birth_ok && expiration_ok && composite_ok,
        }
    }
}

/// Magic bytes every accepted upload must start with.
pub const PDF_SIGNATURE: &[u8; 4] = b"%PDF";

/// Whether `bytes` starts with the PDF signature.
pub fn has_pdf_signature(bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_SIGNATURE)
}
