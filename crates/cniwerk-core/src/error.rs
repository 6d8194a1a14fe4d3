// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for the CNI verification service.
//
// Business rejections (MRZ not found, card number mismatch, ...) are NOT
// errors: they are `VerificationOutcome::Rejected` values.  Everything in
// this enum is either the caller's fault (upload problems) or ours (tools,
// internals).

use thiserror::Error;

/// Top-level error type for all verification operations.
#[derive(Debug, Error)]
pub enum CniError {
    // -- Upload errors --
    #[error("no file uploaded (expected multipart field `file`)")]
    MissingFile,

    #[error("file exceeds the {limit_mb} MB upload limit")]
    FileTooLarge { limit_mb: u64 },

    #[error("uploaded file is not a PDF")]
    NotPdf,

    #[error("unsupported OCR language: {0}")]
    UnsupportedLanguage(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    // -- Tool invocation --
    #[error("{tool} failed: {detail}")]
    ToolInvocation { tool: String, detail: String },

    #[error("OCR worker error: {0}")]
    Worker(String),

    #[error("OCR worker is not configured")]
    WorkerUnavailable,

    // -- Internal --
    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("service is shutting down")]
    ShuttingDown,

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Which side of the taxonomy an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Caller-supplied input is unusable; surfaced immediately, never retried.
    Upload,
    /// An external tool could not produce a result.
    ToolInvocation,
    /// Anything else.  Details stay in the logs.
    Internal,
}

impl CniError {
    /// Convenience constructor for tool failures.
    pub fn tool(tool: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ToolInvocation {
            tool: tool.into(),
            detail: detail.into(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MissingFile
            | Self::FileTooLarge { .. }
            | Self::NotPdf
            | Self::UnsupportedLanguage(_)
            | Self::BadRequest(_) => ErrorClass::Upload,
            Self::ToolInvocation { .. } | Self::Worker(_) | Self::WorkerUnavailable => {
                ErrorClass::ToolInvocation
            }
            Self::PdfError(_)
            | Self::Config(_)
            | Self::ShuttingDown
            | Self::Io(_)
            | Self::Serialization(_) => ErrorClass::Internal,
        }
    }

    /// HTTP status code used when this error reaches a client.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::MissingFile | Self::UnsupportedLanguage(_) | Self::BadRequest(_) => 400,
            Self::FileTooLarge { .. } => 413,
            Self::NotPdf => 415,
            Self::WorkerUnavailable | Self::ShuttingDown => 503,
            _ => 500,
        }
    }

    /// Message safe to put in a response body.
    ///
    /// Upload errors are echoed as-is.  Tool failures name the tool by its
    /// file name only, never its configured path or its output (which may
    /// contain document text); internal errors are replaced with a generic
    /// message.
    pub fn public_message(&self) -> String {
        match self.class() {
            ErrorClass::Upload => self.to_string(),
            ErrorClass::ToolInvocation => match self {
                Self::ToolInvocation { tool, .. } => format!("{} failed", tool_name(tool)),
                Self::WorkerUnavailable => self.to_string(),
                _ => "OCR worker failed".into(),
            },
            ErrorClass::Internal => "internal server error".into(),
        }
    }
}

/// Last path component of a configured tool command.
fn tool_name(tool: &str) -> &str {
    std::path::Path::new(tool)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(tool)
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CniError>;
