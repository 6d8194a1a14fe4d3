// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service configuration, read from the environment at startup.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CniError, Result};
use crate::types::OcrLanguage;

/// Binaries of the external tools the pipeline shells out to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolPaths {
    /// OCR-with-layer tool (OCRmyPDF).
    pub ocrmypdf: String,
    /// Text extractor (Poppler `pdftotext`).
    pub pdftotext: String,
    /// Page rasterizer (Poppler `pdftoppm`).
    pub pdftoppm: String,
    /// Page-info tool (Poppler `pdfinfo`).
    pub pdfinfo: String,
    /// Structured MRZ reader (PassportEye `mrz` CLI).
    pub mrz_reader: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ocrmypdf: "ocrmypdf".into(),
            pdftotext: "pdftotext".into(),
            pdftoppm: "pdftoppm".into(),
            pdfinfo: "pdfinfo".into(),
            mrz_reader: "mrz".into(),
        }
    }
}

/// Runtime settings of the verification service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// TCP port the HTTP front-end listens on.
    pub port: u16,
    /// Largest accepted upload, in megabytes.
    pub max_upload_mb: u64,
    /// Maximum number of verification/OCR jobs running at once.
    pub max_concurrent: usize,
    /// Wall-clock limit for any single external process, in milliseconds.
    pub process_timeout_ms: u64,
    /// Language used when a request does not pass `lang`.
    pub default_lang: OcrLanguage,
    pub tools: ToolPaths,
    /// Command line of the persistent text-native OCR worker, if any.
    pub ocr_worker: Option<Vec<String>>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            max_upload_mb: 20,
            max_concurrent: 2,
            process_timeout_ms: 120_000,
            default_lang: OcrLanguage::default(),
            tools: ToolPaths::default(),
            ocr_worker: None,
        }
    }
}

impl ServiceConfig {
    /// Build the configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// Unset or empty keys keep their default; set keys that fail to parse
    /// are reported as [`CniError::Config`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(v) = get("PORT") {
            config.port = parse_number("PORT", &v)?;
        }
        if let Some(v) = get("MAX_UPLOAD_MB") {
            config.max_upload_mb = parse_number("MAX_UPLOAD_MB", &v)?;
        }
        if let Some(v) = get("MAX_CONCURRENT") {
            config.max_concurrent = parse_number("MAX_CONCURRENT", &v)?;
            if config.max_concurrent == 0 {
                return Err(CniError::Config("MAX_CONCURRENT must be at least 1".into()));
            }
        }
        if let Some(v) = get("PROCESS_TIMEOUT_MS") {
            config.process_timeout_ms = parse_number("PROCESS_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("DEFAULT_LANG") {
            config.default_lang = OcrLanguage::parse(&v)
                .map_err(|e| CniError::Config(format!("DEFAULT_LANG: {e}")))?;
        }

        let tools = &mut config.tools;
        for (key, slot) in [
            ("OCRMYPDF_BIN", &mut tools.ocrmypdf),
            ("PDFTOTEXT_BIN", &mut tools.pdftotext),
            ("PDFTOPPM_BIN", &mut tools.pdftoppm),
            ("PDFINFO_BIN", &mut tools.pdfinfo),
            ("MRZ_READER_BIN", &mut tools.mrz_reader),
        ] {
            if let Some(v) = get(key) {
                *slot = v.trim().to_owned();
            }
        }

        config.ocr_worker = get("OCR_WORKER_CMD")
            .map(|v| v.split_whitespace().map(str::to_owned).collect::<Vec<_>>());

        Ok(config)
    }

    /// Upload limit in bytes.
    pub fn max_upload_bytes(&self) -> usize {
        (self.max_upload_mb as usize).saturating_mul(1024 * 1024)
    }

    pub fn process_timeout(&self) -> Duration {
        Duration::from_millis(self.process_timeout_ms)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CniError::Config(format!("{key}: `{value}` is not a valid number")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = ServiceConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.max_upload_mb, 20);
        assert_eq!(config.max_concurrent, 2);
        assert_eq!(config.process_timeout(), Duration::from_secs(120));
        assert_eq!(config.default_lang.as_str(), "fra");
        assert_eq!(config.tools.mrz_reader, "mrz");
        assert!(config.ocr_worker.is_none());
    }

    #[test]
    fn overrides_are_applied() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("MAX_UPLOAD_MB", "5"),
            ("MAX_CONCURRENT", "4"),
            ("PROCESS_TIMEOUT_MS", "500"),
            ("DEFAULT_LANG", "fra+eng"),
            ("PDFTOTEXT_BIN", "/usr/local/bin/pdftotext"),
            ("OCR_WORKER_CMD", "python3 /opt/ocr_worker.py"),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_upload_bytes(), 5 * 1024 * 1024);
        assert_eq!(config.max_concurrent, 4);
        assert_eq!(config.process_timeout(), Duration::from_millis(500));
        assert_eq!(config.default_lang.as_str(), "fra+eng");
        assert_eq!(config.tools.pdftotext, "/usr/local/bin/pdftotext");
        assert_eq!(
            config.ocr_worker,
            Some(vec!["python3".to_string(), "/opt/ocr_worker.py".to_string()])
        );
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let err = ServiceConfig::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, CniError::Config(_)));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        assert!(ServiceConfig::from_lookup(lookup(&[("MAX_CONCURRENT", "0")])).is_err());
    }

    #[test]
    fn unknown_default_language_is_rejected() {
        assert!(ServiceConfig::from_lookup(lookup(&[("DEFAULT_LANG", "klingon")])).is_err());
    }
}
