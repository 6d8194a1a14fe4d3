// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Primary engine: rasterize page 1 with `pdftoppm`, then hand the image to
// the PassportEye `mrz` command-line reader in JSON mode.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, instrument};

use cniwerk_core::error::{CniError, Result};

use super::PrimaryEngine;
use crate::job::VerificationJob;
use crate::process::ProcessInvocation;

/// Rasterization resolution for the MRZ reader.
const RASTER_DPI: &str = "300";

/// Base name of the rasterized page (`pdftoppm` appends `.png`).
const PAGE_STEM: &str = "page1";

/// Fields as the MRZ reader names them.  Anything it leaves out stays
/// `None`; unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PrimaryFields {
    pub mrz_type: Option<String>,
    /// Reader confidence, 0–100.
    pub valid_score: Option<f64>,
    /// The MRZ lines as the reader saw them, newline-separated.
    pub raw_text: Option<String>,
    pub number: Option<String>,
    pub country: Option<String>,
    pub nationality: Option<String>,
    /// `YYMMDD`.
    pub date_of_birth: Option<String>,
    /// `YYMMDD`.
    pub expiration_date: Option<String>,
    pub sex: Option<String>,
    pub surname: Option<String>,
    pub names: Option<String>,
    pub valid_date_of_birth: Option<bool>,
    pub valid_expiration_date: Option<bool>,
    pub valid_composite: Option<bool>,
}

impl PrimaryFields {
    /// Document number with fillers and spaces removed, if non-empty.
    pub fn card_number(&self) -> Option<String> {
        let number: String = self
            .number
            .as_deref()?
            .chars()
            .filter(|c| *c != '<' && !c.is_whitespace())
            .collect();
        (!number.is_empty()).then_some(number)
    }
}

/// Parse the reader's stdout.  Empty output, `null` or an object without
/// any MRZ data all mean "no MRZ found".
pub fn parse_reader_output(stdout: &str) -> Result<Option<PrimaryFields>> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(None);
    }
    let fields: PrimaryFields = serde_json::from_str(trimmed)
        .map_err(|e| CniError::tool("mrz", format!("unreadable JSON output: {e}")))?;
    if fields.mrz_type.is_none() && fields.number.is_none() {
        return Ok(None);
    }
    Ok(Some(fields))
}

/// `pdftoppm` + PassportEye.
#[derive(Debug, Clone)]
pub struct PassportEye {
    pdftoppm: String,
    reader: String,
    timeout: Duration,
}

impl PassportEye {
    pub fn new(pdftoppm: impl Into<String>, reader: impl Into<String>, timeout: Duration) -> Self {
        Self {
            pdftoppm: pdftoppm.into(),
            reader: reader.into(),
            timeout,
        }
    }
}

impl PrimaryEngine for PassportEye {
    #[instrument(skip_all, fields(job_id = %job.id))]
    async fn read_mrz(&self, job: &VerificationJob) -> Result<Option<PrimaryFields>> {
        let stem = job.workspace.file(PAGE_STEM);
        ProcessInvocation::new(&self.pdftoppm, self.timeout)
            .args(["-r", RASTER_DPI, "-f", "1", "-l", "1", "-singlefile", "-png"])
            .arg(&job.input_path)
            .arg(&stem)
            .run()
            .await?;

        let image = stem.with_extension("png");
        if !image.exists() {
            return Err(CniError::tool(&self.pdftoppm, "no image produced for page 1"));
        }
        debug!("page 1 rasterized");

        let output = ProcessInvocation::new(&self.reader, self.timeout)
            .arg("--json")
            .arg(&image)
            .run()
            .await?;
        parse_reader_output(&output.stdout_text())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
