// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// cniwerk: Core types, verification outcomes, configuration and error
// definitions shared across all crates.

pub mod config;
pub mod error;
pub mod integrity;
pub mod outcome;
pub mod types;

pub use config::{ServiceConfig, ToolPaths};
pub use error::{CniError, ErrorClass};
pub use outcome::{IdentityFields, MrzLines, Rejection, VerificationOutcome, VerifiedIdentity};
pub use types::*;
