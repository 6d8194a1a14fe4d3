// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// cniwerk-server: HTTP front-end for the CNI verification service.

pub mod http;
pub mod routes;
pub mod server;
pub mod services;

pub use server::{ServerStatus, VerifyServer};
pub use services::Services;
