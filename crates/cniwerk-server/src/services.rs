// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service layer: builds every pipeline component from the configuration
// once at startup and shares them with the connection handlers.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use cniwerk_core::ServiceConfig;
use cniwerk_pipeline::{
    DocumentOcr, JobLimiter, MrzTextVerifier, OcrMyPdf, OcrWorker, Orchestrator, PassportEye,
    PdfInspector,
};

/// How long the OCR worker may take to load its models.
const WORKER_STARTUP_TIMEOUT: Duration = Duration::from_secs(300);

/// Everything a request handler needs.
pub struct Services {
    pub config: ServiceConfig,
    pub limiter: JobLimiter,
    pub orchestrator: Orchestrator<PassportEye, OcrMyPdf>,
    pub document_ocr: DocumentOcr,
    /// `None` when no worker is configured or it failed to start.
    pub worker: Option<Arc<OcrWorker>>,
    pub mrz_text: Option<MrzTextVerifier<Arc<OcrWorker>>>,
}

impl Services {
    /// Build the services, starting the OCR worker if one is configured.
    ///
    /// A worker that fails to start is logged and left out; only the
    /// endpoints that need it are affected.
    pub async fn init(config: ServiceConfig) -> Arc<Self> {
        let worker = match &config.ocr_worker {
            Some(command) => {
                match OcrWorker::spawn(command, WORKER_STARTUP_TIMEOUT, config.process_timeout())
                    .await
                {
                    Ok(worker) => Some(Arc::new(worker)),
                    Err(e) => {
                        warn!(error = %e, "OCR worker unavailable, /verify-mrz disabled");
                        None
                    }
                }
            }
            None => None,
        };
        Arc::new(Self::with_worker(config, worker))
    }

    /// Build the services around an already-started worker (or none).
    pub fn with_worker(config: ServiceConfig, worker: Option<Arc<OcrWorker>>) -> Self {
        let timeout = config.process_timeout();
        let tools = &config.tools;

        let ocrmypdf = OcrMyPdf::new(&tools.ocrmypdf, &tools.pdftotext, timeout);
        let orchestrator = Orchestrator::new(
            PassportEye::new(&tools.pdftoppm, &tools.mrz_reader, timeout),
            ocrmypdf.clone(),
        );
        let document_ocr = DocumentOcr::new(ocrmypdf, PdfInspector::new(&tools.pdfinfo, timeout));
        let mrz_text = worker.clone().map(MrzTextVerifier::new);

        info!(
            max_concurrent = config.max_concurrent,
            max_upload_mb = config.max_upload_mb,
            timeout_ms = config.process_timeout_ms,
            worker = worker.is_some(),
            "services initialised"
        );

        Self {
            limiter: JobLimiter::new(config.max_concurrent),
            orchestrator,
            document_ocr,
            worker,
            mrz_text,
            config,
        }
    }
}
