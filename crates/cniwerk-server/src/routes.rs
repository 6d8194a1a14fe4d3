// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Request routing and endpoint handlers.
//
//   GET  /health      limiter occupancy
//   POST /ocr         document OCR, optional searchable PDF
//   POST /verify-id   primary -> secondary MRZ verification
//   POST /verify-mrz  text-native OCR worker -> TD1 parser
//
// Uploads are validated (present, within the size limit, PDF signature,
// language) before a job slot is taken.  Business rejections come back as
// 422 outcomes; errors are mapped through `CniError::http_status`.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::json;
use tracing::{debug, error, info};

use cniwerk_core::error::{CniError, ErrorClass, Result};
use cniwerk_core::outcome::VerificationOutcome;
use cniwerk_core::types::{OcrLanguage, has_pdf_signature};
use cniwerk_pipeline::{JobPermit, VerificationJob, ocr};

use crate::http::{FormPart, HttpRequest, HttpResponse, multipart_boundary, parse_multipart};
use crate::services::Services;

const ROUTES: &[&str] = &["/health", "/ocr", "/verify-id", "/verify-mrz"];

/// Dispatch one request.
pub async fn handle(services: &Services, request: &HttpRequest) -> HttpResponse {
    let result = match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/health") => Ok(health(services)),
        ("POST", "/ocr") => ocr_document(services, request).await,
        ("POST", "/verify-id") => verify_id(services, request).await,
        ("POST", "/verify-mrz") => verify_mrz(services, request).await,
        (_, path) if ROUTES.contains(&path) => {
            return HttpResponse::error(405, "method not allowed");
        }
        _ => return HttpResponse::error(404, "not found"),
    };

    result.unwrap_or_else(|e| error_response(&e))
}

/// Log an error at a level matching its class and turn it into a response.
pub fn error_response(err: &CniError) -> HttpResponse {
    match err.class() {
        ErrorClass::Upload => info!(error = %err, "upload refused"),
        ErrorClass::ToolInvocation => {
            error!(error = %err.public_message(), "tool invocation failed");
            debug!(detail = %err, "tool failure detail");
        }
        ErrorClass::Internal => error!(error = %err, "internal error"),
    }
    HttpResponse::error(err.http_status(), &err.public_message())
}

fn health(services: &Services) -> HttpResponse {
    let limiter = &services.limiter;
    HttpResponse::json(
        200,
        &json!({
            "ok": true,
            "concurrent": limiter.in_flight(),
            "max_concurrent": limiter.capacity(),
            "waiting": limiter.waiting(),
        }),
    )
}

// ---------------------------------------------------------------------------
// Uploads
// ---------------------------------------------------------------------------

/// A validated upload and its options.
#[derive(Debug)]
struct Upload {
    bytes: Vec<u8>,
    lang: OcrLanguage,
    debug: bool,
    return_pdf: bool,
    engine: Option<String>,
}

/// Query parameter, falling back to a same-named form field.
fn param(request: &HttpRequest, parts: &[FormPart<'_>], name: &str) -> Option<String> {
    request
        .query_param(name)
        .map(str::to_owned)
        .or_else(|| parts.iter().find(|p| p.name == name).map(FormPart::text))
        .filter(|v| !v.is_empty())
}

fn flag(value: Option<String>) -> bool {
    matches!(value.as_deref(), Some("true" | "1" | "yes"))
}

fn read_upload(services: &Services, request: &HttpRequest) -> Result<Upload> {
    let boundary = request
        .header("content-type")
        .and_then(multipart_boundary)
        .ok_or(CniError::MissingFile)?;
    let parts = parse_multipart(&request.body, &boundary)?;

    let file = parts
        .iter()
        .find(|p| p.name == "file" && !p.data.is_empty())
        .ok_or(CniError::MissingFile)?;
    if file.data.len() > services.config.max_upload_bytes() {
        return Err(CniError::FileTooLarge {
            limit_mb: services.config.max_upload_mb,
        });
    }
    if !has_pdf_signature(file.data) {
        return Err(CniError::NotPdf);
    }

    let lang = match param(request, &parts, "lang") {
        Some(raw) => OcrLanguage::parse(&raw)?,
        None => services.config.default_lang.clone(),
    };

    Ok(Upload {
        bytes: file.data.to_vec(),
        lang,
        debug: flag(param(request, &parts, "debug")),
        return_pdf: flag(param(request, &parts, "return_pdf")),
        engine: param(request, &parts, "engine"),
    })
}

/// Take a job slot, then create the job workspace.
async fn admit(services: &Services, upload: Upload) -> Result<(JobPermit, VerificationJob)> {
    let permit = services.limiter.acquire().await?;
    let job = VerificationJob::prepare(upload.bytes, upload.lang, upload.debug).await?;
    info!(
        job_id = %job.id,
        doc = %job.fingerprint,
        bytes = job.input.len(),
        lang = %job.lang,
        "job admitted"
    );
    Ok((permit, job))
}

fn outcome_response(outcome: &VerificationOutcome, debug: bool) -> HttpResponse {
    HttpResponse::json(outcome.http_status(), &outcome.to_json(debug))
}

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

async fn verify_id(services: &Services, request: &HttpRequest) -> Result<HttpResponse> {
    let upload = read_upload(services, request)?;
    let debug = upload.debug;

    let (permit, job) = admit(services, upload).await?;
    let result = services.orchestrator.verify(&job).await;
    job.finish().await;
    permit.release();

    Ok(outcome_response(&result?, debug))
}

async fn verify_mrz(services: &Services, request: &HttpRequest) -> Result<HttpResponse> {
    let verifier = services
        .mrz_text
        .as_ref()
        .ok_or(CniError::WorkerUnavailable)?;
    let upload = read_upload(services, request)?;
    let debug = upload.debug;

    let (permit, job) = admit(services, upload).await?;
    let result = verifier.verify(&job).await;
    job.finish().await;
    permit.release();

    Ok(outcome_response(&result?, debug))
}

async fn ocr_document(services: &Services, request: &HttpRequest) -> Result<HttpResponse> {
    let upload = read_upload(services, request)?;
    let return_pdf = upload.return_pdf;
    let use_worker = match upload.engine.as_deref() {
        None | Some("ocrmypdf") => false,
        Some("worker" | "doctr") => true,
        Some(other) => {
            return Err(CniError::BadRequest(format!("unknown OCR engine `{other}`")));
        }
    };
    let worker = match (use_worker, &services.worker) {
        (false, _) => None,
        (true, Some(worker)) => Some(worker),
        (true, None) => return Err(CniError::WorkerUnavailable),
    };

    let (permit, job) = admit(services, upload).await?;
    let result = match worker {
        Some(worker) => ocr::run_text_native(worker, &job).await,
        None => services.document_ocr.run(&job, return_pdf).await,
    };
    job.finish().await;
    permit.release();

    let document = result?;
    let mut body = json!({
        "text": document.text,
        "page_count": document.page_count,
    });
    if let Some(pdf) = document.pdf {
        body["pdf_base64"] = json!(BASE64.encode(pdf));
    }
    Ok(HttpResponse::json(200, &body))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use cniwerk_core::ServiceConfig;

    fn services() -> Services {
        let mut config = ServiceConfig::default();
        config.tools.ocrmypdf = "cniwerk-missing-ocrmypdf".into();
        config.tools.pdftotext = "cniwerk-missing-pdftotext".into();
        config.tools.pdftoppm = "cniwerk-missing-pdftoppm".into();
        config.tools.pdfinfo = "cniwerk-missing-pdfinfo".into();
        config.tools.mrz_reader = "cniwerk-missing-mrz".into();
        Services::with_worker(config, None)
    }

    fn upload(path: &str, file: &[u8], extra_fields: &[(&str, &str)]) -> HttpRequest {
        let mut body = Vec::new();
        for (name, value) in extra_fields {
            body.extend_from_slice(
                format!(
                    "--B\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(
            b"--B\r\nContent-Disposition: form-data; name=\"file\"; filename=\"cni.pdf\"\r\n\r\n",
        );
        body.extend_from_slice(file);
        body.extend_from_slice(b"\r\n--B--\r\n");

        HttpRequest {
            method: "POST".into(),
            path: path.into(),
            headers: vec![(
                "content-type".into(),
                "multipart/form-data; boundary=B".into(),
            )],
            body,
            ..Default::default()
        }
    }

    fn body_json(resp: &HttpResponse) -> serde_json::Value {
        serde_json::from_slice(&resp.body).unwrap()
    }

    #[tokio::test]
    async fn health_reports_limiter() {
        let svc = services();
        let req = HttpRequest {
            method: "GET".into(),
            path: "/health".into(),
            ..Default::default()
        };
        let resp = handle(&svc, &req).await;
        assert_eq!(resp.status, 200);
        let body = body_json(&resp);
        assert_eq!(body["ok"], true);
        assert_eq!(body["concurrent"], 0);
        assert_eq!(body["max_concurrent"], 2);
        assert_eq!(body["waiting"], 0);
    }

    #[tokio::test]
    async fn unknown_routes_and_methods() {
        let svc = services();
        let req = HttpRequest {
            method: "GET".into(),
            path: "/verify-id".into(),
            ..Default::default()
        };
        assert_eq!(handle(&svc, &req).await.status, 405);

        let req = HttpRequest {
            method: "GET".into(),
            path: "/admin".into(),
            ..Default::default()
        };
        assert_eq!(handle(&svc, &req).await.status, 404);
    }

    #[tokio::test]
    async fn non_pdf_is_refused_before_processing() {
        let svc = services();
        let resp = handle(&svc, &upload("/verify-id", b"GIF89a....", &[])).await;
        assert_eq!(resp.status, 415);
        assert_eq!(svc.limiter.in_flight(), 0);
    }

    #[tokio::test]
    async fn missing_file_is_a_bad_request() {
        let svc = services();
        let mut req = upload("/verify-id", b"", &[]);
        assert_eq!(handle(&svc, &req).await.status, 400);

        req.headers.clear();
        assert_eq!(handle(&svc, &req).await.status, 400);
    }

    #[tokio::test]
    async fn oversized_file_is_refused() {
        let mut svc = services();
        svc.config.max_upload_mb = 0;
        let resp = handle(&svc, &upload("/ocr", b"%PDF-1.4", &[])).await;
        assert_eq!(resp.status, 413);
    }

    #[tokio::test]
    async fn unsupported_language_is_a_bad_request() {
        let svc = services();
        let resp = handle(&svc, &upload("/ocr", b"%PDF-1.4", &[("lang", "klingon")])).await;
        assert_eq!(resp.status, 400);
        assert!(body_json(&resp)["error"].as_str().unwrap().contains("klingon"));
    }

    #[tokio::test]
    async fn missing_tools_are_a_500_and_release_the_slot() {
        let svc = services();
        let resp = handle(&svc, &upload("/verify-id", b"%PDF-1.4\n", &[])).await;
        assert_eq!(resp.status, 500);
        assert_eq!(
            body_json(&resp)["error"],
            "cniwerk-missing-ocrmypdf failed"
        );
        assert_eq!(svc.limiter.in_flight(), 0);
    }

    #[tokio::test]
    async fn verify_mrz_without_worker_is_unavailable() {
        let svc = services();
        let resp = handle(&svc, &upload("/verify-mrz", b"%PDF-1.4\n", &[])).await;
        assert_eq!(resp.status, 503);

        let resp = handle(&svc, &upload("/ocr", b"%PDF-1.4\n", &[("engine", "worker")])).await;
        assert_eq!(resp.status, 503);
    }

    #[test]
    fn flags_accept_common_spellings() {
        assert!(flag(Some("true".into())));
        assert!(flag(Some("1".into())));
        assert!(!flag(Some("false".into())));
        assert!(!flag(None));
    }
}
