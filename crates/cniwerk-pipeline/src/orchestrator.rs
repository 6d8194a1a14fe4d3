// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engine fallback for one verification job.
//
//   Start -> PrimaryAttempted -> Verified
//                             -> SecondaryAttempted -> Verified | Rejected
//
// The primary engine is tried once.  If it fails, finds no MRZ or returns
// no card number, the secondary engine runs once.  A secondary tool failure
// has nothing left to fall back to and is returned as an error.

use tracing::{debug, info, instrument, warn};

use cniwerk_core::error::Result;
use cniwerk_core::outcome::{Rejection, VerificationOutcome};
use cniwerk_core::types::{RejectReason, VerifyMethod};

use crate::engine::{PrimaryEngine, SecondaryEngine, TextNativeEngine};
use crate::job::VerificationJob;
use crate::normalizer::{
    SecondaryExtraction, mrz_candidate_lines, mrz_text_outcome, primary_identity,
    secondary_outcome,
};

/// Runs the primary → secondary fallback.
#[derive(Debug, Clone)]
pub struct Orchestrator<P, S> {
    primary: P,
    secondary: S,
}

impl<P: PrimaryEngine, S: SecondaryEngine> Orchestrator<P, S> {
    pub fn new(primary: P, secondary: S) -> Self {
        Self { primary, secondary }
    }

    #[instrument(skip_all, fields(job_id = %job.id, doc = %job.fingerprint))]
    pub async fn verify(&self, job: &VerificationJob) -> Result<VerificationOutcome> {
        match self.primary.read_mrz(job).await {
            Ok(Some(fields)) => match primary_identity(&fields) {
                Some(identity) => {
                    info!(
                        method = "primary",
                        all_checksums_ok = ?identity.checksums.map(|c| c.all_ok),
                        "document verified"
                    );
                    return Ok(VerificationOutcome::Verified(identity));
                }
                None => info!("primary engine returned no card number, falling back"),
            },
            Ok(None) => info!("primary engine found no MRZ, falling back"),
            Err(e) => {
                warn!(error = %e.public_message(), "primary engine failed, falling back");
                debug!(detail = %e, "primary engine failure detail");
            }
        }

        let text = self.secondary.extract_text(job).await?;
        let outcome = assess_full_text(&text, job.debug);
        log_outcome(&outcome);
        Ok(outcome)
    }
}

/// Secondary decision over a page of OCR text.
pub fn assess_full_text(text: &str, debug: bool) -> VerificationOutcome {
    let outcome = if text.trim().is_empty() {
        VerificationOutcome::Rejected(Rejection::new(
            RejectReason::EmptyOcrOutput,
            Some(VerifyMethod::Secondary),
        ))
    } else {
        let extraction = SecondaryExtraction::from_text(text);
        debug!(
            card_number_found = extraction.card_number.is_some(),
            mrz_line2_found = extraction.mrz_line2.is_some(),
            "full-text extraction"
        );
        secondary_outcome(extraction)
    };
    attach_debug_text(outcome, text, debug)
}

/// Verification through a text-native OCR engine and the TD1 parser.
#[derive(Debug, Clone)]
pub struct MrzTextVerifier<E> {
    engine: E,
}

impl<E: TextNativeEngine> MrzTextVerifier<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    #[instrument(skip_all, fields(job_id = %job.id, doc = %job.fingerprint))]
    pub async fn verify(&self, job: &VerificationJob) -> Result<VerificationOutcome> {
        let recognized = self.engine.recognize(&job.input_path).await?;
        debug!(pages = recognized.page_count, "text-native OCR finished");

        let outcome = if recognized.text.trim().is_empty() {
            VerificationOutcome::Rejected(Rejection::new(
                RejectReason::EmptyOcrOutput,
                Some(VerifyMethod::MrzText),
            ))
        } else {
            let lines = mrz_candidate_lines(&recognized.text);
            mrz_text_outcome(lines.iter().map(String::as_str))
        };
        let outcome = attach_debug_text(outcome, &recognized.text, job.debug);
        log_outcome(&outcome);
        Ok(outcome)
    }
}

fn attach_debug_text(outcome: VerificationOutcome, text: &str, debug: bool) -> VerificationOutcome {
    match outcome {
        VerificationOutcome::Rejected(r) if debug => {
            VerificationOutcome::Rejected(r.with_raw_text(text))
        }
        other => other,
    }
}

fn log_outcome(outcome: &VerificationOutcome) {
    let method = outcome.method().map(|m| m.as_str()).unwrap_or("none");
    match outcome.reason() {
        None => info!(method, "document verified"),
        Some(reason) => info!(method, reason = reason.as_str(), "document rejected"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use cniwerk_core::error::CniError;
    use cniwerk_core::types::{Confidence, ConfidenceLevel};

    use super::*;
    use crate::engine::{PrimaryFields, RecognizedText};
    use crate::test_support::pdf_job;

    /// Scripted primary engine that counts its calls.
    struct FakePrimary {
        reply: fn() -> Result<Option<PrimaryFields>>,
        calls: AtomicUsize,
    }

    impl FakePrimary {
        fn new(reply: fn() -> Result<Option<PrimaryFields>>) -> Self {
            Self {
                reply,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl PrimaryEngine for FakePrimary {
        async fn read_mrz(&self, _job: &VerificationJob) -> Result<Option<PrimaryFields>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.reply)()
        }
    }

    struct FakeSecondary {
        reply: fn() -> Result<String>,
        calls: AtomicUsize,
    }

    impl FakeSecondary {
        fn new(reply: fn() -> Result<String>) -> Self {
            Self {
                reply,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl SecondaryEngine for FakeSecondary {
        async fn extract_text(&self, _job: &VerificationJob) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.reply)()
        }
    }

    struct FakeTextNative(&'static str);

    impl TextNativeEngine for FakeTextNative {
        async fn recognize(&self, _pdf_path: &Path) -> Result<RecognizedText> {
            Ok(RecognizedText {
                text: self.0.to_owned(),
                page_count: 1,
            })
        }
    }

    fn good_fields() -> Result<Option<PrimaryFields>> {
        Ok(Some(PrimaryFields {
            mrz_type: Some("TD1".into()),
            valid_score: Some(100.0),
            number: Some("X4RTBPFW4".into()),
            ..Default::default()
        }))
    }

    fn no_mrz() -> Result<Option<PrimaryFields>> {
        Ok(None)
    }

    fn tool_failure() -> Result<Option<PrimaryFields>> {
        Err(CniError::tool("mrz", "exit status 1"))
    }

    const OLD_FORMAT_PAGE: &str = "\
CARTE NATIONALE D'IDENTITE N° : 880692310285
Nom : DUPONT
IDFRADUPONT<<<<<<<<<<<<<<<<<<<<<<<<<<<
8806923102858JEAN<<PIERRE<<7408122M4
";

    #[tokio::test]
    async fn primary_success_never_runs_secondary() {
        let orchestrator = Orchestrator::new(
            FakePrimary::new(good_fields),
            FakeSecondary::new(|| Ok(OLD_FORMAT_PAGE.into())),
        );
        let job = pdf_job().await;
        let outcome = orchestrator.verify(&job).await.unwrap();

        assert_eq!(outcome.method(), Some(VerifyMethod::Primary));
        assert_eq!(orchestrator.primary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(orchestrator.secondary.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_mrz_falls_back_once() {
        let orchestrator = Orchestrator::new(
            FakePrimary::new(no_mrz),
            FakeSecondary::new(|| Ok(OLD_FORMAT_PAGE.into())),
        );
        let job = pdf_job().await;
        let outcome = orchestrator.verify(&job).await.unwrap();

        assert!(outcome.is_verified());
        assert_eq!(outcome.method(), Some(VerifyMethod::Secondary));
        assert_eq!(orchestrator.primary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(orchestrator.secondary.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn primary_tool_failure_falls_back() {
        let orchestrator = Orchestrator::new(
            FakePrimary::new(tool_failure),
            FakeSecondary::new(|| Ok(OLD_FORMAT_PAGE.into())),
        );
        let job = pdf_job().await;
        let outcome = orchestrator.verify(&job).await.unwrap();
        assert_eq!(outcome.method(), Some(VerifyMethod::Secondary));
    }

    #[tokio::test]
    async fn primary_without_number_falls_back() {
        let orchestrator = Orchestrator::new(
            FakePrimary::new(|| {
                Ok(Some(PrimaryFields {
                    mrz_type: Some("TD1".into()),
                    number: Some("<<<<<<<<<".into()),
                    ..Default::default()
                }))
            }),
            FakeSecondary::new(|| Ok(OLD_FORMAT_PAGE.into())),
        );
        let job = pdf_job().await;
        orchestrator.verify(&job).await.unwrap();
        assert_eq!(orchestrator.secondary.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn secondary_failure_is_an_error() {
        let orchestrator = Orchestrator::new(
            FakePrimary::new(tool_failure),
            FakeSecondary::new(|| Err(CniError::tool("ocrmypdf", "exit status 2"))),
        );
        let job = pdf_job().await;
        let err = orchestrator.verify(&job).await.unwrap_err();
        assert_eq!(err.http_status(), 500);
    }

    #[tokio::test]
    async fn empty_text_is_rejected() {
        let orchestrator = Orchestrator::new(
            FakePrimary::new(no_mrz),
            FakeSecondary::new(|| Ok("  \n\u{c}\n".into())),
        );
        let job = pdf_job().await;
        let outcome = orchestrator.verify(&job).await.unwrap();
        assert_eq!(outcome.reason(), Some(RejectReason::EmptyOcrOutput));
        assert_eq!(outcome.http_status(), 422);
    }

    #[test]
    fn rejection_order_on_full_text() {
        assert_eq!(
            assess_full_text("no numbers here", false).reason(),
            Some(RejectReason::CardNumberNotFound)
        );
        assert_eq!(
            assess_full_text("N° 880692310285\nDUPONT", false).reason(),
            Some(RejectReason::MrzLine2NotFound)
        );
        assert_eq!(
            assess_full_text(
                "N° 123456789012\n8806923102858JEAN<<PIERRE<<7408122M4",
                false
            )
            .reason(),
            Some(RejectReason::CardNumberMrzMismatch)
        );
    }

    #[test]
    fn raw_text_only_in_debug() {
        let text = "no numbers here";
        let quiet = assess_full_text(text, false).to_json(false);
        assert!(quiet.get("raw_text").is_none());

        let verbose = assess_full_text(text, true).to_json(true);
        assert_eq!(verbose["raw_text"], text);
    }

    #[tokio::test]
    async fn noisy_text_native_output_verifies() {
        const NOISY: &str = "REPUBLIQUE FRANCAISE\n\
            CARTE NATIONALE D'IDENTITE\n\
            Nom: MARTIN\n\
            \n--- PAGE BREAK ---\n\n\
            IDFRA X4RTBPFW4 6 <<<<<<<<<<<<<<<\n\
            9OO7138F3002119FRA«<<<<<<<<<6\n\
            MARTIN«MAELYS<GAELLE<MARIE<<<";

        let verifier = MrzTextVerifier::new(FakeTextNative(NOISY));
        let job = pdf_job().await;
        let outcome = verifier.verify(&job).await.unwrap();

        let VerificationOutcome::Verified(v) = &outcome else {
            panic!("expected verified, got {outcome:?}");
        };
        assert_eq!(v.card_number, "X4RTBPFW4");
        assert_eq!(v.fields.date_of_birth.as_deref(), Some("1990-07-13"));
        assert_eq!(v.confidence, Some(Confidence::Level(ConfidenceLevel::High)));
    }

    #[tokio::test]
    async fn text_native_empty_output() {
        let verifier = MrzTextVerifier::new(FakeTextNative(""));
        let job = pdf_job().await;
        let outcome = verifier.verify(&job).await.unwrap();
        assert_eq!(outcome.reason(), Some(RejectReason::EmptyOcrOutput));
        assert_eq!(outcome.method(), Some(VerifyMethod::MrzText));
    }
}
