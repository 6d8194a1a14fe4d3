// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Maps what each engine produces onto the canonical verification outcome.
//
//   primary    reader-native field names -> Verified{primary}
//   secondary  card number + MRZ line 2 from full text -> Verified{secondary}
//              or a rejection, checked in a fixed order
//   mrz_text   text-native OCR lines -> TD1 parse -> Verified{mrz_text}
//              with a high/medium confidence bucket

use tracing::debug;

use cniwerk_core::outcome::{IdentityFields, Rejection, VerificationOutcome, VerifiedIdentity};
use cniwerk_core::types::{
    ChecksumResult, Confidence, ConfidenceLevel, RejectReason, VerifyMethod,
};
use cniwerk_mrz::normalize::{format_mrz_date, normalize_line};
use cniwerk_mrz::{
    MrzRecord, card_number_in_mrz, extract_card_number, extract_mrz_line2, parse_td1,
    parse_td1_lines,
};

use crate::engine::PrimaryFields;

// ---------------------------------------------------------------------------
// Primary
// ---------------------------------------------------------------------------

/// Canonical record for a primary-engine result, or `None` when the reader
/// returned no usable card number (the caller falls through).
///
/// Check-digit verdicts come from the reader when it reports all three;
/// otherwise they are recomputed from its raw MRZ text.  Fields the reader
/// left out are filled from that same text.
pub fn primary_identity(fields: &PrimaryFields) -> Option<VerifiedIdentity> {
    let card_number = fields.card_number()?;
    let decoded = fields.raw_text.as_deref().and_then(parse_td1);

    let reported = match (
        fields.valid_date_of_birth,
        fields.valid_expiration_date,
        fields.valid_composite,
    ) {
        (Some(dob), Some(exp), Some(composite)) => Some(ChecksumResult::new(dob, exp, composite)),
        _ => None,
    };
    let checksums = reported.or_else(|| decoded.as_ref().map(|r| r.checksums));

    let from_mrz = decoded
        .as_ref()
        .map(MrzRecord::identity_fields)
        .unwrap_or_default();

    let identity = IdentityFields {
        surname: fields.surname.as_deref().and_then(clean_reader_name).or(from_mrz.surname),
        names: fields.names.as_deref().and_then(clean_reader_name).or(from_mrz.names),
        date_of_birth: fields
            .date_of_birth
            .as_deref()
            .and_then(format_mrz_date)
            .or(from_mrz.date_of_birth),
        expiration_date: fields
            .expiration_date
            .as_deref()
            .and_then(format_mrz_date)
            .or(from_mrz.expiration_date),
        nationality: fields
            .nationality
            .as_deref()
            .or(fields.country.as_deref())
            .and_then(clean_code)
            .or(from_mrz.nationality),
        sex: fields.sex.as_deref().map(canonical_sex).or(from_mrz.sex),
    };

    let confidence = fields
        .valid_score
        .filter(|s| s.is_finite())
        .map(|s| Confidence::Score(s.round().clamp(0.0, 100.0) as u8));

    Some(VerifiedIdentity {
        method: VerifyMethod::Primary,
        card_number,
        mrz: decoded.map(|r| r.lines),
        mrz_line2: None,
        fields: identity,
        checksums,
        confidence,
    })
}

/// Reader names may still carry fillers or stray spacing.
fn clean_reader_name(raw: &str) -> Option<String> {
    let cleaned = raw
        .replace('<', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    (!cleaned.is_empty()).then_some(cleaned)
}

fn clean_code(raw: &str) -> Option<String> {
    let code = raw.trim().trim_matches('<');
    (!code.is_empty()).then(|| code.to_owned())
}

fn canonical_sex(raw: &str) -> String {
    match raw.trim() {
        "M" => "M",
        "F" => "F",
        _ => "X",
    }
    .to_owned()
}

// ---------------------------------------------------------------------------
// Secondary
// ---------------------------------------------------------------------------

/// What the regex extractors found in a page of full text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecondaryExtraction {
    pub card_number: Option<String>,
    pub mrz_line2: Option<String>,
}

impl SecondaryExtraction {
    pub fn from_text(text: &str) -> Self {
        Self {
            card_number: extract_card_number(text),
            mrz_line2: extract_mrz_line2(text),
        }
    }
}

/// Decide a secondary result.
///
/// Checked in order: card number present, MRZ line 2 present, card number
/// contained in line 2.  Each rejection carries whatever was found.
pub fn secondary_outcome(extraction: SecondaryExtraction) -> VerificationOutcome {
    let method = Some(VerifyMethod::Secondary);
    let SecondaryExtraction {
        card_number,
        mrz_line2,
    } = extraction;

    let Some(card_number) = card_number else {
        return VerificationOutcome::Rejected(
            Rejection::new(RejectReason::CardNumberNotFound, method).with_mrz_line2(mrz_line2),
        );
    };
    let Some(mrz_line2) = mrz_line2 else {
        return VerificationOutcome::Rejected(
            Rejection::new(RejectReason::MrzLine2NotFound, method)
                .with_card_number(Some(card_number)),
        );
    };
    if !card_number_in_mrz(&card_number, &mrz_line2) {
        return VerificationOutcome::Rejected(
            Rejection::new(RejectReason::CardNumberMrzMismatch, method)
                .with_card_number(Some(card_number))
                .with_mrz_line2(Some(mrz_line2)),
        );
    }

    VerificationOutcome::Verified(VerifiedIdentity {
        method: VerifyMethod::Secondary,
        card_number,
        mrz: None,
        mrz_line2: Some(mrz_line2),
        fields: IdentityFields::default(),
        checksums: None,
        confidence: None,
    })
}

// ---------------------------------------------------------------------------
// Text-native
// ---------------------------------------------------------------------------

/// Lines of text-native OCR output that could belong to an MRZ, after
/// normalization.  Page-break markers and short lines are dropped.
pub fn mrz_candidate_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(normalize_line)
        .filter(|l| l.len() >= cniwerk_mrz::parser::MIN_CANDIDATE_LEN)
        .collect()
}

/// Decide a text-native result from pre-segmented lines.
pub fn mrz_text_outcome<'a, I>(lines: I) -> VerificationOutcome
where
    I: IntoIterator<Item = &'a str>,
{
    let method = Some(VerifyMethod::MrzText);
    let Some(record) = parse_td1_lines(lines) else {
        return VerificationOutcome::Rejected(Rejection::new(RejectReason::MrzNotFound, method));
    };
    if record.card_number.is_empty() {
        return VerificationOutcome::Rejected(
            Rejection::new(RejectReason::CardNumberNotFound, method)
                .with_mrz_line2(Some(record.lines.line2)),
        );
    }

    let level = if record.checksums.all_ok {
        ConfidenceLevel::High
    } else {
        ConfidenceLevel::Medium
    };
    debug!(confidence = ?level, "text-native MRZ decoded");

    VerificationOutcome::Verified(VerifiedIdentity {
        method: VerifyMethod::MrzText,
        fields: record.identity_fields(),
        card_number: record.card_number,
        checksums: Some(record.checksums),
        mrz: Some(record.lines),
        mrz_line2: None,
        confidence: Some(Confidence::Level(level)),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
