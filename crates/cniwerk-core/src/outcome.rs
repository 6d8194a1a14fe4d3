// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Verification outcome and its canonical wire shape.
//
// The outcome is a closed sum type.  Serialization goes through two flat
// record structs whose fields are all present on the wire, so consumers can
// pattern-match on a stable shape: a field a method cannot supply is `null`,
// never missing.  The only exception is `raw_text`, which is omitted unless
// the caller asked for debug output.

use serde::{Deserialize, Serialize};

use crate::types::{ChecksumResult, Confidence, RejectReason, VerifyMethod};

/// The three MRZ lines, each exactly 30 characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MrzLines {
    pub line1: String,
    pub line2: String,
    pub line3: String,
}

/// Holder data decoded from the card.  Every field is optional because the
/// secondary engine can only supply the card number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityFields {
    pub surname: Option<String>,
    pub names: Option<String>,
    /// ISO date, `YYYY-MM-DD`.
    pub date_of_birth: Option<String>,
    /// ISO date, `YYYY-MM-DD`.
    pub expiration_date: Option<String>,
    /// Three-letter country code.
    pub nationality: Option<String>,
    /// `M`, `F` or `X`.
    pub sex: Option<String>,
}

/// A successful verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedIdentity {
    pub method: VerifyMethod,
    pub card_number: String,
    pub mrz: Option<MrzLines>,
    /// Secondary-only results carry only MRZ line 2.
    pub mrz_line2: Option<String>,
    pub fields: IdentityFields,
    /// `None` means "unknown", not "failed".
    pub checksums: Option<ChecksumResult>,
    pub confidence: Option<Confidence>,
}

/// A business-logic rejection, with whatever was extracted before it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub reason: RejectReason,
    pub message: String,
    pub method: Option<VerifyMethod>,
    pub card_number: Option<String>,
    pub mrz_line2: Option<String>,
    /// OCR text, only serialized when debug output was requested.
    pub raw_text: Option<String>,
}

impl Rejection {
    pub fn new(reason: RejectReason, method: Option<VerifyMethod>) -> Self {
        Self {
            reason,
            message: reason.default_message().to_owned(),
            method,
            card_number: None,
            mrz_line2: None,
            raw_text: None,
        }
    }

    pub fn with_card_number(mut self, card_number: Option<String>) -> Self {
        self.card_number = card_number;
        self
    }

    pub fn with_mrz_line2(mut self, mrz_line2: Option<String>) -> Self {
        self.mrz_line2 = mrz_line2;
        self
    }

    pub fn with_raw_text(mut self, raw_text: impl Into<String>) -> Self {
        self.raw_text = Some(raw_text.into());
        self
    }
}

/// Terminal state of one verification request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VerificationOutcome {
    Verified(VerifiedIdentity),
    Rejected(Rejection),
}

impl VerificationOutcome {
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified(_))
    }

    pub fn method(&self) -> Option<VerifyMethod> {
        match self {
            Self::Verified(v) => Some(v.method),
            Self::Rejected(r) => r.method,
        }
    }

    pub fn reason(&self) -> Option<RejectReason> {
        match self {
            Self::Verified(_) => None,
            Self::Rejected(r) => Some(r.reason),
        }
    }

    /// HTTP status for the response carrying this outcome.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Verified(_) => 200,
            Self::Rejected(_) => 422,
        }
    }

    /// Canonical JSON body.  `debug` controls whether raw OCR text is
    /// attached to rejections.
    pub fn to_json(&self, debug: bool) -> serde_json::Value {
        let value = match self {
            Self::Verified(v) => serde_json::to_value(VerifiedRecord::from(v)),
            Self::Rejected(r) => serde_json::to_value(RejectedRecord::new(r, debug)),
        };
        value.unwrap_or_else(|_| serde_json::json!({ "error": "internal server error" }))
    }
}

/// Wire shape of a verified outcome.
#[derive(Debug, Clone, Serialize)]
pub struct VerifiedRecord<'a> {
    pub valid: bool,
    pub method: VerifyMethod,
    pub card_number: &'a str,
    pub mrz_line1: Option<&'a str>,
    pub mrz_line2: Option<&'a str>,
    pub mrz_line3: Option<&'a str>,
    pub surname: Option<&'a str>,
    pub names: Option<&'a str>,
    pub date_of_birth: Option<&'a str>,
    pub expiration_date: Option<&'a str>,
    pub nationality: Option<&'a str>,
    pub sex: Option<&'a str>,
    pub all_checksums_ok: Option<bool>,
    pub checksums: Option<ChecksumResult>,
    pub confidence: Option<Confidence>,
}

impl<'a> From<&'a VerifiedIdentity> for VerifiedRecord<'a> {
    fn from(v: &'a VerifiedIdentity) -> Self {
        let mrz = v.mrz.as_ref();
        Self {
            valid: true,
            method: v.method,
            card_number: &v.card_number,
            mrz_line1: mrz.map(|m| m.line1.as_str()),
            mrz_line2: mrz
                .map(|m| m.line2.as_str())
                .or(v.mrz_line2.as_deref()),
            mrz_line3: mrz.map(|m| m.line3.as_str()),
            surname: v.fields.surname.as_deref(),
            names: v.fields.names.as_deref(),
            date_of_birth: v.fields.date_of_birth.as_deref(),
            expiration_date: v.fields.expiration_date.as_deref(),
            nationality: v.fields.nationality.as_deref(),
            sex: v.fields.sex.as_deref(),
            all_checksums_ok: v.checksums.map(|c| c.all_ok),
            checksums: v.checksums,
            confidence: v.confidence,
        }
    }
}

/// Wire shape of a rejected outcome.
#[derive(Debug, Clone, Serialize)]
pub struct RejectedRecord<'a> {
    pub valid: bool,
    pub reason: RejectReason,
    pub message: &'a str,
    pub method: Option<VerifyMethod>,
    pub card_number: Option<&'a str>,
    pub mrz_line2: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<&'a str>,
}

impl<'a> RejectedRecord<'a> {
    pub fn new(r: &'a Rejection, debug: bool) -> Self {
        Self {
            valid: false,
            reason: r.reason,
            message: &r.message,
            method: r.method,
            card_number: r.card_number.as_deref(),
            mrz_line2: r.mrz_line2.as_deref(),
            raw_text: if debug { r.raw_text.as_deref() } else { None },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn secondary() -> VerificationOutcome {
        VerificationOutcome::Verified(VerifiedIdentity {
            method: VerifyMethod::Secondary,
            card_number: "123456789012".into(),
            mrz: None,
            mrz_line2: Some("123456789012<<<<<<<<<<<<<<<<<<".into()),
            fields: IdentityFields::default(),
            checksums: None,
            confidence: None,
        })
    }

    #[test]
    fn secondary_nulls_every_unavailable_field() {
        let body = secondary().to_json(false);
        let obj = body.as_object().unwrap();
        assert_eq!(body["valid"], json!(true));
        assert_eq!(body["method"], json!("secondary"));
        assert_eq!(body["card_number"], json!("123456789012"));
        assert_eq!(body["mrz_line2"], json!("123456789012<<<<<<<<<<<<<<<<<<"));
        for key in [
            "mrz_line1",
            "mrz_line3",
            "surname",
            "names",
            "date_of_birth",
            "expiration_date",
            "nationality",
            "sex",
            "all_checksums_ok",
            "checksums",
            "confidence",
        ] {
            assert!(obj.contains_key(key), "{key} must be present");
            assert!(obj[key].is_null(), "{key} must be null");
        }
    }

    #[test]
    fn rejection_hides_raw_text_without_debug() {
        let outcome = VerificationOutcome::Rejected(
            Rejection::new(RejectReason::CardNumberNotFound, Some(VerifyMethod::Secondary))
                .with_raw_text("JEAN MARTIN"),
        );
        assert_eq!(outcome.http_status(), 422);

        let plain = outcome.to_json(false);
        assert_eq!(plain["valid"], json!(false));
        assert_eq!(plain["reason"], json!("card_number_not_found"));
        assert!(plain["card_number"].is_null());
        assert!(plain.get("raw_text").is_none());

        let debug = outcome.to_json(true);
        assert_eq!(debug["raw_text"], json!("JEAN MARTIN"));
    }

    #[test]
    fn all_checksums_ok_follows_checksums() {
        let outcome = VerificationOutcome::Verified(VerifiedIdentity {
            method: VerifyMethod::Primary,
            card_number: "X4RTBPFW4".into(),
            mrz: None,
            mrz_line2: None,
            fields: IdentityFields::default(),
            checksums: Some(ChecksumResult::new(true, false, true)),
            confidence: Some(Confidence::Score(67)),
        });
        let body = outcome.to_json(false);
        assert_eq!(body["all_checksums_ok"], json!(false));
        assert_eq!(body["checksums"]["expiration_ok"], json!(false));
        assert_eq!(body["confidence"], json!(67));
    }
}
