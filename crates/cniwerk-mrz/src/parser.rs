// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// TD1 grammar parser: finds a 3×30 MRZ in arbitrary OCR text and decodes it.
//
// # Algorithm
//
//   1. Normalize every line (see `normalize_line`).
//   2. Keep lines of at least `MIN_CANDIDATE_LEN` characters.
//   3. Slide over consecutive triplets, fitting each line to 30 characters.
//   4. Accept the first triplet whose line 1 starts with a document marker
//      (`I` + letter/filler) and a three-character issuing country.
//   5. Repair letter/digit confusions in the numeric fields, decode through
//      the layout table and verify the three check digits.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use cniwerk_core::{ChecksumResult, IdentityFields, MrzLines};

use crate::checksum::checksum_ok;
use crate::layout::{self, Line, Td1Block};
use crate::normalize::{clean_name, format_mrz_date, normalize_line, repair_digit};

/// Shortest normalized line still considered an MRZ candidate.  Shorter
/// than 30 so that OCR-truncated lines survive and get padded.
pub const MIN_CANDIDATE_LEN: usize = 25;

/// Document marker followed by the issuing country.
static DOCUMENT_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^I[A-Z<][A-Z][A-Z<]{2}")
        .unwrap_or_else(|e| panic!("Failed to compile regex pattern: {e}"))
});

/// A decoded TD1 machine-readable zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MrzRecord {
    /// The three normalized 30-character lines, after numeric repair.
    pub lines: MrzLines,
    /// Document number, fillers stripped.
    pub card_number: String,
    /// Issuing country from line 1, fillers stripped.
    pub nationality: String,
    /// ISO date, `None` if the digits are not a calendar date.
    pub date_of_birth: Option<String>,
    /// ISO date, `None` if the digits are not a calendar date.
    pub expiration_date: Option<String>,
    /// `M`, `F` or `X`.
    pub sex: String,
    pub surname: String,
    pub names: String,
    pub checksums: ChecksumResult,
}

impl MrzRecord {
    /// Holder fields in the shape the outcome model uses.
    pub fn identity_fields(&self) -> IdentityFields {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_owned());
        IdentityFields {
            surname: non_empty(&self.surname),
            names: non_empty(&self.names),
            date_of_birth: self.date_of_birth.clone(),
            expiration_date: self.expiration_date.clone(),
            nationality: non_empty(&self.nationality),
            sex: Some(self.sex.clone()),
        }
    }
}

/// Locate and decode a TD1 MRZ in multi-line OCR text.
///
/// `None` means "MRZ not located", not a hard failure.
pub fn parse_td1(text: &str) -> Option<MrzRecord> {
    parse_td1_lines(text.lines())
}

/// Same as [`parse_td1`] for text that is already split into lines.
pub fn parse_td1_lines<'a, I>(lines: I) -> Option<MrzRecord>
where
    I: IntoIterator<Item = &'a str>,
{
    let candidates: Vec<String> = lines
        .into_iter()
        .map(normalize_line)
        .filter(|l| l.len() >= MIN_CANDIDATE_LEN)
        .collect();

    debug!(candidates = candidates.len(), "scanning for TD1 triplet");

    candidates.windows(3).find_map(|triplet| {
        let block = Td1Block::fitted([&triplet[0][..], &triplet[1][..], &triplet[2][..]])?;
        DOCUMENT_MARKER
            .is_match(block.line(Line::First))
            .then(|| decode(block))
    })
}

/// Decode an accepted block.
pub fn decode(mut block: Td1Block) -> MrzRecord {
    for field in layout::NUMERIC_FIELDS {
        block.map_field(*field, repair_digit);
    }

    let card_number = block.get(layout::DOCUMENT_NUMBER).replace(layout::FILLER, "");
    let nationality = block
        .get(layout::ISSUING_COUNTRY)
        .trim_matches(layout::FILLER)
        .to_owned();
    let sex = match block.get(layout::SEX) {
        "M" => "M",
        "F" => "F",
        _ => "X",
    }
    .to_owned();

    let name_line = block.get(layout::NAME);
    let (surname, names) = name_line.split_once("<<").unwrap_or((name_line, ""));
    let surname = clean_name(surname);
    let names = clean_name(names);

    let checksums = ChecksumResult::new(
        checksum_ok(block.get(layout::BIRTH_DATE), block.get(layout::BIRTH_DATE_CHECK)),
        checksum_ok(block.get(layout::EXPIRY_DATE), block.get(layout::EXPIRY_DATE_CHECK)),
        checksum_ok(&block.composite_input(), block.get(layout::COMPOSITE_CHECK)),
    );

    let date_of_birth = format_mrz_date(block.get(layout::BIRTH_DATE));
    let expiration_date = format_mrz_date(block.get(layout::EXPIRY_DATE));

    debug!(
        all_checksums_ok = checksums.all_ok,
        card_number_len = card_number.len(),
        "TD1 block decoded"
    );

    let [line1, line2, line3] = block.into_lines();
    MrzRecord {
        lines: MrzLines {
            line1,
            line2,
            line3,
        },
        card_number,
        nationality,
        date_of_birth,
        expiration_date,
        sex,
        surname,
        names,
        checksums,
    }
}
