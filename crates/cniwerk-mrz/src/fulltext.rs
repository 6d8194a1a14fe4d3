// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Card-number and MRZ-line-2 extraction from unstructured full-page OCR text.
//
// This is what the secondary engine has to work with: a page of raw text,
// no field positions.  The card number is found by label first, then by
// shape; MRZ line 2 by shape only.  The two are cross-checked by substring
// containment after look-alike folding.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::normalize::fold_lookalikes;

/// Card numbers are twelve digits.
pub const CARD_NUMBER_LEN: usize = 12;

/// Shortest string accepted as MRZ line 2.
pub const MIN_LINE2_LEN: usize = 27;

/// `No`, `No°`, `N°`, `Nº` label followed by twelve ASCII digits.
static LABELED_CARD_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bN(?:o|°|º)[°º]?\.?\s*:?\s*([0-9]{12})(?:[^0-9]|$)")
        .unwrap_or_else(|e| panic!("Failed to compile regex pattern: {e}"))
});

static ANY_TWELVE_DIGITS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9]{12}").unwrap_or_else(|e| panic!("Failed to compile regex pattern: {e}"))
});

/// A whole squashed line shaped like MRZ line 2.
static LINE2_FULL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9]{9,12}[0-9A-Z<]*$")
        .unwrap_or_else(|e| panic!("Failed to compile regex pattern: {e}"))
});

/// A substring shaped like MRZ line 2.
static LINE2_SUBSTRING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9]{9,12}[0-9A-Z<]*")
        .unwrap_or_else(|e| panic!("Failed to compile regex pattern: {e}"))
});

/// Uppercase, drop whitespace, fold guillemets into fillers.
fn squash(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    for c in line
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
    {
        match c {
            '«' => out.push_str("<<"),
            '‹' => out.push('<'),
            _ => out.push(c),
        }
    }
    out
}

fn looks_like_mrz(line: &str) -> bool {
    line.contains('<') || line.contains('«')
}

/// Maximal digit runs of exactly `len` digits.
fn exact_digit_runs(line: &str, len: usize) -> impl Iterator<Item = &str> {
    line.split(|c: char| !c.is_ascii_digit())
        .filter(move |run| run.len() == len)
}

/// Find the 12-digit card number in full-page OCR text.
///
/// Tried in order:
///   1. a number introduced by a `No` / `No°` / `N°` label;
///   2. the first stand-alone 12-digit run on a line that does not look
///      like MRZ;
///   3. the first 12 consecutive digits anywhere.
///
/// The last step is deliberately permissive and can pick up an unrelated
/// number on a noisy scan; the MRZ cross-check is the only guard.
pub fn extract_card_number(text: &str) -> Option<String> {
    if let Some(caps) = LABELED_CARD_NUMBER.captures(text) {
        return Some(caps[1].to_owned());
    }

    let unlabeled = text
        .lines()
        .filter(|line| !looks_like_mrz(line))
        .find_map(|line| exact_digit_runs(line, CARD_NUMBER_LEN).next());
    if let Some(number) = unlabeled {
        return Some(number.to_owned());
    }

    ANY_TWELVE_DIGITS.find(text).map(|m| m.as_str().to_owned())
}

/// Find MRZ line 2 in full-page OCR text.
///
/// First looks for a whole line of at least [`MIN_LINE2_LEN`] characters
/// from `[0-9A-Z<]` that starts with 9-12 digits and contains a filler.
/// Failing that, returns the longest such substring of the whole text with
/// line breaks removed, so a line 2 split across OCR lines is still found.
pub fn extract_mrz_line2(text: &str) -> Option<String> {
    let shaped = |s: &str| s.len() >= MIN_LINE2_LEN && s.contains('<');

    if let Some(line) = text
        .lines()
        .map(squash)
        .find(|l| shaped(l) && LINE2_FULL.is_match(l))
    {
        return Some(line);
    }

    let whole = squash(text);
    LINE2_SUBSTRING
        .find_iter(&whole)
        .map(|m| m.as_str())
        .filter(|s| shaped(s))
        .fold(None::<&str>, |best, s| match best {
            Some(b) if b.len() >= s.len() => Some(b),
            _ => Some(s),
        })
        .map(str::to_owned)
}

/// Document-number region of MRZ line 2: the text before the first filler,
/// cut after its last real digit so the name that follows is left out.
fn number_region(mrz_line2: &str) -> &str {
    let head = mrz_line2.split('<').next().unwrap_or_default();
    match head.rfind(|c: char| c.is_ascii_digit()) {
        Some(last) => &head[..=last],
        None => "",
    }
}

/// Whether the card number occurs in the number region of MRZ line 2,
/// tolerating letter/digit look-alikes on both sides.
pub fn card_number_in_mrz(card_number: &str, mrz_line2: &str) -> bool {
    let needle = fold_lookalikes(card_number);
    !needle.is_empty() && fold_lookalikes(number_region(mrz_line2)).contains(&needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    const OLD_FORMAT_PAGE: &str = "\
REPUBLIQUE FRANCAISE
CARTE NATIONALE D'IDENTITE N° : 880692310285
Nom : DUPONT
Prénom(s) : JEAN, PIERRE
IDFRADUPONT<<<<<<<<<<<<<<<<<<<<<<<<<<<
8806923102858JEAN<<PIERRE<<7408122M4
";

    #[test]
    fn labeled_number_wins() {
        assert_eq!(
            extract_card_number(OLD_FORMAT_PAGE).as_deref(),
            Some("880692310285")
        );
        assert_eq!(
            extract_card_number("No 123456789012 issued").as_deref(),
            Some("123456789012")
        );
        assert_eq!(
            extract_card_number("card no°:111122223333").as_deref(),
            Some("111122223333")
        );
    }

    #[test]
    fn unlabeled_run_skips_mrz_lines() {
        let text = "999988887777<<<<<<<<<<<<<<<<<\nref 123456789012 printed";
        assert_eq!(extract_card_number(text).as_deref(), Some("123456789012"));
    }

    #[test]
    fn unlabeled_run_must_be_exactly_twelve_digits() {
        let text = "phone 0123456789012\nid 123456789012";
        assert_eq!(extract_card_number(text).as_deref(), Some("123456789012"));
    }

    #[test]
    fn last_resort_takes_any_twelve_digits() {
        let text = "8806923102858JEAN<<PIERRE<<7408122M4";
        assert_eq!(extract_card_number(text).as_deref(), Some("880692310285"));
    }

    #[test]
    fn no_digits_no_number() {
        assert_eq!(extract_card_number("nothing to see"), None);
        assert_eq!(extract_card_number("12345678901"), None);
    }

    #[test]
    fn finds_line2_by_shape() {
        assert_eq!(
            extract_mrz_line2(OLD_FORMAT_PAGE).as_deref(),
            Some("8806923102858JEAN<<PIERRE<<7408122M4")
        );
    }

    #[test]
    fn line2_tolerates_spaces_and_case() {
        let text = "8806 9231 0285 8jean<<pierre<<7408122M4";
        assert_eq!(
            extract_mrz_line2(text).as_deref(),
            Some("8806923102858JEAN<<PIERRE<<7408122M4")
        );
    }

    #[test]
    fn line2_falls_back_to_longest_substring() {
        let text = "sig: 123456789<<<<<<<<<<<<<<<<<<<< / 987654321012ABC<<<<<<<<<<<<<<<<<<<<<<<<<";
        assert_eq!(
            extract_mrz_line2(text).as_deref(),
            Some("987654321012ABC<<<<<<<<<<<<<<<<<<<<<<<<<")
        );
    }

    #[test]
    fn line2_split_across_lines_is_rejoined() {
        let text = "8806923102858JEAN<<\nPIERRE<<7408122M4\n";
        assert_eq!(
            extract_mrz_line2(text).as_deref(),
            Some("8806923102858JEAN<<PIERRE<<7408122M4")
        );

        let labeled = "N° 880692310285\n8806923102858JEAN<<\nPIERRE<<7408122M4\n";
        let number = extract_card_number(labeled).unwrap();
        let line2 = extract_mrz_line2(labeled).unwrap();
        assert!(line2.ends_with("8806923102858JEAN<<PIERRE<<7408122M4"));
        assert!(card_number_in_mrz(&number, &line2));
    }

    #[test]
    fn card_number_digits_are_ascii_only() {
        assert_eq!(extract_card_number("N° ١٢٣٤٥٦٧٨٩٠١٢"), None);
        assert_eq!(extract_card_number("ref ١٢٣٤٥٦٧٨٩٠١٢ printed"), None);
        assert_eq!(
            extract_card_number("N° 880692310285١").as_deref(),
            Some("880692310285")
        );
    }

    #[test]
    fn line2_requires_filler_and_length() {
        assert_eq!(extract_mrz_line2("880692310285880692310285880692"), None);
        assert_eq!(extract_mrz_line2("880692310285<<"), None);
        assert_eq!(extract_mrz_line2(""), None);
    }

    #[test]
    fn cross_check_tolerates_lookalikes() {
        assert!(card_number_in_mrz("880692310285", "88O6923IO2858JEAN<<PIERRE"));
        assert!(card_number_in_mrz("88O692310285", "8806923102858JEAN<<PIERRE"));
        assert!(!card_number_in_mrz("123456789012", "8806923102858JEAN<<PIERRE"));
        assert!(!card_number_in_mrz("", "8806923102858JEAN<<PIERRE"));
    }

    #[test]
    fn cross_check_ignores_the_name_region() {
        let line2 = "8806923102858BOZOSTOUDOLI<<7408122M4";
        assert!(card_number_in_mrz("880692310285", line2));
        // BOZOSTOUDOLI folds to 802057000011.
        assert!(!card_number_in_mrz("802057000011", line2));
        assert!(!card_number_in_mrz("7408122", line2));
        assert!(!card_number_in_mrz("880692310285", "<<<<<<<<<<<<<<<<<<<<<<<<<<<"));
    }
}
