// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OCR clean-up for MRZ text: line normalization, letter/digit look-alike
// repair, and MRZ date conversion.

use chrono::NaiveDate;

/// Normalize one OCR line for MRZ matching.
///
/// Uppercases, drops whitespace, folds the guillemet-style characters OCR
/// engines emit for `<`, and keeps only `[A-Z0-9<]`.
pub fn normalize_line(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars().flat_map(char::to_uppercase) {
        match c {
            '«' => out.push_str("<<"),
            '‹' | '〈' | '＜' | '≤' => out.push('<'),
            'A'..='Z' | '0'..='9' | '<' => out.push(c),
            _ => {}
        }
    }
    out
}

/// Map a letter OCR commonly confuses with a digit back to that digit.
/// Digits, fillers and unrelated letters pass through.
pub fn repair_digit(c: char) -> char {
    match c {
        'O' | 'Q' | 'D' | 'U' => '0',
        'I' | 'L' => '1',
        'Z' => '2',
        'S' => '5',
        'G' => '6',
        'T' => '7',
        'B' => '8',
        _ => c,
    }
}

/// Fold a string for look-alike-tolerant comparison: uppercase, no spaces,
/// and every digit-like letter replaced by its digit.
pub fn fold_lookalikes(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .map(repair_digit)
        .collect()
}

/// Expand a two-digit MRZ year.
///
/// Years above 30 are 19xx, the rest 20xx.  This is an approximation: it
/// misdates anyone born after 2030 and cards expiring after 2099.
pub fn expand_year(yy: &str) -> Option<String> {
    if yy.len() != 2 || !yy.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value: u32 = yy.parse().ok()?;
    let century = if value > 30 { 1900 } else { 2000 };
    Some((century + value).to_string())
}

/// Convert an MRZ `YYMMDD` date to ISO `YYYY-MM-DD`.
///
/// Returns `None` for anything that is not a real calendar date.
pub fn format_mrz_date(yymmdd: &str) -> Option<String> {
    if yymmdd.len() != 6 || !yymmdd.is_ascii() {
        return None;
    }
    let year: i32 = expand_year(&yymmdd[..2])?.parse().ok()?;
    let month: u32 = yymmdd[2..4].parse().ok()?;
    let day: u32 = yymmdd[4..6].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day).map(|d| d.format("%Y-%m-%d").to_string())
}

/// Turn a filler-separated name segment into plain text.
pub fn clean_name(segment: &str) -> String {
    segment
        .split('<')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_keeps_mrz_alphabet_only() {
        assert_eq!(normalize_line(" idfra x4rt«bp-fw4 "), "IDFRAX4RT<<BPFW4");
        assert_eq!(normalize_line("Nom: Martin"), "NOMMARTIN");
        assert_eq!(normalize_line(""), "");
    }

    #[test]
    fn century_heuristic() {
        assert_eq!(expand_year("05").as_deref(), Some("2005"));
        assert_eq!(expand_year("95").as_deref(), Some("1995"));
        assert_eq!(expand_year("30").as_deref(), Some("2030"));
        assert_eq!(expand_year("31").as_deref(), Some("1931"));
        assert_eq!(expand_year("3O"), None);
    }

    #[test]
    fn dates_are_validated() {
        assert_eq!(format_mrz_date("900713").as_deref(), Some("1990-07-13"));
        assert_eq!(format_mrz_date("300211").as_deref(), Some("2030-02-11"));
        assert_eq!(format_mrz_date("901332"), None);
        assert_eq!(format_mrz_date("<<<<<<"), None);
        assert_eq!(format_mrz_date("9007"), None);
    }

    #[test]
    fn lookalikes_fold_to_digits() {
        assert_eq!(fold_lookalikes("12O4 56l8 9B"), "1204561898");
        assert_eq!(fold_lookalikes("<<"), "<<");
    }

    #[test]
    fn names_lose_fillers() {
        assert_eq!(clean_name("MAELYS<GAELLE<<<<<"), "MAELYS GAELLE");
        assert_eq!(clean_name("<<<"), "");
    }
}
