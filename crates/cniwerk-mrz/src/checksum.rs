// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ICAO 9303 check digits (7-3-1 weighting, modulo 10).

/// Repeating weight pattern applied by character position.
const WEIGHTS: [u32; 3] = [7, 3, 1];

/// Numeric value of one MRZ character.
///
/// Digits map to themselves, `A`–`Z` to 10–35 and the filler `<` to 0.
/// Anything else also counts as 0: OCR noise must not turn into a parse
/// failure here.
pub fn char_value(c: char) -> u32 {
    match c {
        '0'..='9' => c as u32 - '0' as u32,
        'A'..='Z' => c as u32 - 'A' as u32 + 10,
        _ => 0,
    }
}

/// Compute the check digit of `data`.
pub fn compute_check_digit(data: &str) -> u32 {
    data.chars()
        .zip(WEIGHTS.iter().cycle())
        .map(|(c, w)| char_value(c) * w)
        .sum::<u32>()
        % 10
}

/// Whether `check` (a single digit character) is the check digit of `data`.
///
/// A check character that is not a digit never matches.
pub fn checksum_ok(data: &str, check: &str) -> bool {
    let mut chars = check.chars();
    match (chars.next().and_then(|c| c.to_digit(10)), chars.next()) {
        (Some(digit), None) => digit == compute_check_digit(data),
        _ => false,
    }
}
