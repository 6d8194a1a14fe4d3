// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// TD1 layout table (ICAO 9303 part 5): three lines of 30 characters, every
// field at a fixed offset.  Field access goes through this table and a
// `Td1Block` whose constructor enforces the 30-character invariant, so no
// caller ever slices an MRZ line by hand.

/// Characters per TD1 line.
pub const TD1_LINE_LEN: usize = 30;

/// The filler character.
pub const FILLER: char = '<';

/// Which of the three lines a field lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    First,
    Second,
    Third,
}

impl Line {
    fn index(self) -> usize {
        match self {
            Self::First => 0,
            Self::Second => 1,
            Self::Third => 2,
        }
    }
}

/// A named byte range on one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub line: Line,
    pub start: usize,
    pub end: usize,
}

const fn field(name: &'static str, line: Line, start: usize, end: usize) -> Field {
    Field {
        name,
        line,
        start,
        end,
    }
}

// -- Line 1 --
pub const DOCUMENT_CODE: Field = field("document_code", Line::First, 0, 2);
pub const ISSUING_COUNTRY: Field = field("issuing_country", Line::First, 2, 5);
pub const DOCUMENT_NUMBER: Field = field("document_number", Line::First, 5, 14);
pub const DOCUMENT_NUMBER_CHECK: Field = field("document_number_check", Line::First, 14, 15);
pub const OPTIONAL_DATA_1: Field = field("optional_data_1", Line::First, 15, 30);

// -- Line 2 --
pub const BIRTH_DATE: Field = field("birth_date", Line::Second, 0, 6);
pub const BIRTH_DATE_CHECK: Field = field("birth_date_check", Line::Second, 6, 7);
pub const SEX: Field = field("sex", Line::Second, 7, 8);
pub const EXPIRY_DATE: Field = field("expiry_date", Line::Second, 8, 14);
pub const EXPIRY_DATE_CHECK: Field = field("expiry_date_check", Line::Second, 14, 15);
pub const NATIONALITY: Field = field("nationality", Line::Second, 15, 18);
pub const OPTIONAL_DATA_2: Field = field("optional_data_2", Line::Second, 18, 29);
pub const COMPOSITE_CHECK: Field = field("composite_check", Line::Second, 29, 30);

// -- Line 3 --
pub const NAME: Field = field("name", Line::Third, 0, 30);

/// Every field of the layout, in line order.
pub const TD1_FIELDS: &[Field] = &[
    DOCUMENT_CODE,
    ISSUING_COUNTRY,
    DOCUMENT_NUMBER,
    DOCUMENT_NUMBER_CHECK,
    OPTIONAL_DATA_1,
    BIRTH_DATE,
    BIRTH_DATE_CHECK,
    SEX,
    EXPIRY_DATE,
    EXPIRY_DATE_CHECK,
    NATIONALITY,
    OPTIONAL_DATA_2,
    COMPOSITE_CHECK,
    NAME,
];

/// Spans concatenated (in this order) to form the composite check input:
/// line 1 from the document number on, birth date + check, expiry + check,
/// and the second optional-data field.
pub const COMPOSITE_INPUT: &[Field] = &[
    field("composite_line1", Line::First, 5, 30),
    field("composite_birth", Line::Second, 0, 7),
    field("composite_expiry", Line::Second, 8, 15),
    OPTIONAL_DATA_2,
];

/// Fields that can only hold digits (or fillers); OCR letter confusions in
/// them are repaired before decoding.
pub const NUMERIC_FIELDS: &[Field] = &[
    BIRTH_DATE,
    BIRTH_DATE_CHECK,
    EXPIRY_DATE,
    EXPIRY_DATE_CHECK,
    COMPOSITE_CHECK,
];

/// Three validated TD1 lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Td1Block {
    lines: [String; 3],
}

impl Td1Block {
    /// Wrap three lines.  Returns `None` unless each is exactly
    /// [`TD1_LINE_LEN`] ASCII characters.
    pub fn new(lines: [String; 3]) -> Option<Self> {
        lines
            .iter()
            .all(|l| l.len() == TD1_LINE_LEN && l.is_ascii())
            .then_some(Self { lines })
    }

    /// Pad with fillers or truncate each line to [`TD1_LINE_LEN`], then wrap.
    pub fn fitted(lines: [&str; 3]) -> Option<Self> {
        Self::new(lines.map(fit_line))
    }

    pub fn line(&self, line: Line) -> &str {
        &self.lines[line.index()]
    }

    /// The raw text of `field`.
    pub fn get(&self, field: Field) -> &str {
        // In bounds: every table entry ends at or before TD1_LINE_LEN and
        // the constructor guarantees ASCII lines of exactly that length.
        &self.lines[field.line.index()][field.start..field.end]
    }

    /// Concatenation of the composite-check spans.
    pub fn composite_input(&self) -> String {
        COMPOSITE_INPUT.iter().map(|f| self.get(*f)).collect()
    }

    /// Rewrite `field` through `map`, one character at a time.
    pub(crate) fn map_field(&mut self, field: Field, map: impl Fn(char) -> char) {
        let line = &mut self.lines[field.line.index()];
        let mapped: String = line
            .char_indices()
            .map(|(i, c)| {
                if (field.start..field.end).contains(&i) {
                    map(c)
                } else {
                    c
                }
            })
            .collect();
        *line = mapped;
    }

    pub fn into_lines(self) -> [String; 3] {
        self.lines
    }
}

/// Pad with `<` or truncate to exactly [`TD1_LINE_LEN`] characters.
pub fn fit_line(line: &str) -> String {
    let mut fitted: String = line.chars().take(TD1_LINE_LEN).collect();
    while fitted.len() < TD1_LINE_LEN {
        fitted.push(FILLER);
    }
    fitted
}
