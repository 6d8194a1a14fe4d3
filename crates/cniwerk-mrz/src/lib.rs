// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// cniwerk-mrz: Machine-readable-zone handling for French identity cards.
//
// Provides the ICAO 7-3-1 check-digit engine, the declarative TD1 layout
// table, the TD1 grammar parser, and the card-number / MRZ-line-2
// extraction used on unstructured full-page OCR text.

pub mod checksum;
pub mod fulltext;
pub mod layout;
pub mod normalize;
pub mod parser;

pub use checksum::{checksum_ok, compute_check_digit};
pub use fulltext::{card_number_in_mrz, extract_card_number, extract_mrz_line2};
pub use layout::Td1Block;
pub use parser::{MrzRecord, parse_td1, parse_td1_lines};
