//! Reference tables compiled from `data/`.

use std::collections::HashMap;

use dispatch_board::StaticTenCode;
use lazy_static::lazy_static;

include!(concat!(env!("OUT_DIR"), "/gen.rs"));

lazy_static! {
    static ref TEN_CODES_BY_CODE: HashMap<&'static str, &'static StaticTenCode> = ten_codes::ALL
        .iter()
        .map(|entry| (entry.code, *entry))
        .collect();
}

/// Meaning of a ten-code, if it is part of the table.
pub fn lookup(code: &str) -> Option<&'static str> {
    TEN_CODES_BY_CODE
        .get(code.trim())
        .map(|entry| entry.meaning)
}
