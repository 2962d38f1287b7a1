// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use rand::Rng;

use crate::app::errors::{AppResult, invalid_argument};

const SEED_SUFFIX_LEN: usize = 12;
const SEED_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Characters a seed may carry. Seeds become file names and words of the
/// runner line, so anything the shell or a path would interpret is excluded.
fn is_seed_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

/// Builds a per-job filename seed such as `LoginTest_w0ln0t3j39wm`. Characters
/// outside the seed set are dropped from the name.
pub fn generate_filename_seed(script_name: &str) -> String {
    let name: String = script_name.chars().filter(|c| is_seed_char(*c)).collect();
    let name = name.trim_start_matches(['-', '.']);

    let mut rng = rand::rng();
    let suffix: String = (0..SEED_SUFFIX_LEN)
        .map(|_| {
            let idx = rng.random_range(0..SEED_ALPHABET.len());
            SEED_ALPHABET[idx] as char
        })
        .collect();

    format!("{}_{}", name, suffix)
}

/// Seeds end up in remote shell commands and file names.
pub fn validate_filename_seed(seed: &str) -> AppResult<()> {
    if seed.is_empty() {
        return Err(invalid_argument("filename seed must not be empty"));
    }
    if !seed.chars().all(is_seed_char) {
        return Err(invalid_argument(format!(
            "filename seed {seed:?} may only contain ASCII letters, digits, '.', '_' and '-'"
        )));
    }
    if seed.starts_with(['-', '.']) {
        return Err(invalid_argument(format!(
            "filename seed {seed:?} must not start with '-' or '.'"
        )));
    }
    Ok(())
}
