// SPDX-License-Identifier: Apache-2.0

//! URL slug generation.
//!
//! The base is a deterministic normalization of the title; the caller-visible
//! slug appends a base-36 millisecond timestamp so two identical titles
//! submitted back to back still get distinct slugs. A title that normalizes
//! to nothing is fine: the suffix alone is unique, just low-information.

use chrono::{DateTime, Utc};

/// Maximum length of the normalized base, before the suffix.
const MAX_BASE_LEN: usize = 100;

/// Normalize a title into `[a-z0-9-]{0,100}`.
///
/// German letters map to their ASCII digraphs (ä→ae, ö→oe, ü→ue, ß→ss),
/// whitespace runs become one hyphen, everything else outside `[a-z0-9-]` is
/// stripped, repeated hyphens collapse.
pub fn slugify(title: &str) -> String {
    let mut mapped = String::with_capacity(title.len());
    for ch in title.to_lowercase().chars() {
        match ch {
            'ä' => mapped.push_str("ae"),
            'ö' => mapped.push_str("oe"),
            'ü' => mapped.push_str("ue"),
            'ß' => mapped.push_str("ss"),
            c if c.is_whitespace() => mapped.push('-'),
            c => mapped.push(c),
        }
    }

    let mut slug = String::with_capacity(mapped.len());
    let mut last_was_hyphen = false;
    for ch in mapped.chars() {
        let keep = matches!(ch, 'a'..='z' | '0'..='9' | '-');
        if !keep {
            continue;
        }
        if ch == '-' {
            if last_was_hyphen {
                continue;
            }
            last_was_hyphen = true;
        } else {
            last_was_hyphen = false;
        }
        slug.push(ch);
    }

    slug.truncate(MAX_BASE_LEN);
    slug
}

/// Build the full slug: normalized base plus a base-36 timestamp suffix.
pub fn unique_slug(title: &str, now: DateTime<Utc>) -> String {
    let base = slugify(title);
    let suffix = to_base36(now.timestamp_millis().max(0) as u128);
    if base.is_empty() {
        suffix
    } else {
        format!("{base}-{suffix}")
    }
}

fn to_base36(mut n: u128) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).expect("base36 digits are ASCII")
}
