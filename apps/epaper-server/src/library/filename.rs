//! Filename conventions for e-paper editions
//!
//! Editions are published as `DD-MM-YYYY-Edition-Name.pdf`. Everything the
//! catalog knows about a document besides its size and timestamps is
//! derived from that name, so every function here is pure and must return
//! the same result for the same input.

use chrono::{DateTime, NaiveDate, Utc};

use super::document::DocumentRecord;

/// Length of a `DD-MM-YYYY` date
const DATE_LEN: usize = 10;

/// Id used when a filename has no alphanumeric characters at all
pub const FALLBACK_ID: &str = "document";

/// Derive a document record from a raw filename.
///
/// `scanned_at` stands in for the publish date when the name carries no
/// usable date and seeds `creation_date`; the scanner overwrites size and
/// creation date with what the filesystem reports.
pub fn parse(filename: &str, scanned_at: DateTime<Utc>) -> DocumentRecord {
    let stem = strip_extension(filename);
    let undated = strip_date_prefix(stem);

    let title = title_from(undated, stem);
    let id = derive_id(undated, stem);
    let tags = tags_from(&title);
    let publish_date = extract_date(filename).unwrap_or(scanned_at);

    DocumentRecord {
        id,
        title,
        publish_date,
        file_size: 0,
        tags,
        creation_date: scanned_at,
        filename: filename.to_string(),
    }
}

/// Slug of the whole stem, date prefix included.
///
/// Used to re-key a document whose primary id is already taken.
pub fn stem_id(filename: &str) -> String {
    let slug = slugify(strip_extension(filename));
    if slug.is_empty() {
        FALLBACK_ID.to_string()
    } else {
        slug
    }
}

/// Lowercase, transliterate German letters, and collapse every run of
/// characters outside `[a-z0-9]` into a single `-`. No leading or trailing
/// hyphen.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_hyphen = false;

    for ch in input.chars().flat_map(char::to_lowercase) {
        let replacement = match ch {
            'ä' => Some("ae"),
            'ö' => Some("oe"),
            'ü' => Some("ue"),
            'ß' => Some("ss"),
            _ => None,
        };

        match replacement {
            Some(text) => push_segment(&mut slug, text, &mut pending_hyphen),
            None if ch.is_ascii_lowercase() || ch.is_ascii_digit() => {
                let mut buf = [0u8; 4];
                push_segment(&mut slug, ch.encode_utf8(&mut buf), &mut pending_hyphen);
            }
            None => pending_hyphen = true,
        }
    }

    slug
}

fn push_segment(slug: &mut String, text: &str, pending_hyphen: &mut bool) {
    if *pending_hyphen && !slug.is_empty() {
        slug.push('-');
    }
    *pending_hyphen = false;
    slug.push_str(text);
}

/// Find the first `DD-MM-YYYY` occurrence that is a real calendar date
pub fn extract_date(filename: &str) -> Option<DateTime<Utc>> {
    let bytes = filename.as_bytes();
    if bytes.len() < DATE_LEN {
        return None;
    }

    (0..=bytes.len() - DATE_LEN).find_map(|start| {
        let window = &bytes[start..start + DATE_LEN];
        if !is_date_shape(window) {
            return None;
        }
        // Shape check guarantees ASCII, so the slice is on char boundaries
        let text = &filename[start..start + DATE_LEN];
        let day: u32 = text[0..2].parse().ok()?;
        let month: u32 = text[3..5].parse().ok()?;
        let year: i32 = text[6..10].parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    })
}

fn is_date_shape(window: &[u8]) -> bool {
    window.len() == DATE_LEN
        && window.iter().enumerate().all(|(i, b)| match i {
            2 | 5 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

fn strip_extension(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => filename,
    }
}

/// Remove a leading `DD-MM-YYYY-` prefix. Dates elsewhere in the name stay.
fn strip_date_prefix(stem: &str) -> &str {
    let bytes = stem.as_bytes();
    if bytes.len() > DATE_LEN && is_date_shape(&bytes[..DATE_LEN]) && bytes[DATE_LEN] == b'-' {
        &stem[DATE_LEN + 1..]
    } else {
        stem
    }
}

fn title_from(undated: &str, stem: &str) -> String {
    let title = undated.replace(['-', '_'], " ").trim().to_string();
    if title.is_empty() {
        stem.to_string()
    } else {
        title
    }
}

fn derive_id(undated: &str, stem: &str) -> String {
    let id = slugify(undated);
    if !id.is_empty() {
        return id;
    }
    let id = slugify(stem);
    if id.is_empty() {
        FALLBACK_ID.to_string()
    } else {
        id
    }
}

fn tags_from(title: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for word in title.split_whitespace() {
        if word.chars().count() > 2 && !tags.iter().any(|t| t == word) {
            tags.push(word.to_string());
        }
    }
    tags
}
