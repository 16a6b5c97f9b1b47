//! Pagination over pre-ordered result lists, with an opaque signed cursor.
//! The cursor's only contract is round-trip equivalence; an unparseable or
//! tampered token falls back to page 1.

use crate::config::Config;
use crate::model::Page;

const CURSOR_PREFIX: &str = "s1";
const CURSOR_KEY_CONTEXT: &str = "semquery 2025 pagination cursor v1";

/// Clamp a requested page size into [1, max_page_size], defaulting when
/// absent.
pub fn clamp_page_size(requested: Option<usize>) -> usize {
    let config = Config::get();
    requested
        .unwrap_or(config.default_page_size)
        .clamp(1, config.max_page_size)
}

/// Effective page number: a valid cursor wins over an explicit page; both
/// absent (or an invalid cursor) means page 1.
pub fn resolve_page(page: Option<usize>, cursor: Option<&str>) -> usize {
    if let Some(cursor) = cursor {
        return decode_cursor(cursor).unwrap_or(1);
    }
    page.unwrap_or(1).max(1)
}

/// Slice `items` (already in stable order) into one page. `page` and
/// `page_size` are 1-based/positive.
pub fn paginate<T>(items: Vec<T>, page: usize, page_size: usize) -> Page<T> {
    let total = items.len();
    let page = page.max(1);
    let page_size = page_size.max(1);
    let start = (page - 1).saturating_mul(page_size);
    let sliced: Vec<T> = items
        .into_iter()
        .skip(start)
        .take(page_size)
        .collect();
    let next_cursor = if page.saturating_mul(page_size) < total {
        Some(encode_cursor(page + 1))
    } else {
        None
    };
    Page {
        items: sliced,
        total,
        page,
        page_size,
        next_cursor,
    }
}

fn cursor_mac(page: usize) -> String {
    let key = blake3::derive_key(CURSOR_KEY_CONTEXT, CURSOR_PREFIX.as_bytes());
    let mac = blake3::keyed_hash(&key, page.to_string().as_bytes());
    mac.to_hex()[..8].to_string()
}

pub fn encode_cursor(next_page: usize) -> String {
    format!("{CURSOR_PREFIX}.{next_page:x}.{}", cursor_mac(next_page))
}

/// Decode a continuation token. Returns `None` for anything that does not
/// verify, including truncated or tampered tokens.
pub fn decode_cursor(token: &str) -> Option<usize> {
    let mut parts = token.splitn(3, '.');
    if parts.next()? != CURSOR_PREFIX {
        return None;
    }
    let page = usize::from_str_radix(parts.next()?, 16).ok()?;
    let mac = parts.next()?;
    if page == 0 || mac != cursor_mac(page) {
        return None;
    }
    Some(page)
}
