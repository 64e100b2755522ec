//! Content splitting: delimiter parts and per-destination size chunks.

/// Separates independently sendable posts inside a draft's content.
pub const PART_DELIMITER: &str = "\n\n===SPLIT===\n\n";

/// Split content on [`PART_DELIMITER`], trimming each part and dropping blanks.
///
/// The first returned part is the lead part; it is the only one that may carry an image.
pub fn split_into_parts(content: &str) -> Vec<String> {
    content
        .split(PART_DELIMITER)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Cut `text` into chunks of at most `max_len` characters.
///
/// Cuts prefer the last newline within the limit and fall back to a hard cut.
/// Whitespace around a cut point is trimmed.
pub fn fit_to_limit(text: &str, max_len: usize) -> Vec<String> {
    if max_len == 0 || char_len(text) <= max_len {
        return vec![text.to_string()];
    }

    let mut out = Vec::new();
    let mut rest = text;

    while char_len(rest) > max_len {
        let limit = byte_offset(rest, max_len);

        // A newline sitting exactly at `max_len` is still a valid cut.
        let cut = if rest[limit..].starts_with('\n') {
            Some(limit)
        } else {
            rest[..limit].rfind('\n')
        };

        let (head, tail) = match cut {
            Some(i) => (&rest[..i], &rest[i + 1..]),
            None => (&rest[..limit], &rest[limit..]),
        };

        let head = head.trim_end();
        if !head.is_empty() {
            out.push(head.to_string());
        }
        rest = tail.trim_start();
    }

    if !rest.is_empty() {
        out.push(rest.to_string());
    }
    out
}

pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Byte offset of the `n`th char (or the string length).
fn byte_offset(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len())
}
