//! Formatting utilities (editor HTML → Telegram HTML subset).

use regex::{Captures, Regex};

use crate::splitter::char_len;

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Normalize editor HTML to the subset Telegram accepts.
///
/// Kept: `<b>`, `<i>`, `<u>`, `<s>`, `<a href>`, `<code>`, `<pre>` and newlines.
/// Block tags become newlines, synonyms map onto the kept tags, everything else
/// is dropped while keeping its text. Stray `<`, `>` and `&` are escaped.
pub fn sanitize_telegram_html(input: &str) -> String {
    let script_re = Regex::new(r"(?is)<script\b.*?</script\s*>").expect("valid regex");
    let style_re = Regex::new(r"(?is)<style\b.*?</style\s*>").expect("valid regex");
    let tag_re = Regex::new(r"(?is)<(/?)([a-z][a-z0-9-]*)\b([^>]*)>").expect("valid regex");
    let href_re =
        Regex::new(r#"(?is)\bhref\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid regex");

    let text = script_re.replace_all(input, "");
    let text = style_re.replace_all(&text, "");
    let text = text.replace("\r\n", "\n").replace("&nbsp;", " ");

    // Tracks whether each open <a> was kept, so its closing tag matches.
    let mut anchors: Vec<bool> = Vec::new();
    let mut out = String::with_capacity(text.len());
    let mut last = 0usize;

    for caps in tag_re.captures_iter(&text) {
        let Some(m) = caps.get(0) else {
            continue;
        };
        out.push_str(&escape_text(&text[last..m.start()]));
        last = m.end();

        let closing = !caps[1].is_empty();
        let name = caps[2].to_ascii_lowercase();
        out.push_str(&map_tag(&name, closing, &caps, &href_re, &mut anchors));
    }
    out.push_str(&escape_text(&text[last..]));

    // Close anchors left open by malformed input.
    for kept in anchors.into_iter().rev() {
        if kept {
            out.push_str("</a>");
        }
    }

    let blank_re = Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+").expect("valid regex");
    blank_re.replace_all(&out, "\n\n").trim().to_string()
}

fn map_tag(
    name: &str,
    closing: bool,
    caps: &Captures<'_>,
    href_re: &Regex,
    anchors: &mut Vec<bool>,
) -> String {
    let simple = |tag: &str| {
        if closing {
            format!("</{tag}>")
        } else {
            format!("<{tag}>")
        }
    };

    match name {
        "b" | "strong" => simple("b"),
        "i" | "em" => simple("i"),
        "u" | "ins" => simple("u"),
        "s" | "strike" | "del" => simple("s"),
        "code" => simple("code"),
        "pre" => simple("pre"),
        "br" => "\n".to_string(),
        "p" | "div" => {
            if closing {
                "\n\n".to_string()
            } else {
                String::new()
            }
        }
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            if closing {
                "</b>\n".to_string()
            } else {
                "<b>".to_string()
            }
        }
        "li" => {
            if closing {
                "\n".to_string()
            } else {
                "• ".to_string()
            }
        }
        "ul" | "ol" => {
            if closing {
                "\n".to_string()
            } else {
                String::new()
            }
        }
        "a" => {
            if closing {
                return match anchors.pop() {
                    Some(true) => "</a>".to_string(),
                    _ => String::new(),
                };
            }
            let href = href_re.captures(&caps[3]).and_then(|h| h.get(1).or_else(|| h.get(2)));
            match href.map(|h| h.as_str().trim()).filter(|h| !h.is_empty()) {
                Some(h) => {
                    anchors.push(true);
                    format!(r#"<a href="{}">"#, h.replace('"', "&quot;"))
                }
                None => {
                    anchors.push(false);
                    String::new()
                }
            }
        }
        _ => String::new(),
    }
}

/// Escape text between tags, leaving well-formed entities alone.
fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, ch) in text.char_indices() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' if !starts_with_entity(&text[i..]) => out.push_str("&amp;"),
            _ => out.push(ch),
        }
    }
    out
}

fn starts_with_entity(s: &str) -> bool {
    let Some(end) = s.find(';') else {
        return false;
    };
    if end < 2 || end > 10 {
        return false;
    }
    let body = &s[1..end];
    if let Some(num) = body.strip_prefix('#') {
        let digits = num.strip_prefix(|c: char| c == 'x' || c == 'X').unwrap_or(num);
        return !digits.is_empty() && digits.chars().all(|c| c.is_ascii_hexdigit());
    }
    body.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Remove every tag, keeping text (entities stay escaped).
pub fn strip_tags(html: &str) -> String {
    let tag_re = Regex::new(r"(?s)<[^>]*>").expect("valid regex");
    tag_re.replace_all(html, "").to_string()
}

/// Inner text of the first bold element, if any.
pub fn extract_headline(html: &str) -> Option<String> {
    let bold_re = Regex::new(r"(?is)<(?:b|strong)\b[^>]*>(.*?)</(?:b|strong)\s*>").expect("valid regex");
    bold_re
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| strip_tags(m.as_str()).trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Clip escaped text to `max_chars`, ending with an ellipsis when shortened.
///
/// Never leaves half an entity at the cut.
pub fn clip_html_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }

    let mut clipped: String = text.chars().take(max_chars - 1).collect();
    if let Some(amp) = clipped.rfind('&') {
        if !clipped[amp..].contains(';') {
            clipped.truncate(amp);
        }
    }
    let mut clipped = clipped.trim_end().to_string();
    clipped.push('…');
    clipped
}

/// Cut Telegram HTML into chunks of at most `max_len` characters.
///
/// Same cut preference as [`crate::splitter::fit_to_limit`], but tags and entities are never
/// split, and tags open at a cut are closed at the end of the chunk and
/// reopened at the start of the next one.
pub fn fit_html_to_limit(html: &str, max_len: usize) -> Vec<String> {
    if max_len == 0 || char_len(html) <= max_len {
        return vec![html.to_string()];
    }

    let mut out = Vec::new();
    // Tags open at the start of the current chunk.
    let mut reopen: Vec<&str> = Vec::new();
    let mut body: Vec<&str> = Vec::new();
    // Tags open after `reopen` + `body`.
    let mut open: Vec<&str> = Vec::new();
    let mut body_len = 0;

    for piece in html_pieces(html) {
        body.push(piece);
        body_len += char_len(piece);
        track_tag(&mut open, piece);
        if body.len() < 2 || chars_in(&reopen) + body_len + closers_len(&open) <= max_len {
            continue;
        }

        let fitted = body.len() - 1;
        let (head_end, tail_start) = match last_fitting_newline(&reopen, &body, max_len) {
            Some(i) => (i, i + 1),
            None => (fitted, fitted),
        };
        push_html_chunk(&mut out, &reopen, &body[..head_end]);
        for &p in &body[..tail_start] {
            track_tag(&mut reopen, p);
        }
        body.drain(..tail_start);
        while body.first().is_some_and(|p| p.trim().is_empty()) {
            body.remove(0);
        }

        body_len = chars_in(&body);
        open = reopen.clone();
        for &p in &body {
            track_tag(&mut open, p);
        }
    }

    push_html_chunk(&mut out, &reopen, &body);
    out
}

/// Tags, entities and single characters, in order.
fn html_pieces(html: &str) -> Vec<&str> {
    let piece_re = Regex::new(r"(?s)<[^>]*>|&#?[A-Za-z0-9]+;").expect("valid regex");
    let mut out = Vec::new();
    let mut last = 0;
    for m in piece_re.find_iter(html) {
        split_chars(&html[last..m.start()], &mut out);
        out.push(m.as_str());
        last = m.end();
    }
    split_chars(&html[last..], &mut out);
    out
}

fn split_chars<'a>(text: &'a str, out: &mut Vec<&'a str>) {
    out.extend(
        text.char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()]),
    );
}

/// `(is_closing, lowercase name)` for a tag piece.
fn tag_name(piece: &str) -> Option<(bool, String)> {
    let inner = piece.strip_prefix('<')?.strip_suffix('>')?;
    let (closing, rest) = match inner.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, inner),
    };
    let name: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    (!name.is_empty()).then_some((closing, name))
}

fn track_tag<'a>(open: &mut Vec<&'a str>, piece: &'a str) {
    match tag_name(piece) {
        Some((false, _)) => open.push(piece),
        Some((true, name)) => {
            if let Some(pos) = open
                .iter()
                .rposition(|o| tag_name(o).is_some_and(|(_, n)| n == name))
            {
                open.remove(pos);
            }
        }
        None => {}
    }
}

fn closers(open: &[&str]) -> String {
    open.iter()
        .rev()
        .filter_map(|o| tag_name(o))
        .map(|(_, name)| format!("</{name}>"))
        .collect()
}

fn closers_len(open: &[&str]) -> usize {
    open.iter()
        .filter_map(|o| tag_name(o))
        .map(|(_, name)| name.len() + 3)
        .sum()
}

fn chars_in(pieces: &[&str]) -> usize {
    pieces.iter().map(|p| char_len(p)).sum()
}

/// Index of the last newline piece a chunk could end before.
fn last_fitting_newline(reopen: &[&str], body: &[&str], max_len: usize) -> Option<usize> {
    let base = chars_in(reopen);
    let mut open = reopen.to_vec();
    let mut len = 0;
    let mut best = None;
    for (i, &piece) in body.iter().enumerate() {
        if i > 0 && piece == "\n" && base + len + closers_len(&open) <= max_len {
            best = Some(i);
        }
        len += char_len(piece);
        track_tag(&mut open, piece);
    }
    best
}

fn push_html_chunk(out: &mut Vec<String>, reopen: &[&str], body: &[&str]) {
    let mut open = reopen.to_vec();
    for &p in body {
        track_tag(&mut open, p);
    }
    let chunk = format!("{}{}{}", reopen.concat(), body.concat(), closers(&open));
    let chunk = chunk.trim();
    if !strip_tags(chunk).trim().is_empty() {
        out.push(chunk.to_string());
    }
}
