/// Escape text for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Cut `s` to at most `max_units` UTF-16 code units, marking the cut with
/// `...`. Telegram counts message and caption lengths in UTF-16 units, so an
/// emoji outside the BMP costs two. Never splits a character.
pub fn truncate_text(s: &str, max_units: usize) -> String {
    if s.encode_utf16().count() <= max_units {
        return s.to_string();
    }
    let mut used = 0;
    let mut out = String::new();
    for c in s.chars() {
        used += c.len_utf16();
        if used > max_units {
            break;
        }
        out.push(c);
    }
    out.push_str("...");
    out
}
