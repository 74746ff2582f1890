/// Truncate `text` to at most `max_chars` Unicode scalar values.
///
/// Never splits a multi-byte character, so the result is always valid UTF-8
/// and `truncate_chars(truncate_chars(s, n), n) == truncate_chars(s, n)`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

/// Strip a `data:<mime>;base64,` prefix, returning the bare payload and the
/// MIME type it declared (if any).
pub fn strip_data_url(payload: &str) -> (&str, Option<&str>) {
    let Some(rest) = payload.strip_prefix("data:") else {
        return (payload, None);
    };

    match rest.split_once(";base64,") {
        Some((mime, data)) => {
            let mime = mime.trim();
            (data, (!mime.is_empty()).then_some(mime))
        }
        None => (payload, None),
    }
}
