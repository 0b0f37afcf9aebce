// src/util.rs — Small string helpers for log lines and error messages

/// Longest prefix of `s` that is at most `max_bytes` long and ends on a char boundary.
pub fn clip(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Single-line preview: newlines shown as `⏎`, cut at `max_bytes` with `…` appended.
pub fn preview(s: &str, max_bytes: usize) -> String {
    let clipped = clip(s, max_bytes);
    let mut out = clipped.replace('\n', "⏎");
    if clipped.len() < s.len() {
        out.push('…');
    }
    out
}
