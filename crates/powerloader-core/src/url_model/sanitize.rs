//! Filename sanitization.

/// Characters that are path separators or reserved on common filesystems.
const RESERVED: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Longest filename most filesystems accept, in bytes.
const NAME_MAX: usize = 255;

/// Sanitizes a candidate filename so it stays a single, portable path component.
///
/// - Replaces NUL, reserved characters, whitespace and control characters with `_`
/// - Collapses consecutive underscores
/// - Trims leading/trailing dots and underscores
/// - Limits length to 255 bytes
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_underscore = false;

    for c in name.chars() {
        let replacement = if c.is_control() || c.is_whitespace() || RESERVED.contains(&c) {
            '_'
        } else {
            c
        };

        if replacement == '_' {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
        } else {
            out.push(replacement);
            prev_underscore = false;
        }
    }

    let trimmed = out.trim_matches(|c| c == '.' || c == '_');

    if trimmed.len() > NAME_MAX {
        let mut take = NAME_MAX;
        while take > 0 && !trimmed.is_char_boundary(take) {
            take -= 1;
        }
        trimmed[..take].to_string()
    } else {
        trimmed.to_string()
    }
}
