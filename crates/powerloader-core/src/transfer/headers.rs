//! Parse HTTP response header lines for the final response of a transfer.

/// Parsed `Content-Range` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentRange {
    /// `bytes start-end/total` (total may be `*`).
    Bytes {
        start: u64,
        end: u64,
        total: Option<u64>,
    },
    /// `bytes */total`, sent with 416 Range Not Satisfiable.
    Unsatisfied { total: u64 },
}

/// Key headers of one HTTP response. Redirect hops reset it, so after a
/// transfer it describes only the final response.
#[derive(Debug, Clone, Default)]
pub struct ResponseHeaders {
    /// Status code from the status line.
    pub status: Option<u32>,
    /// Length of this response's body.
    pub content_length: Option<u64>,
    pub content_range: Option<ContentRange>,
}

impl ResponseHeaders {
    /// Feed one raw header line as delivered by curl.
    pub fn push_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        if line.starts_with("HTTP/") {
            *self = ResponseHeaders {
                status: line
                    .split_whitespace()
                    .nth(1)
                    .and_then(|c| c.parse::<u32>().ok()),
                ..ResponseHeaders::default()
            };
            return;
        }
        let Some((name, value)) = line.split_once(':') else {
            return;
        };
        let name = name.trim();
        let value = value.trim();
        if name.eq_ignore_ascii_case("content-length") {
            self.content_length = value.parse::<u64>().ok();
        } else if name.eq_ignore_ascii_case("content-range") {
            self.content_range = parse_content_range(value);
        }
    }

    /// Total size of the resource, if the response lets us know it.
    /// `offset` is the range start that was requested (0 for a plain GET).
    pub fn total_size(&self, offset: u64) -> Option<u64> {
        match self.content_range {
            Some(ContentRange::Bytes { total: Some(t), .. }) => Some(t),
            Some(ContentRange::Unsatisfied { total }) => Some(total),
            _ => self.content_length.map(|len| offset + len),
        }
    }
}

/// Collect header lines into a `ResponseHeaders`.
pub fn parse_headers<S: AsRef<str>>(lines: &[S]) -> ResponseHeaders {
    let mut headers = ResponseHeaders::default();
    for line in lines {
        headers.push_line(line.as_ref());
    }
    headers
}

/// Parse a `Content-Range` value (`bytes 400-999/1000`, `bytes */1000`).
pub fn parse_content_range(value: &str) -> Option<ContentRange> {
    let value = value.trim();
    let rest = value
        .get(..6)
        .filter(|unit| unit.eq_ignore_ascii_case("bytes "))
        .map(|_| value[6..].trim())?;
    let (range, total) = rest.split_once('/')?;
    let total = total.trim();
    if range.trim() == "*" {
        return Some(ContentRange::Unsatisfied {
            total: total.parse().ok()?,
        });
    }
    let (start, end) = range.split_once('-')?;
    Some(ContentRange::Bytes {
        start: start.trim().parse().ok()?,
        end: end.trim().parse().ok()?,
        total: if total == "*" {
            None
        } else {
            Some(total.parse().ok()?)
        },
    })
}
