use crate::error::{Yt2SrtError, Yt2SrtResult};
use crate::types::{Caption, CaptionLine};
use crate::xml::ElementScanner;
use encoding_rs::UTF_8;
use std::path::Path;
use tracing::{debug, warn};

/// Parse a timed-text document into caption lines.
///
/// Every `<text>` element with non-empty content becomes one line, in
/// document order. `start` is required; a missing or empty `dur` means the
/// duration is unspecified and is recorded as zero.
pub fn parse_track(document: &str) -> Yt2SrtResult<Caption> {
    let elements = ElementScanner::new("text").scan(document)?;
    let mut lines = Vec::with_capacity(elements.len());

    for element in elements {
        let Some(text) = element.text() else {
            continue;
        };

        let start = match element.get("start") {
            Some(value) => parse_seconds("start", value)?,
            None => return Err(Yt2SrtError::format("<text> element without start attribute")),
        };

        let duration = match element.get("dur") {
            Some(value) if !value.is_empty() => parse_seconds("dur", value)?,
            _ => 0.0,
        };

        lines.push(CaptionLine::new(start, duration, text));
    }

    debug!("Parsed {} caption lines", lines.len());
    Ok(lines)
}

/// Read and parse a timed-text document from disk
pub async fn parse_track_file(path: impl AsRef<Path>) -> Yt2SrtResult<Caption> {
    let path = path.as_ref();
    debug!("Reading timed-text document from {}", path.display());

    let bytes = tokio::fs::read(path).await?;
    parse_track(&decode_document(&bytes))
}

/// Decode a downloaded or on-disk document to UTF-8
pub fn decode_document(bytes: &[u8]) -> String {
    // BOM sniffing switches to UTF-16 when the document carries one
    let (decoded, encoding, had_errors) = UTF_8.decode(bytes);

    if had_errors {
        warn!(
            "Document is not valid {}, falling back to windows-1252",
            encoding.name()
        );
        let (fallback, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
        return fallback.into_owned();
    }

    decoded.into_owned()
}

fn parse_seconds(attribute: &str, value: &str) -> Yt2SrtResult<f64> {
    let seconds: f64 = value.trim().parse().map_err(|_| {
        Yt2SrtError::format(format!("invalid {attribute} value {value:?}"))
    })?;

    if !seconds.is_finite() || seconds < 0.0 {
        return Err(Yt2SrtError::format(format!(
            "{attribute} must be a non-negative number of seconds, got {value:?}"
        )));
    }

    Ok(seconds)
}
