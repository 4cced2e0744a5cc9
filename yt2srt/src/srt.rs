use crate::error::Yt2SrtResult;
use crate::types::CaptionLine;
use std::path::Path;
use tracing::debug;

/// Seconds a line stays on screen when nothing else bounds it
pub const FALLBACK_WINDOW_SECS: f64 = 5.0;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Convert caption lines into SubRip blocks, one block per line.
///
/// Returns `None` for an empty caption so callers can report that there is
/// nothing to write instead of producing an empty file.
///
/// A line without a duration ends where the line two positions ahead
/// starts; the immediate successor is skipped. Existing `.srt` output
/// depends on this, so it is kept as is.
pub fn format_caption(lines: &[CaptionLine]) -> Option<Vec<String>> {
    if lines.is_empty() {
        return None;
    }

    let blocks = lines
        .iter()
        .enumerate()
        .map(|(index, line)| {
            let num = index + 1;
            let end = if line.has_duration() {
                line.start + line.duration
            } else if let Some(ahead) = lines.get(num + 1) {
                ahead.start
            } else {
                line.start + FALLBACK_WINDOW_SECS
            };

            let block = format!(
                "{}\r\n{} --> {}\r\n{}\r\n\r\n",
                num,
                convert_time(line.start),
                convert_time(end),
                line.text
            );

            unescape_html(&block)
        })
        .collect::<Vec<_>>();

    debug!("Formatted {} SRT blocks", blocks.len());
    Some(blocks)
}

/// Format seconds as an SRT timestamp, `HH:MM:SS,mmm`.
///
/// Every component is truncated, never rounded. Hours keep counting past 24.
pub fn convert_time(seconds: f64) -> String {
    let total_ms = (seconds * 1000.0) as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{hours:02}:{minutes:02}:{secs:02},{millis:03}")
}

fn unescape_html(block: &str) -> String {
    block
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
        .replace("&#39;", "'")
}

/// Write SRT blocks to `path` as UTF-8 with a byte-order mark
pub async fn write_srt(path: impl AsRef<Path>, blocks: &[String]) -> Yt2SrtResult<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let size = blocks.iter().map(String::len).sum::<usize>();
    let mut content = Vec::with_capacity(UTF8_BOM.len() + size);
    content.extend_from_slice(UTF8_BOM);
    for block in blocks {
        content.extend_from_slice(block.as_bytes());
    }

    tokio::fs::write(path, &content).await?;

    debug!("Written {} bytes to {}", content.len(), path.display());
    Ok(())
}
