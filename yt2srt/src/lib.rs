pub mod error;
pub mod extractor;
pub mod parser;
pub mod srt;
pub mod timedtext;
pub mod types;
pub mod xml;

pub use error::{Yt2SrtError, Yt2SrtResult, NETWORK_ERROR_EXIT_CODE};
pub use types::{Caption, CaptionLine, Track, TrackList, Yt2SrtOptions};

use extractor::TrackExtractor;
use parser::VideoUrlParser;
use std::path::Path;
use tracing::{debug, info};

/// Downloads the captions of one video and converts them to SRT
pub struct Yt2Srt {
    url: String,
    video_id: String,
    options: Yt2SrtOptions,
    extractor: TrackExtractor,
}

impl Yt2Srt {
    /// Create a new downloader instance for a specific URL
    pub fn new(url: &str, options: Yt2SrtOptions) -> Yt2SrtResult<Self> {
        info!("Initializing yt2srt for URL: {}", url);

        let video_id = VideoUrlParser::new().parse_url(url)?;
        debug!("Extracted video ID: {}", video_id);

        let extractor = TrackExtractor::new(&options)?;

        Ok(Self {
            url: url.to_string(),
            video_id,
            options,
            extractor,
        })
    }

    /// List all caption tracks available for the video
    pub async fn tracks(&self) -> Yt2SrtResult<TrackList> {
        self.extractor.list_tracks(&self.video_id).await
    }

    /// SRT blocks for the first preferred language, `None` when there is nothing to write
    pub async fn caption(&self) -> Yt2SrtResult<Option<Vec<String>>> {
        let caption = self
            .extractor
            .fetch_track(&self.video_id, &self.options.languages)
            .await?;

        Ok(caption.and_then(|lines| srt::format_caption(&lines)))
    }

    /// Like [`caption`](Self::caption), reusing a listing obtained from [`tracks`](Self::tracks)
    pub async fn caption_from(&self, tracks: &TrackList) -> Yt2SrtResult<Option<Vec<String>>> {
        let caption = self
            .extractor
            .fetch_selected(tracks, &self.video_id, &self.options.languages)
            .await?;

        Ok(caption.and_then(|lines| srt::format_caption(&lines)))
    }

    /// Get the video ID for this instance
    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    /// Get the original URL for this instance
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Preferred languages, in order
    pub fn languages(&self) -> &[String] {
        &self.options.languages
    }

    /// Replace the language preference list
    pub fn with_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = self.options.languages(languages);
        self
    }
}

/// Convert a timed-text document on disk, `None` when it holds no caption lines
pub async fn convert_file(path: impl AsRef<Path>) -> Yt2SrtResult<Option<Vec<String>>> {
    let lines = timedtext::parse_track_file(path).await?;
    Ok(srt::format_caption(&lines))
}
