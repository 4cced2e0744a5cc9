use crate::error::{Yt2SrtError, Yt2SrtResult};
use regex::Regex;
use url::Url;

/// Video URL parser for extracting video IDs
pub struct VideoUrlParser {
    scheme_regex: Regex,
}

impl Default for VideoUrlParser {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoUrlParser {
    /// Create a new video URL parser
    pub fn new() -> Self {
        let scheme_regex = Regex::new(r"(?i)^https?://").expect("Valid scheme regex");

        Self { scheme_regex }
    }

    /// Whether the input should be treated as a URL rather than a file path
    pub fn is_url(&self, input: &str) -> bool {
        self.scheme_regex.is_match(input)
    }

    /// Parse a video URL and extract the video ID
    pub fn parse_url(&self, url_str: &str) -> Yt2SrtResult<String> {
        let url = Url::parse(url_str).map_err(|_| invalid(url_str))?;

        self.extract_video_id(&url)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| invalid(url_str))
    }

    /// Extract video ID from the `v` query parameter or a known path form
    fn extract_video_id(&self, url: &Url) -> Option<String> {
        // watch?v=VIDEO_ID on any host
        if let Some((_, value)) = url.query_pairs().find(|(key, _)| key == "v") {
            return Some(value.into_owned());
        }

        let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();

        match (url.host_str(), segments.as_slice()) {
            // youtu.be/VIDEO_ID
            (Some("youtu.be"), [id, ..]) => Some(id.to_string()),
            // /embed/VIDEO_ID, /shorts/VIDEO_ID
            (_, ["embed" | "shorts", id, ..]) => Some(id.to_string()),
            _ => None,
        }
    }
}

fn invalid(url: &str) -> Yt2SrtError {
    Yt2SrtError::InvalidUrl {
        url: url.to_string(),
    }
}

/// Convenience function to extract the video ID of a URL
pub fn parse_video_url(url: &str) -> Yt2SrtResult<String> {
    VideoUrlParser::new().parse_url(url)
}
