use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default listing endpoint, queried with `type=list&v=<video_id>`
pub const DEFAULT_LIST_URL: &str = "http://www.youtube.com/api/timedtext";

/// Default track endpoint, queried with `name=..&lang=..&v=..`
pub const DEFAULT_TRACK_URL: &str = "http://video.google.com/timedtext";

/// One caption track advertised by the listing endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    /// Sent back as the `name` query parameter when downloading the track
    pub name: String,
    pub lang_original: String,
    pub lang_translated: String,
    pub lang_default: String,
}

/// Available tracks keyed by language code
pub type TrackList = BTreeMap<String, Track>;

/// One timed entry of a timed-text document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionLine {
    /// Seconds from the start of the video
    pub start: f64,
    /// Seconds on screen; zero when the document left it unspecified
    pub duration: f64,
    pub text: String,
}

impl CaptionLine {
    pub fn new(start: f64, duration: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            duration,
            text: text.into(),
        }
    }

    pub fn has_duration(&self) -> bool {
        self.duration != 0.0
    }
}

/// Caption lines in document order
pub type Caption = Vec<CaptionLine>;

/// Options controlling where and how captions are fetched
#[derive(Debug, Clone)]
pub struct Yt2SrtOptions {
    /// Language codes in order of preference
    pub languages: Vec<String>,
    pub list_url: String,
    pub track_url: String,
    pub timeout_seconds: u64,
    pub user_agent: Option<String>,
    pub proxy: Option<String>,
}

impl Default for Yt2SrtOptions {
    fn default() -> Self {
        Self {
            languages: vec!["en".to_string()],
            list_url: DEFAULT_LIST_URL.to_string(),
            track_url: DEFAULT_TRACK_URL.to_string(),
            timeout_seconds: 30,
            user_agent: None,
            proxy: None,
        }
    }
}

impl Yt2SrtOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.languages = languages.into_iter().map(Into::into).collect();
        self
    }

    pub fn list_url(mut self, url: &str) -> Self {
        self.list_url = url.to_string();
        self
    }

    pub fn track_url(mut self, url: &str) -> Self {
        self.track_url = url.to_string();
        self
    }

    pub fn timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = Some(user_agent.to_string());
        self
    }

    pub fn proxy(mut self, proxy: &str) -> Self {
        self.proxy = Some(proxy.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = Yt2SrtOptions::default();
        assert_eq!(options.languages, vec!["en"]);
        assert_eq!(options.list_url, DEFAULT_LIST_URL);
        assert_eq!(options.track_url, DEFAULT_TRACK_URL);
        assert!(options.proxy.is_none());
    }

    #[test]
    fn test_options_builder() {
        let options = Yt2SrtOptions::new()
            .languages(["fr", "en"])
            .list_url("http://localhost/list")
            .timeout(5)
            .user_agent("yt2srt-test");

        assert_eq!(options.languages, vec!["fr", "en"]);
        assert_eq!(options.list_url, "http://localhost/list");
        assert_eq!(options.timeout_seconds, 5);
        assert_eq!(options.user_agent.as_deref(), Some("yt2srt-test"));
    }

    #[test]
    fn test_track_serializes_all_fields() {
        let track = Track {
            id: "0".to_string(),
            name: "CC".to_string(),
            lang_original: "English".to_string(),
            lang_translated: "English".to_string(),
            lang_default: "true".to_string(),
        };

        let json = serde_json::to_value(&track).unwrap();
        assert_eq!(json["name"], "CC");
        assert_eq!(json["lang_default"], "true");
    }

    #[test]
    fn test_zero_duration_is_unspecified() {
        assert!(!CaptionLine::new(1.0, 0.0, "a").has_duration());
        assert!(CaptionLine::new(1.0, 0.5, "a").has_duration());
    }
}
