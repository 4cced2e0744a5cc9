use crate::error::{Yt2SrtError, Yt2SrtResult};
use crate::timedtext::{decode_document, parse_track};
use crate::types::{Caption, Track, TrackList, Yt2SrtOptions};
use crate::xml::ElementScanner;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Lists the caption tracks of a video and downloads the preferred one
pub struct TrackExtractor {
    client: Client,
    list_url: String,
    track_url: String,
}

impl TrackExtractor {
    /// Create a new extractor from options
    pub fn new(options: &Yt2SrtOptions) -> Yt2SrtResult<Self> {
        let mut headers = reqwest::header::HeaderMap::new();

        let user_agent = options
            .user_agent
            .as_deref()
            .unwrap_or(concat!("yt2srt/", env!("CARGO_PKG_VERSION")));
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_str(user_agent).map_err(|_| {
                Yt2SrtError::Configuration {
                    message: "Invalid user agent".to_string(),
                }
            })?,
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/xml,text/xml;q=0.9,*/*;q=0.8"),
        );

        let mut client_builder = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(options.timeout_seconds))
            .redirect(reqwest::redirect::Policy::limited(10));

        if let Some(proxy_url) = &options.proxy {
            let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| Yt2SrtError::Configuration {
                message: format!("Invalid proxy URL: {}", e),
            })?;
            client_builder = client_builder.proxy(proxy);
        }

        let client = client_builder
            .build()
            .map_err(|e| Yt2SrtError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        for endpoint in [&options.list_url, &options.track_url] {
            Url::parse(endpoint).map_err(|e| Yt2SrtError::Configuration {
                message: format!("Invalid endpoint {}: {}", endpoint, e),
            })?;
        }

        Ok(Self {
            client,
            list_url: options.list_url.clone(),
            track_url: options.track_url.clone(),
        })
    }

    /// List the caption tracks available for a video, keyed by language code
    pub async fn list_tracks(&self, video_id: &str) -> Yt2SrtResult<TrackList> {
        let url = endpoint_url(&self.list_url, &[("type", "list"), ("v", video_id)])?;
        info!("Listing caption tracks for video: {}", video_id);

        let body = self.get(&url).await?;
        let tracks = parse_track_list(&body)?;

        debug!("Found {} caption tracks", tracks.len());
        Ok(tracks)
    }

    /// Download the first track whose language appears in `languages`.
    ///
    /// Returns `Ok(None)` when the video has no track in any of the languages.
    pub async fn fetch_track(
        &self,
        video_id: &str,
        languages: &[String],
    ) -> Yt2SrtResult<Option<Caption>> {
        let tracks = self.list_tracks(video_id).await?;
        self.fetch_selected(&tracks, video_id, languages).await
    }

    /// Same as [`fetch_track`](Self::fetch_track) against an existing listing
    pub async fn fetch_selected(
        &self,
        tracks: &TrackList,
        video_id: &str,
        languages: &[String],
    ) -> Yt2SrtResult<Option<Caption>> {
        let Some((lang, track)) = select_track(tracks, languages) else {
            info!("No caption track matches languages {:?}", languages);
            return Ok(None);
        };

        debug!("Selected track: {} ({})", lang, track.lang_original);

        let url = endpoint_url(
            &self.track_url,
            &[("name", track.name.as_str()), ("lang", lang), ("v", video_id)],
        )?;
        info!("Downloading {} captions for video: {}", lang, video_id);

        let body = self.get(&url).await?;
        parse_track(&body).map(Some)
    }

    async fn get(&self, url: &Url) -> Yt2SrtResult<String> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| Yt2SrtError::network(url.as_str(), e))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Yt2SrtError::network(url.as_str(), e))?;

        debug!("Received {} bytes from {}", bytes.len(), url);
        Ok(decode_document(&bytes))
    }
}

/// Pick the first language of `languages` that has a track
pub fn select_track<'a>(
    tracks: &'a TrackList,
    languages: &[String],
) -> Option<(&'a str, &'a Track)> {
    languages.iter().find_map(|lang| {
        tracks
            .get_key_value(lang)
            .map(|(code, track)| (code.as_str(), track))
    })
}

/// Parse a listing document into tracks keyed by `lang_code`; later duplicates win
pub fn parse_track_list(document: &str) -> Yt2SrtResult<TrackList> {
    let mut tracks = TrackList::new();

    for element in ElementScanner::new("track").scan(document)? {
        let Some(lang) = element.get("lang_code") else {
            warn!("Skipping <track> element without lang_code");
            continue;
        };

        let field = |name: &str| element.get(name).unwrap_or_default().to_string();
        let track = Track {
            id: field("id"),
            name: field("name"),
            lang_original: field("lang_original"),
            lang_translated: field("lang_translated"),
            lang_default: field("lang_default"),
        };

        tracks.insert(lang.to_string(), track);
    }

    Ok(tracks)
}

fn endpoint_url(base: &str, params: &[(&str, &str)]) -> Yt2SrtResult<Url> {
    Url::parse_with_params(base, params).map_err(|e| Yt2SrtError::Configuration {
        message: format!("Invalid endpoint {}: {}", base, e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const LIST_XML: &str = r#"<?xml version="1.0" encoding="utf-8" ?>
<transcript_list docid="123">
<track id="0" name="" lang_code="en" lang_original="English" lang_translated="English" lang_default="true"/>
<track id="1" name="CC" lang_code="de" lang_original="Deutsch" lang_translated="German"/>
</transcript_list>"#;

    const TRACK_XML: &str = r#"<?xml version="1.0" encoding="utf-8" ?>
<transcript><text start="0" dur="1.5">Hi</text><text start="2">there</text></transcript>"#;

    fn langs(codes: &[&str]) -> Vec<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    fn extractor_for(server: &mockito::ServerGuard) -> TrackExtractor {
        let options = Yt2SrtOptions::new()
            .list_url(&format!("{}/api/timedtext", server.url()))
            .track_url(&format!("{}/timedtext", server.url()))
            .timeout(5);
        TrackExtractor::new(&options).unwrap()
    }

    #[test]
    fn test_parse_track_list() {
        let tracks = parse_track_list(LIST_XML).unwrap();

        assert_eq!(tracks.len(), 2);
        let en = &tracks["en"];
        assert_eq!(en.id, "0");
        assert_eq!(en.name, "");
        assert_eq!(en.lang_original, "English");
        assert_eq!(en.lang_default, "true");
        assert_eq!(tracks["de"].lang_default, "");
    }

    #[test]
    fn test_parse_empty_track_list() {
        let tracks =
            parse_track_list(r#"<?xml version="1.0"?><transcript_list docid="1"></transcript_list>"#)
                .unwrap();
        assert!(tracks.is_empty());
    }

    #[test]
    fn test_duplicate_language_last_wins() {
        let doc = r#"<transcript_list>
<track id="0" name="first" lang_code="en"/>
<track id="1" name="second" lang_code="en"/>
<track id="2" name="orphan"/>
</transcript_list>"#;

        let tracks = parse_track_list(doc).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks["en"].name, "second");
    }

    #[test]
    fn test_select_track_in_preference_order() {
        let tracks = parse_track_list(LIST_XML).unwrap();

        let (lang, _) = select_track(&tracks, &langs(&["fr", "en"])).unwrap();
        assert_eq!(lang, "en");

        let (lang, track) = select_track(&tracks, &langs(&["de", "en"])).unwrap();
        assert_eq!(lang, "de");
        assert_eq!(track.name, "CC");

        assert!(select_track(&tracks, &langs(&["fr"])).is_none());
    }

    #[test]
    fn test_selected_language_outlives_preferences() {
        let tracks = parse_track_list(LIST_XML).unwrap();

        let selected = {
            let preferences = langs(&["de"]);
            select_track(&tracks, &preferences).map(|(lang, _)| lang)
        };
        assert_eq!(selected, Some("de"));
    }

    #[test]
    fn test_invalid_configuration() {
        let options = Yt2SrtOptions::new().list_url("not a url");
        assert!(matches!(
            TrackExtractor::new(&options),
            Err(Yt2SrtError::Configuration { .. })
        ));

        let options = Yt2SrtOptions::new().user_agent("bad\nagent");
        assert!(TrackExtractor::new(&options).is_err());
    }

    #[tokio::test]
    async fn test_list_tracks() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/timedtext")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("type".into(), "list".into()),
                Matcher::UrlEncoded("v".into(), "abc123".into()),
            ]))
            .with_body(LIST_XML)
            .create_async()
            .await;

        let tracks = extractor_for(&server).list_tracks("abc123").await.unwrap();

        mock.assert_async().await;
        assert_eq!(tracks.keys().collect::<Vec<_>>(), vec!["de", "en"]);
    }

    #[tokio::test]
    async fn test_list_tracks_http_error_is_network() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/timedtext")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let err = extractor_for(&server).list_tracks("abc123").await.unwrap_err();
        assert!(err.is_network());
        assert_eq!(err.exit_code(), 6);
        assert!(err.to_string().contains("/api/timedtext?type=list&v=abc123"));
    }

    #[tokio::test]
    async fn test_fetch_track() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/timedtext")
            .match_query(Matcher::Any)
            .with_body(LIST_XML)
            .create_async()
            .await;
        let track_mock = server
            .mock("GET", "/timedtext")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("name".into(), "".into()),
                Matcher::UrlEncoded("lang".into(), "en".into()),
                Matcher::UrlEncoded("v".into(), "abc123".into()),
            ]))
            .with_body(TRACK_XML)
            .create_async()
            .await;

        let caption = extractor_for(&server)
            .fetch_track("abc123", &langs(&["fr", "en"]))
            .await
            .unwrap()
            .unwrap();

        track_mock.assert_async().await;
        assert_eq!(caption.len(), 2);
        assert_eq!(caption[0].duration, 1.5);
        assert_eq!(caption[1].text, "there");
    }

    #[tokio::test]
    async fn test_fetch_track_without_matching_language() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/timedtext")
            .match_query(Matcher::Any)
            .with_body(LIST_XML)
            .create_async()
            .await;
        let track_mock = server
            .mock("GET", "/timedtext")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let caption = extractor_for(&server)
            .fetch_track("abc123", &langs(&["ja"]))
            .await
            .unwrap();

        assert!(caption.is_none());
        track_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_selected_malformed_track() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/timedtext")
            .match_query(Matcher::Any)
            .with_body("<transcript><text>no start</text></transcript>")
            .create_async()
            .await;

        let tracks = parse_track_list(LIST_XML).unwrap();
        let err = extractor_for(&server)
            .fetch_selected(&tracks, "abc123", &langs(&["en"]))
            .await
            .unwrap_err();

        assert!(matches!(err, Yt2SrtError::Format { .. }));
    }
}
