//! Album artwork resolution through the `iTunes` Search API.
//!
//! The station's now-playing service carries no artwork, so the resolver
//! searches the public `iTunes` catalog with several term variants, retries
//! with exponential backoff, and normalizes the returned URL to a high
//! resolution over secure HTTP.

use async_trait::async_trait;
use blurfm_core::config::ArtworkConfig;
use blurfm_core::error::{CoreError, Result};
use blurfm_core::source::ArtworkSource;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const ITUNES_SEARCH_URL: &str = "https://itunes.apple.com/search";

const USER_AGENT: &str = "BlurFM/0.1 (https://github.com/blurfm/blurfm-rs)";

/// Default per-search timeout (5 seconds)
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Response from the `iTunes` Search API
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(rename = "resultCount")]
    pub result_count: u32,
    #[serde(default)]
    pub results: Vec<SearchResult>,
}

/// A single track result from the `iTunes` Search API
#[derive(Debug, Deserialize)]
pub struct SearchResult {
    #[serde(rename = "trackName")]
    pub track_name: Option<String>,
    #[serde(rename = "artistName")]
    pub artist_name: Option<String>,
    /// URL of the 100x100 artwork; scaled up to 600x600 on use
    #[serde(rename = "artworkUrl100")]
    pub artwork_url_100: Option<String>,
}

/// One catalog search call; a seam so the retry schedule can be tested
/// against a fake.
#[async_trait]
pub trait SearchApi: Send + Sync {
    /// Search the catalog for `term`.
    ///
    /// # Errors
    ///
    /// Returns an error on timeout, transport failure, a non-success
    /// status, or a malformed response body.
    async fn search(&self, term: &str) -> Result<SearchResponse>;
}

/// Production [`SearchApi`] backed by the public `iTunes` endpoint.
pub struct ItunesSearchClient {
    client: reqwest::Client,
}

impl ItunesSearchClient {
    /// Create a client with the default 5-second timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a client with an explicit per-search timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SearchApi for ItunesSearchClient {
    async fn search(&self, term: &str) -> Result<SearchResponse> {
        let url = format!(
            "{ITUNES_SEARCH_URL}?term={}&media=music&limit=1",
            urlencoding::encode(term)
        );
        debug!("iTunes search: {url}");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(CoreError::ServiceStatus {
                service: "itunes-search",
                status: response.status().as_u16(),
            });
        }
        Ok(response.json().await?)
    }
}

/// Resolves artwork URLs by trying term variants over several rounds.
pub struct ArtworkResolver<A: SearchApi> {
    api: A,
    max_attempts: u32,
    backoff_base: Duration,
}

impl ArtworkResolver<ItunesSearchClient> {
    /// Build a resolver over the public `iTunes` endpoint from config.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn from_config(config: &ArtworkConfig) -> Result<Self> {
        Ok(Self::new(
            ItunesSearchClient::with_timeout(config.search_timeout())?,
            config.max_attempts,
            config.backoff_base(),
        ))
    }
}

impl<A: SearchApi> ArtworkResolver<A> {
    /// Create a resolver over an arbitrary search backend
    pub fn new(api: A, max_attempts: u32, backoff_base: Duration) -> Self {
        Self {
            api,
            max_attempts: max_attempts.max(1),
            backoff_base,
        }
    }

    /// Try every term variant once, in order. Per-variant failures are
    /// logged and skipped; the first non-blank artwork wins.
    async fn try_variants(&self, variants: &[String], attempt: u32) -> Option<String> {
        for term in variants {
            match self.api.search(term).await {
                Ok(response) => {
                    if let Some(url) = first_artwork(&response) {
                        debug!("Found artwork for term '{term}': {url}");
                        return Some(url);
                    }
                    debug!("No artwork for term '{term}' (attempt {attempt})");
                }
                Err(e) => {
                    warn!("iTunes search failed for term '{term}' (attempt {attempt}): {e}");
                }
            }
        }
        None
    }
}

#[async_trait]
impl<A: SearchApi> ArtworkSource for ArtworkResolver<A> {
    fn name(&self) -> &'static str {
        "itunes"
    }

    async fn fetch_artwork(&self, artist: &str, title: &str) -> Result<Option<String>> {
        let variants = term_variants(artist, title);
        if variants.is_empty() {
            return Ok(None);
        }

        for attempt in 1..=self.max_attempts {
            if let Some(url) = self.try_variants(&variants, attempt).await {
                return Ok(Some(url));
            }

            // Exponential backoff, only when another round remains. An
            // abandoned future ends the wait silently.
            if attempt < self.max_attempts {
                let backoff = self.backoff_base * 2_u32.saturating_pow(attempt - 1);
                tokio::time::sleep(backoff).await;
            }
        }

        debug!(
            "No artwork after {} attempts for variants: {}",
            self.max_attempts,
            variants.join(", ")
        );
        Ok(None)
    }
}

/// Ordered, de-duplicated, non-blank search term variants for a track
/// identity: combined both ways, then artist alone, then title alone.
#[must_use]
pub fn term_variants(artist: &str, title: &str) -> Vec<String> {
    let artist = artist.trim();
    let title = title.trim();

    let candidates = [
        format!("{artist} {title}"),
        format!("{title} {artist}"),
        artist.to_string(),
        title.to_string(),
    ];

    let mut variants = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let candidate = candidate.trim().to_string();
        if !candidate.is_empty() && !variants.contains(&candidate) {
            variants.push(candidate);
        }
    }
    variants
}

/// First result's artwork URL, normalized; `None` when the response has no
/// usable artwork.
fn first_artwork(response: &SearchResponse) -> Option<String> {
    if response.result_count == 0 {
        return None;
    }
    response
        .results
        .first()
        .and_then(|result| result.artwork_url_100.as_deref())
        .filter(|raw| !raw.trim().is_empty())
        .map(normalize_artwork_url)
}

/// Normalize a catalog artwork reference: upgrade the resolution token from
/// 100x100 to 600x600 and force secure HTTP.
#[must_use]
pub fn normalize_artwork_url(raw: &str) -> String {
    let high_res = raw.replace("100x100", "600x600");
    if let Some(rest) = high_res.strip_prefix("http://") {
        format!("https://{rest}")
    } else if high_res.starts_with("https://") {
        high_res
    } else {
        format!("https://{high_res}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    #[test]
    fn test_normalize_upgrades_resolution_and_scheme() {
        assert_eq!(
            normalize_artwork_url("http://a.mzstatic.com/image/thumb/100x100bb.jpg"),
            "https://a.mzstatic.com/image/thumb/600x600bb.jpg"
        );
    }

    #[test]
    fn test_normalize_leaves_secure_urls() {
        assert_eq!(
            normalize_artwork_url("https://a.mzstatic.com/image/thumb/600x600bb.jpg"),
            "https://a.mzstatic.com/image/thumb/600x600bb.jpg"
        );
    }

    #[test]
    fn test_normalize_prepends_scheme() {
        assert_eq!(
            normalize_artwork_url("a.mzstatic.com/image/thumb/100x100bb.jpg"),
            "https://a.mzstatic.com/image/thumb/600x600bb.jpg"
        );
    }

    #[test]
    fn test_variants_order_and_dedup() {
        assert_eq!(
            term_variants("Blur", "Song 2"),
            vec!["Blur Song 2", "Song 2 Blur", "Blur", "Song 2"]
        );
        // Identical artist and title collapse
        assert_eq!(term_variants("Blur", "Blur"), vec!["Blur Blur", "Blur"]);
    }

    #[test]
    fn test_variants_filter_blank() {
        assert_eq!(term_variants("", "Song 2"), vec!["Song 2"]);
        assert_eq!(term_variants("  ", "  "), Vec::<String>::new());
    }

    #[test]
    fn test_response_decoding() -> std::result::Result<(), serde_json::Error> {
        let response: SearchResponse = serde_json::from_str(
            r#"{
                "resultCount": 1,
                "results": [{
                    "trackName": "Song 2",
                    "artistName": "Blur",
                    "artworkUrl100": "http://a.mzstatic.com/image/thumb/100x100bb.jpg"
                }]
            }"#,
        )?;
        assert_eq!(
            first_artwork(&response).as_deref(),
            Some("https://a.mzstatic.com/image/thumb/600x600bb.jpg")
        );
        Ok(())
    }

    #[test]
    fn test_empty_response_has_no_artwork() -> std::result::Result<(), serde_json::Error> {
        let response: SearchResponse =
            serde_json::from_str(r#"{"resultCount": 0, "results": []}"#)?;
        assert!(first_artwork(&response).is_none());
        Ok(())
    }

    #[test]
    fn test_blank_artwork_url_rejected() -> std::result::Result<(), serde_json::Error> {
        let response: SearchResponse = serde_json::from_str(
            r#"{"resultCount": 1, "results": [{"artworkUrl100": "  "}]}"#,
        )?;
        assert!(first_artwork(&response).is_none());
        Ok(())
    }

    /// Backend that fails every search and counts the calls.
    struct AlwaysEmpty {
        calls: AtomicU32,
    }

    impl AlwaysEmpty {
        fn new() -> Self {
            Self {
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl SearchApi for AlwaysEmpty {
        async fn search(&self, _term: &str) -> Result<SearchResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(SearchResponse {
                result_count: 0,
                results: Vec::new(),
            })
        }
    }

    /// Backend that errors until `succeed_at_call`, then returns a hit.
    struct SucceedsLater {
        calls: AtomicU32,
        succeed_at_call: u32,
    }

    #[async_trait]
    impl SearchApi for SucceedsLater {
        async fn search(&self, _term: &str) -> Result<SearchResponse> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call < self.succeed_at_call {
                return Err(CoreError::ServiceStatus {
                    service: "itunes-search",
                    status: 503,
                });
            }
            Ok(SearchResponse {
                result_count: 1,
                results: vec![SearchResult {
                    track_name: Some("Song 2".to_string()),
                    artist_name: Some("Blur".to_string()),
                    artwork_url_100: Some(
                        "http://a.mzstatic.com/image/thumb/100x100bb.jpg".to_string(),
                    ),
                }],
            })
        }
    }

    /// Backend that records which terms were queried, never matching.
    struct TermRecorder {
        terms: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SearchApi for TermRecorder {
        async fn search(&self, term: &str) -> Result<SearchResponse> {
            if let Ok(mut terms) = self.terms.lock() {
                terms.push(term.to_string());
            }
            Ok(SearchResponse {
                result_count: 0,
                results: Vec::new(),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_three_rounds_with_backoff() -> Result<()> {
        let resolver = ArtworkResolver::new(AlwaysEmpty::new(), 3, Duration::from_millis(200));
        let start = Instant::now();

        let artwork = resolver.fetch_artwork("Blur", "Song 2").await?;
        assert!(artwork.is_none());

        // 4 variants tried in each of 3 rounds
        assert_eq!(resolver.api.calls.load(Ordering::SeqCst), 12);
        // 200ms + 400ms between rounds, nothing after the last
        assert_eq!(start.elapsed(), Duration::from_millis(600));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_on_second_round_waits_once() -> Result<()> {
        // 4 variants fail in round one; first call of round two succeeds
        let resolver = ArtworkResolver::new(
            SucceedsLater {
                calls: AtomicU32::new(0),
                succeed_at_call: 5,
            },
            3,
            Duration::from_millis(200),
        );
        let start = Instant::now();

        let artwork = resolver.fetch_artwork("Blur", "Song 2").await?;
        assert_eq!(
            artwork.as_deref(),
            Some("https://a.mzstatic.com/image/thumb/600x600bb.jpg")
        );
        assert_eq!(resolver.api.calls.load(Ordering::SeqCst), 5);
        assert_eq!(start.elapsed(), Duration::from_millis(200));
        Ok(())
    }

    #[tokio::test]
    async fn test_first_hit_short_circuits() -> Result<()> {
        let resolver = ArtworkResolver::new(
            SucceedsLater {
                calls: AtomicU32::new(0),
                succeed_at_call: 1,
            },
            3,
            Duration::from_millis(200),
        );
        let artwork = resolver.fetch_artwork("Blur", "Song 2").await?;
        assert!(artwork.is_some());
        assert_eq!(resolver.api.calls.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_variant_order_seen_by_backend() -> Result<()> {
        let resolver = ArtworkResolver::new(
            TermRecorder {
                terms: Mutex::new(Vec::new()),
            },
            1,
            Duration::from_millis(200),
        );
        let artwork = resolver.fetch_artwork("Blur", "Song 2").await?;
        assert!(artwork.is_none());

        let terms = resolver
            .api
            .terms
            .lock()
            .map(|terms| terms.clone())
            .unwrap_or_default();
        assert_eq!(terms, vec!["Blur Song 2", "Song 2 Blur", "Blur", "Song 2"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_blank_identity_skips_search() -> Result<()> {
        let resolver = ArtworkResolver::new(AlwaysEmpty::new(), 3, Duration::from_millis(200));
        let artwork = resolver.fetch_artwork("  ", "").await?;
        assert!(artwork.is_none());
        assert_eq!(resolver.api.calls.load(Ordering::SeqCst), 0);
        Ok(())
    }
}
