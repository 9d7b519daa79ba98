use std::time::Duration;

use holocron_core::guide::EpisodeGuide;
use reqwest::Client;
use serde::de::DeserializeOwned;
use url::Url;

use super::types::{ErrorBody, MovieResponse, ResolveResponse, TvResponse};
use crate::error::MetadataError;
use crate::traits::{MetadataService, MovieDetails, ResolveQuery, Resolved};

const USER_AGENT: &str = concat!("holocron/", env!("CARGO_PKG_VERSION"));

/// Client for the metadata resolution proxy.
///
/// The proxy holds the provider credentials; this client only knows the
/// proxy's origin. `resolve` and `tv/{id}` are the routes every proxy serves.
/// `movie/{id}` is an extension (see [`ProxyClient::fetch_movie`]).
pub struct ProxyClient {
    base: Url,
    http: Client,
}

impl ProxyClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, MetadataError> {
        let mut base = Url::parse(base_url)
            .map_err(|e| MetadataError::InvalidQuery(format!("bad base URL {base_url:?}: {e}")))?;
        // `join` replaces the last path segment unless the base ends in '/'.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { base, http })
    }

    fn endpoint(&self, path: &str) -> Result<Url, MetadataError> {
        self.base
            .join(path)
            .map_err(|e| MetadataError::InvalidQuery(format!("bad endpoint {path:?}: {e}")))
    }

    fn resolve_url(&self, query: &ResolveQuery) -> Result<Url, MetadataError> {
        let mut url = self.endpoint("api/tmdb/resolve")?;
        url.query_pairs_mut()
            .append_pair("title", &query.title)
            .append_pair("year", &query.year.to_string())
            .append_pair("type", query.kind.as_str());
        Ok(url)
    }

    /// Check the HTTP response for errors and map the proxy's error body.
    async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, MetadataError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        let body: ErrorBody = serde_json::from_str(&text).unwrap_or_else(|_| ErrorBody {
            error: text,
            message: None,
        });
        tracing::warn!(status, error = %body.error, "Metadata proxy error");
        Err(error_for_status(status, &body))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, MetadataError> {
        tracing::debug!(url = %url, "Metadata proxy request");
        let resp = self.http.get(url).send().await?;
        let resp = Self::check_response(resp).await?;
        resp.json()
            .await
            .map_err(|e| MetadataError::Parse(e.to_string()))
    }
}

/// Map a non-2xx proxy response to an error variant.
///
/// The proxy reports upstream authentication failures as 502 with an
/// "authentication failed" error string.
pub(crate) fn error_for_status(status: u16, body: &ErrorBody) -> MetadataError {
    let text = body.text();
    match status {
        404 => MetadataError::NotFound(text),
        401 | 403 => MetadataError::Auth(text),
        429 => MetadataError::RateLimited,
        502 if body.error.to_lowercase().contains("authentication") => MetadataError::Auth(text),
        _ => MetadataError::Unavailable {
            status,
            message: text,
        },
    }
}

impl MetadataService for ProxyClient {
    async fn resolve(&self, query: &ResolveQuery) -> Result<Resolved, MetadataError> {
        let url = self.resolve_url(query)?;
        let resp: ResolveResponse = self.get_json(url).await?;
        let resolved = resp.into_resolved()?;
        tracing::debug!(
            title = %query.title,
            id = resolved.external_id,
            "Title resolved"
        );
        Ok(resolved)
    }

    async fn fetch_series(&self, external_id: u64) -> Result<EpisodeGuide, MetadataError> {
        let url = self.endpoint(&format!("api/tmdb/tv/{external_id}"))?;
        let resp: TvResponse = self.get_json(url).await?;
        resp.into_guide()
    }

    /// `GET api/tmdb/movie/{id}`, an extension route. A proxy without it
    /// answers 404, which surfaces as [`MetadataError::NotFound`]; the movie
    /// then keeps its catalog runtime estimate.
    async fn fetch_movie(&self, external_id: u64) -> Result<MovieDetails, MetadataError> {
        let url = self.endpoint(&format!("api/tmdb/movie/{external_id}"))?;
        let resp: MovieResponse = self.get_json(url).await?;
        resp.into_details()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use holocron_core::catalog::MediaKind;

    fn client(base: &str) -> ProxyClient {
        ProxyClient::new(base, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_resolve_url_encodes_query() {
        let query =
            ResolveQuery::new("Rogue One: A Star Wars Story", 2016, MediaKind::Movie).unwrap();
        let url = client("http://localhost:3000").resolve_url(&query).unwrap();
        assert_eq!(url.path(), "/api/tmdb/resolve");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("title".into(), "Rogue One: A Star Wars Story".into()),
                ("year".into(), "2016".into()),
                ("type".into(), "movie".into()),
            ]
        );
    }

    #[test]
    fn test_base_path_is_kept() {
        let c = client("https://example.org/holocron");
        assert_eq!(
            c.endpoint("api/tmdb/tv/42").unwrap().as_str(),
            "https://example.org/holocron/api/tmdb/tv/42"
        );
        let c = client("https://example.org/");
        assert_eq!(
            c.endpoint("api/tmdb/movie/11").unwrap().as_str(),
            "https://example.org/api/tmdb/movie/11"
        );
    }

    #[test]
    fn test_bad_base_url() {
        assert!(matches!(
            ProxyClient::new("not a url", Duration::from_secs(1)),
            Err(MetadataError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_missing_movie_route_is_not_found() {
        // A proxy without the movie route answers with its framework's 404 page.
        let body = ErrorBody {
            error: "<!DOCTYPE html><html>404: This page could not be found.</html>".into(),
            message: None,
        };
        let err = error_for_status(404, &body);
        assert!(matches!(err, MetadataError::NotFound(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_for_status() {
        let body = |error: &str| ErrorBody {
            error: error.into(),
            message: None,
        };
        assert!(matches!(
            error_for_status(404, &body("No results found")),
            MetadataError::NotFound(_)
        ));
        assert!(matches!(
            error_for_status(502, &body("TMDB authentication failed")),
            MetadataError::Auth(_)
        ));
        assert!(matches!(
            error_for_status(502, &body("TMDB search failed")),
            MetadataError::Unavailable { status: 502, .. }
        ));
        assert!(matches!(
            error_for_status(429, &body("")),
            MetadataError::RateLimited
        ));
        assert!(matches!(
            error_for_status(400, &body("Missing title")),
            MetadataError::Unavailable { status: 400, .. }
        ));
    }
}
