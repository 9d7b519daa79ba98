use holocron_core::catalog::MediaKind;
use holocron_core::guide::{EpisodeGuide, GuideEpisode, GuideSeason};
use serde::{Deserialize, Deserializer};

use crate::error::MetadataError;
use crate::traits::{MovieDetails, Resolved};

// ── Resolve ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ResolveResponse {
    pub id: u64,
    pub media_type: String,
    pub name: String,
    /// Sent as a number or as a four-character string.
    #[serde(default, deserialize_with = "lenient_year")]
    pub year: Option<u16>,
}

impl ResolveResponse {
    pub fn into_resolved(self) -> Result<Resolved, MetadataError> {
        let kind = match self.media_type.as_str() {
            "tv" | "series" => MediaKind::Series,
            "movie" => MediaKind::Movie,
            other => {
                return Err(MetadataError::InvalidResponse(format!(
                    "unknown media_type {other:?}"
                )))
            }
        };
        if self.id == 0 {
            return Err(MetadataError::InvalidResponse("resolved id is 0".into()));
        }
        Ok(Resolved {
            external_id: self.id,
            kind,
            name: self.name,
            year: self.year,
        })
    }
}

fn lenient_year<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_u64().and_then(|y| u16::try_from(y).ok()),
        Some(serde_json::Value::String(s)) => s.get(..4).and_then(|y| y.parse().ok()),
        _ => None,
    })
}

// ── Series ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TvResponse {
    pub id: u64,
    pub name: Option<String>,
    pub rating: Option<f64>,
    pub runtime: Option<u32>,
    pub poster_path: Option<String>,
    #[serde(default)]
    pub seasons: Vec<TvSeason>,
}

#[derive(Debug, Deserialize)]
pub struct TvSeason {
    pub season_number: u32,
    pub runtime: Option<u32>,
    #[serde(default)]
    pub episodes: Vec<TvEpisode>,
}

#[derive(Debug, Deserialize)]
pub struct TvEpisode {
    pub id: Option<u64>,
    pub episode_number: u32,
    pub name: Option<String>,
    pub air_date: Option<String>,
    pub runtime: Option<u32>,
}

impl TvResponse {
    /// Normalize into an [`EpisodeGuide`]: specials (season 0) dropped,
    /// seasons and episodes sorted, duplicate episode numbers collapsed.
    pub fn into_guide(self) -> Result<EpisodeGuide, MetadataError> {
        if self.id == 0 {
            return Err(MetadataError::InvalidResponse("series id is 0".into()));
        }

        let mut seasons: Vec<GuideSeason> = self
            .seasons
            .into_iter()
            .filter(|s| s.season_number != 0)
            .map(|s| {
                let mut episodes: Vec<GuideEpisode> = s
                    .episodes
                    .into_iter()
                    .map(|e| GuideEpisode {
                        number: e.episode_number,
                        name: e.name.unwrap_or_default(),
                        air_date: e.air_date.filter(|d| !d.is_empty()),
                        runtime_minutes: e.runtime.filter(|r| *r > 0),
                    })
                    .collect();
                episodes.sort_by_key(|e| e.number);
                episodes.dedup_by_key(|e| e.number);
                GuideSeason {
                    number: s.season_number,
                    episodes,
                }
            })
            .collect();
        seasons.sort_by_key(|s| s.number);
        seasons.dedup_by_key(|s| s.number);

        Ok(EpisodeGuide {
            external_id: self.id,
            name: self.name.unwrap_or_default(),
            rating: self.rating.filter(|r| *r > 0.0),
            poster_ref: self.poster_path,
            seasons,
        })
    }
}

// ── Movie ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MovieResponse {
    pub id: u64,
    pub name: Option<String>,
    pub runtime: Option<u32>,
    pub rating: Option<f64>,
    pub poster_path: Option<String>,
}

impl MovieResponse {
    pub fn into_details(self) -> Result<MovieDetails, MetadataError> {
        if self.id == 0 {
            return Err(MetadataError::InvalidResponse("movie id is 0".into()));
        }
        Ok(MovieDetails {
            external_id: self.id,
            name: self.name.unwrap_or_default(),
            runtime_minutes: self.runtime.filter(|r| *r > 0),
            rating: self.rating.filter(|r| *r > 0.0),
            poster_ref: self.poster_path,
        })
    }
}

// ── Errors ──────────────────────────────────────────────────────

/// Error body returned by the proxy alongside a non-2xx status.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn text(&self) -> String {
        match &self.message {
            Some(m) if !m.is_empty() => format!("{}: {m}", self.error),
            _ => self.error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_resolve_response() {
        let json =
            r#"{"id": 82856, "media_type": "tv", "name": "The Mandalorian", "year": "2019"}"#;
        let resp: ResolveResponse = serde_json::from_str(json).unwrap();
        let resolved = resp.into_resolved().unwrap();
        assert_eq!(resolved.external_id, 82856);
        assert_eq!(resolved.kind, MediaKind::Series);
        assert_eq!(resolved.year, Some(2019));

        let json = r#"{"id": 11, "media_type": "movie", "name": "Star Wars", "year": 1977}"#;
        let resolved = serde_json::from_str::<ResolveResponse>(json)
            .unwrap()
            .into_resolved()
            .unwrap();
        assert_eq!(resolved.kind, MediaKind::Movie);
        assert_eq!(resolved.year, Some(1977));

        let json = r#"{"id": 11, "media_type": "movie", "name": "Star Wars"}"#;
        let resp: ResolveResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.year, None);
    }

    #[test]
    fn test_unknown_media_type_rejected() {
        let json = r#"{"id": 1, "media_type": "person", "name": "Someone"}"#;
        let resp: ResolveResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(
            resp.into_resolved(),
            Err(MetadataError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_tv_response_is_normalized() {
        let json = r#"{
            "id": 82856,
            "name": "The Mandalorian",
            "rating": 8.4,
            "runtime": 120,
            "seasons": [
                {"season_number": 2, "episodes": [
                    {"id": 5, "episode_number": 2, "name": "Two", "air_date": null, "runtime": 40},
                    {"id": 4, "episode_number": 1, "name": "One",
                     "air_date": "2020-10-30", "runtime": 35}
                ]},
                {"season_number": 0, "episodes": [
                    {"id": 9, "episode_number": 1, "name": "Special", "runtime": 20}
                ]},
                {"season_number": 1, "runtime": 45, "episodes": [
                    {"id": 1, "episode_number": 1, "name": "Chapter 1", "runtime": 45}
                ]}
            ]
        }"#;
        let guide = serde_json::from_str::<TvResponse>(json)
            .unwrap()
            .into_guide()
            .unwrap();

        let numbers: Vec<u32> = guide.seasons.iter().map(|s| s.number).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert_eq!(guide.seasons[1].episodes[0].name, "One");
        assert_eq!(guide.total_episodes(), 3);
        assert_eq!(guide.total_runtime_minutes(), 120);
        assert_eq!(
            guide.episode_keys(),
            vec!["tv:82856:S1:E1", "tv:82856:S2:E1", "tv:82856:S2:E2"]
        );
    }

    #[test]
    fn test_tv_response_missing_episode_number_fails() {
        let json = r#"{"id": 1, "seasons": [{"season_number": 1, "episodes": [{"name": "x"}]}]}"#;
        assert!(serde_json::from_str::<TvResponse>(json).is_err());
    }

    #[test]
    fn test_movie_response() {
        let json = r#"{
            "id": 11, "name": "Star Wars", "runtime": 121, "rating": 8.2, "poster_path": "/x.jpg"
        }"#;
        let details = serde_json::from_str::<MovieResponse>(json)
            .unwrap()
            .into_details()
            .unwrap();
        assert_eq!(details.runtime_minutes, Some(121));
        assert_eq!(details.poster_ref.as_deref(), Some("/x.jpg"));

        let json = r#"{"id": 11, "runtime": 0, "rating": 0}"#;
        let details = serde_json::from_str::<MovieResponse>(json)
            .unwrap()
            .into_details()
            .unwrap();
        assert_eq!(details.runtime_minutes, None);
        assert_eq!(details.rating, None);
    }

    #[test]
    fn test_error_body_text() {
        let body: ErrorBody = serde_json::from_str(
            r#"{"error": "No results found", "message": "No tv found matching \"x\""}"#,
        )
        .unwrap();
        assert_eq!(body.text(), "No results found: No tv found matching \"x\"");
        let body: ErrorBody = serde_json::from_str(r#"{"error": "Missing title"}"#).unwrap();
        assert_eq!(body.text(), "Missing title");
    }
}
