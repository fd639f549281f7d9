//! Arr gateway: title → external-ID resolution via Sonarr/Radarr parse
//! endpoints. Styled on `cross-seed-indexers`'s Torznab client request/error
//! handling idiom, since the teacher itself *is* an arr and has no separate
//! gateway abstraction to adapt from.

use cross_seed_core::config::{ArrConfig, ArrKind};
use cross_seed_core::parser::MediaType;
use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedIds {
    pub imdb_id: Option<String>,
    pub tmdb_id: Option<String>,
    pub tvdb_id: Option<String>,
}

impl ResolvedIds {
    pub fn any(&self) -> bool {
        self.imdb_id.is_some() || self.tmdb_id.is_some() || self.tvdb_id.is_some()
    }
}

#[derive(Debug, Deserialize)]
struct ParseResponse {
    movie: Option<ArrIds>,
    series: Option<ArrIds>,
}

#[derive(Debug, Deserialize)]
struct ArrIds {
    #[serde(rename = "imdbId")]
    imdb_id: Option<String>,
    #[serde(rename = "tmdbId")]
    tmdb_id: Option<i64>,
    #[serde(rename = "tvdbId")]
    tvdb_id: Option<i64>,
}

impl From<ArrIds> for ResolvedIds {
    fn from(ids: ArrIds) -> Self {
        Self {
            imdb_id: ids.imdb_id,
            tmdb_id: ids.tmdb_id.map(|v| v.to_string()),
            tvdb_id: ids.tvdb_id.map(|v| v.to_string()),
        }
    }
}

pub struct ArrClient {
    http: reqwest::Client,
    arrs: Vec<ArrConfig>,
}

impl ArrClient {
    pub fn new(arrs: Vec<ArrConfig>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .expect("reqwest client builder never fails with only a timeout set"),
            arrs,
        }
    }

    /// Resolve external IDs for a title. For OTHER media, both Sonarr (with
    /// a synthetic `S00E00` suffix) and Radarr are tried; the first truthy
    /// result wins. Missing/errored arr calls degrade to `ResolvedIds::default()`.
    pub async fn resolve_ids(&self, title: &str, media_type: MediaType) -> ResolvedIds {
        let candidates: Vec<&ArrConfig> = match media_type {
            MediaType::Movie => self.arrs.iter().filter(|a| a.kind == ArrKind::Radarr).collect(),
            MediaType::Episode | MediaType::Season | MediaType::Anime => {
                self.arrs.iter().filter(|a| a.kind == ArrKind::Sonarr).collect()
            }
            MediaType::Other => self.arrs.iter().collect(),
        };

        for arr in candidates {
            let query_title = if media_type == MediaType::Other && arr.kind == ArrKind::Sonarr {
                format!("{title} S00E00")
            } else {
                title.to_string()
            };

            match self.parse(arr, &query_title).await {
                Ok(ids) if ids.any() => return ids,
                Ok(_) => continue,
                Err(e) => {
                    warn!(arr = %arr.name, error = %e, "arr parse call failed, degrading to textual search");
                    continue;
                }
            }
        }

        ResolvedIds::default()
    }

    async fn parse(&self, arr: &ArrConfig, title: &str) -> Result<ResolvedIds, reqwest::Error> {
        let url = format!("{}/api/v3/parse", arr.url.trim_end_matches('/'));
        debug!(arr = %arr.name, %title, "calling arr parse endpoint");

        let response = self
            .http
            .get(&url)
            .header("X-Api-Key", &arr.apikey)
            .query(&[("title", title)])
            .send()
            .await?
            .error_for_status()?;

        let parsed: ParseResponse = response.json().await?;
        let ids = parsed.movie.or(parsed.series).map(ResolvedIds::from).unwrap_or_default();
        Ok(ids)
    }

    /// `GET {arrUrl}/api` connectivity check.
    pub async fn ping(&self, arr: &ArrConfig) -> bool {
        let url = format!("{}/api", arr.url.trim_end_matches('/'));
        match self.http.get(&url).header("X-Api-Key", &arr.apikey).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolved_ids_any_is_false_when_empty() {
        assert!(!ResolvedIds::default().any());
    }

    #[test]
    fn resolved_ids_any_is_true_with_one_id() {
        let ids = ResolvedIds { imdb_id: Some("tt123".into()), ..Default::default() };
        assert!(ids.any());
    }
}
