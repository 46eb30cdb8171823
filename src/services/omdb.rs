//! Client for the OMDb lookup provider
//!
//! The provider signals "no match" with a `"Response":"False"` body rather
//! than an HTTP error, so that case is folded into a typed `NotFound`;
//! transport and parse failures become `Upstream`.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum OmdbError {
    /// Provider has no match for this query; the caller moves on to the
    /// next query variant.
    #[error("no provider match")]
    NotFound,
    /// Transport or payload failure; logged, does not abort the enclosing
    /// run.
    #[error("provider request failed: {0}")]
    Upstream(String),
}

/// A full item payload from a direct fetch
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OmdbItem {
    #[serde(rename = "Title")]
    pub title: Option<String>,
    #[serde(rename = "Year")]
    pub year: Option<String>,
    #[serde(rename = "Rated")]
    pub rated: Option<String>,
    #[serde(rename = "Runtime")]
    pub runtime: Option<String>,
    #[serde(rename = "Genre")]
    pub genre: Option<String>,
    #[serde(rename = "Plot")]
    pub plot: Option<String>,
    #[serde(rename = "Poster")]
    pub poster: Option<String>,
    #[serde(rename = "imdbID")]
    pub imdb_id: Option<String>,
    #[serde(rename = "Type")]
    pub media_type: Option<String>,
    /// Raw provider payload, kept for the metadata cache blob
    #[serde(skip)]
    pub raw: Value,
}

impl OmdbItem {
    fn none_if_na(value: &Option<String>) -> Option<&str> {
        value
            .as_deref()
            .filter(|v| !v.is_empty() && *v != "N/A")
    }

    /// Poster URL, with the provider's "N/A" placeholder filtered out
    pub fn poster_url(&self) -> Option<&str> {
        Self::none_if_na(&self.poster)
    }

    /// First four-digit year; the provider uses ranges like "2008–2013"
    /// for series
    pub fn year_number(&self) -> Option<i32> {
        let year = Self::none_if_na(&self.year)?;
        let digits: String = year.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().ok()
    }
}

/// One row of a search response
#[derive(Debug, Clone, Deserialize)]
pub struct OmdbSearchHit {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Year")]
    pub year: Option<String>,
    #[serde(rename = "imdbID")]
    pub imdb_id: String,
    #[serde(rename = "Type")]
    pub media_type: Option<String>,
}

impl OmdbSearchHit {
    pub fn year_number(&self) -> Option<i32> {
        let year = self.year.as_deref()?;
        let digits: String = year.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().ok()
    }
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    #[serde(rename = "Search")]
    results: Option<Vec<OmdbSearchHit>>,
}

#[derive(Clone)]
pub struct OmdbClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OmdbClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }

    async fn get_json(&self, params: &[(&str, &str)]) -> Result<Value, OmdbError> {
        let mut query: Vec<(&str, &str)> = vec![("apikey", self.api_key.as_str())];
        query.extend_from_slice(params);

        let response = self
            .client
            .get(&self.base_url)
            .query(&query)
            .send()
            .await
            .map_err(|e| OmdbError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            return Err(OmdbError::Upstream(format!(
                "status {}",
                response.status()
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| OmdbError::Upstream(e.to_string()))
    }

    fn is_negative(body: &Value) -> bool {
        body.get("Response").and_then(Value::as_str) == Some("False")
    }

    /// Direct fetch by title
    pub async fn fetch_by_title(
        &self,
        title: &str,
        year: Option<&str>,
        media_type: Option<&str>,
    ) -> Result<OmdbItem, OmdbError> {
        let mut params = vec![("t", title), ("plot", "short")];
        if let Some(year) = year {
            params.push(("y", year));
        }
        if let Some(media_type) = media_type {
            params.push(("type", media_type));
        }
        let body = self.get_json(&params).await?;
        if Self::is_negative(&body) {
            debug!(title = %title, "provider reported no match");
            return Err(OmdbError::NotFound);
        }
        let mut item: OmdbItem = serde_json::from_value(body.clone())
            .map_err(|e| OmdbError::Upstream(e.to_string()))?;
        item.raw = body;
        Ok(item)
    }

    /// Direct fetch by external id
    pub async fn fetch_by_id(&self, imdb_id: &str) -> Result<OmdbItem, OmdbError> {
        let body = self
            .get_json(&[("i", imdb_id), ("plot", "short")])
            .await?;
        if Self::is_negative(&body) {
            return Err(OmdbError::NotFound);
        }
        let mut item: OmdbItem = serde_json::from_value(body.clone())
            .map_err(|e| OmdbError::Upstream(e.to_string()))?;
        item.raw = body;
        Ok(item)
    }

    /// Search; an empty result set is not an error
    pub async fn search(
        &self,
        query: &str,
        year: Option<&str>,
        media_type: Option<&str>,
    ) -> Result<Vec<OmdbSearchHit>, OmdbError> {
        let mut params = vec![("s", query)];
        if let Some(year) = year {
            params.push(("y", year));
        }
        if let Some(media_type) = media_type {
            params.push(("type", media_type));
        }
        let body = self.get_json(&params).await?;
        if Self::is_negative(&body) {
            return Ok(Vec::new());
        }
        let envelope: SearchEnvelope = serde_json::from_value(body)
            .map_err(|e| OmdbError::Upstream(e.to_string()))?;
        Ok(envelope.results.unwrap_or_default())
    }
}
