// YouTube Data API HTTP client.
// Handles API key authentication and maps error statuses onto cache errors.

use reqwest::{
    Client, Response, StatusCode,
    header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT},
};

use crate::error::{CacheError, Result};

const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// YouTube Data API v3 client authenticated by API key.
pub struct YouTubeClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl YouTubeClient {
    /// Create a new client with the given API key.
    pub fn new(api_key: &str) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(CacheError::MissingApiKey);
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("yt-analyzer-cache"));

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(CacheError::Api)?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: YOUTUBE_API_BASE.to_string(),
        })
    }

    /// Create a client from the YOUTUBE_API_KEY environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("YOUTUBE_API_KEY").map_err(|_| CacheError::MissingApiKey)?;
        Self::new(&api_key)
    }

    /// Point the client at another API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Make a GET request with query parameters; the API key is appended.
    pub async fn get_with_params<T: serde::Serialize + ?Sized>(
        &self,
        endpoint: &str,
        params: &T,
    ) -> Result<Response> {
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(CacheError::Api)?;

        check_response(response).await
    }
}

/// Check response status and convert errors.
async fn check_response(response: Response) -> Result<Response> {
    match response.status() {
        StatusCode::OK => Ok(response),
        StatusCode::UNAUTHORIZED => Err(CacheError::Unauthorized),
        StatusCode::NOT_FOUND => {
            let mut url = response.url().clone();
            url.set_query(None);
            Err(CacheError::NotFound(url.to_string()))
        }
        StatusCode::FORBIDDEN => Err(CacheError::ApiQuotaExceeded(
            response.text().await.unwrap_or_default(),
        )),
        status => Err(CacheError::Other(format!(
            "HTTP {}: {}",
            status,
            response.text().await.unwrap_or_default()
        ))),
    }
}
