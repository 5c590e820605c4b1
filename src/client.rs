//! Dashboard backend API client.
//!
//! Provides blocking HTTP access to the infrasound image backend.
//! Uses reqwest with rustls for TLS.

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use tracing::{debug, instrument};

use crate::errors::InfraviewError;
use crate::models::{Cursor, DetectionSeries, ImagePage};

/// Default request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// User agent string for API requests.
const USER_AGENT: &str = concat!("infraview/", env!("CARGO_PKG_VERSION"));

/// Default dashboard backend base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

/// Build the endpoint and query arguments for a page request.
///
/// A live request (no cursor) hits `getImages`; a browse request hits
/// `imageBrowse` with the cursor as its `stop` boundary. Pure so that
/// request construction stays checkable without a server.
#[must_use]
pub fn page_query(
    volcano: &str,
    count: usize,
    cursor: Option<&Cursor>,
) -> (&'static str, Vec<(&'static str, String)>) {
    let mut query = vec![("volc", volcano.to_string()), ("count", count.to_string())];
    match cursor {
        Some(stop) => {
            query.push(("stop", stop.query_value()));
            ("imageBrowse", query)
        }
        None => ("getImages", query),
    }
}

/// Client for the dashboard backend API.
pub struct DashboardClient {
    client: Client,
    base_url: String,
}

impl DashboardClient {
    /// Create a new dashboard client against the given base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(base_url: &str) -> Result<Self, InfraviewError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// The base URL requests are issued against.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch one page of image groups.
    ///
    /// Live mode when `cursor` is `None` (most recent page), browse mode
    /// when a cursor anchors the page at its `stop` boundary.
    ///
    /// # Errors
    ///
    /// Returns a [`InfraviewError::Fetch`] naming the volcano if the
    /// request fails or the response cannot be parsed.
    #[instrument(skip(self, cursor), fields(volc = volcano))]
    pub fn fetch_page(
        &self,
        volcano: &str,
        count: usize,
        cursor: Option<&Cursor>,
    ) -> Result<ImagePage, InfraviewError> {
        let (endpoint, query) = page_query(volcano, count, cursor);
        let url = format!("{}/{endpoint}", self.base_url);

        debug!("fetching image page from {url}");

        let page = self
            .get_json::<ImagePage>(&url, &query)
            .map_err(|err| err.for_volcano(volcano))?;

        debug!("fetched {} image groups", page.len());
        Ok(page)
    }

    /// Fetch the detection time series for one volcano.
    ///
    /// # Errors
    ///
    /// Returns a [`InfraviewError::Fetch`] naming the volcano if the
    /// request fails or the series does not validate.
    #[instrument(skip(self), fields(volc = volcano))]
    pub fn fetch_detections(&self, volcano: &str) -> Result<DetectionSeries, InfraviewError> {
        let url = format!("{}/getDetections/{volcano}", self.base_url);

        debug!("fetching detections from {url}");

        let series = self
            .get_json::<DetectionSeries>(&url, &[])
            .and_then(|series| {
                series.validate()?;
                Ok(series)
            })
            .map_err(|err| err.for_volcano(volcano))?;

        debug!("fetched {} detections", series.len());
        Ok(series)
    }

    /// Fetch one image as raw bytes.
    ///
    /// `path` is the derived `{volc}/{yyyy}/{mm}/{dd}/{filename}` form
    /// produced by [`crate::models::image_url_path`].
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the backend reports a
    /// non-success status.
    pub fn fetch_image(&self, path: &str) -> Result<Vec<u8>, InfraviewError> {
        let url = format!("{}/getImage/{path}", self.base_url);
        let response = Self::check_status(self.client.get(&url).send()?)?;
        Ok(response.bytes()?.to_vec())
    }

    /// Issue a GET and parse the JSON body after a status check.
    ///
    /// Parses from the body text so a malformed payload surfaces as a
    /// parse error rather than a transport error.
    fn get_json<T>(&self, url: &str, query: &[(&str, String)]) -> Result<T, InfraviewError>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut request = self.client.get(url);
        if !query.is_empty() {
            request = request.query(query);
        }
        let response = Self::check_status(request.send()?)?;
        let body = response.text()?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Check status before parsing, surfacing the error body when present.
    fn check_status(response: Response) -> Result<Response, InfraviewError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(InfraviewError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_requests_are_identical() {
        // Two live fetches with no state change build the same arguments,
        // with no cursor either time.
        let first = page_query("pavlof", 3, None);
        let second = page_query("pavlof", 3, None);
        assert_eq!(first, second);
        assert_eq!(first.0, "getImages");
        assert!(!first.1.iter().any(|(key, _)| *key == "stop"));
    }

    #[test]
    fn test_browse_request_carries_stop_cursor() {
        let cursor = Cursor::Text("04/05/2023 12:00".into());
        let (endpoint, query) = page_query("semi", 2, Some(&cursor));
        assert_eq!(endpoint, "imageBrowse");
        assert_eq!(
            query,
            vec![
                ("volc", "semi".to_string()),
                ("count", "2".to_string()),
                ("stop", "04/05/2023 12:00".to_string()),
            ]
        );
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = DashboardClient::new("http://example.test:5000/").expect("client builds");
        assert_eq!(client.base_url(), "http://example.test:5000");
    }
}
