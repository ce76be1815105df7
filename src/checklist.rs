use std::fmt;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};

use crate::config::Credentials;
use crate::error::ExportError;

/// Facets requested with every search page; the server computes them over
/// the whole result set, so they do not change between pages.
pub const SEARCH_FACETS: [&str; 16] = [
    "rank",
    "issue",
    "status",
    "nomStatus",
    "nomCode",
    "nameType",
    "field",
    "authorship",
    "authorshipYear",
    "extinct",
    "environment",
    "origin",
    "sectorMode",
    "secondarySourceGroup",
    "sectorDatasetKey",
    "group",
];

/// Filter half of a name usage search; the offset is supplied per page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub release_id: String,
    pub taxon_id: String,
    pub limit: u64,
}

impl SearchQuery {
    pub fn params(&self, offset: u64) -> Vec<(String, String)> {
        let mut params = vec![("TAXON_ID".to_string(), self.taxon_id.clone())];
        params.extend(
            SEARCH_FACETS
                .iter()
                .map(|facet| ("facet".to_string(), facet.to_string())),
        );
        params.push(("limit".to_string(), self.limit.to_string()));
        params.push(("offset".to_string(), offset.to_string()));
        params.push(("sectorMode".to_string(), "merge".to_string()));
        params.push(("sortBy".to_string(), "taxonomic".to_string()));
        params
    }
}

/// Remote catalog endpoints. Every method returns the raw response body so
/// that it can be recorded verbatim in the replay store.
pub trait ChecklistClient {
    fn search_name_usages(&self, query: &SearchQuery, offset: u64) -> Result<Vec<u8>, ExportError>;
    fn fetch_dataset(&self, key: &str) -> Result<Vec<u8>, ExportError>;
    fn fetch_reference(&self, release_id: &str, id: &str) -> Result<Vec<u8>, ExportError>;
}

/// Session token returned by the login endpoint.
#[derive(Clone)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    fn header_value(&self) -> Result<HeaderValue, ExportError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", self.0.trim()))
            .map_err(|err| ExportError::AuthHttp(err.to_string()))?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

#[derive(Clone)]
pub struct ChecklistHttpClient {
    client: Client,
    api_base: String,
}

impl ChecklistHttpClient {
    /// Exchanges the credentials for a bearer token and returns a client that
    /// attaches it to every request.
    pub fn login(api_base: &str, credentials: &Credentials) -> Result<Self, ExportError> {
        let anonymous = build_client(HeaderMap::new()).map_err(ExportError::AuthHttp)?;
        let token = request_token(&anonymous, api_base, credentials)?;
        Self::with_token(api_base, &token)
    }

    pub fn with_token(api_base: &str, token: &BearerToken) -> Result<Self, ExportError> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, token.header_value()?);
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        let client = build_client(headers).map_err(ExportError::AuthHttp)?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    fn get(&self, context: String, request: RequestBuilder) -> Result<Vec<u8>, ExportError> {
        tracing::debug!(%context, "live request");
        let response = request.send().map_err(|err| ExportError::Http {
            context: context.clone(),
            message: err.to_string(),
        })?;
        let response = handle_status(&context, response)?;
        let bytes = response.bytes().map_err(|err| ExportError::Http {
            context,
            message: err.to_string(),
        })?;
        Ok(bytes.to_vec())
    }
}

impl ChecklistClient for ChecklistHttpClient {
    fn search_name_usages(&self, query: &SearchQuery, offset: u64) -> Result<Vec<u8>, ExportError> {
        let url = format!(
            "{}/dataset/{}/nameusage/search",
            self.api_base, query.release_id
        );
        let request = self.client.get(url).query(&query.params(offset));
        self.get(format!("name usage search at offset {offset}"), request)
    }

    fn fetch_dataset(&self, key: &str) -> Result<Vec<u8>, ExportError> {
        let url = format!("{}/dataset/{key}", self.api_base);
        self.get(format!("dataset {key}"), self.client.get(url))
    }

    fn fetch_reference(&self, release_id: &str, id: &str) -> Result<Vec<u8>, ExportError> {
        let url = format!("{}/dataset/{release_id}/reference/{id}", self.api_base);
        self.get(format!("reference {id}"), self.client.get(url))
    }
}

fn build_client(mut headers: HeaderMap) -> Result<Client, String> {
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&format!("clb-exporter/{}", env!("CARGO_PKG_VERSION")))
            .map_err(|err| err.to_string())?,
    );
    Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(300))
        .build()
        .map_err(|err| err.to_string())
}

fn request_token(
    client: &Client,
    api_base: &str,
    credentials: &Credentials,
) -> Result<BearerToken, ExportError> {
    let url = format!("{}/user/login", api_base.trim_end_matches('/'));
    let response = client
        .get(url)
        .basic_auth(&credentials.user, Some(&credentials.password))
        .send()
        .map_err(|err| ExportError::AuthHttp(err.to_string()))?;
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "login failed".to_string());
        return Err(ExportError::Auth { status, message });
    }
    let token = response
        .text()
        .map_err(|err| ExportError::AuthHttp(err.to_string()))?;
    if token.trim().is_empty() {
        return Err(ExportError::Auth {
            status: 200,
            message: "empty token".to_string(),
        });
    }
    Ok(BearerToken::new(token))
}

fn handle_status(context: &str, response: Response) -> Result<Response, ExportError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let message = response
        .text()
        .unwrap_or_else(|_| "request failed".to_string());
    Err(ExportError::Status {
        status,
        context: context.to_string(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_params_carry_filters_and_offset() {
        let query = SearchQuery {
            release_id: "3LR".to_string(),
            taxon_id: "CH2".to_string(),
            limit: 1000,
        };
        let params = query.params(2000);
        assert_eq!(params[0], ("TAXON_ID".to_string(), "CH2".to_string()));
        assert_eq!(params.iter().filter(|(key, _)| key == "facet").count(), 16);
        assert!(params.contains(&("offset".to_string(), "2000".to_string())));
        assert!(params.contains(&("limit".to_string(), "1000".to_string())));
        assert!(params.contains(&("sectorMode".to_string(), "merge".to_string())));
        assert!(params.contains(&("sortBy".to_string(), "taxonomic".to_string())));
    }

    #[test]
    fn token_debug_is_redacted() {
        let token = BearerToken::new("secret");
        assert!(!format!("{token:?}").contains("secret"));
    }
}
