use super::Error;
use http::StatusCode;
use reqwest::header::HeaderMap;
use reqwest::redirect::Policy;
use reqwest::{Client, ClientBuilder, Response};
use serde_json::Value;
use std::time::Duration;

pub const MAX_ATTEMPTS: usize = 3;
const TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    pub follow_redirects: bool,
}

/// Fully read response: status, body and the cookies it set.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: String,
    pub cookies: Vec<(String, String)>,
}

impl RawResponse {
    async fn read(response: Response) -> Result<RawResponse, reqwest::Error> {
        let status = response.status();
        let cookies = response
            .cookies()
            .map(|cookie| (cookie.name().to_string(), cookie.value().to_string()))
            .collect();
        let body = response.text().await?;

        Ok(RawResponse {
            status,
            body,
            cookies,
        })
    }

    pub fn json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }

    pub fn is_ok(&self) -> bool {
        self.status == StatusCode::OK
    }
}

/// Base builder shared by every client: the gateway's certificate is
/// self-signed, so verification is off everywhere.
fn builder() -> ClientBuilder {
    ClientBuilder::new()
        .danger_accept_invalid_certs(true)
        .timeout(TIMEOUT)
}

/// Client for a cloud login session; keeps the cookies the identity
/// service sets between the form post and the token request.
pub fn session_client() -> Result<Client, Error> {
    builder()
        .cookie_store(true)
        .build()
        .map_err(|e| Error::Internal(e.to_string()))
}

/// HTTP access to one gateway.
#[derive(Debug, Clone)]
pub struct Transport {
    client: Client,
    redirecting: Client,
}

impl Transport {
    pub fn new() -> Result<Transport, Error> {
        let client = builder()
            .redirect(Policy::none())
            .build()
            .map_err(|e| Error::Internal(e.to_string()))?;
        let redirecting = builder()
            .build()
            .map_err(|e| Error::Internal(e.to_string()))?;

        Ok(Transport {
            client,
            redirecting,
        })
    }

    /// Single GET attempt.
    pub async fn get(
        &self,
        url: &str,
        headers: HeaderMap,
        options: FetchOptions,
    ) -> Result<RawResponse, reqwest::Error> {
        let client = if options.follow_redirects {
            &self.redirecting
        } else {
            &self.client
        };

        let response = client.get(url).headers(headers).send().await?;
        RawResponse::read(response).await
    }

    /// GET retrying transport failures only. Status codes, 401 included, are
    /// handed back untouched.
    pub async fn get_with_retry(
        &self,
        url: &str,
        headers: HeaderMap,
        options: FetchOptions,
    ) -> Result<RawResponse, Error> {
        let mut attempt = 1;
        loop {
            log::debug!("HTTP GET attempt #{}: {}", attempt, url);
            match self.get(url, headers.clone(), options).await {
                Ok(response) => return Ok(response),
                Err(e) if attempt >= MAX_ATTEMPTS => return Err(e.into()),
                Err(e) => log::debug!("Transport error on {}: {}", url, e),
            }
            attempt += 1;
        }
    }

    pub async fn put_json(
        &self,
        url: &str,
        headers: HeaderMap,
        data: &Value,
    ) -> Result<RawResponse, Error> {
        log::debug!("HTTP PUT {}: {}", url, data);
        let response = self
            .client
            .put(url)
            .headers(headers)
            .json(data)
            .send()
            .await?;
        let response = RawResponse::read(response).await?;
        log::debug!("HTTP PUT {}: {}: {}", url, response.status, response.body);

        Ok(response)
    }
}

/// POST an urlencoded form through a cloud session client.
pub async fn post_form(
    client: &Client,
    url: &str,
    data: &[(&str, &str)],
) -> Result<RawResponse, Error> {
    log::debug!("HTTP POST {}", url);
    let response = client.post(url).form(data).send().await?;
    let response = RawResponse::read(response).await?;
    log::debug!("HTTP POST {}: {}", url, response.status);

    Ok(response)
}

/// GET through a cloud session client.
pub async fn get_text(client: &Client, url: &str) -> Result<RawResponse, Error> {
    log::debug!("HTTP GET {}", url);
    let response = client.get(url).send().await?;
    Ok(RawResponse::read(response).await?)
}
