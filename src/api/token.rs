use super::endpoint;
use super::html;
use super::response::OwnerToken;
use super::transport::{self, FetchOptions, Transport};
use super::Error;
use crate::model::{Credentials, Options};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, COOKIE};
use serde::Deserialize;
use std::convert::TryFrom;
use std::time::Duration;

const VALID_TOKEN: &str = "Valid token.";

#[derive(Deserialize)]
struct Claims {
    exp: i64,
}

/// Expiry encoded in the token's claims. The signature is not verified.
pub fn token_expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    Utc.timestamp_opt(claims.exp, 0).single()
}

/// Bearer token and gateway session cookie of one gateway.
#[derive(Debug, Clone)]
pub struct TokenManager {
    credentials: Option<Credentials>,
    enlighten_url: String,
    refresh_buffer: Duration,
    token: Option<String>,
    cookie: Option<String>,
    /// The gateway accepted the current token.
    validated: bool,
}

impl TokenManager {
    pub fn new(credentials: Option<Credentials>, options: &Options) -> TokenManager {
        TokenManager {
            credentials,
            enlighten_url: options.enlighten_url.trim_end_matches('/').to_string(),
            refresh_buffer: options.token_refresh_buffer,
            token: options.token.clone().filter(|t| !t.is_empty()),
            cookie: None,
            validated: false,
        }
    }

    /// Whether this gateway is accessed with a token at all.
    pub fn is_configured(&self) -> bool {
        self.credentials.is_some() || self.token.is_some()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn cookie(&self) -> Option<&str> {
        self.cookie.as_deref()
    }

    /// Whether the token is missing, undecodable, or within the refresh
    /// buffer of its expiry at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let expiry = match self.token.as_deref().and_then(token_expiry) {
            Some(expiry) => expiry,
            None => return true,
        };
        let renew_at = match i64::try_from(self.refresh_buffer.as_secs())
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|buffer| expiry.checked_sub_signed(buffer))
        {
            Some(renew_at) => renew_at,
            None => {
                log::debug!("Refresh buffer reaches past the token's lifetime");
                return true;
            }
        };

        if now < renew_at {
            log::debug!("Token expires at: {}", renew_at);
            false
        } else {
            log::debug!("Token expired on: {}", renew_at);
            true
        }
    }

    fn bearer_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.token {
            match HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(value) => {
                    headers.insert(AUTHORIZATION, value);
                }
                Err(e) => log::warn!("Token is not a valid header value: {}", e),
            }
        }
        headers
    }

    /// Headers for a gateway request: bearer token and session cookie.
    pub fn headers(&self) -> HeaderMap {
        let mut headers = self.bearer_headers();
        if let Some(value) = self
            .cookie
            .as_deref()
            .and_then(|cookie| HeaderValue::from_str(cookie).ok())
        {
            headers.insert(COOKIE, value);
        }
        headers
    }

    /// Make sure a token the gateway accepts is installed, renewing it from
    /// the cloud when it is missing, expired or rejected.
    pub async fn ensure_valid_token(
        &mut self,
        transport: &Transport,
        base_url: &str,
    ) -> Result<(), Error> {
        if self.token.is_none() {
            log::debug!("No token cached, retrieving one");
            return self.reauthenticate(transport, base_url).await;
        }

        if self.is_expired(Utc::now()) {
            log::debug!("Found expired token, retrieving new token");
            return self.reauthenticate(transport, base_url).await;
        }

        if !self.validated && !self.refresh_cookies(transport, base_url).await? {
            log::info!("Gateway rejected the cached token, retrieving new token");
            return self.reauthenticate(transport, base_url).await;
        }

        Ok(())
    }

    /// Obtain a new token from the cloud and validate it against the gateway.
    pub async fn reauthenticate(
        &mut self,
        transport: &Transport,
        base_url: &str,
    ) -> Result<(), Error> {
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            Error::Auth(String::from(
                "no cloud credentials configured to obtain a gateway token",
            ))
        })?;

        let owner_token = fetch_owner_token(&self.enlighten_url, credentials).await?;
        if let Some(expires_at) = owner_token.1 {
            let days = (expires_at - Utc::now().timestamp()) as f64 / (24.0 * 3600.0);
            log::debug!("Commissioned token valid for {:.1} days", days);
        }

        self.token = Some(owner_token.0);
        self.cookie = None;
        self.validated = false;

        if !self.refresh_cookies(transport, base_url).await? {
            log::warn!("Gateway did not accept the newly issued token");
        }
        Ok(())
    }

    /// Validate the token against the gateway and keep the session cookies
    /// it hands out. Returns `false` when the gateway rejects the token.
    pub async fn refresh_cookies(
        &mut self,
        transport: &Transport,
        base_url: &str,
    ) -> Result<bool, Error> {
        let url = format!("{}{}", base_url, endpoint::CHECK_JWT);
        let response = transport
            .get_with_retry(&url, self.bearer_headers(), FetchOptions::default())
            .await?;

        match html::extract_validity_heading(&response.body) {
            Some(heading) if heading == VALID_TOKEN => {
                log::debug!("Token is valid");
                if !response.cookies.is_empty() {
                    let cookie = response
                        .cookies
                        .iter()
                        .map(|(name, value)| format!("{}={}", name, value))
                        .collect::<Vec<_>>()
                        .join("; ");
                    self.cookie = Some(cookie);
                }
                self.validated = true;
                Ok(true)
            }
            heading => {
                log::debug!("Invalid token! ({:?})", heading);
                self.validated = false;
                Ok(false)
            }
        }
    }
}

/// Sign in to the cloud and request the token for `credentials.serial`.
async fn fetch_owner_token(
    enlighten_url: &str,
    credentials: &Credentials,
) -> Result<(String, Option<i64>), Error> {
    let client = transport::session_client()?;

    let page = transport::get_text(&client, enlighten_url).await?;
    let authenticity_token = html::extract_form_token(&page.body)
        .ok_or_else(|| Error::Auth(String::from("login form token not found")))?;
    let action = html::extract_form_action(&page.body)
        .ok_or_else(|| Error::Auth(String::from("login form action not found")))?;

    let response = transport::post_form(
        &client,
        &format!("{}{}", enlighten_url, action),
        &[
            ("authenticity_token", authenticity_token.as_str()),
            ("user[email]", credentials.username.as_str()),
            ("user[password]", credentials.password.as_str()),
        ],
    )
    .await?;
    if response.status.is_client_error() || response.status.is_server_error() {
        return Err(Error::Auth(format!(
            "could not authenticate via Enlighten auth form (server responded {})",
            response.status
        )));
    }

    let url = format!(
        "{}{}?serial_num={}",
        enlighten_url,
        endpoint::ENLIGHTEN_TOKEN,
        credentials.serial
    );
    let response = transport::get_text(&client, &url).await?;
    let owner_token: OwnerToken = serde_json::from_str(&response.body)
        .map_err(|e| Error::InvalidResponse(e.to_string(), response.body.clone()))?;

    match owner_token.token {
        Some(token) => Ok((token, owner_token.expires_at)),
        None => Err(Error::Auth(format!(
            "could not get gateway token: {}",
            owner_token.message.unwrap_or_else(|| format!(
                "unknown error returned from Enlighten: {}",
                response.body
            ))
        ))),
    }
}
