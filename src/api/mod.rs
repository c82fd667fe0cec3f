pub mod cache;
mod detect;
pub mod endpoint;
pub mod error;
pub mod html;
pub mod response;
pub mod token;
pub mod transport;

use crate::extract::Readings;
use crate::model::{self, Capability};
use endpoint::Endpoint;
pub use error::Error;
use http::StatusCode;
use serde_json::json;
use token::TokenManager;
use transport::{FetchOptions, RawResponse, Transport, MAX_ATTEMPTS};

/// Session with one gateway. Operations take `&mut self`: a session serves
/// one poll cycle at a time, callers sharing it across tasks must lock it.
#[derive(Debug)]
pub struct Gateway {
    base_url: String,
    transport: Transport,
    tokens: TokenManager,
    readings: Readings,
    installer_access: bool,
}

/// `https://<host>` unless `host` already names a scheme.
fn base_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/').to_lowercase();
    if host.starts_with("http://") || host.starts_with("https://") {
        host
    } else {
        format!("https://{}", host)
    }
}

pub fn configure(
    host: &str,
    credentials: Option<model::Credentials>,
    options: model::Options,
) -> Result<Gateway, Error> {
    Ok(Gateway {
        base_url: base_url(host),
        transport: Transport::new()?,
        tokens: TokenManager::new(credentials, &options),
        readings: Readings::default(),
        installer_access: false,
    })
}

impl Gateway {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn capability(&self) -> Capability {
        self.readings.capability
    }

    pub fn installer_access(&self) -> bool {
        self.installer_access
    }

    /// Cached payloads of the last cycle, for the extractors.
    pub fn readings(&self) -> &Readings {
        &self.readings
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET with up to three attempts. A 401 before the last attempt renews
    /// the token (cookie refresh first, full re-authentication if the gateway
    /// rejects the token) and tries again; the last 401 is returned as-is.
    /// 404 yields `None`.
    pub async fn fetch_with_retry(
        &mut self,
        url: &str,
        options: FetchOptions,
    ) -> Result<Option<RawResponse>, Error> {
        let mut attempt = 1;
        loop {
            log::debug!("HTTP GET attempt #{}: {}", attempt, url);
            match self.transport.get(url, self.tokens.headers(), options).await {
                Ok(response)
                    if response.status == StatusCode::UNAUTHORIZED
                        && attempt < MAX_ATTEMPTS
                        && self.tokens.is_configured() =>
                {
                    log::debug!(
                        "Received 401 from gateway; refreshing token, attempt {} of {}",
                        attempt,
                        MAX_ATTEMPTS - 1
                    );
                    if !self
                        .tokens
                        .refresh_cookies(&self.transport, &self.base_url)
                        .await?
                    {
                        self.tokens
                            .reauthenticate(&self.transport, &self.base_url)
                            .await?;
                    }
                }
                Ok(response) if response.status == StatusCode::NOT_FOUND => {
                    log::debug!("{} not supported by this gateway", url);
                    return Ok(None);
                }
                Ok(response) => {
                    log::trace!("Fetched from {}: {}: {}", url, response.status, response.body);
                    return Ok(Some(response));
                }
                Err(e) if attempt >= MAX_ATTEMPTS => return Err(e.into()),
                Err(e) => log::debug!("Transport error on {}: {}", url, e),
            }
            attempt += 1;
        }
    }

    /// Fetch `endpoint` into the cache.
    async fn update_endpoint(&mut self, endpoint: Endpoint) -> Result<(), Error> {
        let url = self.url(endpoint.path());
        match self.fetch_with_retry(&url, FetchOptions::default()).await {
            Ok(response) => {
                self.readings.cache.apply(endpoint, response);
                Ok(())
            }
            Err(e) => {
                self.readings.cache.invalidate(endpoint);
                Err(e)
            }
        }
    }

    /// Endpoints polled every cycle for the detected capability.
    pub fn cycle_endpoints(&self) -> Vec<Endpoint> {
        let mut endpoints = match self.readings.capability {
            Capability::ProductionAndConsumption { metering_enabled } => {
                let mut endpoints = detect::PRODUCTION_AND_CONSUMPTION.to_vec();
                if !metering_enabled {
                    endpoints.push(Endpoint::ProductionV1);
                }
                endpoints
            }
            Capability::ProductionOnly => vec![Endpoint::ProductionV1],
            Capability::Undetected => vec![],
        };
        if self.installer_access {
            endpoints.extend_from_slice(&detect::INSTALLER);
        }
        endpoints
    }

    /// Update the cache for the current capability. Endpoint failures are
    /// isolated; only a cycle in which every endpoint failed is an error.
    pub async fn refresh(&mut self) -> Result<(), Error> {
        let endpoints = self.cycle_endpoints();
        let mut updated = 0;
        let mut last_error = None;

        for endpoint in endpoints {
            match self.update_endpoint(endpoint).await {
                Ok(()) => updated += 1,
                Err(e) => {
                    log::warn!("Could not update {}: {}", endpoint, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if updated == 0 => Err(e),
            _ => Ok(()),
        }
    }

    /// Per-inverter production. A 401 here means the gateway no longer
    /// accepts us at all and is reported as an authentication failure.
    async fn update_inverters(&mut self) -> Result<(), Error> {
        let endpoint = Endpoint::ProductionInverters;
        let url = self.url(endpoint.path());

        match self.fetch_with_retry(&url, FetchOptions::default()).await {
            Ok(Some(response)) if response.status == StatusCode::UNAUTHORIZED => {
                self.readings.cache.invalidate(endpoint);
                Err(Error::Auth(format!(
                    "gateway rejected {} with {}",
                    endpoint, response.status
                )))
            }
            Ok(response) => {
                self.readings.cache.apply(endpoint, response);
                Ok(())
            }
            Err(Error::Auth(e)) => Err(Error::Auth(e)),
            Err(e) => {
                log::warn!("Could not update {}: {}", endpoint, e);
                self.readings.cache.invalidate(endpoint);
                Ok(())
            }
        }
    }

    /// One poll cycle: token, detection on the first cycle and refresh on the
    /// following ones, then inverter detail when asked for.
    pub async fn fetch_all(&mut self, want_inverters: bool) -> Result<(), Error> {
        if self.tokens.is_configured() {
            self.tokens
                .ensure_valid_token(&self.transport, &self.base_url)
                .await?;
        }

        if self.readings.capability == Capability::Undetected {
            self.detect_model().await?;
        } else {
            self.refresh().await?;
        }

        if want_inverters {
            self.update_inverters().await?;
        }
        Ok(())
    }

    /// Serial number from the gateway info document, `None` if unparsable.
    pub async fn device_serial(&mut self) -> Result<Option<String>, Error> {
        let url = self.url(endpoint::INFO);
        let response = self
            .fetch_with_retry(
                &url,
                FetchOptions {
                    follow_redirects: true,
                },
            )
            .await?;

        Ok(response.and_then(|r| html::extract_serial(&r.body)))
    }

    /// Switch power production on or off. The gateway does not always
    /// confirm the change; it shows up in the next cycle's readings.
    pub async fn set_production_power(&mut self, enabled: bool) -> Result<(), Error> {
        if !self.installer_access {
            return Err(Error::Unsupported(String::from(
                "production power requires installer access",
            )));
        }

        let url = self.url(Endpoint::ProductionPower.path());
        let power_forced_off = if enabled { 0 } else { 1 };
        let data = json!({ "length": 1, "arr": [power_forced_off] });

        let response = self
            .transport
            .put_json(&url, self.tokens.headers(), &data)
            .await?;
        if !response.status.is_success() {
            log::warn!(
                "Gateway answered {} to production power change",
                response.status
            );
        }
        Ok(())
    }

    /// Reachability check over the production endpoint; a permanent redirect
    /// means the host must be addressed over HTTPS.
    pub async fn check_connection(&mut self) -> Result<(), Error> {
        log::debug!("Checking host: {}", self.base_url);
        let url = self.url(Endpoint::ProductionV1.path());
        let response = self.fetch_with_retry(&url, FetchOptions::default()).await?;

        match response {
            Some(r) if r.status == StatusCode::MOVED_PERMANENTLY => Err(Error::SwitchToHttps),
            Some(r) => {
                log::debug!("Check connection HTTP code: {}", r.status);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::token::test::jwt;
    use super::*;
    use crate::model::{Credentials, Options, Reading};
    use mockito::{Matcher, Mock, Server, ServerGuard};
    use std::fs;
    use std::path::PathBuf;

    fn read_resource(filename: &str) -> String {
        let mut d = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        d.push(format!("resources/test/{}", filename));
        fs::read_to_string(d.as_path()).unwrap()
    }

    async fn serve(server: &mut ServerGuard, path: &str, status: usize, resource: &str) -> Mock {
        server
            .mock("GET", Matcher::Regex(format!(r"^{}(\?.*)?$", regex::escape(path))))
            .with_status(status)
            .with_body(read_resource(resource))
            .create_async()
            .await
    }

    fn unauthenticated(server: &ServerGuard) -> Gateway {
        configure(&server.url(), None, Options::default()).unwrap()
    }

    #[test]
    fn host_gets_https_scheme() {
        assert_eq!("https://envoy.local", base_url("Envoy.local"));
        assert_eq!("http://127.0.0.1:8080", base_url("http://127.0.0.1:8080/"));
    }

    #[tokio::test]
    async fn detects_metered_production_and_consumption() {
        let mut server = Server::new_async().await;
        serve(&mut server, "/production.json", 200, "production_metered.json").await;
        serve(&mut server, "/ivp/ensemble/inventory", 200, "ensemble_inventory.json").await;
        serve(&mut server, "/home.json", 200, "home.json").await;
        serve(&mut server, "/ivp/peb/devstatus", 401, "check_jwt_invalid.html").await;
        serve(&mut server, "/ivp/mod/603980032/mode/power", 401, "check_jwt_invalid.html").await;
        let v1 = server
            .mock("GET", "/api/v1/production")
            .expect(0)
            .create_async()
            .await;

        let mut gateway = unauthenticated(&server);
        gateway.fetch_all(false).await.unwrap();

        assert_eq!(
            Capability::ProductionAndConsumption {
                metering_enabled: true
            },
            gateway.capability()
        );
        assert!(!gateway.installer_access());
        assert_eq!(1532, gateway.readings().production().unwrap());
        v1.assert_async().await;

        /* detection again with unchanged device behaviour */
        gateway.detect_model().await.unwrap();
        assert_eq!(
            Capability::ProductionAndConsumption {
                metering_enabled: true
            },
            gateway.capability()
        );
        assert!(!gateway.installer_access());
    }

    #[tokio::test]
    async fn unmetered_gateway_also_reads_production_only_endpoint() {
        let mut server = Server::new_async().await;
        serve(&mut server, "/production.json", 200, "production_unmetered.json").await;
        serve(&mut server, "/ivp/ensemble/inventory", 404, "production_power.json").await;
        serve(&mut server, "/home.json", 200, "home.json").await;
        serve(&mut server, "/api/v1/production", 200, "production_v1.json").await;
        serve(&mut server, "/ivp/peb/devstatus", 200, "devstatus.json").await;
        serve(&mut server, "/ivp/mod/603980032/mode/power", 200, "production_power.json").await;

        let mut gateway = unauthenticated(&server);
        gateway.fetch_all(false).await.unwrap();

        assert_eq!(
            Capability::ProductionAndConsumption {
                metering_enabled: false
            },
            gateway.capability()
        );
        assert!(gateway.installer_access());
        assert!(!gateway.readings().cache.contains(Endpoint::EnsembleInventory));
        assert_eq!(4321, gateway.readings().daily_production().unwrap());
        assert_eq!(
            Reading::Available(true),
            gateway.readings().production_power()
        );
        assert_eq!(
            vec![
                Endpoint::ProductionJson,
                Endpoint::EnsembleInventory,
                Endpoint::HomeJson,
                Endpoint::ProductionV1,
                Endpoint::DevStatus,
                Endpoint::ProductionPower
            ],
            gateway.cycle_endpoints()
        );
    }

    #[tokio::test]
    async fn detects_production_only() {
        let mut server = Server::new_async().await;
        serve(&mut server, "/production.json", 404, "production_power.json").await;
        serve(&mut server, "/ivp/ensemble/inventory", 404, "production_power.json").await;
        serve(&mut server, "/home.json", 404, "production_power.json").await;
        serve(&mut server, "/api/v1/production", 200, "production_v1.json").await;
        serve(&mut server, "/ivp/peb/devstatus", 404, "production_power.json").await;
        serve(&mut server, "/ivp/mod/603980032/mode/power", 404, "production_power.json").await;

        let mut gateway = unauthenticated(&server);
        gateway.fetch_all(false).await.unwrap();

        assert_eq!(Capability::ProductionOnly, gateway.capability());
        assert_eq!(812, gateway.readings().production().unwrap());
        assert!(matches!(
            gateway.readings().consumption(),
            Ok(Reading::NotAvailable(_))
        ));
    }

    #[tokio::test]
    async fn unauthorized_gateway_needs_secure_communication() {
        let mut server = Server::new_async().await;
        serve(&mut server, "/production.json", 401, "check_jwt_invalid.html").await;
        serve(&mut server, "/ivp/ensemble/inventory", 401, "check_jwt_invalid.html").await;
        serve(&mut server, "/home.json", 401, "check_jwt_invalid.html").await;

        let mut gateway = unauthenticated(&server);
        match gateway.fetch_all(false).await {
            Err(Error::Detection(message)) => assert!(message.contains("secure communication")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn unknown_gateway_cannot_be_detected() {
        let mut server = Server::new_async().await;
        serve(&mut server, "/production.json", 500, "check_jwt_invalid.html").await;
        serve(&mut server, "/ivp/ensemble/inventory", 500, "check_jwt_invalid.html").await;
        serve(&mut server, "/home.json", 500, "check_jwt_invalid.html").await;
        serve(&mut server, "/api/v1/production", 500, "check_jwt_invalid.html").await;

        let mut gateway = unauthenticated(&server);
        let result = gateway.detect_model().await;

        assert!(matches!(result, Err(Error::Detection(_))));
        assert_eq!(Capability::Undetected, gateway.capability());
    }

    fn authenticated(server: &ServerGuard) -> Gateway {
        authenticated_with(server, jwt(chrono::Utc::now().timestamp() + 30 * 24 * 3600))
    }

    fn authenticated_with(server: &ServerGuard, token: String) -> Gateway {
        let options = Options {
            token: Some(token),
            enlighten_url: server.url(),
            ..Options::default()
        };
        let credentials = Credentials {
            username: "owner@example.com".to_string(),
            password: "secret".to_string(),
            serial: "122233445566".to_string(),
        };
        configure(&server.url(), Some(credentials), options).unwrap()
    }

    fn bearer(token: &str) -> String {
        format!("Bearer {}", token)
    }

    /* Cloud login handing out `token`, each step expected exactly once */
    async fn cloud_login(server: &mut ServerGuard, token: &str) -> Vec<Mock> {
        let login_page = server
            .mock("GET", "/")
            .with_status(200)
            .with_body(read_resource("login_page.html"))
            .create_async()
            .await;
        let login = server
            .mock("POST", "/login/login")
            .with_status(200)
            .create_async()
            .await;
        let owner_token = server
            .mock("GET", Matcher::Regex(r"^/entrez-auth-token".to_string()))
            .with_status(200)
            .with_body(format!(r#"{{"token":"{}"}}"#, token))
            .create_async()
            .await;
        let check = server
            .mock("GET", "/auth/check_jwt")
            .match_header("authorization", bearer(token).as_str())
            .with_status(200)
            .with_header("set-cookie", "sessionId=renewed; Path=/")
            .with_body(read_resource("check_jwt_valid.html"))
            .create_async()
            .await;
        vec![login_page, login, owner_token, check]
    }

    #[tokio::test]
    async fn rejected_token_is_renewed_from_cloud_and_request_retried() {
        let mut server = Server::new_async().await;
        let now = chrono::Utc::now().timestamp();
        let old_token = jwt(now + 30 * 24 * 3600);
        let new_token = jwt(now + 365 * 24 * 3600);

        let rejected = server
            .mock("GET", "/home.json")
            .match_header("authorization", bearer(&old_token).as_str())
            .with_status(401)
            .expect(1)
            .create_async()
            .await;
        let stale_check = server
            .mock("GET", "/auth/check_jwt")
            .match_header("authorization", bearer(&old_token).as_str())
            .with_status(200)
            .with_body(read_resource("check_jwt_invalid.html"))
            .expect(1)
            .create_async()
            .await;
        let cloud = cloud_login(&mut server, &new_token).await;
        let accepted = server
            .mock("GET", "/home.json")
            .match_header("authorization", bearer(&new_token).as_str())
            .match_header("cookie", "sessionId=renewed")
            .with_status(200)
            .with_body(read_resource("home.json"))
            .expect(1)
            .create_async()
            .await;

        let mut gateway = authenticated_with(&server, old_token);
        let url = format!("{}/home.json", server.url());
        let response = gateway
            .fetch_with_retry(&url, FetchOptions::default())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(StatusCode::OK, response.status);
        assert_eq!(Some(new_token.as_str()), gateway.tokens().token());
        rejected.assert_async().await;
        stale_check.assert_async().await;
        for mock in &cloud {
            mock.assert_async().await;
        }
        accepted.assert_async().await;
    }

    #[tokio::test]
    async fn expired_token_is_renewed_before_any_data_fetch() {
        let mut server = Server::new_async().await;
        let now = chrono::Utc::now().timestamp();
        let expired = jwt(now - 60);
        let new_token = jwt(now + 365 * 24 * 3600);

        let cloud = cloud_login(&mut server, &new_token).await;
        let with_expired_token = server
            .mock("GET", Matcher::Any)
            .match_header("authorization", bearer(&expired).as_str())
            .expect(0)
            .create_async()
            .await;
        let production = server
            .mock("GET", Matcher::Regex(r"^/production\.json".to_string()))
            .match_header("authorization", bearer(&new_token).as_str())
            .with_status(200)
            .with_body(read_resource("production_metered.json"))
            .expect(1)
            .create_async()
            .await;
        serve(&mut server, "/ivp/ensemble/inventory", 404, "production_power.json").await;
        serve(&mut server, "/home.json", 404, "production_power.json").await;
        serve(&mut server, "/ivp/peb/devstatus", 404, "production_power.json").await;
        serve(&mut server, "/ivp/mod/603980032/mode/power", 404, "production_power.json").await;

        let mut gateway = authenticated_with(&server, expired);
        gateway.fetch_all(false).await.unwrap();

        assert_eq!(Some(new_token.as_str()), gateway.tokens().token());
        assert_eq!(1532, gateway.readings().production().unwrap());
        for mock in &cloud {
            mock.assert_async().await;
        }
        with_expired_token.assert_async().await;
        production.assert_async().await;
    }

    #[tokio::test]
    async fn unauthorized_endpoint_does_not_abort_cycle_but_inverters_do() {
        let mut server = Server::new_async().await;
        let check = server
            .mock("GET", "/auth/check_jwt")
            .with_status(200)
            .with_header("set-cookie", "sessionId=abc; Path=/")
            .with_body(read_resource("check_jwt_valid.html"))
            .expect_at_least(1)
            .create_async()
            .await;
        serve(&mut server, "/production.json", 200, "production_metered.json").await;
        serve(&mut server, "/ivp/ensemble/inventory", 200, "ensemble_inventory.json").await;
        serve(&mut server, "/home.json", 401, "check_jwt_invalid.html").await;
        serve(&mut server, "/ivp/peb/devstatus", 404, "production_power.json").await;
        serve(&mut server, "/ivp/mod/603980032/mode/power", 404, "production_power.json").await;
        let inverters = server
            .mock("GET", "/api/v1/production/inverters")
            .with_status(401)
            .expect(MAX_ATTEMPTS)
            .create_async()
            .await;

        let mut gateway = authenticated(&server);

        /* detection and the cycle survive the 401 on home.json */
        gateway.fetch_all(false).await.unwrap();
        gateway.fetch_all(false).await.unwrap();
        assert_eq!(1532, gateway.readings().production().unwrap());
        assert_eq!(
            StatusCode::UNAUTHORIZED,
            gateway.readings().cache.get(Endpoint::HomeJson).unwrap().status
        );
        assert!(matches!(
            gateway.readings().grid_status(),
            Reading::NotAvailable(_)
        ));

        let result = gateway.fetch_all(true).await;
        assert!(matches!(result, Err(Error::Auth(_))));

        check.assert_async().await;
        inverters.assert_async().await;
        assert_eq!(Some("sessionId=abc"), gateway.tokens().cookie());
    }

    #[tokio::test]
    async fn inverters_are_fetched_on_request() {
        let mut server = Server::new_async().await;
        serve(&mut server, "/production.json", 404, "production_power.json").await;
        serve(&mut server, "/ivp/ensemble/inventory", 404, "production_power.json").await;
        serve(&mut server, "/home.json", 404, "production_power.json").await;
        serve(&mut server, "/api/v1/production/inverters", 200, "inverters.json").await;
        serve(&mut server, "/api/v1/production", 200, "production_v1.json").await;
        serve(&mut server, "/ivp/peb/devstatus", 404, "production_power.json").await;
        serve(&mut server, "/ivp/mod/603980032/mode/power", 404, "production_power.json").await;

        let mut gateway = unauthenticated(&server);
        gateway.fetch_all(true).await.unwrap();

        let inverters = gateway.readings().inverters_production().unwrap();
        assert_eq!(2, inverters.len());
        assert_eq!(128, inverters["121935144671"].watts);
    }

    #[tokio::test]
    async fn installer_data_survives_transport_failure() {
        let mut server = Server::new_async().await;
        serve(&mut server, "/production.json", 404, "production_power.json").await;
        serve(&mut server, "/ivp/ensemble/inventory", 404, "production_power.json").await;
        serve(&mut server, "/home.json", 404, "production_power.json").await;
        serve(&mut server, "/api/v1/production", 200, "production_v1.json").await;
        serve(&mut server, "/ivp/peb/devstatus", 200, "devstatus.json").await;
        serve(&mut server, "/ivp/mod/603980032/mode/power", 200, "production_power.json").await;

        let mut gateway = unauthenticated(&server);
        gateway.fetch_all(false).await.unwrap();
        assert!(gateway.installer_access());

        /* gateway goes away */
        gateway.base_url = String::from("http://127.0.0.1:1");
        let result = gateway.fetch_all(false).await;

        assert!(matches!(result, Err(Error::Transport(_))));
        assert!(!gateway.readings().cache.contains(Endpoint::ProductionV1));
        assert_eq!(
            Reading::Available(true),
            gateway.readings().production_power()
        );
        assert_eq!(2, gateway.readings().inverters_status().unwrap().len());
    }

    #[tokio::test]
    async fn production_power_toggle() {
        let mut server = Server::new_async().await;
        serve(&mut server, "/production.json", 404, "production_power.json").await;
        serve(&mut server, "/ivp/ensemble/inventory", 404, "production_power.json").await;
        serve(&mut server, "/home.json", 404, "production_power.json").await;
        serve(&mut server, "/api/v1/production", 200, "production_v1.json").await;
        serve(&mut server, "/ivp/peb/devstatus", 404, "production_power.json").await;
        serve(&mut server, "/ivp/mod/603980032/mode/power", 200, "production_power.json").await;
        let put = server
            .mock("PUT", "/ivp/mod/603980032/mode/power")
            .match_body(Matcher::Json(json!({"length": 1, "arr": [1]})))
            .with_status(204)
            .create_async()
            .await;

        let mut gateway = unauthenticated(&server);
        assert!(matches!(
            gateway.set_production_power(false).await,
            Err(Error::Unsupported(_))
        ));

        gateway.fetch_all(false).await.unwrap();
        gateway.set_production_power(false).await.unwrap();
        put.assert_async().await;
    }

    #[tokio::test]
    async fn device_serial_from_info() {
        let mut server = Server::new_async().await;
        serve(&mut server, "/info.xml", 200, "info.xml").await;

        let mut gateway = unauthenticated(&server);
        assert_eq!(
            Some("122233445566".to_string()),
            gateway.device_serial().await.unwrap()
        );
    }

    #[tokio::test]
    async fn redirect_means_https() {
        let mut server = Server::new_async().await;
        let _redirect = server
            .mock("GET", "/api/v1/production")
            .with_status(301)
            .with_header("location", "https://envoy.local/api/v1/production")
            .create_async()
            .await;

        let mut gateway = unauthenticated(&server);
        assert!(matches!(
            gateway.check_connection().await,
            Err(Error::SwitchToHttps)
        ));
    }
}
