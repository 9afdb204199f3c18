use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use serde::de::DeserializeOwned;
use serde_json::json;
use url::Url;

use crate::config::{self, Credentials};
use crate::error::{Error, Result, vendor_message};
use crate::readings::{Period, Reading, ReadingsQuery, SeriesReply};
use crate::resource::{ELECTRICITY_CONSUMPTION, GAS_CONSUMPTION, Resource, ResourceDetails};
use crate::tariff::{Tariff, TariffReply};
use crate::transport::{HttpTransport, Request, Transport};

/// Glowmarkt API root.
pub const DEFAULT_BASE_URL: &str = "https://api.glowmarkt.com/api/v0-1";

/// An authenticated session, created by [`Client::login`].
///
/// The token is never refreshed; once `expiry` passes, requests start failing
/// and the caller has to log in again.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    application_id: String,
    token: String,
    expiry: Option<DateTime<Utc>>,
    account_id: Option<String>,
}

impl Session {
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expiry
    }

    pub fn account_id(&self) -> Option<&str> {
        self.account_id.as_deref()
    }

    pub fn application_id(&self) -> &str {
        &self.application_id
    }

    /// Whether the vendor-reported expiry is at or before `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry.is_some_and(|exp| exp <= now)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("application_id", &self.application_id)
            .field("token", &"<redacted>")
            .field("expiry", &self.expiry)
            .field("account_id", &self.account_id)
            .finish()
    }
}

/// A current reading with the tariff it was priced at.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentUsage {
    pub reading: Reading,
    pub tariff: Tariff,
    pub cost: f64,
}

impl CurrentUsage {
    fn priced(reading: Reading, tariff: Tariff) -> Self {
        let cost = tariff.cost(&reading);
        Self {
            reading,
            tariff,
            cost,
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct AuthReply {
    #[serde(default)]
    valid: Option<bool>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    exp: Option<i64>,
    #[serde(default, rename = "accountId")]
    account_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Glowmarkt API client.
///
/// Starts unauthenticated; [`Client::login`] stores a session that every data
/// call then uses. Data calls made before login fail with
/// [`Error::NotAuthenticated`] without touching the network.
#[derive(Debug)]
pub struct Client<T = HttpTransport> {
    base_url: String,
    transport: T,
    session: Option<Session>,
}

impl Client<HttpTransport> {
    /// Creates an unauthenticated client over HTTPS.
    pub fn new() -> Result<Self> {
        Ok(Self::with_transport(HttpTransport::new()?))
    }

    /// Resolves credentials from the environment and/or the credentials file,
    /// then logs in.
    pub fn from_env() -> Result<Self> {
        let credentials = config::resolve(None)?;
        let mut client = Self::new()?;
        client.login(&credentials)?;
        Ok(client)
    }
}

impl<T: Transport> Client<T> {
    pub fn with_transport(transport: T) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            transport,
            session: None,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    /// Exchanges credentials for a bearer token.
    ///
    /// A failed attempt leaves any earlier session in place.
    pub fn login(&mut self, credentials: &Credentials) -> Result<Session> {
        let url = self.endpoint(&["auth"])?;
        let request = Request::post(
            url.clone(),
            json!({
                "username": credentials.username(),
                "password": credentials.password(),
            }),
        )
        .header("applicationId", credentials.application_id())
        .header("Content-Type", "application/json");

        log::debug!("POST {}", url);
        let resp = self.transport.send(&request)?;
        if !resp.is_success() {
            return Err(Error::Authentication {
                status: Some(resp.status),
                message: vendor_message(&resp.body),
            });
        }

        let reply: AuthReply =
            serde_json::from_str(&resp.body).map_err(|e| Error::Authentication {
                status: Some(resp.status),
                message: format!("malformed login reply: {}", e),
            })?;
        if reply.valid == Some(false) {
            return Err(Error::Authentication {
                status: Some(resp.status),
                message: reply
                    .error
                    .unwrap_or_else(|| "credentials rejected".to_string()),
            });
        }
        let token = reply
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Authentication {
                status: Some(resp.status),
                message: "login reply carries no token".to_string(),
            })?;

        let session = Session {
            application_id: credentials.application_id().to_string(),
            token,
            expiry: reply
                .exp
                .and_then(|exp| DateTime::<Utc>::from_timestamp(exp, 0)),
            account_id: reply.account_id,
        };
        match session.expiry {
            Some(exp) => log::debug!("authenticated; token expires at {}", exp),
            None => log::debug!("authenticated; no expiry reported"),
        }
        self.session = Some(session.clone());
        Ok(session)
    }

    /// Lists the resources visible to the account.
    pub fn list_resources(&self) -> Result<Vec<Resource>> {
        let session = self.require_session()?;
        let url = self.endpoint(&["resource"])?;
        self.get_json(session, url, None)
    }

    /// First resource whose classifier equals `classifier`, e.g.
    /// [`ELECTRICITY_CONSUMPTION`](crate::ELECTRICITY_CONSUMPTION).
    pub fn find_resource(&self, classifier: &str) -> Result<Option<Resource>> {
        Ok(self
            .list_resources()?
            .into_iter()
            .find(|r| r.classifier == classifier))
    }

    pub fn get_resource_metadata(&self, resource_id: &str) -> Result<ResourceDetails> {
        let session = self.require_session()?;
        let url = self.resource_endpoint(resource_id, None)?;
        self.get_json(session, url, Some(resource_id))
    }

    /// Readings of `resource_id` between `start` and `end`, summed per `period`.
    pub fn get_readings(
        &self,
        resource_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        period: Period,
    ) -> Result<Vec<Reading>> {
        self.query_readings(resource_id, &ReadingsQuery::new(start, end, period))
    }

    /// Readings with full control over offset and aggregation function.
    ///
    /// Readings come back in the order the vendor sends them.
    pub fn query_readings(&self, resource_id: &str, query: &ReadingsQuery) -> Result<Vec<Reading>> {
        let session = self.require_session()?;
        query.validate()?;
        let mut url = self.resource_endpoint(resource_id, Some("readings"))?;
        url.query_pairs_mut().extend_pairs(query.query_pairs());

        let reply: SeriesReply = self.get_json(session, url.clone(), Some(resource_id))?;
        reply.into_readings(url.as_str())
    }

    /// Latest reading reported for a resource.
    ///
    /// For gas resources the vendor answers with the meter register rather
    /// than recent usage; [`Client::gas_current`] reads usage instead.
    pub fn current_reading(&self, resource_id: &str) -> Result<Reading> {
        self.single_reading(resource_id, "current")
    }

    /// Cumulative meter register value for a resource.
    ///
    /// The gas endpoint returns the electricity register; use
    /// [`Client::gas_meter_read`] for gas.
    pub fn meter_read(&self, resource_id: &str) -> Result<Reading> {
        self.single_reading(resource_id, "meterread")
    }

    pub fn tariff(&self, resource_id: &str) -> Result<Tariff> {
        let session = self.require_session()?;
        let url = self.resource_endpoint(resource_id, Some("tariff"))?;
        let reply: TariffReply = self.get_json(session, url.clone(), Some(resource_id))?;
        reply.into_tariff(url.as_str())
    }

    fn single_reading(&self, resource_id: &str, kind: &str) -> Result<Reading> {
        let session = self.require_session()?;
        let url = self.resource_endpoint(resource_id, Some(kind))?;
        let reply: SeriesReply = self.get_json(session, url.clone(), Some(resource_id))?;
        reply
            .into_readings(url.as_str())?
            .into_iter()
            .next()
            .ok_or_else(|| Error::parse(url.as_str(), "reply carries no data points"))
    }

    /// Current electricity usage priced at the active tariff.
    pub fn electricity_current(&self) -> Result<CurrentUsage> {
        let resource = self.resource_for(ELECTRICITY_CONSUMPTION)?;
        let reading = self.current_reading(&resource.id)?;
        let tariff = self.tariff(&resource.id)?;
        Ok(CurrentUsage::priced(reading, tariff))
    }

    /// Gas usage over the last half hour, priced at the active tariff.
    pub fn gas_current(&self) -> Result<CurrentUsage> {
        self.gas_current_at(Utc::now())
    }

    /// [`Client::gas_current`] for the half hour ending at `now`.
    ///
    /// Gas meters report every 30 minutes, so this sums the `PT30M` window
    /// ending at `now` truncated to the minute.
    pub fn gas_current_at(&self, now: DateTime<Utc>) -> Result<CurrentUsage> {
        let resource = self.resource_for(GAS_CONSUMPTION)?;
        let end = now.duration_trunc(TimeDelta::minutes(1)).unwrap_or(now);
        let query = ReadingsQuery::new(end - TimeDelta::minutes(30), end, Period::HalfHour);
        let reading = self
            .query_readings(&resource.id, &query)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::parse(resource.id.as_str(), "no gas usage in the last half hour"))?;
        let tariff = self.tariff(&resource.id)?;
        Ok(CurrentUsage::priced(reading, tariff))
    }

    /// Gas meter register.
    ///
    /// Takes the unit from `/meterread` and the register from gas `/current`
    /// (scaled by 1000 into that unit).
    pub fn gas_meter_read(&self) -> Result<Reading> {
        let resource = self.resource_for(GAS_CONSUMPTION)?;
        let unit = self.meter_read(&resource.id)?.unit;
        let register = self.current_reading(&resource.id)?;
        Ok(Reading {
            timestamp: register.timestamp,
            value: register.value * 1000.0,
            unit,
        })
    }

    fn resource_for(&self, classifier: &str) -> Result<Resource> {
        self.find_resource(classifier)?
            .ok_or_else(|| Error::NotFound(classifier.to_string()))
    }

    fn require_session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(Error::NotAuthenticated)
    }

    fn resource_endpoint(&self, resource_id: &str, suffix: Option<&str>) -> Result<Url> {
        if resource_id.trim().is_empty() {
            return Err(Error::EmptyResourceId);
        }
        match suffix {
            Some(suffix) => self.endpoint(&["resource", resource_id, suffix]),
            None => self.endpoint(&["resource", resource_id]),
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let invalid = |reason: String| Error::InvalidUrl {
            url: self.base_url.clone(),
            reason,
        };
        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| invalid("cannot be a base URL".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    // `resource_id` is set for resource-scoped endpoints, where 404 means the
    // resource does not exist.
    fn get_json<R: DeserializeOwned>(
        &self,
        session: &Session,
        url: Url,
        resource_id: Option<&str>,
    ) -> Result<R> {
        let request = Request::get(url)
            .header("applicationId", session.application_id.as_str())
            .header("token", session.token.as_str())
            .header("Content-Type", "application/json");

        log::debug!("GET {}", request.url);
        let resp = self.transport.send(&request)?;
        if !resp.is_success() {
            if let (404, Some(id)) = (resp.status, resource_id) {
                return Err(Error::NotFound(id.to_string()));
            }
            return Err(Error::Api {
                status: resp.status,
                body: resp.body,
            });
        }

        serde_json::from_str::<R>(&resp.body).map_err(|e| Error::parse(request.url.as_str(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Response;

    struct Unreachable;

    impl Transport for Unreachable {
        fn send(&self, request: &Request) -> Result<Response> {
            panic!("unexpected request to {}", request.url)
        }
    }

    #[test]
    fn endpoints_escape_resource_ids() {
        let client = Client::with_transport(Unreachable);
        let url = client.endpoint(&["resource", "a/b c", "readings"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.glowmarkt.com/api/v0-1/resource/a%2Fb%20c/readings"
        );
    }

    #[test]
    fn blank_resource_ids_are_rejected() {
        let client = Client::with_transport(Unreachable);
        for id in ["", "  "] {
            assert!(matches!(
                client.resource_endpoint(id, Some("readings")),
                Err(Error::EmptyResourceId)
            ));
        }
        assert!(client.resource_endpoint("r1", None).is_ok());
    }

    #[test]
    fn trailing_slash_in_base_url_is_tolerated() {
        let client =
            Client::with_transport(Unreachable).with_base_url("http://localhost:8080/api/v0-1/");
        let url = client.endpoint(&["auth"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/v0-1/auth");
    }

    #[test]
    fn invalid_base_url_is_reported() {
        let client = Client::with_transport(Unreachable).with_base_url("not a url");
        assert!(matches!(
            client.endpoint(&["auth"]),
            Err(Error::InvalidUrl { .. })
        ));
    }

    #[test]
    fn session_expiry() {
        let session = Session {
            application_id: "app".into(),
            token: "secret".into(),
            expiry: DateTime::<Utc>::from_timestamp(1_000, 0),
            account_id: None,
        };
        assert!(!session.is_expired(DateTime::<Utc>::from_timestamp(999, 0).unwrap()));
        assert!(session.is_expired(DateTime::<Utc>::from_timestamp(1_000, 0).unwrap()));
        assert!(!format!("{:?}", session).contains("secret"));
    }
}
