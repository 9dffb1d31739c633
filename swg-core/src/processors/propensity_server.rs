//! PropensityServer processor.
//!
//! The PropensityServer is responsible for:
//! - Listening to every event dispatched by the `ClientEventManager`
//! - Deciding which events the propensity endpoint may see and translating
//!   them into the publisher vocabulary
//! - Reporting subscription states and events (fire-and-forget `GET`s)
//! - Querying propensity scores and parsing the untrusted response
//!
//! Outbound URLs always end with the same parameters, in this order:
//! `u_tz`, `v`, `cookie` (when the `__gads` cookie is present) and `cdm`.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use kanau::processor::Processor;
use serde_json::{Map, Value};
use swg_sdk::client::{ClientError, Fetcher};
use swg_sdk::objects::{
    PropensityScore, PropensityType, PublisherEventName, parse_propensity_response,
};
use tokio::runtime::Handle;
use tokio::task::JoinSet;
use tracing::{debug, warn};
use url::Url;

use crate::config::{ClientConfig, ConfigStore, PropensityServerConfig};
use crate::context::DocumentContext;
use crate::events::{
    AdditionalParameters, AnalyticsEvent, ClientEvent, ClientEventManager, EventOriginator,
    analytics_event_to_publisher_event,
};
use crate::utils::cookie::find_cookie;

/// Cookie holding the client identifier.
pub const CLIENT_ID_COOKIE: &str = "__gads";

/// Path of the reporting endpoint.
const DATA_PATH: &str = "/subopt/data";

/// Path of the scoring endpoint.
const SCORE_PATH: &str = "/subopt/pts";

/// Pull query for a propensity score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetPropensity {
    pub referrer: String,
    pub propensity_type: PropensityType,
}

/// Client of the propensity endpoint.
pub struct PropensityServer {
    config: PropensityServerConfig,
    client_config: ConfigStore<ClientConfig>,
    fetcher: Arc<dyn Fetcher>,
    document: Arc<dyn DocumentContext>,
    client_id: OnceLock<String>,
    runtime: Option<Handle>,
    reports: Mutex<JoinSet<()>>,
}

impl PropensityServer {
    /// Create a new PropensityServer.
    ///
    /// # Arguments
    ///
    /// * `config` - Publication id and endpoint location
    /// * `client_config` - Live configuration holding `enable_propensity`
    /// * `fetcher` - Transport for outbound requests
    /// * `document` - Cookie, hostname and referrer of the page
    ///
    /// Reports are sent on the runtime current at construction, falling back
    /// to the caller's runtime.
    pub fn new(
        config: PropensityServerConfig,
        client_config: ConfigStore<ClientConfig>,
        fetcher: Arc<dyn Fetcher>,
        document: Arc<dyn DocumentContext>,
    ) -> Self {
        Self {
            config,
            client_config,
            fetcher,
            document,
            client_id: OnceLock::new(),
            runtime: Handle::try_current().ok(),
            reports: Mutex::new(JoinSet::new()),
        }
    }

    /// Send reports on `runtime`.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Create a PropensityServer and register it as a listener on `events`.
    pub fn register(
        events: &ClientEventManager,
        config: PropensityServerConfig,
        client_config: ConfigStore<ClientConfig>,
        fetcher: Arc<dyn Fetcher>,
        document: Arc<dyn DocumentContext>,
    ) -> Arc<Self> {
        let server = Arc::new(Self::new(config, client_config, fetcher, document));
        let listener = Arc::clone(&server);
        events.register_event_listener(move |event, _| {
            listener.handle_client_event(event);
            Ok(())
        });
        server
    }

    /// Referrer of the hosting document.
    pub fn referrer(&self) -> String {
        self.document.referrer()
    }

    /// Percent-encoded `__gads` cookie value.
    ///
    /// Resolved on first use and kept for the server's lifetime; while the
    /// cookie is absent every call looks again.
    pub fn client_id(&self) -> Option<&str> {
        if let Some(id) = self.client_id.get() {
            return Some(id);
        }
        let cookies = self.document.cookie();
        let value = find_cookie(&cookies, CLIENT_ID_COOKIE)?;
        let encoded = urlencoding::encode(value).into_owned();
        Some(self.client_id.get_or_init(|| encoded))
    }

    // -- Listener -----------------------------------------------------------

    /// Forward an analytics event to the propensity endpoint when allowed.
    pub fn handle_client_event(&self, event: &ClientEvent) {
        // Showcase data is never shared with the propensity endpoint.
        if event.event_originator == EventOriginator::ShowcaseClient {
            return;
        }
        let enabled = self.client_config.read().enable_propensity;
        if !enabled && event.event_originator != EventOriginator::PropensityClient {
            return;
        }

        if event.event_type == AnalyticsEvent::EventSubscriptionState {
            let params = event
                .additional_parameters
                .as_ref()
                .and_then(AdditionalParameters::as_json);
            let Some(state) = params.and_then(|p| p.get("state")).and_then(Value::as_str) else {
                warn!(
                    originator = %event.event_originator,
                    "Subscription state event without a state, not reported"
                );
                return;
            };
            let products = params
                .and_then(|p| p.get("productsOrSkus"))
                .and_then(products_or_skus);
            self.send_subscription_state(state, products.as_deref());
            return;
        }

        let Some(name) = analytics_event_to_publisher_event(event.event_type) else {
            debug!(event_type = %event.event_type, "No publisher equivalent, event dropped");
            return;
        };
        let context = event_context(event);
        self.send_event(name, context.as_deref());
    }

    // -- Reports ------------------------------------------------------------

    /// Report the reader's subscription state.
    pub fn send_subscription_state(&self, state: &str, products_or_skus: Option<&str>) {
        self.send_report(self.subscription_state_url(state, products_or_skus));
    }

    /// Report a publisher event with an optional JSON context.
    pub fn send_event(&self, event: PublisherEventName, context: Option<&str>) {
        self.send_report(self.event_url(event, context));
    }

    fn send_report(&self, url: Result<Url, url::ParseError>) {
        let url = match url {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Failed to build propensity report URL");
                return;
            }
        };
        let Some(runtime) = self.runtime.clone().or_else(|| Handle::try_current().ok()) else {
            warn!(%url, "No tokio runtime available, propensity report dropped");
            return;
        };
        debug!(%url, "Sending propensity report");
        let fetcher = Arc::clone(&self.fetcher);
        let mut reports = self.reports.lock().unwrap_or_else(PoisonError::into_inner);
        while reports.try_join_next().is_some() {}
        reports.spawn_on(
            async move {
                if let Err(e) = fetcher.fetch(url).await {
                    warn!(error = %e, "Propensity report failed");
                }
            },
            &runtime,
        );
    }

    /// Wait for every report sent so far to finish.
    pub async fn flush(&self) {
        let mut reports =
            std::mem::take(&mut *self.reports.lock().unwrap_or_else(PoisonError::into_inner));
        while let Some(result) = reports.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "Report task did not complete");
            }
        }
    }

    // -- URLs ---------------------------------------------------------------

    /// URL of a subscription state report.
    pub fn subscription_state_url(
        &self,
        state: &str,
        products_or_skus: Option<&str>,
    ) -> Result<Url, url::ParseError> {
        let mut user_state = format!("{}:{state}", self.config.publication_id);
        if let Some(products) = products_or_skus.filter(|p| !p.is_empty()) {
            user_state.push(':');
            user_state.push_str(&urlencoding::encode(products));
        }
        self.propensity_url(DATA_PATH, vec![("states", encode(&user_state))])
    }

    /// URL of an event report.
    pub fn event_url(
        &self,
        event: PublisherEventName,
        context: Option<&str>,
    ) -> Result<Url, url::ParseError> {
        let event_info = format!("{}:{event}", self.config.publication_id);
        let mut query = vec![("events", encode(&event_info))];
        if let Some(context) = context.filter(|c| !c.is_empty()) {
            query.push(("extrainfo", encode(context)));
        }
        self.propensity_url(DATA_PATH, query)
    }

    /// URL of a score query.
    pub fn score_url(
        &self,
        referrer: &str,
        propensity_type: PropensityType,
    ) -> Result<Url, url::ParseError> {
        self.propensity_url(
            SCORE_PATH,
            vec![
                ("products", encode(&self.config.publication_id)),
                ("type", propensity_type.as_str().to_owned()),
                ("ref", encode(referrer)),
            ],
        )
    }

    /// Join `path` onto the base URL and append the common parameters.
    ///
    /// Query values must already be percent-encoded.
    fn propensity_url(
        &self,
        path: &str,
        mut query: Vec<(&'static str, String)>,
    ) -> Result<Url, url::ParseError> {
        query.push(("u_tz", self.document.timezone_offset_minutes().to_string()));
        query.push(("v", self.config.version.to_string()));
        if let Some(client_id) = self.client_id() {
            query.push(("cookie", client_id.to_owned()));
        }
        query.push(("cdm", encode(&self.document.hostname())));

        // Values are pre-encoded: `states` nests an encoded segment and spaces
        // must stay `%20`, which `query_pairs_mut` would re-encode.
        let query = query
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&");
        let mut url = self.config.base_url.join(path)?;
        url.set_query(Some(&query));
        Ok(url)
    }

    // -- Scores -------------------------------------------------------------

    /// Fetch and parse the propensity score for the current reader.
    ///
    /// Transport failures are returned as errors; a malformed response is
    /// turned into a failed [`PropensityScore`].
    pub async fn get_propensity(
        &self,
        referrer: &str,
        propensity_type: PropensityType,
    ) -> Result<PropensityScore, ClientError> {
        self.process(GetPropensity {
            referrer: referrer.to_owned(),
            propensity_type,
        })
        .await
    }
}

impl Processor<GetPropensity> for PropensityServer {
    type Output = PropensityScore;
    type Error = ClientError;

    #[tracing::instrument(skip_all, err, name = "HTTP:GetPropensity")]
    async fn process(&self, query: GetPropensity) -> Result<PropensityScore, ClientError> {
        let url = self.score_url(&query.referrer, query.propensity_type)?;
        let body = self.fetcher.fetch(url).await?;
        let score = match serde_json::from_slice::<Value>(&body) {
            Ok(response) => parse_propensity_response(&response),
            Err(e) => {
                warn!(error = %e, "Propensity response is not JSON");
                PropensityScore::invalid()
            }
        };
        Ok(score)
    }
}

fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

fn products_or_skus(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(_) | Value::Array(_) => Some(value.to_string()),
        _ => None,
    }
}

/// JSON context forwarded with an event report.
///
/// The internal [`EventParams`](crate::events::EventParams) container is never
/// forwarded. A boolean `is_from_user_action` is added as `is_active`.
fn event_context(event: &ClientEvent) -> Option<String> {
    let mut params = match &event.additional_parameters {
        Some(AdditionalParameters::Json(map)) => Some(map.clone()),
        Some(AdditionalParameters::Internal(_)) | None => None,
    };
    if let Some(active) = event.is_from_user_action {
        params
            .get_or_insert_with(Map::new)
            .insert("is_active".to_owned(), Value::Bool(active));
    }
    params.map(|params| Value::Object(params).to_string())
}
