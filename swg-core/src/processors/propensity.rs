//! Publisher-facing propensity API.
//!
//! [`Propensity`] produces events into the [`ClientEventManager`] with the
//! `PropensityClient` originator and answers score queries through the
//! [`PropensityServer`].

use std::sync::Arc;

use serde_json::{Map, Value};
use swg_sdk::client::ClientError;
use swg_sdk::objects::{PropensityScore, PropensityType, SubscriptionState, UserEvent};
use thiserror::Error;
use tracing::debug;

use super::propensity_server::PropensityServer;
use crate::events::{
    AdditionalParameters, AnalyticsEvent, ClientEvent, ClientEventManager, EventOriginator,
    publisher_event_to_analytics_event,
};

#[derive(Debug, Error)]
pub enum PropensityError {
    #[error("entitlements must be a JSON object")]
    InvalidEntitlements,
    #[error("entitlements must be provided for state {0}")]
    MissingEntitlements(SubscriptionState),
    #[error(transparent)]
    Client(#[from] ClientError),
}

#[derive(Clone)]
pub struct Propensity {
    events: ClientEventManager,
    server: Arc<PropensityServer>,
}

impl Propensity {
    pub fn new(events: ClientEventManager, server: Arc<PropensityServer>) -> Self {
        Self { events, server }
    }

    /// Report the reader's subscription state.
    ///
    /// `entitlements` must be a JSON object when given. It is required for
    /// subscribers and past subscribers.
    pub fn send_subscription_state(
        &self,
        state: SubscriptionState,
        entitlements: Option<Value>,
    ) -> Result<(), PropensityError> {
        if entitlements.as_ref().is_some_and(|e| !e.is_object()) {
            return Err(PropensityError::InvalidEntitlements);
        }
        if state.requires_entitlements() && entitlements.is_none() {
            return Err(PropensityError::MissingEntitlements(state));
        }

        let mut params = Map::new();
        params.insert("state".to_owned(), Value::String(state.as_str().to_owned()));
        params.insert(
            "productsOrSkus".to_owned(),
            entitlements.map_or(Value::Null, |e| Value::String(e.to_string())),
        );
        debug!(%state, "Logging subscription state");
        self.events.log_event(
            ClientEvent::new(
                AnalyticsEvent::EventSubscriptionState,
                EventOriginator::PropensityClient,
            )
            .with_parameters(AdditionalParameters::Json(params)),
            None,
        );
        Ok(())
    }

    /// Report a publisher event.
    pub fn send_event(&self, event: UserEvent) {
        let mut client_event = ClientEvent::new(
            publisher_event_to_analytics_event(event.name),
            EventOriginator::PropensityClient,
        )
        .with_user_action(event.active);
        if let Some(data) = event.data {
            client_event = client_event.with_parameters(AdditionalParameters::Json(data));
        }
        self.events.log_event(client_event, None);
    }

    /// Query the propensity score for the current page.
    pub async fn get_propensity(
        &self,
        propensity_type: Option<PropensityType>,
    ) -> Result<PropensityScore, PropensityError> {
        let referrer = self.server.referrer();
        let score = self
            .server
            .get_propensity(&referrer, propensity_type.unwrap_or_default())
            .await?;
        Ok(score)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::{ClientConfig, ConfigStore, PropensityServerConfig};
    use crate::context::StaticDocument;
    use crate::events::ReadyGate;
    use async_trait::async_trait;
    use bytes::Bytes;
    use serde_json::json;
    use swg_sdk::client::Fetcher;
    use swg_sdk::objects::PublisherEventName;
    use tokio::sync::mpsc;
    use url::Url;

    struct RecordingFetcher {
        urls: mpsc::UnboundedSender<Url>,
    }

    #[async_trait]
    impl Fetcher for RecordingFetcher {
        async fn fetch(&self, url: Url) -> Result<Bytes, ClientError> {
            let _ = self.urls.send(url);
            Ok(Bytes::from_static(br#"{"header":{"ok":false},"error":"none"}"#))
        }
    }

    struct Harness {
        propensity: Propensity,
        manager: ClientEventManager,
        events: mpsc::UnboundedReceiver<ClientEvent>,
        urls: mpsc::UnboundedReceiver<Url>,
    }

    fn harness() -> Harness {
        let manager = ClientEventManager::new(ReadyGate::resolved());
        let (event_tx, events) = mpsc::unbounded_channel();
        manager.register_event_listener(move |event: &ClientEvent, _| {
            event_tx.send(event.clone())?;
            Ok(())
        });
        let (url_tx, urls) = mpsc::unbounded_channel();
        let server = PropensityServer::register(
            &manager,
            PropensityServerConfig::new("pub1").unwrap(),
            ConfigStore::new(ClientConfig::default()),
            Arc::new(RecordingFetcher { urls: url_tx }),
            Arc::new(
                StaticDocument::new("example.com")
                    .with_referrer("https://ref.example/")
                    .with_timezone_offset(0),
            ),
        );
        Harness {
            propensity: Propensity::new(manager.clone(), server),
            manager,
            events,
            urls,
        }
    }

    #[tokio::test]
    async fn test_subscriber_requires_entitlements() {
        let mut h = harness();
        let err = h
            .propensity
            .send_subscription_state(SubscriptionState::Subscriber, None)
            .unwrap_err();
        assert!(matches!(
            err,
            PropensityError::MissingEntitlements(SubscriptionState::Subscriber)
        ));

        let err = h
            .propensity
            .send_subscription_state(SubscriptionState::PastSubscriber, Some(json!("basic")))
            .unwrap_err();
        assert!(matches!(err, PropensityError::InvalidEntitlements));

        h.manager.last_dispatch().await;
        assert!(h.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_subscription_state_is_logged_and_reported() {
        let mut h = harness();
        h.propensity
            .send_subscription_state(SubscriptionState::Subscriber, Some(json!({"product": ["a"]})))
            .unwrap();
        h.manager.last_dispatch().await;

        let event = h.events.recv().await.unwrap();
        assert_eq!(event.event_type, AnalyticsEvent::EventSubscriptionState);
        assert_eq!(event.event_originator, EventOriginator::PropensityClient);
        let params = event.additional_parameters.unwrap();
        assert_eq!(
            Value::Object(params.as_json().unwrap().clone()),
            json!({"state": "subscriber", "productsOrSkus": r#"{"product":["a"]}"#})
        );

        let url = h.urls.recv().await.unwrap();
        let states = url
            .query_pairs()
            .find(|(key, _)| key == "states")
            .map(|(_, value)| value.into_owned())
            .unwrap();
        assert_eq!(
            states,
            format!("pub1:subscriber:{}", urlencoding::encode(r#"{"product":["a"]}"#))
        );
    }

    #[tokio::test]
    async fn test_non_subscriber_without_entitlements() {
        let mut h = harness();
        h.propensity
            .send_subscription_state(SubscriptionState::NonSubscriber, None)
            .unwrap();
        h.manager.last_dispatch().await;

        let event = h.events.recv().await.unwrap();
        let params = event.additional_parameters.unwrap();
        assert_eq!(params.as_json().unwrap()["productsOrSkus"], Value::Null);
    }

    #[tokio::test]
    async fn test_send_event_maps_name_and_copies_data() {
        let mut h = harness();
        let mut event = UserEvent::new(PublisherEventName::ActionPaymentCompleted);
        event.active = Some(true);
        event.data = json!({"amount": 5}).as_object().cloned();
        h.propensity.send_event(event);
        h.manager.last_dispatch().await;

        let event = h.events.recv().await.unwrap();
        assert_eq!(event.event_type, AnalyticsEvent::ActionPaymentComplete);
        assert_eq!(event.event_originator, EventOriginator::PropensityClient);
        assert_eq!(event.is_from_user_action, Some(true));
        assert_eq!(
            event.additional_parameters,
            Some(AdditionalParameters::Json(
                json!({"amount": 5}).as_object().unwrap().clone()
            ))
        );
        assert!(ClientEventManager::is_publisher_event(&event));
    }

    #[tokio::test]
    async fn test_get_propensity_defaults_to_general_and_uses_referrer() {
        let mut h = harness();
        let score = h.propensity.get_propensity(None).await.unwrap();
        assert!(!score.header.ok);
        assert_eq!(score.error(), Some("none"));

        let url = h.urls.recv().await.unwrap();
        let query: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(query["type"], "general");
        assert_eq!(query["ref"], "https://ref.example/");
    }
}
