//! Publisher-facing event vocabulary.
//!
//! These are the names publishers use when they talk to the propensity
//! endpoint. The internal analytics taxonomy lives in `swg-core`; the mapping
//! between the two is owned by the core crate.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a publisher-supplied string is not part of the
/// vocabulary it is parsed into.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseNameError {
    #[error("invalid user event provided ({0})")]
    UserEvent(String),
    #[error("invalid subscription state provided ({0})")]
    SubscriptionState(String),
    #[error("invalid propensity type requested ({0})")]
    PropensityType(String),
}

/// Event names understood by the propensity endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PublisherEventName {
    #[serde(rename = "paywall")]
    ImpressionPaywall,
    #[serde(rename = "ad_shown")]
    ImpressionAd,
    #[serde(rename = "offers_shown")]
    ImpressionOffers,
    #[serde(rename = "subscriptions_landing_page")]
    ActionSubscriptionsLandingPage,
    #[serde(rename = "offer_selected")]
    ActionOfferSelected,
    #[serde(rename = "payment_flow_start")]
    ActionPaymentFlowStarted,
    #[serde(rename = "payment_complete")]
    ActionPaymentCompleted,
    #[serde(rename = "custom")]
    EventCustom,
}

impl PublisherEventName {
    pub const ALL: [PublisherEventName; 8] = [
        PublisherEventName::ImpressionPaywall,
        PublisherEventName::ImpressionAd,
        PublisherEventName::ImpressionOffers,
        PublisherEventName::ActionSubscriptionsLandingPage,
        PublisherEventName::ActionOfferSelected,
        PublisherEventName::ActionPaymentFlowStarted,
        PublisherEventName::ActionPaymentCompleted,
        PublisherEventName::EventCustom,
    ];

    /// The wire name sent in the `events` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            PublisherEventName::ImpressionPaywall => "paywall",
            PublisherEventName::ImpressionAd => "ad_shown",
            PublisherEventName::ImpressionOffers => "offers_shown",
            PublisherEventName::ActionSubscriptionsLandingPage => "subscriptions_landing_page",
            PublisherEventName::ActionOfferSelected => "offer_selected",
            PublisherEventName::ActionPaymentFlowStarted => "payment_flow_start",
            PublisherEventName::ActionPaymentCompleted => "payment_complete",
            PublisherEventName::EventCustom => "custom",
        }
    }
}

impl std::fmt::Display for PublisherEventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PublisherEventName {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| ParseNameError::UserEvent(s.to_owned()))
    }
}

/// Subscription state a publisher reports for the current reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
    Unknown,
    Subscriber,
    NonSubscriber,
    PastSubscriber,
}

impl SubscriptionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionState::Unknown => "unknown",
            SubscriptionState::Subscriber => "subscriber",
            SubscriptionState::NonSubscriber => "non_subscriber",
            SubscriptionState::PastSubscriber => "past_subscriber",
        }
    }

    /// Subscribers and past subscribers must report their entitlements.
    pub fn requires_entitlements(&self) -> bool {
        matches!(
            self,
            SubscriptionState::Subscriber | SubscriptionState::PastSubscriber
        )
    }
}

impl std::fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionState {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(SubscriptionState::Unknown),
            "subscriber" => Ok(SubscriptionState::Subscriber),
            "non_subscriber" => Ok(SubscriptionState::NonSubscriber),
            "past_subscriber" => Ok(SubscriptionState::PastSubscriber),
            other => Err(ParseNameError::SubscriptionState(other.to_owned())),
        }
    }
}

/// Kind of score requested from the scoring endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropensityType {
    #[default]
    General,
    Paywall,
}

impl PropensityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropensityType::General => "general",
            PropensityType::Paywall => "paywall",
        }
    }
}

impl std::fmt::Display for PropensityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropensityType {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "general" => Ok(PropensityType::General),
            "paywall" => Ok(PropensityType::Paywall),
            other => Err(ParseNameError::PropensityType(other.to_owned())),
        }
    }
}

/// An event reported by the publisher page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserEvent {
    pub name: PublisherEventName,
    /// Whether a human action triggered the event.
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub data: Option<serde_json::Map<String, serde_json::Value>>,
}

impl UserEvent {
    pub fn new(name: PublisherEventName) -> Self {
        Self {
            name,
            active: None,
            data: None,
        }
    }
}
