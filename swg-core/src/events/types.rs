//! Event type definitions for the analytics dispatch pipeline.
//!
//! Every event carries an [`AnalyticsEvent`] kind and the
//! [`EventOriginator`] that produced it. Both are closed enums; untrusted
//! input is checked once at the JSON boundary in [`ClientEvent::from_json`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

macro_rules! analytics_events {
    ($($variant:ident = $code:literal => $name:literal,)+) => {
        /// Internal analytics event kinds, numbered as in the analytics proto.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(i32)]
        pub enum AnalyticsEvent {
            $($variant = $code,)+
        }

        impl AnalyticsEvent {
            pub const ALL: &'static [AnalyticsEvent] = &[$(AnalyticsEvent::$variant,)+];

            pub fn code(self) -> i32 {
                self as i32
            }

            pub fn from_code(code: i64) -> Option<Self> {
                match code {
                    $($code => Some(AnalyticsEvent::$variant),)+
                    _ => None,
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(AnalyticsEvent::$variant => $name,)+
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(AnalyticsEvent::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

analytics_events! {
    Unknown = 0 => "UNKNOWN",
    ImpressionPaywall = 1 => "IMPRESSION_PAYWALL",
    ImpressionAd = 2 => "IMPRESSION_AD",
    ImpressionOffers = 3 => "IMPRESSION_OFFERS",
    ImpressionSubscribeButton = 4 => "IMPRESSION_SUBSCRIBE_BUTTON",
    ImpressionSmartbox = 5 => "IMPRESSION_SMARTBOX",
    ImpressionSwgButton = 6 => "IMPRESSION_SWG_BUTTON",
    ImpressionClickToShowOffers = 7 => "IMPRESSION_CLICK_TO_SHOW_OFFERS",
    ImpressionClickToShowOffersOrAlreadySubscribed = 8 => "IMPRESSION_CLICK_TO_SHOW_OFFERS_OR_ALREADY_SUBSCRIBED",
    ImpressionSubscriptionComplete = 9 => "IMPRESSION_SUBSCRIPTION_COMPLETE",
    ImpressionAccountChanged = 10 => "IMPRESSION_ACCOUNT_CHANGED",
    ImpressionPageLoad = 11 => "IMPRESSION_PAGE_LOAD",
    ImpressionLink = 12 => "IMPRESSION_LINK",
    ImpressionSaveSubscrToGoogle = 13 => "IMPRESSION_SAVE_SUBSCR_TO_GOOGLE",
    ImpressionGoogleUpdated = 14 => "IMPRESSION_GOOGLE_UPDATED",
    ImpressionShowOffersSmartbox = 15 => "IMPRESSION_SHOW_OFFERS_SMARTBOX",
    ImpressionShowOffersSwgButton = 16 => "IMPRESSION_SHOW_OFFERS_SWG_BUTTON",
    ImpressionSelectOfferSmartbox = 17 => "IMPRESSION_SELECT_OFFER_SMARTBOX",
    ImpressionSelectOfferSwgButton = 18 => "IMPRESSION_SELECT_OFFER_SWG_BUTTON",
    ImpressionShowContributionsSwgButton = 19 => "IMPRESSION_SHOW_CONTRIBUTIONS_SWG_BUTTON",
    ImpressionSelectContributionSwgButton = 20 => "IMPRESSION_SELECT_CONTRIBUTION_SWG_BUTTON",
    ImpressionMeterToast = 21 => "IMPRESSION_METER_TOAST",
    ImpressionRegwall = 22 => "IMPRESSION_REGWALL",
    ImpressionShowcaseRegwall = 23 => "IMPRESSION_SHOWCASE_REGWALL",
    ActionSubscribe = 1000 => "ACTION_SUBSCRIBE",
    ActionPaymentComplete = 1001 => "ACTION_PAYMENT_COMPLETE",
    ActionAccountCreated = 1002 => "ACTION_ACCOUNT_CREATED",
    ActionAccountAcknowledged = 1003 => "ACTION_ACCOUNT_ACKNOWLEDGED",
    ActionSubscriptionsLandingPage = 1004 => "ACTION_SUBSCRIPTIONS_LANDING_PAGE",
    ActionPaymentFlowStarted = 1005 => "ACTION_PAYMENT_FLOW_STARTED",
    ActionOfferSelected = 1006 => "ACTION_OFFER_SELECTED",
    ActionSwgButtonClick = 1007 => "ACTION_SWG_BUTTON_CLICK",
    ActionViewOffers = 1008 => "ACTION_VIEW_OFFERS",
    ActionAlreadySubscribed = 1009 => "ACTION_ALREADY_SUBSCRIBED",
    ActionNewDeferredAccount = 1010 => "ACTION_NEW_DEFERRED_ACCOUNT",
    ActionLinkContinue = 1011 => "ACTION_LINK_CONTINUE",
    ActionLinkCancel = 1012 => "ACTION_LINK_CANCEL",
    ActionGoogleUpdatedClose = 1013 => "ACTION_GOOGLE_UPDATED_CLOSE",
    EventPaymentFailed = 2000 => "EVENT_PAYMENT_FAILED",
    EventCustom = 3000 => "EVENT_CUSTOM",
    EventConfirmTxId = 3001 => "EVENT_CONFIRM_TX_ID",
    EventChangedTxId = 3002 => "EVENT_CHANGED_TX_ID",
    EventGpayNoTxId = 3003 => "EVENT_GPAY_NO_TX_ID",
    EventGpayCannotConfirmTxId = 3004 => "EVENT_GPAY_CANNOT_CONFIRM_TX_ID",
    EventGoogleUpdated = 3005 => "EVENT_GOOGLE_UPDATED",
    EventNewTxId = 3006 => "EVENT_NEW_TX_ID",
    EventUnlockedBySubscription = 3007 => "EVENT_UNLOCKED_BY_SUBSCRIPTION",
    EventUnlockedByMeter = 3008 => "EVENT_UNLOCKED_BY_METER",
    EventNoEntitlements = 3009 => "EVENT_NO_ENTITLEMENTS",
    EventHasMeteringEntitlements = 3010 => "EVENT_HAS_METERING_ENTITLEMENTS",
    EventOfferedMeter = 3011 => "EVENT_OFFERED_METER",
    EventUnlockedFreePage = 3012 => "EVENT_UNLOCKED_FREE_PAGE",
    EventSubscriptionState = 4000 => "EVENT_SUBSCRIPTION_STATE",
}

impl std::fmt::Display for AnalyticsEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The subsystem that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum EventOriginator {
    UnknownClient = 0,
    SwgClient = 1,
    AmpClient = 2,
    PropensityClient = 3,
    SwgServer = 4,
    PublisherClient = 5,
    ShowcaseClient = 6,
}

impl EventOriginator {
    pub const ALL: [EventOriginator; 7] = [
        EventOriginator::UnknownClient,
        EventOriginator::SwgClient,
        EventOriginator::AmpClient,
        EventOriginator::PropensityClient,
        EventOriginator::SwgServer,
        EventOriginator::PublisherClient,
        EventOriginator::ShowcaseClient,
    ];

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|o| i64::from(o.code()) == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            EventOriginator::UnknownClient => "UNKNOWN_CLIENT",
            EventOriginator::SwgClient => "SWG_CLIENT",
            EventOriginator::AmpClient => "AMP_CLIENT",
            EventOriginator::PropensityClient => "PROPENSITY_CLIENT",
            EventOriginator::SwgServer => "SWG_SERVER",
            EventOriginator::PublisherClient => "PUBLISHER_CLIENT",
            EventOriginator::ShowcaseClient => "SHOWCASE_CLIENT",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.name() == name)
    }
}

impl std::fmt::Display for EventOriginator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Verdict returned by an event filterer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterResult {
    /// Let the event continue to the next filterer and the listeners.
    ProcessEvent,
    /// Stop dispatch of this event.
    CancelEvent,
}

/// Parameter container private to the analytics pipeline.
///
/// Listeners may read it, but it must never leave the process verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventParams {
    pub smartbox_message: Option<String>,
    pub gpay_transaction_id: Option<String>,
    pub had_logged: Option<bool>,
    pub sku: Option<String>,
    pub old_transaction_id: Option<String>,
    pub is_user_registered: Option<bool>,
    pub subscription_flow: Option<String>,
}

/// Extra data attached to a [`ClientEvent`].
#[derive(Debug, Clone, PartialEq)]
pub enum AdditionalParameters {
    /// Opaque key/value mapping supplied by the producer.
    Json(Map<String, Value>),
    /// Internal parameter container, see [`EventParams`].
    Internal(EventParams),
}

impl AdditionalParameters {
    pub fn as_json(&self) -> Option<&Map<String, Value>> {
        match self {
            AdditionalParameters::Json(map) => Some(map),
            AdditionalParameters::Internal(_) => None,
        }
    }
}

/// The unit of dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientEvent {
    pub event_type: AnalyticsEvent,
    pub event_originator: EventOriginator,
    pub additional_parameters: Option<AdditionalParameters>,
    pub is_from_user_action: Option<bool>,
}

/// Why an untrusted event was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EventValidationError {
    #[error("event must be an object")]
    NotAnObject,
    #[error("event must have a valid eventType")]
    MissingEventType,
    #[error("unknown eventType: {0}")]
    InvalidEventType(Value),
    #[error("event must have a valid eventOriginator")]
    MissingEventOriginator,
    #[error("unknown eventOriginator: {0}")]
    InvalidEventOriginator(Value),
    #[error("event.additionalParameters must be an object if it exists")]
    InvalidAdditionalParameters,
    #[error("event.isFromUserAction must be a boolean if it exists")]
    InvalidUserAction,
}

impl ClientEvent {
    pub fn new(event_type: AnalyticsEvent, event_originator: EventOriginator) -> Self {
        Self {
            event_type,
            event_originator,
            additional_parameters: None,
            is_from_user_action: None,
        }
    }

    pub fn with_parameters(mut self, params: AdditionalParameters) -> Self {
        self.additional_parameters = Some(params);
        self
    }

    pub fn with_user_action(mut self, is_from_user_action: Option<bool>) -> Self {
        self.is_from_user_action = is_from_user_action;
        self
    }

    /// Validate and convert an event received from an untrusted producer.
    ///
    /// `eventType` and `eventOriginator` may be given as proto codes or as
    /// their `SCREAMING_SNAKE` names. Null optional fields count as absent.
    pub fn from_json(value: &Value) -> Result<Self, EventValidationError> {
        let object = value.as_object().ok_or(EventValidationError::NotAnObject)?;

        let event_type = match object.get("eventType") {
            None | Some(Value::Null) => return Err(EventValidationError::MissingEventType),
            Some(raw) => parse_enum(raw, AnalyticsEvent::from_code, AnalyticsEvent::from_name)
                .ok_or_else(|| EventValidationError::InvalidEventType(raw.clone()))?,
        };

        let event_originator = match object.get("eventOriginator") {
            None | Some(Value::Null) => return Err(EventValidationError::MissingEventOriginator),
            Some(raw) => parse_enum(raw, EventOriginator::from_code, EventOriginator::from_name)
                .ok_or_else(|| EventValidationError::InvalidEventOriginator(raw.clone()))?,
        };

        let additional_parameters = match object.get("additionalParameters") {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) => Some(AdditionalParameters::Json(map.clone())),
            Some(_) => return Err(EventValidationError::InvalidAdditionalParameters),
        };

        let is_from_user_action = match object.get("isFromUserAction") {
            None | Some(Value::Null) => None,
            Some(Value::Bool(b)) => Some(*b),
            Some(_) => return Err(EventValidationError::InvalidUserAction),
        };

        Ok(Self {
            event_type,
            event_originator,
            additional_parameters,
            is_from_user_action,
        })
    }
}

fn parse_enum<T>(
    raw: &Value,
    from_code: impl Fn(i64) -> Option<T>,
    from_name: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    match raw {
        Value::Number(n) => n.as_i64().and_then(from_code),
        Value::String(s) => from_name(s),
        _ => None,
    }
}
