//! Translation between the internal analytics taxonomy and the publisher
//! event vocabulary.

use swg_sdk::objects::PublisherEventName;

use super::types::AnalyticsEvent;

/// Publisher-facing name for an internal event, if the event has one.
pub fn analytics_event_to_publisher_event(event: AnalyticsEvent) -> Option<PublisherEventName> {
    match event {
        AnalyticsEvent::ImpressionPaywall => Some(PublisherEventName::ImpressionPaywall),
        AnalyticsEvent::ImpressionAd => Some(PublisherEventName::ImpressionAd),
        AnalyticsEvent::ImpressionOffers => Some(PublisherEventName::ImpressionOffers),
        AnalyticsEvent::ActionSubscriptionsLandingPage => {
            Some(PublisherEventName::ActionSubscriptionsLandingPage)
        }
        AnalyticsEvent::ActionOfferSelected => Some(PublisherEventName::ActionOfferSelected),
        AnalyticsEvent::ActionPaymentFlowStarted => {
            Some(PublisherEventName::ActionPaymentFlowStarted)
        }
        AnalyticsEvent::ActionPaymentComplete => Some(PublisherEventName::ActionPaymentCompleted),
        AnalyticsEvent::EventCustom => Some(PublisherEventName::EventCustom),
        _ => None,
    }
}

/// Internal event kind for a publisher-facing name.
pub fn publisher_event_to_analytics_event(name: PublisherEventName) -> AnalyticsEvent {
    match name {
        PublisherEventName::ImpressionPaywall => AnalyticsEvent::ImpressionPaywall,
        PublisherEventName::ImpressionAd => AnalyticsEvent::ImpressionAd,
        PublisherEventName::ImpressionOffers => AnalyticsEvent::ImpressionOffers,
        PublisherEventName::ActionSubscriptionsLandingPage => {
            AnalyticsEvent::ActionSubscriptionsLandingPage
        }
        PublisherEventName::ActionOfferSelected => AnalyticsEvent::ActionOfferSelected,
        PublisherEventName::ActionPaymentFlowStarted => AnalyticsEvent::ActionPaymentFlowStarted,
        PublisherEventName::ActionPaymentCompleted => AnalyticsEvent::ActionPaymentComplete,
        PublisherEventName::EventCustom => AnalyticsEvent::EventCustom,
    }
}
