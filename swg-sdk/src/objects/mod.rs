pub mod propensity;
pub mod publisher;

pub use propensity::{
    BUCKETED_SCORE_TYPE, NO_VALID_RESPONSE, PropensityScore, Score, ScoreBody, ScoreDetail,
    ScoreHeader, parse_propensity_response,
};
pub use publisher::{ParseNameError, PropensityType, PublisherEventName, SubscriptionState, UserEvent};
