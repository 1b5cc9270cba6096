use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RelayError;

/// The participant type a subscription record was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ParticipantType {
    Bap,
    Bpp,
    Bg,
}

/// Lifecycle status of a subscriber record. A registry-subscribe request always
/// lands in `UnderSubscription`; later transitions are out of this core's scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    Initiated,
    UnderSubscription,
    Subscribed,
    Expired,
    Unsubscribed,
    InvalidSsl,
}

/// An identity/key record for a network participant, keyed by `subscriber_id`
/// within a cache namespace (`subscriber:{subscriber_id}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub subscriber_id: String,
    pub url: String,
    #[serde(rename = "type")]
    pub participant_type: ParticipantType,
    pub domain: String,
    pub key_id: String,
    pub signing_public_key: String,
    pub encr_public_key: String,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub status: SubscriptionStatus,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    #[serde(default)]
    pub nonce: String,
}

impl Subscription {
    /// Validates the `valid_from <= valid_until` invariant. Status and
    /// `subscriber_id` uniqueness are enforced by the type system and the
    /// cache namespace respectively, not here.
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.valid_from > self.valid_until {
            return Err(RelayError::BadRequest(format!(
                "subscription {}: valid_from ({}) is after valid_until ({})",
                self.subscriber_id, self.valid_from, self.valid_until
            )));
        }
        Ok(())
    }

    pub fn cache_key(subscriber_id: &str) -> String {
        format!("subscriber:{subscriber_id}")
    }

    pub fn private_cache_key(subscriber_id: &str) -> String {
        format!("private:{subscriber_id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Subscription {
        let now = Utc::now();
        Subscription {
            subscriber_id: "np-9".into(),
            url: "https://np-9.example".into(),
            participant_type: ParticipantType::Bpp,
            domain: "retail".into(),
            key_id: "key-1".into(),
            signing_public_key: "c2lnbmluZw==".into(),
            encr_public_key: "ZW5jcg==".into(),
            valid_from: now,
            valid_until: now + chrono::Duration::hours(48),
            status: SubscriptionStatus::UnderSubscription,
            created: now,
            updated: now,
            nonce: "n1".into(),
        }
    }

    #[test]
    fn valid_from_before_valid_until_passes() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn valid_from_after_valid_until_fails() {
        let mut sub = sample();
        sub.valid_from = sub.valid_until + chrono::Duration::hours(1);
        assert!(sub.validate().is_err());
    }

    #[test]
    fn cache_keys_are_namespaced() {
        assert_eq!(Subscription::cache_key("np-9"), "subscriber:np-9");
        assert_eq!(Subscription::private_cache_key("np-9"), "private:np-9");
    }

    #[test]
    fn status_roundtrips_as_screaming_snake_case() {
        let v = serde_json::to_value(SubscriptionStatus::UnderSubscription).unwrap();
        assert_eq!(v, "UNDER_SUBSCRIPTION");
    }
}
