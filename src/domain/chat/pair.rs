//! Unordered participant pair - the identity key of a conversation.

use serde::Serialize;

use crate::domain::foundation::{UserId, ValidationError};

/// The two users of a conversation, normalised so that `{A, B}` and
/// `{B, A}` compare equal.
///
/// Invariant: `low < high`. Two identical users cannot form a pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ParticipantPair {
    low: UserId,
    high: UserId,
}

impl ParticipantPair {
    /// Builds the normalised pair for two distinct users.
    pub fn new(a: UserId, b: UserId) -> Result<Self, ValidationError> {
        if a == b {
            return Err(ValidationError::invalid_format(
                "participants",
                "a conversation needs two distinct users",
            ));
        }
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        Ok(Self { low, high })
    }

    pub fn low(&self) -> &UserId {
        &self.low
    }

    pub fn high(&self) -> &UserId {
        &self.high
    }

    /// Both members in normalised order.
    pub fn members(&self) -> [&UserId; 2] {
        [&self.low, &self.high]
    }

    pub fn contains(&self, user_id: &UserId) -> bool {
        &self.low == user_id || &self.high == user_id
    }

    /// The member that is not `user_id`, if `user_id` belongs to the pair.
    pub fn other(&self, user_id: &UserId) -> Option<&UserId> {
        if &self.low == user_id {
            Some(&self.high)
        } else if &self.high == user_id {
            Some(&self.low)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    #[test]
    fn pair_rejects_self_conversation() {
        assert!(ParticipantPair::new(user("a"), user("a")).is_err());
    }

    #[test]
    fn other_returns_counterpart() {
        let pair = ParticipantPair::new(user("renter"), user("landlord")).unwrap();
        assert_eq!(pair.other(&user("renter")), Some(&user("landlord")));
        assert_eq!(pair.other(&user("landlord")), Some(&user("renter")));
        assert_eq!(pair.other(&user("stranger")), None);
    }

    #[test]
    fn members_are_sorted() {
        let pair = ParticipantPair::new(user("zed"), user("amy")).unwrap();
        assert_eq!(pair.low().as_str(), "amy");
        assert_eq!(pair.high().as_str(), "zed");
    }

    proptest! {
        #[test]
        fn pair_is_order_independent(a in "[a-z0-9]{1,12}", b in "[a-z0-9]{1,12}") {
            prop_assume!(a != b);
            let ab = ParticipantPair::new(user(&a), user(&b)).unwrap();
            let ba = ParticipantPair::new(user(&b), user(&a)).unwrap();
            prop_assert_eq!(ab, ba);
        }

        #[test]
        fn pair_contains_exactly_its_members(a in "[a-z]{1,8}", b in "[a-z]{1,8}", c in "[a-z]{1,8}") {
            prop_assume!(a != b);
            let pair = ParticipantPair::new(user(&a), user(&b)).unwrap();
            prop_assert!(pair.contains(&user(&a)));
            prop_assert!(pair.contains(&user(&b)));
            prop_assert_eq!(pair.contains(&user(&c)), c == a || c == b);
        }
    }
}
