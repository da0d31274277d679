//! Subscription descriptors shared by every relay in a pool.

use crate::error::Result;
use crate::message::{ClientMessage, Filter};
use uuid::Uuid;

/// Generate a unique subscription ID.
pub fn generate_subscription_id() -> String {
    Uuid::new_v4().to_string()[..8].to_string()
}

/// One REQ, issued identically to each relay as soon as it opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: String,
    pub filters: Vec<Filter>,
}

impl Subscription {
    /// Create a subscription with a fresh id.
    pub fn new(filters: Vec<Filter>) -> Self {
        Self::with_id(generate_subscription_id(), filters)
    }

    pub fn with_id(id: impl Into<String>, filters: Vec<Filter>) -> Self {
        Self {
            id: id.into(),
            filters,
        }
    }

    /// The `["REQ", id, filter…]` frame.
    pub fn to_req(&self) -> Result<String> {
        Ok(ClientMessage::Req {
            subscription_id: self.id.clone(),
            filters: self.filters.clone(),
        }
        .to_json()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_subscription_id() {
        let id1 = generate_subscription_id();
        let id2 = generate_subscription_id();
        assert_eq!(id1.len(), 8);
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_subscription_req_frame() {
        let sub = Subscription::with_id("sub", vec![Filter::new().kinds(vec![3, 10000])]);
        assert_eq!(sub.to_req().unwrap(), r#"["REQ","sub",{"kinds":[3,10000]}]"#);
    }
}
