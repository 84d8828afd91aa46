//! Broadcast topics.
//!
//! Every WebSocket connection subscribes to exactly one topic at registration
//! and keeps it for its whole lifetime. The set is closed: `orders` carries
//! order update and lock lifecycle events, `global` carries everything aimed
//! at all terminals regardless of what they are looking at.

use crate::errors::CoordError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A broadcast topic a connection can subscribe to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    /// Order update and lock lifecycle events.
    Orders,
    /// Announcements for every terminal.
    Global,
}

impl Topic {
    /// All topics, in a stable order.
    pub const ALL: [Self; 2] = [Self::Orders, Self::Global];

    /// The wire name of this topic.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Orders => "orders",
            Self::Global => "global",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = CoordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "orders" => Ok(Self::Orders),
            "global" => Ok(Self::Global),
            other => Err(CoordError::UnknownTopic { topic: other.to_owned() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn parse_known_topics() {
        assert_eq!("orders".parse::<Topic>().unwrap(), Topic::Orders);
        assert_eq!("global".parse::<Topic>().unwrap(), Topic::Global);
    }

    #[test]
    fn parse_is_case_sensitive() {
        assert_matches!("Orders".parse::<Topic>(), Err(CoordError::UnknownTopic { .. }));
    }

    #[test]
    fn parse_unknown_topic() {
        let err = "chat".parse::<Topic>().unwrap_err();
        assert_matches!(err, CoordError::UnknownTopic { ref topic } if topic == "chat");
    }

    #[test]
    fn display_matches_wire_name() {
        assert_eq!(Topic::Orders.to_string(), "orders");
        assert_eq!(Topic::Global.to_string(), "global");
    }

    #[test]
    fn serde_uses_lowercase() {
        assert_eq!(serde_json::to_string(&Topic::Orders).unwrap(), "\"orders\"");
        let back: Topic = serde_json::from_str("\"global\"").unwrap();
        assert_eq!(back, Topic::Global);
    }

    #[test]
    fn all_covers_every_topic() {
        for topic in Topic::ALL {
            assert_eq!(topic.as_str().parse::<Topic>().unwrap(), topic);
        }
    }
}
