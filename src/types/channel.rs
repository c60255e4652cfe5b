use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A logical messaging scope. Messages, receipts and typing signals are
/// always addressed to a channel, never to an individual member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Channel {
    /// The shared feed of a whole community.
    Community(String),
    /// A smaller group inside a community (e.g. a ministry or home group).
    Subgroup(String),
}

impl Channel {
    pub fn community(id: impl Into<String>) -> Self {
        Channel::Community(id.into())
    }

    pub fn subgroup(id: impl Into<String>) -> Self {
        Channel::Subgroup(id.into())
    }

    pub fn id(&self) -> &str {
        match self {
            Channel::Community(id) | Channel::Subgroup(id) => id,
        }
    }

    /// Path fragment used by the REST API, e.g. `communities/42`.
    pub fn api_path(&self) -> String {
        match self {
            Channel::Community(id) => format!("communities/{id}"),
            Channel::Subgroup(id) => format!("subgroups/{id}"),
        }
    }

    /// Pub/sub topic carrying this channel's realtime frames.
    pub fn topic(&self) -> String {
        format!("chat/{}", self.api_path())
    }

    /// Inverse of [`Channel::topic`]. Returns `None` for topics this crate
    /// does not own (the broker may multiplex other traffic on the socket).
    pub fn from_topic(topic: &str) -> Option<Self> {
        let rest = topic.strip_prefix("chat/")?;
        let (kind, id) = rest.split_once('/')?;
        if id.is_empty() || id.contains('/') {
            return None;
        }
        match kind {
            "communities" => Some(Channel::Community(id.to_string())),
            "subgroups" => Some(Channel::Subgroup(id.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Community(id) => write!(f, "community:{id}"),
            Channel::Subgroup(id) => write!(f, "subgroup:{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid channel reference: {0}")]
pub struct ChannelParseError(String);

impl FromStr for Channel {
    type Err = ChannelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some(("community", id)) if !id.is_empty() => Ok(Channel::Community(id.to_string())),
            Some(("subgroup", id)) if !id.is_empty() => Ok(Channel::Subgroup(id.to_string())),
            _ => Err(ChannelParseError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_round_trip() {
        let community = Channel::community("42");
        assert_eq!(community.topic(), "chat/communities/42");
        assert_eq!(Channel::from_topic(&community.topic()), Some(community));

        let subgroup = Channel::subgroup("youth");
        assert_eq!(subgroup.topic(), "chat/subgroups/youth");
        assert_eq!(Channel::from_topic(&subgroup.topic()), Some(subgroup));
    }

    #[test]
    fn test_foreign_topics_rejected() {
        assert_eq!(Channel::from_topic("presence/communities/42"), None);
        assert_eq!(Channel::from_topic("chat/communities/"), None);
        assert_eq!(Channel::from_topic("chat/communities/42/extra"), None);
        assert_eq!(Channel::from_topic("chat/devotionals/42"), None);
    }

    #[test]
    fn test_parse_display_round_trip() {
        let channel: Channel = "community:main".parse().unwrap();
        assert_eq!(channel, Channel::community("main"));
        assert_eq!(channel.to_string().parse::<Channel>().unwrap(), channel);

        assert!("community".parse::<Channel>().is_err());
        assert!("campus:north".parse::<Channel>().is_err());
    }
}
