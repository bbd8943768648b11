use serde::{Deserialize, Serialize};

use crate::constants::GROUP_SUFFIX;

// Network identifiers are opaque strings such as `15551234567@s.whatsapp.net`
// or `120363012345678901@g.us`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part before `@`, or the whole identifier when there is none.
    pub fn user_part(&self) -> &str {
        user_part(&self.0)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ChatId(pub String);

impl ChatId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_group(&self) -> bool {
        self.0.ends_with(GROUP_SUFFIX)
    }

    /// Which name cache this chat's display name lives in.
    pub fn name_kind(&self) -> NameKind {
        if self.is_group() {
            NameKind::Group
        } else {
            NameKind::Contact
        }
    }

    pub fn user_part(&self) -> &str {
        user_part(&self.0)
    }
}

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<&str> for ChatId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameKind {
    Contact,
    Group,
}

/// The part of an identifier before `@`, or the whole identifier.
pub fn user_part(id: &str) -> &str {
    match id.split_once('@') {
        Some((user, _)) if !user.is_empty() => user,
        _ => id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_detection() {
        assert!(ChatId::from("120363012345678901@g.us").is_group());
        assert!(!ChatId::from("15551234567@s.whatsapp.net").is_group());
        assert_eq!(ChatId::from("1@g.us").name_kind(), NameKind::Group);
    }

    #[test]
    fn user_part_strips_server() {
        assert_eq!(UserId::from("15551234567@s.whatsapp.net").user_part(), "15551234567");
        assert_eq!(UserId::from("15551234567").user_part(), "15551234567");
        assert_eq!(UserId::from("@odd").user_part(), "@odd");
    }
}
