//! Object paths: `/`, `/'group'`, `/'group'/'channel'`.
//!
//! Names are wrapped in single quotes; a quote inside a name is written
//! twice (`/'it''s'` names the group `it's`).

use crate::error::{CodecError, CodecResult};
use std::fmt;
use std::str::FromStr;

/// Which level of the hierarchy a path names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// The file itself.
    Root,
    /// A named group.
    Group,
    /// A channel inside a group.
    Channel,
}

/// A resolved object path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectPath {
    /// The file-level object, written `/`.
    Root,
    /// A group, written `/'name'`.
    Group {
        /// Group name.
        group: String,
    },
    /// A channel, written `/'group'/'channel'`.
    Channel {
        /// Owning group name.
        group: String,
        /// Channel name.
        channel: String,
    },
}

impl ObjectPath {
    /// The root path.
    #[must_use]
    pub const fn root() -> Self {
        Self::Root
    }

    /// A group path.
    pub fn group(name: impl Into<String>) -> Self {
        Self::Group { group: name.into() }
    }

    /// A channel path.
    pub fn channel(group: impl Into<String>, channel: impl Into<String>) -> Self {
        Self::Channel {
            group: group.into(),
            channel: channel.into(),
        }
    }

    /// Returns the level this path names.
    #[must_use]
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Root => ObjectKind::Root,
            Self::Group { .. } => ObjectKind::Group,
            Self::Channel { .. } => ObjectKind::Channel,
        }
    }

    /// Returns whether this is a channel path.
    #[must_use]
    pub fn is_channel(&self) -> bool {
        matches!(self, Self::Channel { .. })
    }

    /// The group name for group and channel paths.
    #[must_use]
    pub fn group_name(&self) -> Option<&str> {
        match self {
            Self::Root => None,
            Self::Group { group } | Self::Channel { group, .. } => Some(group),
        }
    }

    /// The channel name for channel paths.
    #[must_use]
    pub fn channel_name(&self) -> Option<&str> {
        match self {
            Self::Channel { channel, .. } => Some(channel),
            _ => None,
        }
    }

    /// The enclosing object: a channel's group, a group's root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        match self {
            Self::Root => None,
            Self::Group { .. } => Some(Self::Root),
            Self::Channel { group, .. } => Some(Self::group(group.clone())),
        }
    }

    /// Parses the canonical string form.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidObjectPath`] for anything other than
    /// `/`, one quoted component, or two quoted components.
    pub fn parse(text: &str) -> CodecResult<Self> {
        if text == "/" {
            return Ok(Self::Root);
        }

        let mut names = Vec::with_capacity(2);
        let mut chars = text.chars().peekable();
        while chars.peek().is_some() {
            if chars.next() != Some('/') {
                return Err(CodecError::invalid_path(text, "expected '/'"));
            }
            if chars.next() != Some('\'') {
                return Err(CodecError::invalid_path(text, "expected opening quote"));
            }

            let mut name = String::new();
            loop {
                match chars.next() {
                    None => return Err(CodecError::invalid_path(text, "unterminated quote")),
                    Some('\'') if chars.peek() == Some(&'\'') => {
                        chars.next();
                        name.push('\'');
                    }
                    Some('\'') => break,
                    Some(c) => name.push(c),
                }
            }

            names.push(name);
            if names.len() > 2 {
                return Err(CodecError::invalid_path(text, "more than two components"));
            }
        }

        let mut names = names.into_iter();
        match (names.next(), names.next()) {
            (Some(group), None) => Ok(Self::Group { group }),
            (Some(group), Some(channel)) => Ok(Self::Channel { group, channel }),
            _ => Err(CodecError::invalid_path(text, "empty path")),
        }
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    f.write_str("/'")?;
    f.write_str(&name.replace('\'', "''"))?;
    f.write_str("'")
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => f.write_str("/"),
            Self::Group { group } => write_quoted(f, group),
            Self::Channel { group, channel } => {
                write_quoted(f, group)?;
                write_quoted(f, channel)
            }
        }
    }
}

impl FromStr for ObjectPath {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn canonical_forms() {
        assert_eq!(ObjectPath::root().to_string(), "/");
        assert_eq!(ObjectPath::group("Group 1").to_string(), "/'Group 1'");
        assert_eq!(
            ObjectPath::channel("Group 1", "Channel 1").to_string(),
            "/'Group 1'/'Channel 1'"
        );
    }

    #[test]
    fn quotes_are_doubled() {
        let path = ObjectPath::channel("it's", "a 'b'");
        assert_eq!(path.to_string(), "/'it''s'/'a ''b'''");
        assert_eq!(ObjectPath::parse("/'it''s'/'a ''b'''").unwrap(), path);
    }

    #[test]
    fn parse_levels() {
        assert_eq!(ObjectPath::parse("/").unwrap(), ObjectPath::Root);
        assert_eq!(
            "/'SensorReadings'".parse::<ObjectPath>().unwrap(),
            ObjectPath::group("SensorReadings")
        );
        let channel = ObjectPath::parse("/'Waveforms'/'SineWave'").unwrap();
        assert_eq!(channel.kind(), ObjectKind::Channel);
        assert_eq!(channel.group_name(), Some("Waveforms"));
        assert_eq!(channel.channel_name(), Some("SineWave"));
        assert_eq!(channel.parent(), Some(ObjectPath::group("Waveforms")));
    }

    #[test]
    fn malformed_paths_rejected() {
        for bad in [
            "",
            "//",
            "Group",
            "/Group",
            "/'Group",
            "/'a'/'b'/'c'",
            "/'a'x",
            "/'a'/",
            "/'a'/b",
        ] {
            assert!(
                matches!(
                    ObjectPath::parse(bad),
                    Err(CodecError::InvalidObjectPath { .. })
                ),
                "accepted {bad:?}"
            );
        }
    }

    proptest! {
        #[test]
        fn display_then_parse_is_identity(group in ".{0,12}", channel in ".{0,12}") {
            let path = ObjectPath::channel(group.clone(), channel);
            prop_assert_eq!(ObjectPath::parse(&path.to_string()).unwrap(), path);
            let path = ObjectPath::group(group);
            prop_assert_eq!(ObjectPath::parse(&path.to_string()).unwrap(), path);
        }
    }
}
