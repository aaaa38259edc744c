//! Capability set: the protocol verbs a bridge instance is allowed to serve.
//!
//! The set is parsed once from a comma-separated string such as
//! `"ls,get,put"` and consulted before any store call is made.

use std::fmt;
use std::str::FromStr;

use crate::errors::FeatureError;

/// Default capability string: listing only.
pub const DEFAULT_FEATURE_SET: &str = "ls";

/// A single protocol verb that can be enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    /// `cd`
    ChangeDir,
    /// `ls`
    List,
    /// `rmdir`
    RemoveDir,
    /// `rm`
    Remove,
    /// `mv`
    Move,
    /// `mkdir`
    MakeDir,
    /// `get`
    Get,
    /// `put`
    Put,
}

impl Feature {
    /// Every known feature, in declaration order.
    pub const ALL: [Feature; 8] = [
        Feature::ChangeDir,
        Feature::List,
        Feature::RemoveDir,
        Feature::Remove,
        Feature::Move,
        Feature::MakeDir,
        Feature::Get,
        Feature::Put,
    ];

    /// The configuration token for this feature.
    pub fn token(self) -> &'static str {
        match self {
            Feature::ChangeDir => "cd",
            Feature::List => "ls",
            Feature::RemoveDir => "rmdir",
            Feature::Remove => "rm",
            Feature::Move => "mv",
            Feature::MakeDir => "mkdir",
            Feature::Get => "get",
            Feature::Put => "put",
        }
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Feature {
    type Err = FeatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        Feature::ALL
            .into_iter()
            .find(|feature| feature.token() == lowered)
            .ok_or_else(|| FeatureError::Unknown {
                feature: s.to_string(),
            })
    }
}

/// An immutable set of enabled features.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureSet {
    bits: u8,
}

impl FeatureSet {
    /// Parse a comma-separated feature list.
    ///
    /// Tokens are case-insensitive and surrounding whitespace is ignored.
    /// A blank string and any unknown token are rejected.
    pub fn parse(spec: &str) -> Result<Self, FeatureError> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(FeatureError::Empty);
        }

        let mut set = FeatureSet::default();
        for token in spec.split(',') {
            set.bits |= token.parse::<Feature>()?.bit();
        }
        Ok(set)
    }

    /// Whether `feature` is enabled.
    pub fn has(&self, feature: Feature) -> bool {
        self.bits & feature.bit() != 0
    }

    /// Iterate over the enabled features.
    pub fn iter(&self) -> impl Iterator<Item = Feature> + '_ {
        Feature::ALL.into_iter().filter(|f| self.has(*f))
    }
}

impl FromStr for FeatureSet {
    type Err = FeatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeatureSet::parse(s)
    }
}

impl fmt::Debug for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tokens: Vec<&str> = self.iter().map(Feature::token).collect();
        f.write_str(&tokens.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_enables_only_list() {
        let set = FeatureSet::parse(DEFAULT_FEATURE_SET).unwrap();
        assert!(set.has(Feature::List));
        for feature in Feature::ALL {
            if feature != Feature::List {
                assert!(!set.has(feature), "{feature} should be disabled");
            }
        }
    }

    #[test]
    fn test_parse_all_tokens() {
        let set = FeatureSet::parse("cd,ls,rmdir,rm,mv,mkdir,get,put").unwrap();
        for feature in Feature::ALL {
            assert!(set.has(feature), "{feature} should be enabled");
        }
    }

    #[test]
    fn test_parse_exactly_listed() {
        let set = FeatureSet::parse("get,put").unwrap();
        assert!(set.has(Feature::Get));
        assert!(set.has(Feature::Put));
        assert!(!set.has(Feature::List));
        assert!(!set.has(Feature::Remove));
        assert_eq!(set.iter().count(), 2);
    }

    #[test]
    fn test_parse_case_insensitive() {
        let set = FeatureSet::parse("LS,Get").unwrap();
        assert!(set.has(Feature::List));
        assert!(set.has(Feature::Get));
    }

    #[test]
    fn test_parse_tolerates_whitespace() {
        let set = FeatureSet::parse("  ls, get ").unwrap();
        assert!(set.has(Feature::List));
        assert!(set.has(Feature::Get));
    }

    #[test]
    fn test_parse_empty_is_error() {
        assert!(matches!(FeatureSet::parse(""), Err(FeatureError::Empty)));
        assert!(matches!(FeatureSet::parse("   "), Err(FeatureError::Empty)));
    }

    #[test]
    fn test_parse_unknown_names_token() {
        match FeatureSet::parse("ls,chmod") {
            Err(FeatureError::Unknown { feature }) => assert_eq!(feature, "chmod"),
            other => panic!("expected unknown feature error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_empty_token_is_unknown() {
        assert!(matches!(
            FeatureSet::parse("ls,,get"),
            Err(FeatureError::Unknown { .. })
        ));
    }

    #[test]
    fn test_display_roundtrips_through_parse() {
        let set: FeatureSet = "put,ls,rm".parse().unwrap();
        assert_eq!(set.to_string(), "ls,rm,put");
        assert_eq!(set.to_string().parse::<FeatureSet>().unwrap(), set);
    }
}
