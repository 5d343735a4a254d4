//! Release version model
//!
//! Garden Linux versions come in two eras:
//!
//! - **v1** (`major < 2000`): `major` or `major.minor`, never a micro component
//! - **v2** (`major >= 2000`): `major.minor.micro`
//!
//! The singleton `next` release uses the literal token `next` as its major,
//! which sorts after every concrete major.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{GlrdError, Result};

/// First major of the v2 versioning scheme
pub const V2_MAJOR_THRESHOLD: u32 = 2000;

const NEXT_TOKEN: &str = "next";

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d+)(?:\.(\d+))?(?:\.(\d+))?$").expect("version pattern is valid")
    })
}

/// Major version component: a day count or the `next` placeholder.
///
/// Variant order matters: the derived `Ord` places `Next` after every number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Major {
    Number(u32),
    Next,
}

impl Major {
    pub fn number(&self) -> Option<u32> {
        match self {
            Major::Number(n) => Some(*n),
            Major::Next => None,
        }
    }

    pub fn is_next(&self) -> bool {
        matches!(self, Major::Next)
    }
}

impl fmt::Display for Major {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Major::Number(n) => write!(f, "{}", n),
            Major::Next => f.write_str(NEXT_TOKEN),
        }
    }
}

impl Serialize for Major {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Major::Number(n) => serializer.serialize_u32(*n),
            Major::Next => serializer.serialize_str(NEXT_TOKEN),
        }
    }
}

impl<'de> Deserialize<'de> for Major {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawMajor {
            Number(u32),
            Token(String),
        }

        match RawMajor::deserialize(deserializer)? {
            RawMajor::Number(n) => Ok(Major::Number(n)),
            RawMajor::Token(s) if s == NEXT_TOKEN => Ok(Major::Next),
            RawMajor::Token(s) => s
                .parse::<u32>()
                .map(Major::Number)
                .map_err(|_| serde::de::Error::custom(format!("invalid major version '{}'", s))),
        }
    }
}

/// Schema era of a version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaEra {
    V1,
    V2,
    /// The `next` placeholder belongs to no numbered era
    Next,
}

/// How [`Version::format`] renders a version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionStyle {
    /// Every populated component
    Full,
    /// Only the major component
    Major,
    /// `major.minor` with an absent minor shown as `0`, plus micro when set
    Release,
}

/// A release version
///
/// Field order defines the total order: major, then minor, then micro, with
/// absent components sorting lowest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version {
    pub major: Major,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minor: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub micro: Option<u32>,
}

impl Version {
    pub fn new(major: u32, minor: Option<u32>, micro: Option<u32>) -> Self {
        Self {
            major: Major::Number(major),
            minor,
            micro,
        }
    }

    /// A bare major version (stable releases)
    pub fn major_only(major: u32) -> Self {
        Self::new(major, None, None)
    }

    /// The version of the singleton next release
    pub fn next() -> Self {
        Self {
            major: Major::Next,
            minor: None,
            micro: None,
        }
    }

    /// Parse `major`, `major.minor`, `major.minor.micro` or `next`
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input == NEXT_TOKEN {
            return Ok(Self::next());
        }

        let caps = version_regex()
            .captures(input)
            .ok_or_else(|| GlrdError::InvalidVersionFormat(input.to_string()))?;

        let component = |idx: usize| -> Result<Option<u32>> {
            caps.get(idx)
                .map(|m| {
                    m.as_str()
                        .parse::<u32>()
                        .map_err(|_| GlrdError::InvalidVersionFormat(input.to_string()))
                })
                .transpose()
        };

        let major = component(1)?.ok_or_else(|| GlrdError::InvalidVersionFormat(input.to_string()))?;
        let minor = component(2)?;
        let micro = component(3)?;

        if micro.is_some() && major < V2_MAJOR_THRESHOLD {
            return Err(GlrdError::InvalidVersionFormat(format!(
                "{}: versions below {} (v1 schema) do not have a micro version",
                input, V2_MAJOR_THRESHOLD
            )));
        }

        Ok(Self::new(major, minor, micro))
    }

    pub fn is_next(&self) -> bool {
        self.major.is_next()
    }

    pub fn era(&self) -> SchemaEra {
        match self.major {
            Major::Next => SchemaEra::Next,
            Major::Number(n) if n >= V2_MAJOR_THRESHOLD => SchemaEra::V2,
            Major::Number(_) => SchemaEra::V1,
        }
    }

    /// Render the version in the requested style
    pub fn format(&self, style: VersionStyle) -> String {
        if self.is_next() {
            return NEXT_TOKEN.to_string();
        }
        match style {
            VersionStyle::Major => self.major.to_string(),
            VersionStyle::Full => match (self.minor, self.micro) {
                (None, None) => self.major.to_string(),
                (Some(minor), None) => format!("{}.{}", self.major, minor),
                (minor, Some(micro)) => format!("{}.{}.{}", self.major, minor.unwrap_or(0), micro),
            },
            VersionStyle::Release => match self.micro {
                Some(micro) => format!("{}.{}.{}", self.major, self.minor.unwrap_or(0), micro),
                None => format!("{}.{}", self.major, self.minor.unwrap_or(0)),
            },
        }
    }

    /// Prefix match used by version filters.
    ///
    /// Components absent from `prefix` match anything. A component absent
    /// from `self` counts as `0` against a concrete prefix component.
    pub fn matches_prefix(&self, prefix: &Version) -> bool {
        if self.major != prefix.major {
            return false;
        }
        if let Some(minor) = prefix.minor {
            if self.minor.unwrap_or(0) != minor {
                return false;
            }
        }
        if let Some(micro) = prefix.micro {
            if self.micro.unwrap_or(0) != micro {
                return false;
            }
        }
        true
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format(VersionStyle::Full))
    }
}

impl FromStr for Version {
    type Err = GlrdError;

    fn from_str(s: &str) -> Result<Self> {
        Version::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn test_parse_forms() {
        assert_eq!(Version::parse("1312").unwrap(), Version::major_only(1312));
        assert_eq!(Version::parse("1312.2").unwrap(), Version::new(1312, Some(2), None));
        assert_eq!(
            Version::parse("2000.1.0").unwrap(),
            Version::new(2000, Some(1), Some(0))
        );
        assert_eq!(Version::parse("next").unwrap(), Version::next());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for input in ["", "abc.def", "1990.0.0.0", "1.", ".1", "-1", "1312.x"] {
            assert!(
                matches!(Version::parse(input), Err(GlrdError::InvalidVersionFormat(_))),
                "{input} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_rejects_micro_below_v2() {
        let err = Version::parse("1990.0.1").unwrap_err();
        assert!(err.to_string().contains("micro version"));
        assert!(Version::parse("1999.0.5").is_err());
        assert!(Version::parse("2000.0.0").is_ok());
    }

    #[test]
    fn test_ordering() {
        let stable = Version::major_only(1592);
        let patch1 = Version::new(1592, Some(1), None);
        let patch6 = Version::new(1592, Some(6), None);
        let later = Version::major_only(1877);
        let v2 = Version::new(2000, Some(0), Some(0));
        let v2_micro = Version::new(2000, Some(0), Some(1));

        assert!(stable < patch1);
        assert!(patch1 < patch6);
        assert!(patch6 < later);
        assert!(later < v2);
        assert!(v2 < v2_micro);
        assert!(v2_micro < Version::next());
        assert_eq!(patch1.cmp(&patch1), Ordering::Equal);
    }

    #[test]
    fn test_ordering_is_total() {
        let versions = [
            Version::major_only(934),
            Version::new(934, Some(0), None),
            Version::new(934, Some(11), None),
            Version::major_only(1312),
            Version::new(2000, None, None),
            Version::new(2000, Some(1), Some(0)),
            Version::next(),
        ];
        for a in &versions {
            for b in &versions {
                let outcomes = [a < b, a == b, a > b];
                assert_eq!(outcomes.iter().filter(|x| **x).count(), 1, "{a} vs {b}");
            }
        }
    }

    #[test]
    fn test_format_round_trip() {
        for input in ["1312", "1312.0", "1592.6", "2000.0.0", "3000.5.2", "next"] {
            let v = Version::parse(input).unwrap();
            assert_eq!(v.to_string(), input);
            assert_eq!(Version::parse(&v.format(VersionStyle::Full)).unwrap(), v);
        }
    }

    #[test]
    fn test_format_styles() {
        let v = Version::new(1592, Some(6), None);
        assert_eq!(v.format(VersionStyle::Major), "1592");
        assert_eq!(v.format(VersionStyle::Release), "1592.6");
        assert_eq!(Version::major_only(1312).format(VersionStyle::Release), "1312.0");
        assert_eq!(Version::next().format(VersionStyle::Major), "next");
    }

    #[test]
    fn test_prefix_matching() {
        let prefix = Version::parse("1312").unwrap();
        assert!(Version::major_only(1312).matches_prefix(&prefix));
        assert!(Version::new(1312, Some(3), None).matches_prefix(&prefix));
        assert!(!Version::new(1443, Some(3), None).matches_prefix(&prefix));

        let minor_prefix = Version::parse("1312.3").unwrap();
        assert!(Version::new(1312, Some(3), None).matches_prefix(&minor_prefix));
        assert!(!Version::new(1312, Some(2), None).matches_prefix(&minor_prefix));
    }

    #[test]
    fn test_serde_shapes() {
        let v: Version = serde_json::from_str(r#"{"major": 1592, "minor": 6}"#).unwrap();
        assert_eq!(v, Version::new(1592, Some(6), None));
        assert_eq!(serde_json::to_string(&v).unwrap(), r#"{"major":1592,"minor":6}"#);

        let next: Version = serde_json::from_str(r#"{"major": "next"}"#).unwrap();
        assert!(next.is_next());
        assert_eq!(serde_json::to_string(&next).unwrap(), r#"{"major":"next"}"#);
    }
}
