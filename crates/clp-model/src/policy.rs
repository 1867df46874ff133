//! Policy container and version objects.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::matches::ObjectMatchShape;
use crate::rules::MatchRule;

/// Unique identifier for a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyId(i64);

impl PolicyId {
    /// Create a new policy ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the raw numeric value.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for PolicyId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Identifier of the group that owns a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(i64);

impl GroupId {
    /// Create a new group ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the raw numeric value.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for GroupId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Monotonically increasing policy version number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyVersionNumber(u64);

impl PolicyVersionNumber {
    /// Create a new version number.
    #[must_use]
    pub const fn new(version: u64) -> Self {
        Self(version)
    }

    /// Get the raw numeric value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// The version number following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for PolicyVersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for PolicyVersionNumber {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Policy flavor: the enumerated sub-type selecting which rule variant and
/// allowed match-value shapes apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyFlavor {
    /// Redirect matching requests to a new URL with a redirect status code.
    EdgeRedirect,
    /// Forward matching requests to an alternate origin, optionally
    /// rewriting path and query string.
    ForwardRewrite,
    /// Split matching traffic across weighted origin targets.
    PhasedRelease,
    /// Segment audiences toward an alternate origin or path.
    AudienceSegmentation,
    /// Allow or deny matching requests outright.
    RequestControl,
}

impl PolicyFlavor {
    /// The `type` wire tag carried by this flavor's match rules.
    #[must_use]
    pub const fn rule_tag(self) -> &'static str {
        match self {
            Self::EdgeRedirect => "erMatchRule",
            Self::ForwardRewrite => "frMatchRule",
            Self::PhasedRelease => "cdMatchRule",
            Self::AudienceSegmentation => "asMatchRule",
            Self::RequestControl => "igMatchRule",
        }
    }

    /// Object-match-value shapes this flavor accepts.
    #[must_use]
    pub const fn allowed_shapes(self) -> &'static [ObjectMatchShape] {
        match self {
            Self::EdgeRedirect | Self::ForwardRewrite | Self::AudienceSegmentation => {
                &[ObjectMatchShape::Simple, ObjectMatchShape::Object]
            }
            Self::PhasedRelease | Self::RequestControl => &[
                ObjectMatchShape::Simple,
                ObjectMatchShape::Object,
                ObjectMatchShape::Range,
            ],
        }
    }

    /// Match types this flavor accepts in a criterion's `matchType` field.
    #[must_use]
    pub const fn allowed_match_types(self) -> &'static [&'static str] {
        match self {
            Self::EdgeRedirect | Self::ForwardRewrite => &[
                "header",
                "hostname",
                "path",
                "extension",
                "query",
                "cookie",
                "deviceCharacteristics",
                "clientip",
                "continent",
                "countrycode",
                "regioncode",
                "protocol",
                "method",
                "proxy",
            ],
            Self::PhasedRelease => &[
                "hostname",
                "path",
                "extension",
                "query",
                "range",
                "cookie",
                "deviceCharacteristics",
                "clientip",
                "continent",
                "countrycode",
                "regioncode",
                "protocol",
                "method",
                "proxy",
            ],
            Self::AudienceSegmentation => &[
                "header",
                "hostname",
                "path",
                "extension",
                "query",
                "range",
                "cookie",
                "deviceCharacteristics",
                "clientip",
                "continent",
                "countrycode",
                "regioncode",
                "protocol",
                "method",
                "proxy",
            ],
            Self::RequestControl => &["clientip", "continent", "countrycode", "regioncode"],
        }
    }
}

impl fmt::Display for PolicyFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::EdgeRedirect => "EDGE_REDIRECT",
            Self::ForwardRewrite => "FORWARD_REWRITE",
            Self::PhasedRelease => "PHASED_RELEASE",
            Self::AudienceSegmentation => "AUDIENCE_SEGMENTATION",
            Self::RequestControl => "REQUEST_CONTROL",
        };
        write!(f, "{name}")
    }
}

/// A cloudlet policy container.
///
/// The container itself carries only identity and metadata; rule content
/// lives on [`PolicyVersion`]. Beyond name and group, the container is never
/// mutated structurally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    /// Unique policy identifier.
    pub policy_id: PolicyId,
    /// Display name.
    pub name: String,
    /// Owning group.
    pub group_id: GroupId,
    /// Flavor selecting the rule variant set.
    pub flavor: PolicyFlavor,
    /// Human description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Structured warning attached to a policy version by validation or remote
/// processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleWarning {
    /// Short warning title.
    pub title: String,
    /// Warning type identifier.
    #[serde(rename = "type")]
    pub warning_type: String,
    /// Human-readable detail.
    pub detail: String,
    /// JSON pointer to the offending rule element, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_pointer: Option<String>,
}

/// One version of a policy's rule content.
///
/// Versions are mutable in place until some activation of the version
/// reaches `pending` or `active` on any network; from then on `immutable`
/// holds and edits must go to a freshly created version instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyVersion {
    /// Owning policy.
    pub policy_id: PolicyId,
    /// Version number, unique and increasing within the policy.
    pub version: PolicyVersionNumber,
    /// Whether in-place mutation is still permitted.
    #[serde(default)]
    pub immutable: bool,
    /// Ordered match rules; evaluation order is semantically significant.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_rules: Vec<MatchRule>,
    /// Free-text description of this version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Warnings reported by validation or remote processing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<RuleWarning>,
}
