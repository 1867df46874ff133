//! Match criteria and the structured match-value variant system.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Comparison operator applied by a match criterion.
///
/// The wire contract carries an empty string when the operator is left
/// unspecified, so the default variant renders as `""`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOperator {
    /// Value comparison by substring containment.
    #[serde(rename = "contains")]
    Contains,
    /// Presence check; no value is required.
    #[serde(rename = "exists")]
    Exists,
    /// Exact value comparison.
    #[serde(rename = "equals")]
    Equals,
    /// Operator not specified.
    #[default]
    #[serde(rename = "")]
    Unspecified,
}

impl MatchOperator {
    /// Whether this operator compares against a value at all.
    #[must_use]
    pub const fn requires_value(self) -> bool {
        !matches!(self, Self::Exists)
    }
}

impl fmt::Display for MatchOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Contains => "contains",
            Self::Exists => "exists",
            Self::Equals => "equals",
            Self::Unspecified => "",
        };
        write!(f, "{name}")
    }
}

/// Which part of the request supplies the client IP for IP-based matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckIps {
    /// Use the connecting IP only.
    #[serde(rename = "CONNECTING_IP")]
    ConnectingIp,
    /// Use `X-Forwarded-For` headers only.
    #[serde(rename = "XFF_HEADERS")]
    XffHeaders,
    /// Check the connecting IP, then fall back to `X-Forwarded-For`.
    #[serde(rename = "CONNECTING_IP XFF_HEADERS")]
    ConnectingIpXffHeaders,
}

/// Extra flags applied to the values of an object-shaped match value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMatchValueOptions {
    /// Values to compare against.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub value: Vec<String>,
    /// Whether values may contain wildcards.
    #[serde(default)]
    pub value_has_wildcard: bool,
    /// Whether value comparison is case sensitive.
    #[serde(default)]
    pub value_case_sensitive: bool,
    /// Whether values are escaped.
    #[serde(default)]
    pub value_escaped: bool,
}

/// Structured match value, discriminated by the `type` wire tag.
///
/// Which shapes are legal depends on the policy flavor; see
/// [`resolve_object_match_value`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ObjectMatchValue {
    /// An ordered list of plain string values.
    Simple {
        /// Values to compare against.
        value: Vec<String>,
    },
    /// A named object with per-value comparison flags.
    #[serde(rename_all = "camelCase")]
    Object {
        /// Name of the matched object (header name, cookie name, ...).
        name: String,
        /// Whether name comparison is case sensitive.
        #[serde(default)]
        name_case_sensitive: bool,
        /// Whether the name may contain wildcards.
        #[serde(default)]
        name_has_wildcard: bool,
        /// Value comparison options.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        options: Option<ObjectMatchValueOptions>,
    },
    /// An inclusive numeric range; exactly two integers, low then high.
    Range {
        /// Low and high bounds.
        value: (i64, i64),
    },
}

impl ObjectMatchValue {
    /// The shape discriminator of this value.
    #[must_use]
    pub const fn shape(&self) -> ObjectMatchShape {
        match self {
            Self::Simple { .. } => ObjectMatchShape::Simple,
            Self::Object { .. } => ObjectMatchShape::Object,
            Self::Range { .. } => ObjectMatchShape::Range,
        }
    }
}

/// Shape discriminator for [`ObjectMatchValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectMatchShape {
    /// Plain list of strings.
    Simple,
    /// Named object with flags and options.
    Object,
    /// Two-integer inclusive range.
    Range,
}

impl fmt::Display for ObjectMatchShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Simple => "simple",
            Self::Object => "object",
            Self::Range => "range",
        };
        write!(f, "{name}")
    }
}

/// A single match criterion within a rule.
///
/// Exactly one of `match_value` / `object_match_value` may be set; the
/// mutual exclusivity is enforced by [`crate::validate_rules`], not by
/// deserialization, so that violations can be aggregated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCriterion {
    /// What part of the request is matched (header, hostname, path, ...).
    /// The legal set depends on the policy flavor.
    pub match_type: String,
    /// Plain string value; mutually exclusive with `object_match_value`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_value: Option<String>,
    /// Structured value; mutually exclusive with `match_value`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_match_value: Option<ObjectMatchValue>,
    /// Comparison operator.
    #[serde(default)]
    pub match_operator: MatchOperator,
    /// Whether comparison is case sensitive.
    #[serde(default)]
    pub case_sensitive: bool,
    /// Whether the criterion's outcome is negated.
    #[serde(default)]
    pub negate: bool,
    /// Client IP source for IP-based match types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "checkIPs")]
    pub check_ips: Option<CheckIps>,
}

/// Unsupported object-match-value shape for the rule flavor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported objectMatchValue type '{found}': expected one of {}", format_allowed(.allowed))]
pub struct InvalidVariantError {
    /// The shape declared by the criterion.
    pub found: ObjectMatchShape,
    /// The shapes the flavor permits.
    pub allowed: Vec<ObjectMatchShape>,
}

fn format_allowed(allowed: &[ObjectMatchShape]) -> String {
    let names: Vec<String> = allowed.iter().map(|s| format!("'{s}'")).collect();
    format!("[{}]", names.join(", "))
}

/// Resolve a criterion's structured value against the flavor's allowed
/// shape set.
///
/// Returns `Ok(None)` when no object-match-value block is present (the
/// criterion carries a plain `match_value` instead, or no value at all);
/// absence is not an error here.
///
/// # Errors
///
/// Returns [`InvalidVariantError`] naming the allowed set when the declared
/// shape is not permitted for the flavor.
pub fn resolve_object_match_value<'a>(
    criterion: &'a MatchCriterion,
    allowed: &[ObjectMatchShape],
) -> Result<Option<&'a ObjectMatchValue>, InvalidVariantError> {
    match &criterion.object_match_value {
        None => Ok(None),
        Some(value) => {
            let shape = value.shape();
            if allowed.contains(&shape) {
                Ok(Some(value))
            } else {
                Err(InvalidVariantError {
                    found: shape,
                    allowed: allowed.to_vec(),
                })
            }
        }
    }
}
