//! Match-rule variants, one per policy flavor.
//!
//! Every rule object on the wire carries a `type` tag naming its flavor
//! (`erMatchRule`, `frMatchRule`, ...). The tagged union here is closed:
//! the discriminator is resolved once at parse time and downstream code
//! matches on the variant, never on a string.

use serde::{Deserialize, Serialize};

use crate::matches::MatchCriterion;
use crate::policy::PolicyFlavor;

/// A match rule, discriminated by the `type` wire tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MatchRule {
    /// Redirect matching requests (`erMatchRule`).
    #[serde(rename = "erMatchRule")]
    EdgeRedirect(EdgeRedirectRule),
    /// Forward matching requests to an alternate origin (`frMatchRule`).
    #[serde(rename = "frMatchRule")]
    ForwardRewrite(ForwardRewriteRule),
    /// Split matching traffic across weighted targets (`cdMatchRule`).
    #[serde(rename = "cdMatchRule")]
    PhasedRelease(PhasedReleaseRule),
    /// Segment matching audiences (`asMatchRule`).
    #[serde(rename = "asMatchRule")]
    AudienceSegmentation(AudienceSegmentationRule),
    /// Allow or deny matching requests (`igMatchRule`).
    #[serde(rename = "igMatchRule")]
    RequestControl(RequestControlRule),
}

impl MatchRule {
    /// The policy flavor this rule variant belongs to.
    #[must_use]
    pub const fn flavor(&self) -> PolicyFlavor {
        match self {
            Self::EdgeRedirect(_) => PolicyFlavor::EdgeRedirect,
            Self::ForwardRewrite(_) => PolicyFlavor::ForwardRewrite,
            Self::PhasedRelease(_) => PolicyFlavor::PhasedRelease,
            Self::AudienceSegmentation(_) => PolicyFlavor::AudienceSegmentation,
            Self::RequestControl(_) => PolicyFlavor::RequestControl,
        }
    }

    /// Rule name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::EdgeRedirect(r) => &r.name,
            Self::ForwardRewrite(r) => &r.name,
            Self::PhasedRelease(r) => &r.name,
            Self::AudienceSegmentation(r) => &r.name,
            Self::RequestControl(r) => &r.name,
        }
    }

    /// Ordered match criteria.
    #[must_use]
    pub fn matches(&self) -> &[MatchCriterion] {
        match self {
            Self::EdgeRedirect(r) => &r.matches,
            Self::ForwardRewrite(r) => &r.matches,
            Self::PhasedRelease(r) => &r.matches,
            Self::AudienceSegmentation(r) => &r.matches,
            Self::RequestControl(r) => &r.matches,
        }
    }

    /// Whether the rule matches unconditionally, ignoring `matches`.
    #[must_use]
    pub const fn matches_always(&self) -> bool {
        match self {
            Self::EdgeRedirect(r) => r.matches_always,
            Self::ForwardRewrite(r) => r.matches_always,
            Self::PhasedRelease(r) => r.matches_always,
            Self::AudienceSegmentation(r) => r.matches_always,
            Self::RequestControl(r) => r.matches_always,
        }
    }

    /// Activity window as `(start, end)` epoch seconds.
    #[must_use]
    pub const fn window(&self) -> (Option<i64>, Option<i64>) {
        match self {
            Self::EdgeRedirect(r) => (r.start, r.end),
            Self::ForwardRewrite(r) => (r.start, r.end),
            Self::PhasedRelease(r) => (r.start, r.end),
            Self::AudienceSegmentation(r) => (r.start, r.end),
            Self::RequestControl(r) => (r.start, r.end),
        }
    }

    /// Whether the rule is disabled.
    #[must_use]
    pub const fn disabled(&self) -> bool {
        match self {
            Self::EdgeRedirect(r) => r.disabled,
            Self::ForwardRewrite(r) => r.disabled,
            Self::PhasedRelease(r) => r.disabled,
            Self::AudienceSegmentation(r) => r.disabled,
            Self::RequestControl(r) => r.disabled,
        }
    }
}

/// Redirect rule for the edge-redirect flavor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeRedirectRule {
    /// Rule name.
    pub name: String,
    /// Activity window start, epoch seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    /// Activity window end, epoch seconds; must be >= `start` when both set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<i64>,
    /// Whether the rule is disabled.
    #[serde(default)]
    pub disabled: bool,
    /// Whether the rule matches unconditionally.
    #[serde(default)]
    pub matches_always: bool,
    /// URL pattern matched before criteria are consulted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "matchURL")]
    pub match_url: Option<String>,
    /// Ordered match criteria; always present on the wire, empty when the
    /// rule relies on `matchesAlways`.
    #[serde(default)]
    pub matches: Vec<MatchCriterion>,
    /// Redirect target URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "redirectURL")]
    pub redirect_url: Option<String>,
    /// Redirect status code: 301, 302, 303, 307 or 308.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Whether the incoming query string is appended to the target.
    #[serde(default)]
    pub use_incoming_query_string: bool,
    /// Relative-URL handling mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_relative_url: Option<String>,
}

/// Origin forwarding settings shared by forward-style rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardSettings {
    /// Target origin identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_id: Option<String>,
    /// Percentage of matching traffic forwarded, 1-100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent: Option<u32>,
    /// Replacement path and query string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "pathAndQS")]
    pub path_and_qs: Option<String>,
    /// Whether the incoming query string is preserved.
    #[serde(default)]
    pub use_incoming_query_string: bool,
}

/// Forward/rewrite rule for the forward-rewrite flavor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardRewriteRule {
    /// Rule name.
    pub name: String,
    /// Activity window start, epoch seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    /// Activity window end, epoch seconds; must be >= `start` when both set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<i64>,
    /// Whether the rule is disabled.
    #[serde(default)]
    pub disabled: bool,
    /// Whether the rule matches unconditionally.
    #[serde(default)]
    pub matches_always: bool,
    /// URL pattern matched before criteria are consulted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "matchURL")]
    pub match_url: Option<String>,
    /// Ordered match criteria; always present on the wire, empty when the
    /// rule relies on `matchesAlways`.
    #[serde(default)]
    pub matches: Vec<MatchCriterion>,
    /// Forward-target origin and rewrite settings; required for this flavor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward_settings: Option<ForwardSettings>,
}

/// A weighted forward target for phased-release rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedTarget {
    /// Target origin identifier.
    pub origin_id: String,
    /// Percentage of matching traffic sent to this target.
    pub percent: u32,
}

/// Weighted traffic-split rule for the phased-release flavor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhasedReleaseRule {
    /// Rule name.
    pub name: String,
    /// Activity window start, epoch seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    /// Activity window end, epoch seconds; must be >= `start` when both set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<i64>,
    /// Whether the rule is disabled.
    #[serde(default)]
    pub disabled: bool,
    /// Whether the rule matches unconditionally.
    #[serde(default)]
    pub matches_always: bool,
    /// URL pattern matched before criteria are consulted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "matchURL")]
    pub match_url: Option<String>,
    /// Ordered match criteria; always present on the wire, empty when the
    /// rule relies on `matchesAlways`.
    #[serde(default)]
    pub matches: Vec<MatchCriterion>,
    /// Weighted targets; percentages must sum to exactly 100.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub forward_settings: Vec<WeightedTarget>,
}

/// Origin/path settings for audience-segmentation rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudienceSegmentationSettings {
    /// Target origin identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_id: Option<String>,
    /// Replacement path and query string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "pathAndQS")]
    pub path_and_qs: Option<String>,
    /// Whether the incoming query string is preserved.
    #[serde(default)]
    pub use_incoming_query_string: bool,
}

/// Audience-segmentation rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudienceSegmentationRule {
    /// Rule name.
    pub name: String,
    /// Activity window start, epoch seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    /// Activity window end, epoch seconds; must be >= `start` when both set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<i64>,
    /// Whether the rule is disabled.
    #[serde(default)]
    pub disabled: bool,
    /// Whether the rule matches unconditionally.
    #[serde(default)]
    pub matches_always: bool,
    /// URL pattern matched before criteria are consulted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "matchURL")]
    pub match_url: Option<String>,
    /// Ordered match criteria; always present on the wire, empty when the
    /// rule relies on `matchesAlways`.
    #[serde(default)]
    pub matches: Vec<MatchCriterion>,
    /// Segment forwarding settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward_settings: Option<AudienceSegmentationSettings>,
}

/// Verdict applied by a request-control rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllowDeny {
    /// Let the request through.
    #[serde(rename = "allow")]
    Allow,
    /// Deny the request.
    #[serde(rename = "deny")]
    Deny,
    /// Deny the request with the branded deny page.
    #[serde(rename = "denybranded")]
    DenyBranded,
}

/// Allow/deny gating rule for the request-control flavor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestControlRule {
    /// Rule name.
    pub name: String,
    /// Activity window start, epoch seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    /// Activity window end, epoch seconds; must be >= `start` when both set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<i64>,
    /// Whether the rule is disabled.
    #[serde(default)]
    pub disabled: bool,
    /// Whether the rule matches unconditionally.
    #[serde(default)]
    pub matches_always: bool,
    /// URL pattern matched before criteria are consulted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "matchURL")]
    pub match_url: Option<String>,
    /// Ordered match criteria; always present on the wire, empty when the
    /// rule relies on `matchesAlways`.
    #[serde(default)]
    pub matches: Vec<MatchCriterion>,
    /// Verdict; required for this flavor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_deny: Option<AllowDeny>,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn rule_tag_matches_flavor_tag() {
        let rule = MatchRule::PhasedRelease(PhasedReleaseRule {
            name: "split".to_string(),
            ..PhasedReleaseRule::default()
        });
        let json = serde_json::to_value(&rule).expect("serialize");
        assert_eq!(json["type"], rule.flavor().rule_tag());
    }

    #[test]
    fn empty_matches_stays_on_the_wire() {
        let rule = MatchRule::EdgeRedirect(EdgeRedirectRule {
            name: "always".to_string(),
            matches_always: true,
            redirect_url: Some("https://www.example.com".to_string()),
            status_code: Some(301),
            ..EdgeRedirectRule::default()
        });
        let json = serde_json::to_value(&rule).expect("serialize");
        assert_eq!(json["matches"], serde_json::json!([]));
        let back: MatchRule = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, rule);
    }

    #[test]
    fn default_booleans_are_omittable_on_input() {
        let json = r#"{"type":"igMatchRule","name":"gate","allowDeny":"deny"}"#;
        let rule: MatchRule = serde_json::from_str(json).expect("deserialize");
        let MatchRule::RequestControl(rc) = &rule else {
            panic!("expected request-control rule");
        };
        assert!(!rc.disabled);
        assert!(!rc.matches_always);
        assert_eq!(rc.allow_deny, Some(AllowDeny::Deny));
    }
}
