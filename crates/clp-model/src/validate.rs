//! Structural validation over ordered rule lists.
//!
//! Validation never fails fast: every violation in the whole list is
//! collected so callers can fix a configuration in one pass.

use std::fmt;

use crate::matches::{MatchCriterion, ObjectMatchValue, resolve_object_match_value};
use crate::policy::PolicyFlavor;
use crate::rules::MatchRule;

/// Redirect status codes accepted by edge-redirect rules.
const REDIRECT_STATUS_CODES: [u16; 5] = [301, 302, 303, 307, 308];

/// A single field-level validation violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Path to the offending field, e.g. `matchRules[2].matches[0].matchValue`.
    pub path: String,
    /// What is wrong with the field.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Aggregate validation failure carrying every known violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// All violations found, in rule order.
    pub violations: Vec<Violation>,
}

impl ValidationError {
    /// Number of violations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Whether the violation list is empty (never true for a returned error).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rule validation failed with {} violation(s)",
            self.violations.len()
        )?;
        for violation in &self.violations {
            write!(f, "; {violation}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Collector that accumulates violations with hierarchical field paths.
struct Violations {
    items: Vec<Violation>,
}

impl Violations {
    const fn new() -> Self {
        Self { items: Vec::new() }
    }

    fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.items.push(Violation {
            path: path.into(),
            message: message.into(),
        });
    }

    fn into_result(self) -> Result<(), ValidationError> {
        if self.items.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                violations: self.items,
            })
        }
    }
}

/// Validate an ordered rule list against its policy flavor.
///
/// Runs every structural check over the whole list and aggregates all
/// violations rather than failing on the first.
///
/// # Errors
///
/// Returns a [`ValidationError`] enumerating every violation with a field
/// path.
pub fn validate_rules(flavor: PolicyFlavor, rules: &[MatchRule]) -> Result<(), ValidationError> {
    let mut out = Violations::new();

    for (index, rule) in rules.iter().enumerate() {
        let base = format!("matchRules[{index}]");

        if rule.flavor() != flavor {
            out.push(
                format!("{base}.type"),
                format!(
                    "rule type '{}' is not valid for {flavor} policies (expected '{}')",
                    rule.flavor().rule_tag(),
                    flavor.rule_tag()
                ),
            );
        }

        if rule.matches_always() && !rule.matches().is_empty() {
            out.push(
                format!("{base}.matches"),
                "must be blank when matchesAlways is set",
            );
        }

        if let (Some(start), Some(end)) = rule.window() {
            if end < start {
                out.push(
                    format!("{base}.end"),
                    format!("must be greater than or equal to start ({start}), got {end}"),
                );
            }
        }

        for (m_index, criterion) in rule.matches().iter().enumerate() {
            check_criterion(
                &mut out,
                &format!("{base}.matches[{m_index}]"),
                flavor,
                criterion,
            );
        }

        check_flavor_fields(&mut out, &base, rule);
    }

    out.into_result()
}

fn check_criterion(
    out: &mut Violations,
    base: &str,
    flavor: PolicyFlavor,
    criterion: &MatchCriterion,
) {
    if !flavor
        .allowed_match_types()
        .contains(&criterion.match_type.as_str())
    {
        out.push(
            format!("{base}.matchType"),
            format!(
                "matchType '{}' is not valid for {flavor} policies",
                criterion.match_type
            ),
        );
    }

    match (&criterion.match_value, &criterion.object_match_value) {
        (Some(_), Some(_)) => {
            out.push(
                format!("{base}.matchValue"),
                "must be blank when objectMatchValue is set",
            );
        }
        (None, None) => {
            if criterion.match_operator.requires_value() {
                out.push(
                    format!("{base}.matchValue"),
                    "cannot be blank when objectMatchValue is blank",
                );
            }
        }
        _ => {}
    }

    match resolve_object_match_value(criterion, flavor.allowed_shapes()) {
        Ok(Some(ObjectMatchValue::Range { value: (low, high) })) if low > high => {
            out.push(
                format!("{base}.objectMatchValue.value"),
                format!("range low {low} must not exceed high {high}"),
            );
        }
        Ok(_) => {}
        Err(err) => {
            out.push(format!("{base}.objectMatchValue"), err.to_string());
        }
    }
}

fn check_flavor_fields(out: &mut Violations, base: &str, rule: &MatchRule) {
    match rule {
        MatchRule::EdgeRedirect(er) => {
            if er.redirect_url.as_deref().is_none_or(str::is_empty) {
                out.push(format!("{base}.redirectURL"), "cannot be blank");
            }
            match er.status_code {
                None => out.push(format!("{base}.statusCode"), "cannot be blank"),
                Some(code) if !REDIRECT_STATUS_CODES.contains(&code) => {
                    out.push(
                        format!("{base}.statusCode"),
                        format!("must be one of 301, 302, 303, 307, 308 (got {code})"),
                    );
                }
                Some(_) => {}
            }
        }
        MatchRule::ForwardRewrite(fr) => match &fr.forward_settings {
            None => out.push(format!("{base}.forwardSettings"), "cannot be blank"),
            Some(settings) => {
                if settings.origin_id.as_deref().is_none_or(str::is_empty) {
                    out.push(format!("{base}.forwardSettings.originId"), "cannot be blank");
                }
                if let Some(percent) = settings.percent {
                    if percent == 0 || percent > 100 {
                        out.push(
                            format!("{base}.forwardSettings.percent"),
                            format!("must be between 1 and 100 (got {percent})"),
                        );
                    }
                }
            }
        },
        MatchRule::PhasedRelease(cd) => {
            if cd.forward_settings.is_empty() {
                out.push(format!("{base}.forwardSettings"), "cannot be blank");
            } else {
                let total: u64 = cd
                    .forward_settings
                    .iter()
                    .map(|target| u64::from(target.percent))
                    .sum();
                if total != 100 {
                    out.push(
                        format!("{base}.forwardSettings"),
                        format!("target percentages must sum to exactly 100 (got {total})"),
                    );
                }
            }
        }
        MatchRule::AudienceSegmentation(segment) => match &segment.forward_settings {
            None => out.push(format!("{base}.forwardSettings"), "cannot be blank"),
            Some(settings) => {
                let has_origin = settings.origin_id.as_deref().is_some_and(|s| !s.is_empty());
                let has_path = settings.path_and_qs.as_deref().is_some_and(|s| !s.is_empty());
                if !has_origin && !has_path {
                    out.push(
                        format!("{base}.forwardSettings"),
                        "must set originId or pathAndQS",
                    );
                }
            }
        },
        MatchRule::RequestControl(rc) => {
            if rc.allow_deny.is_none() {
                out.push(format!("{base}.allowDeny"), "cannot be blank");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::matches::{MatchCriterion, ObjectMatchValue};
    use crate::rules::{
        AllowDeny, EdgeRedirectRule, PhasedReleaseRule, RequestControlRule, WeightedTarget,
    };

    fn redirect_rule(name: &str) -> EdgeRedirectRule {
        EdgeRedirectRule {
            name: name.to_string(),
            redirect_url: Some("https://www.example.com/new".to_string()),
            status_code: Some(302),
            ..EdgeRedirectRule::default()
        }
    }

    fn split_rule(name: &str, weights: &[(&str, u32)]) -> PhasedReleaseRule {
        PhasedReleaseRule {
            name: name.to_string(),
            forward_settings: weights
                .iter()
                .map(|(origin, percent)| WeightedTarget {
                    origin_id: (*origin).to_string(),
                    percent: *percent,
                })
                .collect(),
            ..PhasedReleaseRule::default()
        }
    }

    #[test]
    fn valid_rules_pass() {
        let rules = vec![MatchRule::PhasedRelease(split_rule(
            "split",
            &[("a", 60), ("b", 40)],
        ))];
        validate_rules(PolicyFlavor::PhasedRelease, &rules).expect("valid");
    }

    #[test]
    fn weight_sum_violation_names_actual_total() {
        let rules = vec![MatchRule::PhasedRelease(split_rule(
            "split",
            &[("a", 60), ("b", 39)],
        ))];
        let err = validate_rules(PolicyFlavor::PhasedRelease, &rules).expect_err("sum is 99");
        assert_eq!(err.violations.len(), 1);
        assert_eq!(err.violations[0].path, "matchRules[0].forwardSettings");
        assert_eq!(
            err.violations[0].message,
            "target percentages must sum to exactly 100 (got 99)"
        );

        let rules = vec![MatchRule::PhasedRelease(split_rule(
            "split",
            &[("a", 60), ("b", 41)],
        ))];
        let err = validate_rules(PolicyFlavor::PhasedRelease, &rules).expect_err("sum is 101");
        assert_eq!(
            err.violations[0].message,
            "target percentages must sum to exactly 100 (got 101)"
        );
    }

    #[test]
    fn value_exclusivity_violations_are_aggregated() {
        let mut both_set = redirect_rule("both");
        both_set.matches.push(MatchCriterion {
            match_type: "hostname".to_string(),
            match_value: Some("www.example.com".to_string()),
            object_match_value: Some(ObjectMatchValue::Simple {
                value: vec!["www.example.com".to_string()],
            }),
            ..MatchCriterion::default()
        });
        let mut both_blank = redirect_rule("blank");
        both_blank.matches.push(MatchCriterion {
            match_type: "hostname".to_string(),
            ..MatchCriterion::default()
        });

        let rules = vec![
            MatchRule::EdgeRedirect(both_set),
            MatchRule::EdgeRedirect(both_blank),
        ];
        let err = validate_rules(PolicyFlavor::EdgeRedirect, &rules).expect_err("both invalid");
        let messages: Vec<&str> = err
            .violations
            .iter()
            .map(|v| v.message.as_str())
            .collect();
        assert!(messages.contains(&"must be blank when objectMatchValue is set"));
        assert!(messages.contains(&"cannot be blank when objectMatchValue is blank"));
    }

    #[test]
    fn exists_operator_requires_no_value() {
        let mut rule = redirect_rule("exists");
        rule.matches.push(MatchCriterion {
            match_type: "header".to_string(),
            match_operator: crate::matches::MatchOperator::Exists,
            ..MatchCriterion::default()
        });
        validate_rules(PolicyFlavor::EdgeRedirect, &[MatchRule::EdgeRedirect(rule)])
            .expect("exists needs no value");
    }

    #[test]
    fn range_rejected_for_flavor_without_ranges() {
        let mut rule = redirect_rule("ranged");
        rule.matches.push(MatchCriterion {
            match_type: "hostname".to_string(),
            object_match_value: Some(ObjectMatchValue::Range { value: (1, 50) }),
            ..MatchCriterion::default()
        });
        let err = validate_rules(PolicyFlavor::EdgeRedirect, &[MatchRule::EdgeRedirect(rule)])
            .expect_err("range not allowed for edge redirect");
        assert_eq!(
            err.violations[0].message,
            "unsupported objectMatchValue type 'range': expected one of ['simple', 'object']"
        );
    }

    #[test]
    fn window_ordering_checked() {
        let mut rule = redirect_rule("windowed");
        rule.start = Some(2_000);
        rule.end = Some(1_000);
        let err = validate_rules(PolicyFlavor::EdgeRedirect, &[MatchRule::EdgeRedirect(rule)])
            .expect_err("end before start");
        assert_eq!(err.violations[0].path, "matchRules[0].end");
    }

    #[test]
    fn matches_always_forbids_criteria() {
        let mut rule = redirect_rule("always");
        rule.matches_always = true;
        rule.matches.push(MatchCriterion {
            match_type: "hostname".to_string(),
            match_value: Some("www.example.com".to_string()),
            ..MatchCriterion::default()
        });
        let err = validate_rules(PolicyFlavor::EdgeRedirect, &[MatchRule::EdgeRedirect(rule)])
            .expect_err("matchesAlways with criteria");
        assert_eq!(err.violations[0].path, "matchRules[0].matches");
    }

    #[test]
    fn missing_verdict_flagged_for_request_control() {
        let rule = RequestControlRule {
            name: "gate".to_string(),
            matches_always: true,
            allow_deny: None,
            ..RequestControlRule::default()
        };
        let err = validate_rules(
            PolicyFlavor::RequestControl,
            &[MatchRule::RequestControl(rule)],
        )
        .expect_err("verdict required");
        assert_eq!(err.violations[0].path, "matchRules[0].allowDeny");

        let rule = RequestControlRule {
            name: "gate".to_string(),
            matches_always: true,
            allow_deny: Some(AllowDeny::Allow),
            ..RequestControlRule::default()
        };
        validate_rules(
            PolicyFlavor::RequestControl,
            &[MatchRule::RequestControl(rule)],
        )
        .expect("verdict present");
    }

    #[test]
    fn wrong_rule_tag_for_flavor_flagged() {
        let rules = vec![MatchRule::EdgeRedirect(redirect_rule("stray"))];
        let err =
            validate_rules(PolicyFlavor::PhasedRelease, &rules).expect_err("tag mismatch");
        assert_eq!(err.violations[0].path, "matchRules[0].type");
    }

    #[test]
    fn all_violations_are_reported_together() {
        let mut bad_redirect = redirect_rule("bad");
        bad_redirect.redirect_url = None;
        bad_redirect.status_code = Some(200);
        let rules = vec![
            MatchRule::EdgeRedirect(bad_redirect),
            MatchRule::PhasedRelease(split_rule("split", &[("a", 10)])),
        ];
        let err = validate_rules(PolicyFlavor::EdgeRedirect, &rules).expect_err("many violations");
        // blank redirectURL + bad statusCode + wrong tag + bad weight sum
        assert_eq!(err.violations.len(), 4);
    }
}
