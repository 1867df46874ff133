//! Data model for cloudlet edge-traffic policies.
//!
//! A cloudlet policy is a versioned, ordered list of match rules that
//! redirect, rewrite, weight, or gate incoming requests at the edge. This
//! crate defines:
//!
//! - the policy/version/activation object model ([`Policy`],
//!   [`PolicyVersion`], [`Activation`]),
//! - the polymorphic match-rule variant system ([`MatchRule`], one variant
//!   per policy flavor, discriminated by the `type` wire tag),
//! - the structured match-value variants ([`ObjectMatchValue`]:
//!   simple/object/range) and their per-flavor resolution,
//! - aggregate structural validation ([`validate_rules`]), and
//! - canonical identity derivation over rule names ([`canonical_rule_id`]).
//!
//! The serde representation of every type in this crate is a wire contract:
//! rule arrays must round-trip bit-exact through JSON.

pub mod activation;
pub mod identity;
pub mod matches;
pub mod policy;
pub mod rules;
pub mod validate;

pub use activation::{Activation, ActivationStatus, Network, ResourceKey, UnknownNetworkError};
pub use identity::canonical_rule_id;
pub use matches::{
    CheckIps, InvalidVariantError, MatchCriterion, MatchOperator, ObjectMatchShape,
    ObjectMatchValue, ObjectMatchValueOptions, resolve_object_match_value,
};
pub use policy::{
    GroupId, Policy, PolicyFlavor, PolicyId, PolicyVersion, PolicyVersionNumber, RuleWarning,
};
pub use rules::{
    AllowDeny, AudienceSegmentationRule, AudienceSegmentationSettings, EdgeRedirectRule,
    ForwardRewriteRule, ForwardSettings, MatchRule, PhasedReleaseRule, RequestControlRule,
    WeightedTarget,
};
pub use validate::{ValidationError, Violation, validate_rules};
