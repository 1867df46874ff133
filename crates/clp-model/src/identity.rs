//! Canonical identity derivation for rule lists.

use sha2::{Digest, Sha256};

use crate::rules::MatchRule;

/// Hex characters kept from the digest.
const ID_LEN_BYTES: usize = 8;

/// Derive a short, stable identifier from an ordered rule list.
///
/// The identifier is a truncated SHA-256 over the rule *names* in order,
/// separated so that name boundaries cannot collide. It exists for
/// idempotent downstream resource naming and is intentionally insensitive
/// to rule content: editing a rule's fields without renaming it leaves the
/// identifier unchanged. Callers must not use it for content drift
/// detection, and it is not a security mechanism.
#[must_use]
pub fn canonical_rule_id(rules: &[MatchRule]) -> String {
    let mut hasher = Sha256::new();
    for rule in rules {
        hasher.update(rule.name().as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(&hasher.finalize()[..ID_LEN_BYTES])
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::rules::{EdgeRedirectRule, MatchRule};

    fn named_rule(name: &str, redirect: &str) -> MatchRule {
        MatchRule::EdgeRedirect(EdgeRedirectRule {
            name: name.to_string(),
            redirect_url: Some(redirect.to_string()),
            status_code: Some(301),
            ..EdgeRedirectRule::default()
        })
    }

    #[test]
    fn identity_is_deterministic() {
        let rules = vec![named_rule("a", "https://a.example"), named_rule("b", "https://b.example")];
        assert_eq!(canonical_rule_id(&rules), canonical_rule_id(&rules));
        assert_eq!(canonical_rule_id(&rules).len(), 16);
    }

    #[test]
    fn identity_is_order_sensitive() {
        let ab = vec![named_rule("a", "https://x.example"), named_rule("b", "https://x.example")];
        let ba = vec![named_rule("b", "https://x.example"), named_rule("a", "https://x.example")];
        assert_ne!(canonical_rule_id(&ab), canonical_rule_id(&ba));
    }

    #[test]
    fn identity_ignores_rule_content() {
        let before = vec![named_rule("a", "https://old.example")];
        let after = vec![named_rule("a", "https://new.example")];
        assert_eq!(canonical_rule_id(&before), canonical_rule_id(&after));
    }

    #[test]
    fn name_boundaries_do_not_collide() {
        let joined = vec![named_rule("ab", "https://x.example")];
        let split = vec![named_rule("a", "https://x.example"), named_rule("b", "https://x.example")];
        assert_ne!(canonical_rule_id(&joined), canonical_rule_id(&split));
    }
}
