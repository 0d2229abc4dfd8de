//! Site block rule model

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::entity::{EntityId, EntityKind, SyncMeta, SyncedRecord};

/// A rule blocking distracting sites while focus mode is active.
///
/// Patterns are domain wildcards (`*.example.com`, `news.*`), compiled to an
/// anchored regex for matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRule {
    pub id: EntityId,
    pub pattern: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub owner_id: String,
    #[serde(flatten)]
    pub meta: SyncMeta,
}

const fn default_enabled() -> bool {
    true
}

impl BlockRule {
    #[must_use]
    pub fn new(pattern: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            pattern: pattern.into(),
            enabled: true,
            owner_id: owner_id.into(),
            meta: SyncMeta::new(),
        }
    }

    /// Check whether a host matches this rule. Disabled rules never match.
    #[must_use]
    pub fn matches_host(&self, host: &str) -> bool {
        if !self.enabled {
            return false;
        }
        match Regex::new(&wildcard_to_regex(&self.pattern)) {
            Ok(re) => re.is_match(&host.to_lowercase()),
            Err(_) => false,
        }
    }
}

impl SyncedRecord for BlockRule {
    const KIND: EntityKind = EntityKind::BlockRule;

    fn entity_id(&self) -> EntityId {
        self.id
    }

    fn meta(&self) -> &SyncMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut SyncMeta {
        &mut self.meta
    }

    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

/// Translate a domain wildcard into an anchored regex, escaping everything
/// except `*`.
fn wildcard_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');
    for ch in pattern.trim().to_lowercase().chars() {
        match ch {
            '*' => out.push_str(".*"),
            c if "\\.+?()[]{}|^$".contains(c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push('$');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_host_match() {
        let rule = BlockRule::new("news.ycombinator.com", "user-1");
        assert!(rule.matches_host("news.ycombinator.com"));
        assert!(!rule.matches_host("ycombinator.com"));
    }

    #[test]
    fn test_wildcard_subdomain_match() {
        let rule = BlockRule::new("*.reddit.com", "user-1");
        assert!(rule.matches_host("www.reddit.com"));
        assert!(rule.matches_host("old.reddit.com"));
        assert!(!rule.matches_host("reddit.com"));
    }

    #[test]
    fn test_disabled_rule_never_matches() {
        let mut rule = BlockRule::new("*.twitter.com", "user-1");
        rule.enabled = false;
        assert!(!rule.matches_host("www.twitter.com"));
    }

    #[test]
    fn test_dots_are_literal() {
        let rule = BlockRule::new("a.b", "user-1");
        assert!(!rule.matches_host("axb"));
        assert!(rule.matches_host("A.B"));
    }
}
