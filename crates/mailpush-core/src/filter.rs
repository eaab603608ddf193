//! Keyword priority rules

use tracing::info;

use crate::NotifyRules;

/// Priority reported when no rule matched; below any valid weight
pub const NO_MATCH: i64 = -1000;

/// Outcome of running the rules over one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterDecision {
    /// Highest matched weight, or [`NO_MATCH`]
    pub priority: i64,
    /// Keyword that produced `priority`
    pub keyword: Option<String>,
}

impl FilterDecision {
    pub fn should_notify(&self) -> bool {
        self.priority > NO_MATCH
    }
}

/// Score sender, subject and body against the rules.
///
/// Matching is plain substring containment on the lowercased, newline-joined
/// text, so partial words match too.
pub fn decide(
    name: &str,
    address: &str,
    subject: &str,
    body: &str,
    rules: &NotifyRules,
) -> FilterDecision {
    let combined = format!("{}\n{}\n{}\n{}", name, address, subject, body).to_lowercase();

    let mut decision = FilterDecision {
        priority: NO_MATCH,
        keyword: None,
    };

    for rule in rules.iter() {
        if combined.contains(&rule.keyword.to_lowercase()) {
            info!("Matched '{}' with priority {}", rule.keyword, rule.priority);
            if rule.priority > decision.priority {
                decision.priority = rule.priority;
                decision.keyword = Some(rule.keyword.clone());
            }
        }
    }

    decision
}
