use crate::models::Team;
use serde::Serialize;
use tracing::debug;

/// One keyword tier: any keyword contained in the lowercased description
/// routes to `team`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KeywordRule {
    pub team: Team,
    pub keywords: &'static [&'static str],
}

impl KeywordRule {
    /// First keyword of this rule found in already-lowercased text
    fn first_hit(&self, lowered: &str) -> Option<&'static str> {
        self.keywords.iter().copied().find(|k| lowered.contains(k))
    }
}

/// Keyword tiers in evaluation order. First satisfied tier wins.
pub static DEFAULT_RULES: &[KeywordRule] = &[
    KeywordRule {
        team: Team::Backend,
        keywords: &["api", "database", "backend"],
    },
    KeywordRule {
        team: Team::UX,
        keywords: &["css", "alignment", "color", "style", "spacing"],
    },
    KeywordRule {
        team: Team::Frontend,
        keywords: &["button", "mobile", "dropdown", "form", "header"],
    },
    KeywordRule {
        team: Team::Platform,
        keywords: &["cache", "session", "backup"],
    },
];

/// Which rule fired for a description
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleMatch {
    /// Zero-based tier position
    pub tier: usize,
    pub team: Team,
    pub keyword: &'static str,
}

/// Deterministic keyword classifier over a fixed, ordered rule list.
///
/// Matching is plain substring containment on the lowercased text. No
/// tokenisation, no stripping of punctuation or markup, so `"<div>API
/// failure</div>"` matches `api` and `"information"` matches `form`.
#[derive(Debug, Clone, Copy)]
pub struct RuleClassifier {
    rules: &'static [KeywordRule],
}

impl RuleClassifier {
    pub fn new() -> Self {
        Self {
            rules: DEFAULT_RULES,
        }
    }

    pub fn rules(&self) -> &'static [KeywordRule] {
        self.rules
    }

    /// Classify a description. `None` means no rule matched.
    pub fn classify(&self, description: &str) -> Option<Team> {
        self.explain(description).map(|m| m.team)
    }

    /// Classify and report the tier and keyword that decided it
    pub fn explain(&self, description: &str) -> Option<RuleMatch> {
        let lowered = description.to_lowercase();

        let found = self.rules.iter().enumerate().find_map(|(tier, rule)| {
            rule.first_hit(&lowered).map(|keyword| RuleMatch {
                tier,
                team: rule.team,
                keyword,
            })
        });

        if let Some(m) = &found {
            debug!(tier = m.tier, keyword = m.keyword, team = %m.team, "Keyword rule matched");
        }

        found
    }
}

impl Default for RuleClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Classify a description with the default rule set
pub fn classify(description: &str) -> Option<Team> {
    RuleClassifier::new().classify(description)
}
