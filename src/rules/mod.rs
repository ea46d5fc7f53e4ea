/// Keyword rule classification
///
/// The first stage of triage. A fixed list of keyword tiers is checked in
/// order against the lowercased description:
///
/// ```text
/// Tier | Keywords                                  | Team
/// -----|-------------------------------------------|---------------
/// 0    | api, database, backend                    | Backend Team
/// 1    | css, alignment, color, style, spacing     | UX Team
/// 2    | button, mobile, dropdown, form, header    | Frontend Team
/// 3    | cache, session, backup                    | Platform Team
/// ```
///
/// Descriptions matching no tier are left for the model fallback.

pub mod classifier;

pub use classifier::{classify, KeywordRule, RuleClassifier, RuleMatch, DEFAULT_RULES};
