//! Free-text command classification.
//!
//! Incoming messages are matched against an explicit, ordered rule table:
//! each rule is a set of substrings mapped to one intent, rules are tested
//! top to bottom and the first hit wins. Messages containing several
//! keywords ("log my water steps") therefore resolve deterministically.

use std::sync::LazyLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Bmi,
    WaterIntake,
    Steps,
    HealthTips,
    LogHealth,
    AiAssistant,
    Unknown,
}

/// Priority-ordered dispatch table. Order is part of the contract; tests
/// pin it down.
const RULES: &[(&[&str], Intent)] = &[
    (&["bmi"], Intent::Bmi),
    (&["water"], Intent::WaterIntake),
    (&["steps"], Intent::Steps),
    (&["health tips", "tip"], Intent::HealthTips),
    (&["log health", "log"], Intent::LogHealth),
    (&["ai assistant", "ai"], Intent::AiAssistant),
];

/// Shown whenever a message cannot be classified or lacks parameters.
pub const AVAILABLE_COMMANDS: &str = "bmi, water, steps, tip, log, ai";

/// Resolve a message to an intent. Matching is case-insensitive substring
/// containment over the rule table; no match resolves to `Unknown`.
pub fn classify(message: &str) -> Intent {
    let normalized = message.to_lowercase();
    for (keywords, intent) in RULES {
        if keywords.iter().any(|k| normalized.contains(k)) {
            return *intent;
        }
    }
    Intent::Unknown
}

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("number pattern is valid"));

/// Pull the numeric literals out of a message, in order of appearance.
/// Used for parameter extraction ("bmi 172 68" -> [172.0, 68.0]).
pub fn extract_numbers(message: &str) -> Vec<f64> {
    NUMBER
        .find_iter(message)
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_basic_messages() {
        assert_eq!(classify("what's my bmi"), Intent::Bmi);
        assert_eq!(classify("log water please"), Intent::WaterIntake);
        assert_eq!(classify("I walked 12000 steps"), Intent::Steps);
        assert_eq!(classify("give me a health tip"), Intent::HealthTips);
        assert_eq!(classify("log my sleep"), Intent::LogHealth);
        assert_eq!(classify("ask the ai assistant something"), Intent::AiAssistant);
    }

    #[test]
    fn is_case_insensitive() {
        assert_eq!(classify("BMI please"), Intent::Bmi);
        assert_eq!(classify("Health Tips"), Intent::HealthTips);
    }

    #[test]
    fn first_rule_wins_on_multiple_keywords() {
        assert_eq!(classify("bmi and water"), Intent::Bmi);
        assert_eq!(classify("log my water steps"), Intent::WaterIntake);
        assert_eq!(classify("steps or a tip"), Intent::Steps);
    }

    #[test]
    fn unmatched_input_is_unknown() {
        assert_eq!(classify("xyz"), Intent::Unknown);
        assert_eq!(classify(""), Intent::Unknown);
    }

    #[test]
    fn extracts_numbers_in_order() {
        assert_eq!(extract_numbers("bmi 172 68.5"), vec![172.0, 68.5]);
        assert_eq!(extract_numbers("drink 500 ml"), vec![500.0]);
        assert!(extract_numbers("no numbers here").is_empty());
    }
}
