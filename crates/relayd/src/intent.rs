//! Tokenizer and intent extractor.
//!
//! Splits a raw utterance into an action verb and a target-name phrase.
//! Pure and deterministic: identical text always yields identical output.

use once_cell::sync::Lazy;
use regex::Regex;
use relay_common::types::{IntentCandidate, Verb};

/// Transcription mishearings corrected before parsing. Applied only to
/// command-shaped text so free-form questions reach the agents untouched.
const CONFUSION_PAIRS: &[(&str, &str)] = &[
    (r"\bgrape room\b", "great room"),
    (r"\bline\b", "light"),
    (r"\blife\b", "light"),
];

static CONFUSIONS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    CONFUSION_PAIRS
        .iter()
        .map(|(pattern, repl)| (Regex::new(pattern).unwrap(), *repl))
        .collect()
});

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\s]").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static COMMAND_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(turn|switch|power|toggle|flip|set|dim|change)\b").unwrap());

static ON_OFF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(turn on|turn off|switch on|switch off|power on|power off|toggle|flip)\s+(.+)$")
        .unwrap()
});

static SET_LEVEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(set|dim|change)\s+(.+?)\s+to\s+([0-9]+(?:\.[0-9]+)?)\s*(?:percent|degrees)?$")
        .unwrap()
});

/// Politeness fillers stripped from the front of the utterance.
const LEAD_FILLERS: &[&str] = &["please", "hey relay", "hey", "okay", "ok", "can you", "could you", "would you"];

/// Articles stripped from the front of the target phrase.
const LEAD_ARTICLES: &[&str] = &["the", "my", "an", "a", "all"];

/// Lowercase, strip punctuation, collapse whitespace.
pub fn normalize(text: &str) -> String {
    let lower = text.to_lowercase();
    let stripped = NON_WORD.replace_all(&lower, " ");
    WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}

fn strip_prefixes(text: &str, prefixes: &[&str]) -> String {
    let mut s = text.trim();
    let mut changed = true;
    while changed {
        changed = false;
        for prefix in prefixes {
            if s == *prefix {
                return String::new();
            }
            if let Some(rest) = s.strip_prefix(&format!("{} ", prefix)) {
                s = rest.trim_start();
                changed = true;
            }
        }
    }
    s.to_string()
}

fn looks_like_command(text: &str) -> bool {
    COMMAND_SHAPE.is_match(text)
}

fn apply_confusions(text: &str) -> String {
    let mut s = text.to_string();
    for (re, repl) in CONFUSIONS.iter() {
        s = re.replace_all(&s, *repl).into_owned();
    }
    s
}

fn target_of(raw: &str) -> String {
    strip_prefixes(raw, LEAD_ARTICLES)
}

/// Extract the action verb and target phrase from one utterance.
///
/// When no action token is recognized the verb is `Unknown` and the full
/// normalized remainder is still produced, so later stages miss cleanly.
pub fn extract(raw_text: &str) -> IntentCandidate {
    let normalized = normalize(raw_text);
    let mut text = strip_prefixes(&normalized, LEAD_FILLERS);

    if looks_like_command(&text) {
        text = apply_confusions(&text);
    }

    if let Some(caps) = SET_LEVEL.captures(&text) {
        let target = target_of(&caps[2]);
        let level = caps[3].parse::<f64>().ok();
        if !target.is_empty() && level.is_some() {
            return IntentCandidate {
                verb: Verb::SetLevel,
                target_phrase: target,
                level,
            };
        }
    }

    if let Some(caps) = ON_OFF.captures(&text) {
        let verb = match &caps[1] {
            "turn on" | "switch on" | "power on" => Verb::TurnOn,
            "turn off" | "switch off" | "power off" => Verb::TurnOff,
            _ => Verb::Toggle,
        };
        let target = target_of(&caps[2]);
        if !target.is_empty() {
            return IntentCandidate {
                verb,
                target_phrase: target,
                level: None,
            };
        }
    }

    IntentCandidate {
        verb: Verb::Unknown,
        target_phrase: text,
        level: None,
    }
}
