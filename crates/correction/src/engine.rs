use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use crate::rules::ConfusionRules;

const VOWELS: &[char] = &['a', 'e', 'i', 'o', 'u'];

/// One alternate reading of a raw OCR guess.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrectionCandidate {
    pub text: String,
    pub score: f64,
    /// e.g. `"ml -> mon"`
    pub rule: String,
}

/// Proposes and ranks alternate readings of OCR output.
///
/// Pure over its [`ConfusionRules`]: no global state, never fails.
#[derive(Debug, Clone, Default)]
pub struct CorrectionEngine {
    rules: ConfusionRules,
}

impl CorrectionEngine {
    pub fn new(rules: ConfusionRules) -> Self {
        Self { rules }
    }

    /// Best-scoring alternate reading, or `raw` unchanged when no rule applies.
    pub fn correct(&self, raw: &str) -> String {
        match self.ranked(raw).into_iter().next() {
            Some(best) => {
                debug!(original = %raw, corrected = %best.text, rule = %best.rule, score = best.score, "applied correction");
                best.text
            }
            None => raw.to_string(),
        }
    }

    /// All candidates, best first.
    ///
    /// Ties keep the fewer-digits reading first, then generation order.
    pub fn ranked(&self, raw: &str) -> Vec<CorrectionCandidate> {
        let mut candidates = self.candidates(raw);
        candidates.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| digit_count(&a.text).cmp(&digit_count(&b.text)))
        });
        candidates
    }

    /// Candidates in generation order: digraph rules left to right, then
    /// single-character rules left to right. Deduplicated against the
    /// lowercased input and each other.
    pub fn candidates(&self, raw: &str) -> Vec<CorrectionCandidate> {
        let lowered = raw.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(lowered.clone());
        let mut out = Vec::new();

        let mut push = |text: String, rule: String, out: &mut Vec<CorrectionCandidate>| {
            if seen.insert(text.clone()) {
                let score = self.score(&text);
                out.push(CorrectionCandidate { text, score, rule });
            }
        };

        for i in 0..chars.len().saturating_sub(1) {
            let window: String = chars[i..i + 2].iter().collect();
            for replacement in self.rules.digraph_alternates(&window) {
                let text = splice(&chars, i, 2, replacement);
                push(text, format!("{} -> {}", window, replacement), &mut out);
            }
        }

        for (i, c) in chars.iter().enumerate() {
            for replacement in self.rules.single_alternates(*c) {
                let text = splice(&chars, i, 1, replacement);
                push(text, format!("{} -> {}", c, replacement), &mut out);
            }
        }

        out
    }

    /// Plausibility of a reading as a CAPTCHA code. Higher is better.
    pub fn score(&self, candidate: &str) -> f64 {
        let chars: Vec<char> = candidate.chars().collect();
        let len = chars.len();
        let mut score = 0.0;

        if (4..=8).contains(&len) {
            score += 2.0;
        } else if len < 4 {
            score -= 3.0;
        }

        for (digraph, bonus) in self.rules.bonus_digraphs() {
            if candidate.contains(digraph.as_str()) {
                score += bonus;
            }
        }

        let unique: HashSet<&char> = chars.iter().collect();
        if (unique.len() as f64) < len as f64 * 0.5 {
            score -= 1.0;
        }

        if len > 0 {
            let vowels = chars.iter().filter(|c| VOWELS.contains(*c)).count();
            let ratio = vowels as f64 / len as f64;
            if (0.2..=0.6).contains(&ratio) {
                score += 1.0;
            }
        }

        score
    }
}

fn splice(chars: &[char], at: usize, width: usize, replacement: &str) -> String {
    let mut text: String = chars[..at].iter().collect();
    text.push_str(replacement);
    text.extend(&chars[at + width..]);
    text
}

fn digit_count(text: &str) -> usize {
    text.chars().filter(char::is_ascii_digit).count()
}
