//! OCR post-correction.
//!
//! [`CorrectionEngine`] proposes alternate readings of a raw OCR guess from
//! an explicit confusion-rule table and re-ranks them by a plausibility
//! heuristic. [`apply_pattern_fixes`] is the deterministic clean-up the
//! scraping workflow runs on the final code.

pub mod engine;
pub mod patterns;
pub mod rules;

pub use engine::{CorrectionCandidate, CorrectionEngine};
pub use patterns::apply_pattern_fixes;
pub use rules::ConfusionRules;
