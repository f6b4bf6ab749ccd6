use captcha_resolver_correction::{apply_pattern_fixes, CorrectionEngine};

pub fn run(text: &str, limit: usize) {
    let engine = CorrectionEngine::default();
    let ranked = engine.ranked(text);

    if ranked.is_empty() {
        println!("No confusion rule matches {:?}", text);
    } else {
        println!("Candidates ({} total):", ranked.len());
        for c in ranked.iter().take(limit) {
            println!("  {:>5.1}  {:<16} {}", c.score, c.text, c.rule);
        }
    }

    println!("Corrected:     {}", engine.correct(text));
    println!("Pattern fixes: {}", apply_pattern_fixes(text));
}
