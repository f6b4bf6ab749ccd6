use anyhow::Result;

use captcha_resolver_core::{AppConfig, SolverStrategy};
use captcha_resolver_engine::build_resolver;
use captcha_resolver_local::tool_installed;

pub async fn run(config: AppConfig) -> Result<()> {
    let resolver = build_resolver(&config)?;

    println!("Strategies (in order, {}s budget each):", config.resolver.strategy_timeout_seconds);
    for (i, id) in resolver.order().iter().enumerate() {
        let status = match resolver.strategy(*id) {
            Some(strategy) => match strategy.check_available() {
                Ok(()) => "available".to_string(),
                Err(e) => e.to_string(),
            },
            None => "not registered".to_string(),
        };
        let metered = if id.is_metered() { " (metered)" } else { "" };
        println!("  {}. {:<18} {}{}", i + 1, id.as_str(), status, metered);
    }

    let easyocr = tool_installed(&config.local.easyocr_bin, "--help").await;
    let tesseract = tool_installed(&config.local.tesseract_bin, "--version").await;

    println!("Local OCR engines:");
    println!("  EasyOCR:   {}", installed(easyocr));
    println!("  Tesseract: {}", installed(tesseract));
    if !easyocr && !tesseract {
        println!("  local_ocr cannot produce candidates until one engine is installed");
    }

    Ok(())
}

fn installed(found: bool) -> &'static str {
    if found {
        "installed"
    } else {
        "not found"
    }
}
