use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::json;
use tracing::info;
use url::Url;

use captcha_resolver_core::{AppConfig, CaptchaImage, ImageFormat, ResolveError, SolveAttempt, StrategyId};
use captcha_resolver_correction::apply_pattern_fixes;
use captcha_resolver_engine::build_resolver;

/// Checked in order when no image is given.
const DEFAULT_IMAGE_NAMES: [&str; 3] = ["captcha_image.png", "captcha.png", "captcha.jpg"];

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

pub async fn run(
    config: AppConfig,
    image: Option<PathBuf>,
    url: Option<String>,
    base: Option<String>,
    methods: Option<String>,
    json_output: bool,
) -> Result<()> {
    let image = match (image, url) {
        (_, Some(url)) => {
            let target = resolve_url(&url, base.as_deref())?;
            download_image(&target, Duration::from_secs(config.workflow.download_timeout_seconds)).await?
        }
        (Some(path), None) => CaptchaImage::from_path(&path)?,
        (None, None) => {
            let cwd = std::env::current_dir()?;
            let path = find_default_image(&cwd).map_err(|present| {
                if present.is_empty() {
                    anyhow!("no CAPTCHA image found in {}", cwd.display())
                } else {
                    anyhow!("no CAPTCHA image found; image files present: {}", present.join(", "))
                }
            })?;
            info!(path = %path.display(), "using default CAPTCHA image");
            CaptchaImage::from_path(&path)?
        }
    };

    let order = match methods {
        Some(list) => StrategyId::parse_list(&list).map_err(|e| anyhow!(e))?,
        None => config.resolver.order.clone(),
    };

    let resolver = build_resolver(&config)?;
    match resolver.resolve_with_order(&image, &order).await {
        Ok(resolution) => {
            let submitted = if config.workflow.apply_pattern_fixes {
                apply_pattern_fixes(resolution.code.text())
            } else {
                resolution.code.text().to_string()
            };
            if json_output {
                let out = json!({ "resolution": resolution, "submitted": submitted });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                if submitted != resolution.code.text() {
                    info!(resolved = %resolution.code, submitted = %submitted, "pattern fix-ups applied");
                }
                println!("{}", submitted);
            }
            Ok(())
        }
        Err(err) => {
            if json_output {
                let out = json!({ "error": err.to_string(), "attempts": err.attempts() });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                print_trace(err.attempts());
            }
            Err(exhausted(err))
        }
    }
}

fn exhausted(err: ResolveError) -> anyhow::Error {
    anyhow!("CAPTCHA not resolved: {}", err)
}

fn print_trace(attempts: &[SolveAttempt]) {
    eprintln!("Attempts:");
    for (i, a) in attempts.iter().enumerate() {
        eprintln!(
            "  {}. {:<18} {:<10} {:>6}ms  {}",
            i + 1,
            a.strategy.as_str(),
            format!("{:?}", a.status),
            a.elapsed_ms,
            a.diagnostic
        );
    }
}

/// Absolute URLs are used as-is; relative ones need `base`.
pub fn resolve_url(raw: &str, base: Option<&str>) -> Result<Url> {
    match Url::parse(raw) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = base.ok_or_else(|| anyhow!("relative URL {} needs --base", raw))?;
            Ok(Url::parse(base)?.join(raw)?)
        }
        Err(e) => Err(e.into()),
    }
}

async fn download_image(url: &Url, timeout: Duration) -> Result<CaptchaImage> {
    info!(url = %url, "downloading CAPTCHA image");
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    let resp = client.get(url.clone()).send().await?;
    if !resp.status().is_success() {
        bail!("CAPTCHA download failed: HTTP {}", resp.status());
    }

    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_lowercase);
    let bytes = resp.bytes().await?.to_vec();

    let format = ImageFormat::sniff(&bytes)
        .or_else(|| match content_type.as_deref() {
            Some(ct) if ct.contains("jpeg") || ct.contains("jpg") => Some(ImageFormat::Jpeg),
            Some(ct) if ct.contains("png") => Some(ImageFormat::Png),
            _ => None,
        })
        .context("downloaded file is not a PNG or JPEG image")?;

    info!(bytes = bytes.len(), format = ?format, "CAPTCHA image downloaded");
    Ok(CaptchaImage::new(bytes, format)?)
}

/// First default name present in `dir`, or the image files that are there.
pub fn find_default_image(dir: &Path) -> std::result::Result<PathBuf, Vec<String>> {
    for name in DEFAULT_IMAGE_NAMES {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }

    let mut present: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.extension()
                        .and_then(|e| e.to_str())
                        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
                        .unwrap_or(false)
                })
                .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
                .collect()
        })
        .unwrap_or_default();
    present.sort();
    Err(present)
}
