//! Image clean-up ahead of local OCR.
//!
//! Everything here is best-effort: an image that cannot be decoded is
//! passed through untouched rather than failing the strategy.

use std::io::Cursor;

use image::{DynamicImage, GrayImage, Luma};
use imageproc::contrast::otsu_level;
use imageproc::distance_transform::Norm;
use imageproc::filter::median_filter;
use imageproc::morphology::open;
use tracing::{debug, warn};

use captcha_resolver_core::{CaptchaImage, ImageFormat};

const SHARPEN: [[i32; 3]; 3] = [[-1, -1, -1], [-1, 9, -1], [-1, -1, -1]];

/// Otsu binarization, opening, median blur, then sharpening.
///
/// Returns the input unchanged if it cannot be decoded or re-encoded.
pub fn clean_for_ocr(image: &CaptchaImage) -> CaptchaImage {
    let decoded = match image::load_from_memory(image.bytes()) {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!(error = %e, "image cleaning skipped, cannot decode");
            return image.clone();
        }
    };

    let gray = decoded.to_luma8();
    let (binary, level) = binarize_otsu(&gray);
    let opened = open(&binary, Norm::LInf, 1);
    let smoothed = median_filter(&opened, 1, 1);
    let sharpened = sharpen(&smoothed);
    debug!(otsu_level = level, width = gray.width(), height = gray.height(), "image cleaned");

    match encode_png(&DynamicImage::ImageLuma8(sharpened)) {
        Some(bytes) => CaptchaImage::new(bytes, ImageFormat::Png).unwrap_or_else(|_| image.clone()),
        None => image.clone(),
    }
}

/// Global threshold chosen by Otsu's method (minimum intra-class variance).
pub fn binarize_otsu(gray: &GrayImage) -> (GrayImage, u8) {
    let level = otsu_level(gray);
    (binarize(gray, level), level)
}

/// Pixels brighter than `level` become white, the rest black.
pub fn binarize(gray: &GrayImage, level: u8) -> GrayImage {
    let mut out = gray.clone();
    for p in out.pixels_mut() {
        p[0] = if p[0] > level { 255 } else { 0 };
    }
    out
}

/// 3x3 sharpening convolution, edges replicated.
pub fn sharpen(gray: &GrayImage) -> GrayImage {
    let (w, h) = gray.dimensions();
    let mut out = GrayImage::new(w, h);
    if w == 0 || h == 0 {
        return out;
    }
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0i32;
            for (ky, row) in SHARPEN.iter().enumerate() {
                for (kx, k) in row.iter().enumerate() {
                    let sx = (x as i64 + kx as i64 - 1).clamp(0, w as i64 - 1) as u32;
                    let sy = (y as i64 + ky as i64 - 1).clamp(0, h as i64 - 1) as u32;
                    acc += k * gray.get_pixel(sx, sy)[0] as i32;
                }
            }
            out.put_pixel(x, y, Luma([acc.clamp(0, 255) as u8]));
        }
    }
    out
}

/// Stretch intensities away from the mean by `factor`.
pub fn boost_contrast(gray: &GrayImage, factor: f32) -> GrayImage {
    let count = (gray.width() as u64 * gray.height() as u64).max(1);
    let sum: u64 = gray.pixels().map(|p| p[0] as u64).sum();
    let mean = (sum as f32 / count as f32).round();

    let mut out = gray.clone();
    for p in out.pixels_mut() {
        let v = mean + factor * (p[0] as f32 - mean);
        p[0] = v.round().clamp(0.0, 255.0) as u8;
    }
    out
}

pub fn encode_png(image: &DynamicImage) -> Option<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    match image.write_to(&mut buf, image::ImageFormat::Png) {
        Ok(()) => Some(buf.into_inner()),
        Err(e) => {
            warn!(error = %e, "failed to encode png");
            None
        }
    }
}

/// Renderings of the image fed to the whitelist OCR engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Original,
    GrayscaleContrast,
    BinaryThreshold,
    NoiseRemoval,
    Sharpening,
    InvertColors,
}

impl Variant {
    pub const ALL: [Variant; 6] = [
        Variant::Original,
        Variant::GrayscaleContrast,
        Variant::BinaryThreshold,
        Variant::NoiseRemoval,
        Variant::Sharpening,
        Variant::InvertColors,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Variant::Original => "original",
            Variant::GrayscaleContrast => "grayscale_contrast",
            Variant::BinaryThreshold => "binary_threshold",
            Variant::NoiseRemoval => "noise_removal",
            Variant::Sharpening => "sharpening",
            Variant::InvertColors => "invert_colors",
        }
    }

    pub fn render(&self, image: &DynamicImage) -> DynamicImage {
        if *self == Variant::Original {
            return image.clone();
        }
        let gray = image.to_luma8();
        let out = match self {
            Variant::GrayscaleContrast => boost_contrast(&gray, 2.5),
            Variant::BinaryThreshold => binarize(&gray, 128),
            Variant::NoiseRemoval => boost_contrast(&median_filter(&gray, 1, 1), 2.0),
            Variant::Sharpening => sharpen(&gray),
            Variant::InvertColors => {
                let mut inverted = gray;
                image::imageops::invert(&mut inverted);
                inverted
            }
            Variant::Original => gray,
        };
        DynamicImage::ImageLuma8(out)
    }
}

/// PNG-encoded renderings of every variant. An undecodable image yields
/// only the original bytes.
pub fn render_variants(image: &CaptchaImage) -> Vec<(Variant, CaptchaImage)> {
    let decoded = match image::load_from_memory(image.bytes()) {
        Ok(decoded) => decoded,
        Err(_) => return vec![(Variant::Original, image.clone())],
    };

    Variant::ALL
        .iter()
        .filter_map(|variant| {
            if *variant == Variant::Original {
                return Some((*variant, image.clone()));
            }
            let bytes = encode_png(&variant.render(&decoded))?;
            let rendered = CaptchaImage::new(bytes, ImageFormat::Png).ok()?;
            Some((*variant, rendered))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_tone(w: u32, h: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, _| if x < w / 2 { Luma([30]) } else { Luma([220]) })
    }

    fn png_image(gray: GrayImage) -> CaptchaImage {
        let bytes = encode_png(&DynamicImage::ImageLuma8(gray)).unwrap();
        CaptchaImage::new(bytes, ImageFormat::Png).unwrap()
    }

    #[test]
    fn test_otsu_splits_bimodal_image() {
        let (binary, level) = binarize_otsu(&two_tone(20, 10));
        assert!((30..220).contains(&level));
        assert_eq!(binary.get_pixel(0, 0)[0], 0);
        assert_eq!(binary.get_pixel(19, 9)[0], 255);
    }

    #[test]
    fn test_sharpen_keeps_flat_regions() {
        let flat = GrayImage::from_pixel(5, 5, Luma([100]));
        let out = sharpen(&flat);
        assert!(out.pixels().all(|p| p[0] == 100));
    }

    #[test]
    fn test_contrast_boost_spreads_values() {
        let img = GrayImage::from_fn(2, 1, |x, _| if x == 0 { Luma([100]) } else { Luma([140]) });
        let out = boost_contrast(&img, 2.5);
        assert_eq!(out.get_pixel(0, 0)[0], 70);
        assert_eq!(out.get_pixel(1, 0)[0], 170);
    }

    #[test]
    fn test_clean_for_ocr_outputs_binary_png() {
        let mut gray = two_tone(40, 20);
        gray.put_pixel(5, 5, Luma([240]));
        let cleaned = clean_for_ocr(&png_image(gray));

        assert_eq!(cleaned.format(), ImageFormat::Png);
        let decoded = image::load_from_memory(cleaned.bytes()).unwrap().to_luma8();
        assert_eq!(decoded.dimensions(), (40, 20));
        assert!(decoded.pixels().all(|p| p[0] == 0 || p[0] == 255));
        // isolated speck removed
        assert_eq!(decoded.get_pixel(5, 5)[0], 0);
    }

    #[test]
    fn test_clean_for_ocr_passes_through_undecodable_input() {
        let garbage = CaptchaImage::new(vec![0x89, b'P', b'N', b'G', 1, 2, 3], ImageFormat::Png).unwrap();
        let cleaned = clean_for_ocr(&garbage);
        assert_eq!(cleaned.bytes(), garbage.bytes());
    }

    #[test]
    fn test_render_variants() {
        let variants = render_variants(&png_image(two_tone(8, 4)));
        let labels: Vec<&str> = variants.iter().map(|(v, _)| v.label()).collect();
        assert_eq!(
            labels,
            ["original", "grayscale_contrast", "binary_threshold", "noise_removal", "sharpening", "invert_colors"]
        );

        let garbage = CaptchaImage::new(vec![1, 2, 3], ImageFormat::Jpeg).unwrap();
        assert_eq!(render_variants(&garbage).len(), 1);
    }

    #[test]
    fn test_invert_variant() {
        let decoded = DynamicImage::ImageLuma8(two_tone(4, 2));
        let inverted = Variant::InvertColors.render(&decoded).to_luma8();
        assert_eq!(inverted.get_pixel(0, 0)[0], 225);
        assert_eq!(inverted.get_pixel(3, 0)[0], 35);
    }
}
