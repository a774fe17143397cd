use image::{imageops, DynamicImage, GrayImage, Luma};
use imageproc::contrast::adaptive_threshold;
use imageproc::filter::median_filter;
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};

use crate::error::{Error, Result};

/// Photographs wider than this are downscaled before OCR; modern phone
/// cameras produce far more resolution than Tesseract benefits from.
const TARGET_WIDTH: u32 = 1800;

/// Skew correction is only attempted within this range; photographs rotated
/// further than that are treated as intentionally oriented.
const MAX_SKEW_DEGREES: f32 = 15.0;
const SKEW_STEP_DEGREES: f32 = 0.5;
const MIN_CORRECTION_DEGREES: f32 = 0.5;

const DENOISE_RADIUS: u32 = 1;
const THRESHOLD_BLOCK_RADIUS: u32 = 10;

/// Decodes the image at `path` and runs the full OCR preparation pipeline.
/// Corrupt or unreadable files surface as `Error::ImageDecode`.
pub fn load_and_preprocess(path: &str) -> Result<GrayImage> {
    let img = image::open(path).map_err(|e| Error::ImageDecode {
        path: path.to_string(),
        reason: e.to_string(),
    })?;
    Ok(preprocess(&img))
}

/// Pure transform: grayscale, normalize width, deskew, denoise, and
/// adaptive-threshold to dark text on a light background. The same input
/// always yields the same output.
pub fn preprocess(img: &DynamicImage) -> GrayImage {
    let gray = img.to_luma8();
    let gray = resize_to_target_width(gray);
    let gray = deskew(&gray);
    let gray = median_filter(&gray, DENOISE_RADIUS, DENOISE_RADIUS);
    adaptive_threshold(&gray, THRESHOLD_BLOCK_RADIUS)
}

fn resize_to_target_width(gray: GrayImage) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width <= TARGET_WIDTH || height == 0 {
        return gray;
    }
    let new_height = ((height as f32 * TARGET_WIDTH as f32 / width as f32) as u32).max(1);
    imageops::resize(&gray, TARGET_WIDTH, new_height, imageops::FilterType::Lanczos3)
}

fn deskew(gray: &GrayImage) -> GrayImage {
    let angle = estimate_skew_correction(gray);
    if angle.abs() < MIN_CORRECTION_DEGREES {
        return gray.clone();
    }
    rotate_about_center(
        gray,
        angle.to_radians(),
        Interpolation::Bilinear,
        Luma([255u8]),
    )
}

/// Estimates the rotation (in degrees) that best aligns text lines with the
/// horizontal axis. Candidate rotations are scored on a downscaled copy by
/// the variance of per-row darkness: straight text lines produce alternating
/// dark and light rows, so the best-aligned rotation maximizes the variance.
fn estimate_skew_correction(gray: &GrayImage) -> f32 {
    let (width, height) = gray.dimensions();
    if width < 8 || height < 8 {
        return 0.0;
    }

    let small_width = 300.min(width);
    let small_height = ((height as f32 * small_width as f32 / width as f32) as u32).max(1);
    let small = imageops::resize(
        gray,
        small_width,
        small_height,
        imageops::FilterType::Triangle,
    );

    let mut best_angle = 0.0f32;
    let mut best_score = row_darkness_variance(&small);

    let steps = (2.0 * MAX_SKEW_DEGREES / SKEW_STEP_DEGREES) as i32;
    for step in 0..=steps {
        let angle = -MAX_SKEW_DEGREES + step as f32 * SKEW_STEP_DEGREES;
        if angle.abs() < SKEW_STEP_DEGREES / 2.0 {
            continue;
        }
        let rotated = rotate_about_center(
            &small,
            angle.to_radians(),
            Interpolation::Nearest,
            Luma([255u8]),
        );
        let score = row_darkness_variance(&rotated);
        if score > best_score {
            best_score = score;
            best_angle = angle;
        }
    }

    best_angle
}

fn row_darkness_variance(gray: &GrayImage) -> f64 {
    let (width, height) = gray.dimensions();
    if height == 0 || width == 0 {
        return 0.0;
    }

    let mut row_sums = Vec::with_capacity(height as usize);
    for y in 0..height {
        let mut sum = 0u64;
        for x in 0..width {
            sum += (255 - gray.get_pixel(x, y).0[0]) as u64;
        }
        row_sums.push(sum as f64);
    }

    let mean = row_sums.iter().sum::<f64>() / row_sums.len() as f64;
    row_sums.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / row_sums.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn striped_page() -> DynamicImage {
        // White page with horizontal dark "text lines"
        let mut img = RgbImage::from_pixel(400, 300, image::Rgb([255, 255, 255]));
        for y in (40..260).step_by(30) {
            for dy in 0..6 {
                for x in 40..360 {
                    img.put_pixel(x, y + dy, image::Rgb([20, 20, 20]));
                }
            }
        }
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn preprocess_is_deterministic() {
        let img = striped_page();
        let a = preprocess(&img);
        let b = preprocess(&img);
        assert_eq!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn preprocess_outputs_binary_pixels() {
        let out = preprocess(&striped_page());
        assert!(out.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    #[test]
    fn straight_page_needs_no_correction() {
        let img = striped_page().to_luma8();
        let angle = estimate_skew_correction(&img);
        assert!(angle.abs() < 1.0, "expected ~0, got {angle}");
    }

    #[test]
    fn skewed_page_gets_counter_rotated() {
        let gray = striped_page().to_luma8();
        let skewed = rotate_about_center(
            &gray,
            5f32.to_radians(),
            Interpolation::Bilinear,
            Luma([255u8]),
        );
        let correction = estimate_skew_correction(&skewed);
        assert!(
            (correction + 5.0).abs() < 1.5,
            "expected ~-5 degrees, got {correction}"
        );
    }

    #[test]
    fn tiny_image_is_left_alone_by_deskew() {
        let gray = GrayImage::from_pixel(4, 4, Luma([128]));
        assert_eq!(estimate_skew_correction(&gray), 0.0);
    }

    #[test]
    fn unreadable_file_is_a_decode_error() {
        let err = load_and_preprocess("/nonexistent/page.jpg").unwrap_err();
        assert!(matches!(err, Error::ImageDecode { .. }));
    }
}
