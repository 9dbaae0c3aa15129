use fast_image_resize::{self as fir, images::Image as FirImage};
use image::DynamicImage;

use crate::domain::PhotoId;
use crate::error::{Error, Result};

/// Longest edge the saturation statistics are computed on.
pub const ANALYSIS_EDGE: u32 = 256;

/// Decides whether a decoded image reads as black and white.
pub trait Classifier {
    fn classify(&self, image: &DynamicImage, tolerance: f64) -> std::result::Result<bool, String>;
}

/// Mean per-pixel chroma test: a pixel's chroma is `(max - min) / 255` over its
/// RGB channels, and the image is grayscale when the mean is within tolerance.
/// Toned prints (sepia, cyanotype) stay under a modest tolerance.
#[derive(Debug, Default, Clone, Copy)]
pub struct SaturationClassifier;

impl Classifier for SaturationClassifier {
    fn classify(&self, image: &DynamicImage, tolerance: f64) -> std::result::Result<bool, String> {
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(format!("invalid tolerance {tolerance}"));
        }
        if image.width() == 0 || image.height() == 0 {
            return Err("image has no pixels".to_string());
        }

        let rgb = downsample_rgb(image)?;
        let total: u64 = rgb
            .chunks_exact(3)
            .map(|px| {
                let max = px[0].max(px[1]).max(px[2]);
                let min = px[0].min(px[1]).min(px[2]);
                u64::from(max - min)
            })
            .sum();
        let pixels = (rgb.len() / 3) as f64;
        let mean_chroma = total as f64 / pixels / 255.0;
        Ok(mean_chroma <= tolerance)
    }
}

/// RGB8 buffer scaled so the long edge is at most `ANALYSIS_EDGE`.
fn downsample_rgb(image: &DynamicImage) -> std::result::Result<Vec<u8>, String> {
    let rgb = image.to_rgb8();
    let (w, h) = rgb.dimensions();
    if w.max(h) <= ANALYSIS_EDGE {
        return Ok(rgb.into_raw());
    }

    let scale = ANALYSIS_EDGE as f64 / w.max(h) as f64;
    let dst_w = ((w as f64 * scale).round() as u32).max(1);
    let dst_h = ((h as f64 * scale).round() as u32).max(1);

    let src = FirImage::from_vec_u8(w, h, rgb.into_raw(), fir::PixelType::U8x3)
        .map_err(|e| e.to_string())?;
    let mut dst = FirImage::new(dst_w, dst_h, fir::PixelType::U8x3);
    fir::Resizer::new()
        .resize(&src, &mut dst, None)
        .map_err(|e| e.to_string())?;
    Ok(dst.buffer().to_vec())
}

/// Run the classifier for one photo, folding any classifier failure into
/// `ClassificationFailed`.
pub fn is_grayscale<C: Classifier + ?Sized>(
    classifier: &C,
    photo_id: &PhotoId,
    image: &DynamicImage,
    tolerance: f64,
) -> Result<bool> {
    classifier
        .classify(image, tolerance)
        .map_err(|reason| Error::ClassificationFailed {
            photo_id: photo_id.clone(),
            reason,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn solid(w: u32, h: u32, px: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb(px)))
    }

    #[test]
    fn test_gray_gradient_is_grayscale() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(64, 64, |x, _| {
            let v = (x * 4) as u8;
            Rgb([v, v, v])
        }));
        assert!(SaturationClassifier.classify(&img, 0.1).unwrap());
        assert!(SaturationClassifier.classify(&img, 0.0).unwrap());
    }

    #[test]
    fn test_saturated_color_is_not_grayscale() {
        let img = solid(32, 32, [220, 30, 40]);
        assert!(!SaturationClassifier.classify(&img, 0.1).unwrap());
    }

    #[test]
    fn test_sepia_within_tolerance() {
        // Chroma (112 - 94) / 255 ≈ 0.07
        let img = solid(32, 32, [112, 101, 94]);
        assert!(SaturationClassifier.classify(&img, 0.1).unwrap());
        assert!(!SaturationClassifier.classify(&img, 0.05).unwrap());
    }

    #[test]
    fn test_luma_image_is_grayscale() {
        let img = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(10, 10, image::Luma([77])));
        assert!(SaturationClassifier.classify(&img, 0.1).unwrap());
    }

    #[test]
    fn test_large_image_downsampled() {
        let img = solid(1200, 800, [0, 0, 255]);
        assert!(!SaturationClassifier.classify(&img, 0.1).unwrap());
        let gray = solid(1200, 800, [128, 128, 128]);
        assert!(SaturationClassifier.classify(&gray, 0.1).unwrap());
    }

    #[test]
    fn test_empty_image_fails() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        assert!(SaturationClassifier.classify(&img, 0.1).is_err());
    }

    #[test]
    fn test_adapter_maps_error_kind() {
        let img = solid(4, 4, [1, 2, 3]);
        let err = is_grayscale(&SaturationClassifier, &PhotoId::from("p9"), &img, f64::NAN)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ClassificationFailed { ref photo_id, .. } if photo_id.as_str() == "p9"
        ));
    }
}
