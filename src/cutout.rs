//! Compositing a mask into the final RGBA image

use crate::{
    config::AlphaMattingOptions,
    error::Result,
    matting::alpha_matting_cutout,
    types::SegmentationMask,
};
use image::{DynamicImage, Rgba, RgbaImage};
use tracing::warn;

/// Blend `image` over a fully transparent canvas using `mask` as the weight
///
/// Every channel, alpha included, is scaled by `mask / 255`.
#[must_use]
pub fn naive_cutout(image: &DynamicImage, mask: &SegmentationMask) -> RgbaImage {
    let mut rgba = image.to_rgba8();
    for (pixel, &weight) in rgba.pixels_mut().zip(mask.data.iter()) {
        for channel in &mut pixel.0 {
            *channel = blend(*channel, weight);
        }
    }
    rgba
}

/// Render the mask itself as an opaque grayscale RGBA image
#[must_use]
pub fn mask_to_rgba(mask: &SegmentationMask) -> RgbaImage {
    let (width, height) = mask.dimensions;
    RgbaImage::from_fn(width, height, |x, y| {
        let v = mask.get(x, y);
        Rgba([v, v, v, 255])
    })
}

/// Cut out with alpha matting, falling back to [`naive_cutout`] when the
/// trimap is degenerate
///
/// Returns the image and whether matting was actually applied.
///
/// # Errors
/// - Matting failed for a reason other than a degenerate trimap
pub fn matting_cutout(
    image: &DynamicImage,
    mask: &SegmentationMask,
    options: &AlphaMattingOptions,
) -> Result<(RgbaImage, bool)> {
    let gray = mask.to_gray_image()?;
    match alpha_matting_cutout(image, &gray, options) {
        Ok(cutout) => Ok((cutout, true)),
        Err(err) if err.is_degenerate() => {
            warn!(reason = %err, "Alpha matting not possible, using plain cutout");
            Ok((naive_cutout(image, mask), false))
        },
        Err(err) => Err(err.into()),
    }
}

/// `round(value * weight / 255)` in integer arithmetic
fn blend(value: u8, weight: u8) -> u8 {
    ((u32::from(value) * u32::from(weight) + 127) / 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    fn half_mask(width: u32, height: u32) -> SegmentationMask {
        let gray = GrayImage::from_fn(width, height, |x, _| Luma([if x < width / 2 { 255 } else { 0 }]));
        SegmentationMask::from_gray_image(&gray)
    }

    #[test]
    fn test_blend() {
        assert_eq!(blend(200, 255), 200);
        assert_eq!(blend(200, 0), 0);
        assert_eq!(blend(255, 128), 128);
        assert_eq!(blend(100, 128), 50);
    }

    #[test]
    fn test_naive_cutout() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 4, Rgb([10, 200, 90])));
        let cutout = naive_cutout(&image, &half_mask(8, 4));

        assert_eq!(cutout.dimensions(), (8, 4));
        assert_eq!(cutout.get_pixel(1, 1), &Rgba([10, 200, 90, 255]));
        assert_eq!(cutout.get_pixel(6, 2), &Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_naive_cutout_scales_existing_alpha() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 1, Rgba([255, 255, 255, 128])));
        let mask = SegmentationMask::new(vec![255, 128], (2, 1));
        let cutout = naive_cutout(&image, &mask);

        assert_eq!(cutout.get_pixel(0, 0).0[3], 128);
        assert_eq!(cutout.get_pixel(1, 0).0[3], 64);
    }

    #[test]
    fn test_mask_to_rgba() {
        let rgba = mask_to_rgba(&half_mask(4, 2));
        assert_eq!(rgba.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
        assert_eq!(rgba.get_pixel(3, 1), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_matting_cutout_falls_back_on_empty_mask() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([50, 60, 70])));
        let mask = SegmentationMask::new(vec![0; 256], (16, 16));

        let (cutout, matted) =
            matting_cutout(&image, &mask, &AlphaMattingOptions::default()).unwrap();
        assert!(!matted);
        assert!(cutout.pixels().all(|p| p.0 == [0, 0, 0, 0]));
    }

    #[test]
    fn test_matting_cutout_applies_matting() {
        let size = 40;
        let image = DynamicImage::ImageRgb8(RgbImage::from_fn(size, size, |x, y| {
            if (12..28).contains(&x) && (12..28).contains(&y) {
                Rgb([240, 240, 20])
            } else {
                Rgb([20, 20, 160])
            }
        }));
        let gray = GrayImage::from_fn(size, size, |x, y| {
            Luma([if (12..28).contains(&x) && (12..28).contains(&y) { 255 } else { 0 }])
        });
        let mask = SegmentationMask::from_gray_image(&gray);

        let options = AlphaMattingOptions {
            erode_size: 4,
            ..AlphaMattingOptions::default()
        };
        let (cutout, matted) = matting_cutout(&image, &mask, &options).unwrap();
        assert!(matted);
        assert_eq!(cutout.dimensions(), (size, size));
        assert!(cutout.get_pixel(20, 20).0[3] > 250);
        assert!(cutout.get_pixel(2, 2).0[3] < 5);
    }
}
