//! Normalize pass over a freshly rendered page
//!
//! Fits the rendered page inside the preview box (never enlarging it), flattens
//! transparency onto white, and re-encodes as PNG with fixed settings so the
//! same input always yields the same bytes.

use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ExtendedColorType, GenericImageView, ImageEncoder, Rgba, RgbaImage};

use super::renderer::RenderError;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Normalize a rendered page into the final preview PNG
pub fn normalize(page: DynamicImage, max_width: u32, max_height: u32) -> Result<Vec<u8>, RenderError> {
    let img = fit_within(page, max_width, max_height);
    let flattened = flatten_onto_white(&img);

    let (width, height) = flattened.dimensions();
    let mut output = Vec::new();
    PngEncoder::new_with_quality(&mut output, CompressionType::Best, PngFilter::Adaptive)
        .write_image(flattened.as_raw(), width, height, ExtendedColorType::Rgb8)?;
    Ok(output)
}

/// Shrink to fit `max_width` x `max_height`, keeping aspect ratio
fn fit_within(img: DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    if width <= max_width && height <= max_height {
        return img;
    }
    img.resize(max_width, max_height, FilterType::Lanczos3)
}

fn flatten_onto_white(img: &DynamicImage) -> image::RgbImage {
    let (width, height) = img.dimensions();
    let mut background = RgbaImage::from_pixel(width, height, WHITE);
    imageops::overlay(&mut background, &img.to_rgba8(), 0, 0);
    DynamicImage::ImageRgba8(background).to_rgb8()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(width: u32, height: u32, pixel: Rgba<u8>) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, pixel))
    }

    #[test]
    fn test_downscale_preserves_aspect_ratio() {
        let out = normalize(page(800, 600, Rgba([10, 20, 30, 255])), 400, 600).unwrap();
        let img = image::load_from_memory(&out).unwrap();
        assert_eq!(img.dimensions(), (400, 300));
    }

    #[test]
    fn test_never_upscales() {
        let out = normalize(page(100, 150, Rgba([10, 20, 30, 255])), 400, 600).unwrap();
        let img = image::load_from_memory(&out).unwrap();
        assert_eq!(img.dimensions(), (100, 150));
    }

    #[test]
    fn test_transparency_becomes_white() {
        let out = normalize(page(4, 4, Rgba([0, 0, 0, 0])), 400, 600).unwrap();
        let img = image::load_from_memory(&out).unwrap();
        assert_eq!(img.color(), image::ColorType::Rgb8);
        assert_eq!(img.to_rgb8().get_pixel(0, 0).0, [255, 255, 255]);
    }

    #[test]
    fn test_output_is_stable() {
        let input = page(640, 960, Rgba([200, 100, 50, 128]));
        assert_eq!(
            normalize(input.clone(), 400, 600).unwrap(),
            normalize(input, 400, 600).unwrap()
        );
    }

    #[test]
    fn test_rgb_input_passes_through_unchanged() {
        let rgb = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(3, 3, image::Rgb([9, 8, 7])));
        let out = normalize(rgb, 400, 600).unwrap();
        let img = image::load_from_memory(&out).unwrap();
        assert_eq!(img.to_rgb8().get_pixel(2, 2).0, [9, 8, 7]);
    }
}
