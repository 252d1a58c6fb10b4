use image::DynamicImage;

const MIN_OCR_WIDTH: u32 = 1000;
const MAX_OCR_WIDTH: u32 = 6000;
/// Crops whose darkest and lightest pixels are this close to black and white
/// already have full contrast.
const FULL_RANGE_SLACK: u8 = 8;

/// Grayscale, optionally upscaled and contrast stretched copy for tesseract.
pub(super) fn preprocess_for_ocr(image: &DynamicImage) -> DynamicImage {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut luma = image::GrayImage::new(width, height);

    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as f32 / 255.0;
        let r = r as f32 * alpha + 255.0 * (1.0 - alpha);
        let g = g as f32 * alpha + 255.0 * (1.0 - alpha);
        let b = b as f32 * alpha + 255.0 * (1.0 - alpha);
        let value = (0.299 * r + 0.587 * g + 0.114 * b).round() as u8;
        luma.put_pixel(x, y, image::Luma([value]));
    }

    let scale = ocr_scale(width);
    let resized = if scale > 1 {
        image::imageops::resize(
            &luma,
            width.saturating_mul(scale),
            height.saturating_mul(scale),
            image::imageops::FilterType::Lanczos3,
        )
    } else {
        luma
    };
    DynamicImage::ImageLuma8(contrast_stretch(resized))
}

/// Small crops are upscaled so glyphs reach a size tesseract handles well.
pub(super) fn ocr_scale(width: u32) -> u32 {
    if width == 0 || width >= MIN_OCR_WIDTH {
        return 1;
    }
    let mut scale = 3u32;
    while width.saturating_mul(scale) > MAX_OCR_WIDTH && scale > 1 {
        scale -= 1;
    }
    scale
}

/// Photos of printed riddles come out grey on grey; spread them over the
/// whole range. Flat crops and crops that are already black on white pass
/// through untouched.
fn contrast_stretch(mut image: image::GrayImage) -> image::GrayImage {
    let (min, max) = image
        .pixels()
        .fold((u8::MAX, u8::MIN), |(min, max), pixel| {
            (min.min(pixel[0]), max.max(pixel[0]))
        });
    let full_range = min <= FULL_RANGE_SLACK && max >= u8::MAX - FULL_RANGE_SLACK;
    if max <= min || full_range {
        return image;
    }

    let scale = 255.0 / f32::from(max - min);
    for pixel in image.pixels_mut() {
        pixel[0] = (f32::from(pixel[0] - min) * scale).round() as u8;
    }
    image
}
