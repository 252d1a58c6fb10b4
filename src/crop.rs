use anyhow::{Context, Result};
use image::{DynamicImage, GenericImageView};
use std::io::Cursor;
use std::sync::Arc;

use crate::error::PipelineError;
use crate::geometry::{CropRect, Size, clamp_to_bounds, scale_factors, to_natural_space};

/// Bytes handed over by the file picker or camera.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub bytes: Vec<u8>,
    pub mime: Option<String>,
    pub name: Option<String>,
}

impl UploadFile {
    pub fn new(bytes: Vec<u8>, mime: Option<&str>, name: Option<&str>) -> Self {
        Self {
            bytes,
            mime: mime.map(|value| value.trim().to_string()),
            name: name.map(|value| value.to_string()),
        }
    }
}

/// A decoded upload together with the size it is currently rendered at.
#[derive(Debug, Clone)]
pub struct SourceImage {
    raster: Arc<DynamicImage>,
    natural: Size,
    display: Size,
}

impl SourceImage {
    /// Display size starts out equal to the natural size until the page
    /// reports its layout.
    pub fn new(raster: DynamicImage) -> Self {
        let (width, height) = raster.dimensions();
        let natural = Size::from_pixels(width, height);
        Self {
            raster: Arc::new(raster),
            natural,
            display: natural,
        }
    }

    pub fn with_display(mut self, display: Size) -> Self {
        self.display = display;
        self
    }

    pub fn set_display(&mut self, display: Size) {
        self.display = display;
    }

    pub fn natural(&self) -> Size {
        self.natural
    }

    pub fn display(&self) -> Size {
        self.display
    }

    pub fn raster(&self) -> &DynamicImage {
        &self.raster
    }

    fn is_ready(&self) -> bool {
        !self.natural.is_empty()
    }
}

pub fn validate_upload(file: &UploadFile) -> Result<(), PipelineError> {
    let declared = file
        .mime
        .as_deref()
        .map(str::to_ascii_lowercase)
        .filter(|mime| !mime.is_empty());
    let is_image = match declared {
        Some(mime) => mime.starts_with("image/"),
        None => infer::is_image(&file.bytes),
    };
    if is_image {
        Ok(())
    } else {
        Err(PipelineError::invalid_file_type())
    }
}

pub fn decode_upload(file: &UploadFile) -> Result<SourceImage, PipelineError> {
    validate_upload(file)?;
    let raster = image::load_from_memory(&file.bytes).map_err(|err| {
        PipelineError::InvalidFileType(format!("error reading file: {}", err))
    })?;
    Ok(SourceImage::new(raster))
}

/// Cuts `rect` (display space) out of the image at source resolution.
///
/// A rectangle without area selects the whole image and shares its raster.
pub fn extract(image: &SourceImage, rect: CropRect) -> Result<Arc<DynamicImage>, PipelineError> {
    if !image.is_ready() {
        return Err(PipelineError::image_not_ready());
    }
    if rect.is_empty() {
        return Ok(Arc::clone(&image.raster));
    }

    let display = image.display();
    let natural = image.natural();
    let clamped = clamp_to_bounds(rect, bounds_for(display, natural));
    let mapped = to_natural_space(clamped, scale_factors(natural, display));
    let (x, y, width, height) = pixel_bounds(mapped, image.raster().dimensions());
    if width == 0 || height == 0 {
        return Err(PipelineError::Extraction(format!(
            "crop area is empty ({:.1}x{:.1} at source resolution)",
            mapped.width, mapped.height
        )));
    }
    Ok(Arc::new(image.raster().crop_imm(x, y, width, height)))
}

// A zero display dimension scales 1:1, so natural bounds apply on that axis.
fn bounds_for(display: Size, natural: Size) -> Size {
    Size::new(
        if display.width > 0.0 { display.width } else { natural.width },
        if display.height > 0.0 { display.height } else { natural.height },
    )
}

fn pixel_bounds(rect: CropRect, (max_w, max_h): (u32, u32)) -> (u32, u32, u32, u32) {
    let left = (rect.x.floor().max(0.0) as u32).min(max_w);
    let top = (rect.y.floor().max(0.0) as u32).min(max_h);
    let right = (rect.right().round().max(0.0) as u32).min(max_w);
    let bottom = (rect.bottom().round().max(0.0) as u32).min(max_h);
    (
        left,
        top,
        right.saturating_sub(left),
        bottom.saturating_sub(top),
    )
}

pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .with_context(|| "failed to encode image as PNG")?;
    Ok(bytes)
}

#[cfg(test)]
pub(crate) fn test_image(width: u32, height: u32) -> DynamicImage {
    let buffer = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    DynamicImage::ImageRgb8(buffer)
}
