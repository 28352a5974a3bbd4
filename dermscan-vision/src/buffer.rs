//! Pixel sampling: turn whatever the caller captured into an RGBA grid at its
//! natural resolution.

use base64::Engine;
use image::{DynamicImage, ImageBuffer, Luma, RgbaImage};

use crate::error::ClassifierError;

/// Single-channel float image, used for gradient work.
pub type GrayF32 = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Where an image came from before decoding.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Encoded file contents (PNG, JPEG, WebP, ...).
    Bytes(Vec<u8>),
    /// `data:<mime>;base64,<payload>`
    DataUrl(String),
    /// An already-decoded camera frame.
    Frame(RgbaImage),
}

/// RGBA pixels plus dimensions. Width and height are always non-zero.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    image: RgbaImage,
}

impl PixelBuffer {
    pub fn from_rgba(image: RgbaImage) -> Result<Self, ClassifierError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(ClassifierError::Decode("image dimensions are zero".into()));
        }
        Ok(Self { image })
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ClassifierError> {
        let img = image::load_from_memory(bytes)?;
        Self::from_rgba(img.to_rgba8())
    }

    pub fn from_data_url(url: &str) -> Result<Self, ClassifierError> {
        let payload = data_url_payload(url)?;
        let bytes = base64::engine::general_purpose::STANDARD.decode(payload.trim())?;
        Self::decode(&bytes)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixel_count(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    /// Raw RGBA bytes, row-major, four per pixel.
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn pixels(&self) -> impl Iterator<Item = [u8; 4]> + '_ {
        self.image.pixels().map(|p| p.0)
    }

    pub fn get(&self, x: u32, y: u32) -> [u8; 4] {
        self.image.get_pixel(x, y).0
    }

    /// BT.601 luma for every pixel.
    pub fn luma_plane(&self) -> GrayF32 {
        ImageBuffer::from_fn(self.width(), self.height(), |x, y| {
            let [r, g, b, _] = self.get(x, y);
            Luma([luma(r, g, b)])
        })
    }

    pub fn to_dynamic(&self) -> DynamicImage {
        DynamicImage::ImageRgba8(self.image.clone())
    }
}

/// Decode any supported source into a [`PixelBuffer`].
pub fn sample(source: ImageSource) -> Result<PixelBuffer, ClassifierError> {
    let buffer = match source {
        ImageSource::Bytes(bytes) => PixelBuffer::decode(&bytes)?,
        ImageSource::DataUrl(url) => PixelBuffer::from_data_url(&url)?,
        ImageSource::Frame(frame) => PixelBuffer::from_rgba(frame)?,
    };
    log::debug!("sampled {}x{} image", buffer.width(), buffer.height());
    Ok(buffer)
}

pub(crate) fn luma(r: u8, g: u8, b: u8) -> f32 {
    0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32
}

fn data_url_payload(url: &str) -> Result<&str, ClassifierError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| ClassifierError::Decode("not a data URL".into()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| ClassifierError::Decode("data URL has no payload".into()))?;
    if !meta.ends_with(";base64") {
        return Err(ClassifierError::Decode(
            "only base64 data URLs are supported".into(),
        ));
    }
    Ok(payload)
}
