//! V4L2 capture, for photographing skin straight from a webcam.

use anyhow::{Context, Result};
use image::RgbaImage;
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, Format, FourCC};

pub struct Camera {
    stream: Stream<'static>,
    width: u32,
    height: u32,
    fourcc: FourCC,
}

impl Camera {
    pub fn open(device: &str) -> Result<Self> {
        let dev = Device::with_path(device).with_context(|| format!("open camera {device}"))?;
        let mut fmt = dev.format().context("get format")?;
        // Prefer RGB, fall back to YUYV, else keep whatever the device offers
        let desired = Format::new(fmt.width, fmt.height, FourCC::new(b"RGB3"));
        fmt = dev.set_format(&desired).unwrap_or(fmt);
        if fmt.fourcc != FourCC::new(b"RGB3") {
            let yuyv = Format::new(fmt.width, fmt.height, FourCC::new(b"YUYV"));
            fmt = dev.set_format(&yuyv).unwrap_or(fmt);
        }
        let stream = Stream::with_buffers(&dev, Type::VideoCapture, 4).context("stream")?;
        Ok(Self {
            stream,
            width: fmt.width,
            height: fmt.height,
            fourcc: fmt.fourcc,
        })
    }

    /// Grab one frame as opaque RGBA.
    pub fn frame(&mut self) -> Result<RgbaImage> {
        let (data, meta) = self.stream.next().context("capture frame")?;
        log::debug!(
            "captured frame: {}x{} fourcc={:?} seq={:?} len={}",
            self.width,
            self.height,
            self.fourcc,
            meta.sequence,
            data.len()
        );
        let rgba = match self.fourcc {
            f if f == FourCC::new(b"RGB3") => rgb_to_rgba(self.width, self.height, data)?,
            f if f == FourCC::new(b"YUYV") => yuyv_to_rgba(self.width, self.height, data)?,
            f if f == FourCC::new(b"GREY") => grey_to_rgba(self.width, self.height, data)?,
            other => anyhow::bail!("unsupported pixel format {:?}", other),
        };
        RgbaImage::from_raw(self.width, self.height, rgba)
            .ok_or_else(|| anyhow::anyhow!("failed to build image buffer"))
    }
}

fn pixel_count(width: u32, height: u32) -> usize {
    width as usize * height as usize
}

fn rgb_to_rgba(width: u32, height: u32, data: &[u8]) -> Result<Vec<u8>> {
    let n = pixel_count(width, height);
    if data.len() < n * 3 {
        anyhow::bail!("short RGB3 buffer: {} < {}", data.len(), n * 3);
    }
    let mut out = Vec::with_capacity(n * 4);
    for px in data.chunks_exact(3).take(n) {
        out.extend_from_slice(&[px[0], px[1], px[2], 255]);
    }
    Ok(out)
}

fn yuyv_to_rgba(width: u32, height: u32, data: &[u8]) -> Result<Vec<u8>> {
    let n = pixel_count(width, height);
    if data.len() < n * 2 {
        anyhow::bail!("short YUYV buffer: {} < {}", data.len(), n * 2);
    }
    let mut out = Vec::with_capacity(n * 4);
    for chunk in data.chunks_exact(4).take(n / 2) {
        let u = chunk[1] as f32 - 128.0;
        let v = chunk[3] as f32 - 128.0;
        for y in [chunk[0] as f32, chunk[2] as f32] {
            out.push(clamp(y + 1.402 * v));
            out.push(clamp(y - 0.344136 * u - 0.714136 * v));
            out.push(clamp(y + 1.772 * u));
            out.push(255);
        }
    }
    Ok(out)
}

fn grey_to_rgba(width: u32, height: u32, data: &[u8]) -> Result<Vec<u8>> {
    let n = pixel_count(width, height);
    if data.len() < n {
        anyhow::bail!("short GREY buffer: {} < {}", data.len(), n);
    }
    Ok(data[..n].iter().flat_map(|&y| [y, y, y, 255]).collect())
}

fn clamp(v: f32) -> u8 {
    v.clamp(0.0, 255.0) as u8
}
