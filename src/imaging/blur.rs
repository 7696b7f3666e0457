//! Separable Gaussian blur over RGBA pixel buffers.
//!
//! The kernel is applied horizontally into an intermediate buffer and then
//! vertically into the output. Out-of-range indices are clamped to the nearest
//! edge pixel, so any radius is valid, including radii wider than the image.

use anyhow::{bail, Result};
use image::RgbaImage;

const CHANNELS: usize = 4;

/// Row-major, top-to-bottom RGBA samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * CHANNELS;
        if data.len() != expected {
            bail!(
                "pixel buffer for {width}x{height} needs {expected} bytes, got {}",
                data.len()
            );
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let count = width as usize * height as usize;
        let mut data = Vec::with_capacity(count * CHANNELS);
        for _ in 0..count {
            data.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * CHANNELS;
        Some([
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        ])
    }

    pub fn into_image(self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.data)
    }
}

impl From<RgbaImage> for PixelBuffer {
    fn from(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            data: image.into_raw(),
        }
    }
}

/// Normalized 1-D kernel of length `2 * radius + 1` with `sigma = radius / 3`.
pub fn gaussian_kernel(radius: u32) -> Vec<f32> {
    if radius == 0 {
        return vec![1.0];
    }

    let sigma = radius as f32 / 3.0;
    let denom = 2.0 * sigma * sigma;
    let r = radius as i64;
    let mut weights: Vec<f32> = (-r..=r)
        .map(|i| (-((i * i) as f32) / denom).exp())
        .collect();

    let total: f32 = weights.iter().sum();
    for weight in &mut weights {
        *weight /= total;
    }
    weights
}

/// Blurs `pixels` with a Gaussian of the given radius. Same input, same bytes.
pub fn blur(pixels: &PixelBuffer, radius: u32) -> PixelBuffer {
    if radius == 0 || pixels.data.is_empty() {
        return pixels.clone();
    }

    let width = pixels.width as usize;
    let height = pixels.height as usize;
    let kernel = gaussian_kernel(radius);
    let r = radius as i64;

    let mut horizontal = vec![0f32; pixels.data.len()];
    for y in 0..height {
        let row = y * width;
        for x in 0..width {
            let mut acc = [0f32; CHANNELS];
            for (k, weight) in kernel.iter().enumerate() {
                let xi = clamp_index(x as i64 + k as i64 - r, width);
                let idx = (row + xi) * CHANNELS;
                for c in 0..CHANNELS {
                    acc[c] += pixels.data[idx + c] as f32 * weight;
                }
            }
            let out = (row + x) * CHANNELS;
            horizontal[out..out + CHANNELS].copy_from_slice(&acc);
        }
    }

    let mut output = vec![0u8; pixels.data.len()];
    for x in 0..width {
        for y in 0..height {
            let mut acc = [0f32; CHANNELS];
            for (k, weight) in kernel.iter().enumerate() {
                let yi = clamp_index(y as i64 + k as i64 - r, height);
                let idx = (yi * width + x) * CHANNELS;
                for c in 0..CHANNELS {
                    acc[c] += horizontal[idx + c] * weight;
                }
            }
            let out = (y * width + x) * CHANNELS;
            for c in 0..CHANNELS {
                output[out + c] = to_channel(acc[c]);
            }
        }
    }

    PixelBuffer {
        width: pixels.width,
        height: pixels.height,
        data: output,
    }
}

fn clamp_index(index: i64, len: usize) -> usize {
    index.clamp(0, len as i64 - 1) as usize
}

fn to_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
