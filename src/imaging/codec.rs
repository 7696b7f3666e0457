//! Loading image references into pixel buffers and encoding them back out.

use std::io::Cursor;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageFormat;

use super::PixelBuffer;

const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Fetches the raw bytes behind an image reference: an `http(s)` URL, a
/// base64 `data:` URL, or a local file path.
pub async fn load_image_bytes(client: &reqwest::Client, reference: &str) -> Result<Vec<u8>> {
    if reference.starts_with("http://") || reference.starts_with("https://") {
        let response = client
            .get(reference)
            .send()
            .await
            .with_context(|| format!("failed to request image {reference}"))?
            .error_for_status()
            .with_context(|| format!("image request for {reference} was rejected"))?;
        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("failed to read image body from {reference}"))?;
        return Ok(bytes.to_vec());
    }

    if reference.starts_with("data:") {
        return decode_data_url(reference);
    }

    tokio::fs::read(Path::new(reference))
        .await
        .with_context(|| format!("failed to read image file {reference}"))
}

pub fn decode_data_url(url: &str) -> Result<Vec<u8>> {
    let (header, payload) = url
        .split_once(',')
        .ok_or_else(|| anyhow!("data URL has no payload"))?;
    if !header.ends_with(";base64") {
        bail!("only base64 data URLs are supported");
    }
    let payload: String = payload.split_whitespace().collect();
    STANDARD
        .decode(payload)
        .context("data URL payload is not valid base64")
}

pub fn decode_pixels(bytes: &[u8]) -> Result<PixelBuffer> {
    let decoded = image::load_from_memory(bytes).context("failed to decode image")?;
    Ok(PixelBuffer::from(decoded.to_rgba8()))
}

pub fn encode_png(pixels: PixelBuffer) -> Result<Vec<u8>> {
    let (width, height) = (pixels.width(), pixels.height());
    let image = pixels
        .into_image()
        .ok_or_else(|| anyhow!("pixel buffer does not match {width}x{height}"))?;

    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .context("failed to encode PNG")?;
    Ok(bytes)
}

pub fn encode_png_data_url(pixels: PixelBuffer) -> Result<String> {
    let png = encode_png(pixels)?;
    Ok(format!("{PNG_DATA_URL_PREFIX}{}", STANDARD.encode(&png)))
}
