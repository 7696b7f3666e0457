use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::{blur, codec};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Turns a source image reference into the obscured image shown before the
/// first hint.
#[async_trait]
pub trait ImageObscurer: Send + Sync {
    async fn obscure(&self, source_ref: &str) -> Result<String>;
}

/// Production obscurer: fetch, decode, Gaussian blur, encode as a PNG data URL.
#[derive(Clone)]
pub struct BlurObscurer {
    client: reqwest::Client,
    radius: u32,
}

impl BlurObscurer {
    pub fn new(client: reqwest::Client, radius: u32) -> Self {
        Self { client, radius }
    }
}

#[async_trait]
impl ImageObscurer for BlurObscurer {
    async fn obscure(&self, source_ref: &str) -> Result<String> {
        let bytes = codec::load_image_bytes(&self.client, source_ref).await?;
        let radius = self.radius;

        // The full convolution finishes before anything is returned.
        tokio::task::spawn_blocking(move || {
            let started = Instant::now();
            let pixels = codec::decode_pixels(&bytes)?;
            let (width, height) = (pixels.width(), pixels.height());
            let blurred = blur(&pixels, radius);
            let url = codec::encode_png_data_url(blurred)?;
            log_info!(
                "Blurred {}x{} image with radius {} in {}ms",
                width,
                height,
                radius,
                started.elapsed().as_millis()
            );
            Ok(url)
        })
        .await
        .context("blur worker join failed")?
    }
}

/// Obscures `source_ref`, or hands back `source_ref` itself when the image
/// cannot be processed. The day stays playable either way.
pub async fn obscure_or_source(obscurer: &dyn ImageObscurer, source_ref: &str) -> String {
    match obscurer.obscure(source_ref).await {
        Ok(obscured) => obscured,
        Err(err) => {
            log_warn!("Error blurring image {source_ref}: {err:#}; using the original");
            source_ref.to_string()
        }
    }
}
