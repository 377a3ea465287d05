use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use persona_contracts::catalog::ImageSize;
use persona_contracts::studio::{GenerationError, ImagePayload};
use serde_json::json;
use sha2::{Digest, Sha256};

use super::{
    map_object, transport_error, ImageGenerator, ProviderGenerateRequest,
    ProviderGenerateResponse,
};

/// Offline generator: paints four flat quadrants whose colors are a hash of
/// the prompt, so the same selection always yields the same PNG.
pub struct DryrunProvider;

impl DryrunProvider {
    fn edge_for_size(size: ImageSize) -> u32 {
        match size {
            ImageSize::OneK => 256,
            ImageSize::TwoK => 512,
            ImageSize::FourK => 1024,
        }
    }

    fn render_png(prompt: &str, size: ImageSize) -> anyhow::Result<Vec<u8>> {
        let edge = Self::edge_for_size(size);
        let half = edge / 2;
        let colors: Vec<Rgb<u8>> = (0u8..4)
            .map(|quadrant| {
                let (r, g, b) = color_from_prompt(prompt, size, quadrant);
                Rgb([r, g, b])
            })
            .collect();
        let mut canvas = RgbImage::new(edge, edge);
        for (x, y, pixel) in canvas.enumerate_pixels_mut() {
            let quadrant = usize::from(x >= half) + 2 * usize::from(y >= half);
            *pixel = colors[quadrant];
        }

        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(canvas).write_to(&mut out, ImageFormat::Png)?;
        Ok(out.into_inner())
    }
}

impl ImageGenerator for DryrunProvider {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn generate(
        &self,
        request: &ProviderGenerateRequest,
    ) -> Result<ProviderGenerateResponse, GenerationError> {
        let size = request.selection.size;
        let bytes = Self::render_png(&request.prompt, size).map_err(transport_error)?;
        let edge = Self::edge_for_size(size);
        Ok(ProviderGenerateResponse {
            payload: ImagePayload::new(bytes, Some("image/png".to_string())),
            provider_request: map_object(json!({
                "endpoint": "dryrun-native",
                "payload": {
                    "model": request.model,
                    "prompt": request.prompt,
                    "aspect_ratio": request.aspect_ratio,
                    "image_size": size.label(),
                }
            })),
            provider_response: map_object(json!({
                "status": "ok",
                "width": edge,
                "height": edge,
            })),
            warnings: Vec::new(),
        })
    }
}

fn color_from_prompt(prompt: &str, size: ImageSize, quadrant: u8) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hasher.update(size.label().as_bytes());
    hasher.update([quadrant]);
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}
