use std::io::Cursor;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{ImageFormat, Rgb, RgbImage};
use sha2::{Digest, Sha256};
use stylematrix_contracts::errors::GenerationFailed;
use stylematrix_contracts::phase::RenderTier;
use stylematrix_contracts::records::ImageHandle;
use stylematrix_contracts::themes::{ColorTheme, ThemePalette};

use crate::client::{RenderClient, RenderRequest};
use crate::prompt::compose_prompt;

/// Offline client that paints a deterministic swatch per prompt.
///
/// Paper-coloured background with an ink block whose inset and shade come from
/// a hash of the composed prompt and reference image, so every style gets a
/// distinct but reproducible cell.
pub struct DryrunRenderClient {
    palette: ThemePalette,
}

impl DryrunRenderClient {
    pub fn new(palette: ThemePalette) -> Self {
        Self { palette }
    }

    fn render_swatch(&self, request: &RenderRequest) -> Result<ImageHandle> {
        let theme = self.palette.get(request.theme_index)?;
        let prompt = compose_prompt(theme, &request.style_prompt);
        let digest = prompt_digest(&prompt, request.reference.base64_data());
        let edge = dryrun_edge(request.tier);
        let image = paint_swatch(theme, &digest, edge);

        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .context("dryrun PNG encode failed")?;
        Ok(ImageHandle::new(format!(
            "data:image/png;base64,{}",
            BASE64.encode(bytes)
        )))
    }
}

impl RenderClient for DryrunRenderClient {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn render(&self, request: &RenderRequest) -> Result<ImageHandle, GenerationFailed> {
        self.render_swatch(request)
            .map_err(|err| GenerationFailed::new(format!("{err:#}")))
    }
}

fn dryrun_edge(tier: RenderTier) -> u32 {
    match tier {
        RenderTier::OneK => 64,
        RenderTier::TwoK => 128,
        RenderTier::FourK => 256,
    }
}

fn prompt_digest(prompt: &str, reference: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hasher.update(reference.as_bytes());
    hasher.finalize().into()
}

fn paint_swatch(theme: &ColorTheme, digest: &[u8; 32], edge: u32) -> RgbImage {
    let paper = theme.paper_rgb().unwrap_or([255, 255, 255]);
    let ink = shade(theme.ink_rgb().unwrap_or([0, 0, 0]), digest[0]);
    let inset = edge / 8 + u32::from(digest[1]) % (edge / 4).max(1);

    let mut image = RgbImage::from_pixel(edge, edge, Rgb(paper));
    for y in inset..edge.saturating_sub(inset) {
        for x in inset..edge.saturating_sub(inset) {
            image.put_pixel(x, y, Rgb(ink));
        }
    }
    image
}

fn shade(rgb: [u8; 3], amount: u8) -> [u8; 3] {
    let factor = 0.6 + f32::from(amount) / 255.0 * 0.4;
    rgb.map(|channel| (f32::from(channel) * factor).round() as u8)
}
