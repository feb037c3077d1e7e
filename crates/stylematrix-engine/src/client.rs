use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use stylematrix_contracts::errors::GenerationFailed;
use stylematrix_contracts::phase::RenderTier;
use stylematrix_contracts::records::ImageHandle;
use stylematrix_contracts::themes::ThemePalette;

use crate::config::SessionConfig;
use crate::dryrun::DryrunRenderClient;
use crate::gemini::GeminiRenderClient;
use crate::reference::ReferenceImage;

#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub reference: Arc<ReferenceImage>,
    pub style_prompt: String,
    pub theme_index: usize,
    pub tier: RenderTier,
}

/// One attempt at rendering the reference image in a style.
///
/// Implementations make a single attempt per call. Any retry policy lives
/// inside the implementation, never in the job runner.
pub trait RenderClient: Send + Sync {
    fn name(&self) -> &str;
    fn render(&self, request: &RenderRequest) -> Result<ImageHandle, GenerationFailed>;
}

#[derive(Default)]
pub struct RenderClientRegistry {
    clients: BTreeMap<String, Arc<dyn RenderClient>>,
}

impl RenderClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<C: RenderClient + 'static>(&mut self, client: C) {
        self.clients
            .insert(client.name().to_string(), Arc::new(client));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn RenderClient>> {
        self.clients.get(name.trim()).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.clients.keys().cloned().collect()
    }
}

/// Dryrun is always available; Gemini only once a credential is configured.
pub fn default_client_registry(
    config: &SessionConfig,
    palette: &ThemePalette,
) -> Result<RenderClientRegistry> {
    let mut clients = RenderClientRegistry::new();
    clients.register(DryrunRenderClient::new(palette.clone()));
    if config.credential.is_some() {
        clients.register(GeminiRenderClient::new(config, palette.clone())?);
    }
    Ok(clients)
}
