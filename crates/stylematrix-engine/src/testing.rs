use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use stylematrix_contracts::catalogue::{StyleCatalogue, StyleDescriptor};
use stylematrix_contracts::errors::GenerationFailed;
use stylematrix_contracts::events::EventWriter;
use stylematrix_contracts::phase::RenderTier;
use stylematrix_contracts::records::ImageHandle;
use stylematrix_contracts::themes::ThemePalette;

use crate::client::{RenderClient, RenderRequest};
use crate::config::SessionConfig;
use crate::reference::ReferenceImage;
use crate::session::StageController;

pub(crate) type RenderHook = Box<dyn Fn(&RenderRequest) + Send + Sync>;

/// Records every call and fails on the style prompts it was told to.
#[derive(Default)]
pub(crate) struct ScriptedClient {
    calls: Mutex<Vec<(String, RenderTier)>>,
    failing: HashSet<String>,
    fail_tier: Option<RenderTier>,
    hook: Mutex<Option<RenderHook>>,
}

impl ScriptedClient {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn failing(prompts: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            failing: prompts.iter().map(|prompt| prompt.to_string()).collect(),
            ..Self::default()
        })
    }

    /// Like [`ScriptedClient::failing`] but only for calls at `tier`.
    pub(crate) fn failing_at(tier: RenderTier, prompts: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            failing: prompts.iter().map(|prompt| prompt.to_string()).collect(),
            fail_tier: Some(tier),
            ..Self::default()
        })
    }

    /// Runs `hook` inside every render call, before the result is produced.
    pub(crate) fn set_hook(&self, hook: RenderHook) {
        *self.hook.lock().unwrap_or_else(PoisonError::into_inner) = Some(hook);
    }

    pub(crate) fn calls(&self) -> Vec<(String, RenderTier)> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl RenderClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    fn render(&self, request: &RenderRequest) -> Result<ImageHandle, GenerationFailed> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((request.style_prompt.clone(), request.tier));
        if let Some(hook) = self
            .hook
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            hook(request);
        }
        let tier_matches = self.fail_tier.map_or(true, |tier| tier == request.tier);
        if tier_matches && self.failing.contains(&request.style_prompt) {
            return Err(GenerationFailed::new(format!(
                "scripted failure for {}",
                request.style_prompt
            )));
        }
        let body = format!("{}:{}", request.tier, request.style_prompt);
        Ok(ImageHandle::new(format!(
            "data:image/png;base64,{}",
            BASE64.encode(body)
        )))
    }
}

/// Styles 1, 2, 3 named A, B, C with prompts `a`, `b`, `c`.
pub(crate) fn abc_catalogue() -> StyleCatalogue {
    let styles = [(1, "A", "a"), (2, "B", "b"), (3, "C", "c")]
        .into_iter()
        .map(|(id, name, prompt)| StyleDescriptor {
            id,
            name: name.to_string(),
            prompt: prompt.to_string(),
        })
        .collect();
    match StyleCatalogue::new(styles) {
        Ok(catalogue) => catalogue,
        Err(err) => panic!("abc catalogue is valid: {err}"),
    }
}

pub(crate) fn controller_with(
    client: Arc<ScriptedClient>,
    events: EventWriter,
) -> anyhow::Result<StageController> {
    Ok(StageController::new(
        &SessionConfig::default(),
        client,
        abc_catalogue(),
        ThemePalette::reference(),
        events,
    )?)
}

pub(crate) fn reference_image() -> anyhow::Result<ReferenceImage> {
    ReferenceImage::from_bytes(b"\x89PNG subject", "image/png")
}
