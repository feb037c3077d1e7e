use std::fmt;

use serde::{Deserialize, Serialize};

use crate::records::GenerationStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationPhase {
    Initial,
    ImageLoaded,
    RunningStage1,
    Reviewing,
    RunningStage2,
    Done,
}

impl ApplicationPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::ImageLoaded => "image_loaded",
            Self::RunningStage1 => "running_stage1",
            Self::Reviewing => "reviewing",
            Self::RunningStage2 => "running_stage2",
            Self::Done => "done",
        }
    }

    /// The stage whose queue is drained in this phase, if any.
    pub fn running_stage(self) -> Option<Stage> {
        match self {
            Self::RunningStage1 => Some(Stage::Preview),
            Self::RunningStage2 => Some(Stage::Upgrade),
            _ => None,
        }
    }
}

impl fmt::Display for ApplicationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the two generation passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Preview,
    Upgrade,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Preview => "preview",
            Self::Upgrade => "upgrade",
        }
    }

    pub fn tier(self) -> RenderTier {
        match self {
            Self::Preview => RenderTier::OneK,
            Self::Upgrade => RenderTier::FourK,
        }
    }

    pub fn running_phase(self) -> ApplicationPhase {
        match self {
            Self::Preview => ApplicationPhase::RunningStage1,
            Self::Upgrade => ApplicationPhase::RunningStage2,
        }
    }

    pub fn finished_phase(self) -> ApplicationPhase {
        match self {
            Self::Preview => ApplicationPhase::Reviewing,
            Self::Upgrade => ApplicationPhase::Done,
        }
    }

    /// Status a record carries while its job is in flight.
    pub fn in_flight_status(self) -> GenerationStatus {
        match self {
            Self::Preview => GenerationStatus::Processing,
            Self::Upgrade => GenerationStatus::Upgrading,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Preview => "Stage 1: rendering previews",
            Self::Upgrade => "Stage 2: 4K upgrades",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolution class requested from the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenderTier {
    #[serde(rename = "1K")]
    OneK,
    #[serde(rename = "2K")]
    TwoK,
    #[serde(rename = "4K")]
    FourK,
}

impl RenderTier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneK => "1K",
            Self::TwoK => "2K",
            Self::FourK => "4K",
        }
    }
}

impl fmt::Display for RenderTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
