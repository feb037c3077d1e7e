pub mod catalogue;
pub mod errors;
pub mod events;
pub mod phase;
pub mod queue;
pub mod records;
pub mod runs;
pub mod themes;

use chrono::{SecondsFormat, Utc};

pub fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
