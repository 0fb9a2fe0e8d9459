//! Package metadata model: records, match specs, channels and platforms

mod channel;
mod match_spec;
mod platform;
mod record;

pub use channel::{Channel, ParseChannelError, DEFAULT_CHANNEL_ALIAS};
pub use match_spec::{MatchSpec, ParseMatchSpecError};
pub use platform::{ParsePlatformError, Platform};
pub use record::{PackageRecord, RecordKind};
