pub mod api;
pub mod client;
pub mod coordinator;
pub mod error;
pub mod sink;
pub mod storage;
pub mod types;

pub use api::{FilterRequest, FilterVerdict, PayloadVideo};
pub use client::{FilterClient, HttpFilterClient};
pub use coordinator::{
    Coordinator, CoordinatorMetrics, CycleOutcome, CycleTicket, DEFAULT_DEBOUNCE, TabPhase,
};
pub use error::{Result, TubegateError};
pub use sink::{ChannelPageSink, PageSink, PageUpdate};
pub use storage::{
    JsonSettingsStore, MemorySettingsStore, MemoryTabStore, SettingsStore, TabStore,
};
pub use types::{
    BlockedVideoDetails, ContentKind, DetectedVideo, FilterSettings, ListMode, SurfaceKind,
    TabEntry, TabId,
};
