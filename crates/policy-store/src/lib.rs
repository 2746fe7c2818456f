pub mod api;
pub mod category;
pub mod coordinates;
pub mod errors;
pub mod fetch;
pub mod loader;
pub mod metrics;
pub mod model;
pub mod parse;
pub mod relations;
pub mod scheduler;
pub mod snapshot;

pub use api::{PolicyReader, Published, RegoStore, RegoStoreBuilder};
pub use category::RegoObjectCategory;
pub use coordinates::{
    resolve_root, ResolvedSource, StoreCoordinates, MAX_REFRESH_INTERVAL_MINUTES,
};
pub use errors::{ConfigError, FetchError, ParseError, RefreshCause, RefreshError};
pub use fetch::{ArtifactFetcher, HttpFetcher};
pub use loader::{load_settings, load_settings_with_options, LoadOptions};
pub use metrics::{RefreshMetrics, RefreshMetricsSnapshot};
pub use model::{Preset, SettingsSource, StoreSettings};
pub use parse::{ArtifactParser, JsonArtifactParser};
pub use relations::{derive_relations, RelationTable, RelationTables};
pub use scheduler::{logging_sink, ErrorSink, SchedulerState};
pub use snapshot::{Snapshot, SnapshotBuilder};
