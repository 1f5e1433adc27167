//! Metric names emitted by the application services.

pub const METRIC_PAGE_SAVES: &str = "tessera_page_saves_total";
pub const METRIC_AUTOSAVE_FAILURES: &str = "tessera_autosave_failures_total";
pub const METRIC_VERSIONS_CREATED: &str = "tessera_versions_created_total";
pub const METRIC_VERSION_RESTORES: &str = "tessera_version_restores_total";
pub const METRIC_PAGE_REORDERS: &str = "tessera_page_reorders_total";
pub const METRIC_SAVE_MS: &str = "tessera_save_ms";
