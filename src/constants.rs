//! Field and collection name constants shared by the cleaner, loader and transformer.
//! Collection names here are only defaults; the config file can override them.

// Collections
pub const SOURCE_INDEX: &str = "it-assets";
pub const TARGET_INDEX: &str = "it-assets-transformed";

// Asset record fields
pub const HOSTNAME_FIELD: &str = "hostname";
pub const PROVIDER_FIELD: &str = "provider";
pub const LIFECYCLE_STATUS_FIELD: &str = "operating_system_lifecycle_status";
pub const INSTALLATION_DATE_FIELD: &str = "installation_date";
pub const OS_INSTALLATION_DATE_FIELD: &str = "operating_system_installation_date";

// Derived fields, written only by the transformer
pub const RISK_LEVEL_FIELD: &str = "risk_level";
pub const SYSTEM_AGE_FIELD: &str = "system_age";

/// Placeholder written wherever a cell is missing or blank
pub const UNKNOWN: &str = "unknown";

/// Provider values that mark a record as invalid (compared lower-cased)
pub const INVALID_PROVIDERS: [&str; 4] = ["unknown", "n/a", "not available", "na"];

/// Lifecycle statuses that classify an asset as high risk (compared lower-cased)
pub const HIGH_RISK_STATUSES: [&str; 4] = ["eol", "eos", "end of life", "end-of-support"];

/// CSV cell texts read as a missing value
pub const CSV_NULL_MARKERS: [&str; 11] = [
    "", "NA", "N/A", "n/a", "NaN", "nan", "NULL", "null", "None", "#N/A", "<NA>",
];

pub const DEFAULT_BATCH_SIZE: usize = 500;
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 60;
pub const DEFAULT_SCROLL_KEEP_ALIVE: &str = "2m";

/// Days per year used for age computation
pub const DAYS_PER_YEAR: f64 = 365.25;
