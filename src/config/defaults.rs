/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Provider defaults
pub const DEFAULT_PROVIDER_BASE_URL: &str = "https://tv.api.pressassociation.io/v2";
pub const DEFAULT_REQUEST_TIMEOUT: &str = "30s";

// Ingestion defaults
pub const DEFAULT_CRON: &str = "0 0 22 * * *"; // 22:00 daily, in the configured time zone
pub const DEFAULT_RUN_ON_STARTUP: bool = false;
pub const DEFAULT_HORIZON_DAYS: u32 = 14;
pub const DEFAULT_FETCH_INTERVAL: &str = "1s";
pub const DEFAULT_RETRY_GAP: &str = "30s";
pub const DEFAULT_MAX_RETRY_GAP: &str = "10m";
pub const DEFAULT_MAX_RETRY_ROUNDS: u32 = 3;
pub const DEFAULT_TIMEZONE: &str = "Europe/London";
pub const DEFAULT_PLACEHOLDER_IMAGE_URL: &str = "https://static.example.com/images/not-available.png";

// Storage defaults
pub const DEFAULT_SCHEDULES_PATH: &str = "./data/schedules.json";
pub const DEFAULT_CHANNELS_PATH: &str = "./data/channels.json";
pub const DEFAULT_STATE_PATH: &str = "./data/ingestion-state.json";

// Fetch window offsets (not configurable)
pub const FIRST_RUN_LEAD_HOURS: i64 = 2;
