/// Application name
pub const APP_NAME: &str = "BaseSeva";

/// Maximum certificate upload size in bytes (10 MiB)
pub const MAX_CERTIFICATE_SIZE: usize = 10 * 1024 * 1024;

/// MIME types accepted for donation certificates
pub const ALLOWED_CERTIFICATE_TYPES: &[&str] =
    &["image/jpeg", "image/jpg", "image/png", "image/webp"];

/// Lifetime of a blood request from creation, in hours
pub const REQUEST_TTL_HOURS: i64 = 24;

/// Minimum gap between two donations before a donor is eligible again
pub const DONATION_COOLDOWN_DAYS: i64 = 90;

/// Donations closer together than this keep the streak alive
pub const STREAK_WINDOW_DAYS: i64 = 180;

/// Impact points awarded for every recorded donation
pub const DONATION_IMPACT_POINTS: u64 = 100;

/// Default radius for "nearby" searches
pub const DEFAULT_SEARCH_RADIUS_KM: f64 = 50.0;

/// Background sync interval while online (5 minutes)
pub const SYNC_INTERVAL_SECS: u64 = 300;

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Local store keys
pub const SESSION_KEY: &str = "baseseva_session";
pub const USER_KEY: &str = "baseseva_user";
pub const APP_DATA_KEY: &str = "baseseva_app_data";

/// Key derivation contexts (BLAKE3)
pub const KDF_CONTEXT_WALLET_ADDRESS: &str = "baseseva-wallet-address-v1";
pub const KDF_CONTEXT_MOCK_WALLET: &str = "baseseva-mock-wallet-v1";

/// Wallet address length in bytes (hex-encoded with a `0x` prefix)
pub const ADDRESS_SIZE: usize = 20;
