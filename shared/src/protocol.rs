/// Registration endpoint; a POST here is the sole heartbeat mechanism
pub const REGISTER_PATH: &str = "/register";

/// Full listing with derived status
pub const SERVICES_PATH: &str = "/services";

/// Single-service status refresh, suffixed with the service name
pub const REFRESH_PREFIX: &str = "/refresh";

/// Status refresh for every registered service
pub const REFRESH_ALL_PATH: &str = "/refresh_all";

/// Human-readable dashboard
pub const DASHBOARD_PATH: &str = "/";

/// JSON field carrying the service address on the wire
pub const ADDRESS_FIELD: &str = "ip";
