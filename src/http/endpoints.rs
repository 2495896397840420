//! Backend paths, relative to the `/api` base URL.

pub const LOGIN: &str = "/auth/login/";
pub const REGISTER: &str = "/auth/register/";
pub const TOKEN_REFRESH: &str = "/auth/token/refresh/";
pub const LOGOUT: &str = "/auth/logout/";
pub const ME: &str = "/auth/me/";
pub const PREFERENCES: &str = "/auth/preferences/";
pub const CHANGE_PASSWORD: &str = "/auth/change-password/";

pub const HEALTH: &str = "/health/";
pub const NEARBY_SHELTERS: &str = "/nearby-shelters/";
pub const ACTIVE_ALERTS: &str = "/active-alerts/";
pub const SAFETY_INSTRUCTIONS: &str = "/safety-instructions/";
pub const EMERGENCY_EDUCATION: &str = "/emergency-education/";
pub const DEVICE_REGISTER: &str = "/devices/register/";
pub const SAFETY_STATUS: &str = "/status/";
pub const SIMULATE_ALERT: &str = "/simulate-alert/";

/// Never sent with a bearer token.
pub const PUBLIC_ENDPOINTS: [&str; 8] = [
    HEALTH,
    NEARBY_SHELTERS,
    ACTIVE_ALERTS,
    SAFETY_INSTRUCTIONS,
    EMERGENCY_EDUCATION,
    DEVICE_REGISTER,
    SAFETY_STATUS,
    SIMULATE_ALERT,
];

/// Endpoints that mint credentials; a 401 from them is final.
const CREDENTIAL_EXCHANGE: [&str; 3] = [LOGIN, REGISTER, TOKEN_REFRESH];

fn normalize(path: &str) -> String {
    let path = path.split('?').next().unwrap_or_default();
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

pub fn is_public(path: &str) -> bool {
    let path = normalize(path);
    PUBLIC_ENDPOINTS.contains(&path.as_str())
}

pub fn is_credential_exchange(path: &str) -> bool {
    let path = normalize(path);
    CREDENTIAL_EXCHANGE.contains(&path.as_str())
}

/// Whether a 401 on this path should go through the refresh coordinator.
pub fn is_refreshable(path: &str) -> bool {
    !is_public(path) && !is_credential_exchange(path)
}
