//! Resource paths, relative to the versioned API base.

/// Collection of the account's events.
pub const EVENTS: &str = "/events";

/// Path of one event.
pub fn event(id: &str) -> String {
    format!("{EVENTS}/{id}")
}

/// Path of one device registration.
pub fn device(device_id: &str) -> String {
    format!("/devices/{device_id}")
}

/// Path used to broadcast a sync token from `device_id`.
pub fn device_sync(device_id: &str) -> String {
    format!("/devices/{device_id}/sync")
}

/// Ensures `path` starts with exactly one `/`.
pub fn normalize(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}

/// Base URL of the REST API: `https://{host}/api/{version}`.
pub fn base_url(host: &str, version: u32) -> String {
    format!("https://{host}/api/{version}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_paths() {
        assert_eq!(event("E1"), "/events/E1");
        assert_eq!(device("d1"), "/devices/d1");
        assert_eq!(device_sync("d1"), "/devices/d1/sync");
        assert_eq!(base_url("example.com", 1), "https://example.com/api/1");
    }

    #[test]
    fn normalization() {
        assert_eq!(normalize("events"), "/events");
        assert_eq!(normalize("/events"), "/events");
        assert_eq!(normalize("//events"), "/events");
        assert_eq!(normalize(""), "/");
    }
}
