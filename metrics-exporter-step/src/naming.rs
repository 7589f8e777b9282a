//! Naming conventions.
//!
//! Backends disagree on how meter names and tag keys should look. A [`NamingConvention`] maps the dot-separated,
//! lowercase names used when registering meters into whatever a given backend expects.

use crate::id::MeterType;

/// Maps meter names and tags into a backend-specific form.
///
/// Implementations must be pure string transformations.
pub trait NamingConvention: Send + Sync {
    /// Maps a meter name.
    ///
    /// `name` is the raw, dot-separated name, including any statistic suffix.
    fn name(&self, name: &str, meter_type: MeterType, base_unit: Option<&str>) -> String;

    /// Maps a tag key.
    fn tag_key(&self, key: &str) -> String {
        key.to_string()
    }

    /// Maps a tag value.
    fn tag_value(&self, value: &str) -> String {
        value.to_string()
    }
}

/// Leaves names and tags untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct Identity;

impl NamingConvention for Identity {
    fn name(&self, name: &str, _: MeterType, _: Option<&str>) -> String {
        name.to_string()
    }
}

/// Converts dot-separated names and tag keys to `snake_case`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SnakeCase;

impl NamingConvention for SnakeCase {
    fn name(&self, name: &str, _: MeterType, _: Option<&str>) -> String {
        name.replace('.', "_")
    }

    fn tag_key(&self, key: &str) -> String {
        key.replace('.', "_")
    }
}

/// Converts dot-separated names and tag keys to `camelCase`.
#[derive(Clone, Copy, Debug, Default)]
pub struct CamelCase;

impl CamelCase {
    fn convert(value: &str) -> String {
        let mut out = String::with_capacity(value.len());
        let mut upper_next = false;
        for c in value.chars() {
            if c == '.' {
                upper_next = !out.is_empty();
                continue;
            }

            if upper_next {
                out.extend(c.to_uppercase());
                upper_next = false;
            } else {
                out.push(c);
            }
        }
        out
    }
}

impl NamingConvention for CamelCase {
    fn name(&self, name: &str, _: MeterType, _: Option<&str>) -> String {
        Self::convert(name)
    }

    fn tag_key(&self, key: &str) -> String {
        Self::convert(key)
    }
}

#[cfg(test)]
mod tests {
    use super::{CamelCase, Identity, NamingConvention, SnakeCase};
    use crate::id::MeterType;

    #[test]
    fn conventions() {
        let name = "http.server.requests.count";

        assert_eq!(Identity.name(name, MeterType::Timer, None), "http.server.requests.count");
        assert_eq!(SnakeCase.name(name, MeterType::Timer, None), "http_server_requests_count");
        assert_eq!(CamelCase.name(name, MeterType::Timer, None), "httpServerRequestsCount");
        assert_eq!(CamelCase.name(".leading..dots", MeterType::Other, None), "leadingDots");

        assert_eq!(SnakeCase.tag_key("status.code"), "status_code");
        assert_eq!(CamelCase.tag_key("status.code"), "statusCode");
        assert_eq!(CamelCase.tag_value("a.b"), "a.b");
    }
}
