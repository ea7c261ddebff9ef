//! URI comparison used by address filters.
//!
//! Two URIs are considered equal when their schemes, paths and (optionally)
//! host/port agree, ignoring ASCII case and a trailing slash on the path. The
//! query and fragment never take part in the comparison.

use url::Url;

/// Compares endpoint URIs with or without their host component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UriComparer {
    include_host_name: bool,
}

impl UriComparer {
    /// Compares scheme, host, port and path.
    pub const HOST_INCLUSIVE: Self = Self {
        include_host_name: true,
    };

    /// Compares scheme and path only, so one endpoint answers on every host
    /// name the machine is reachable by.
    pub const HOST_AGNOSTIC: Self = Self {
        include_host_name: false,
    };

    /// Returns `true` when host and port take part in comparisons.
    #[must_use]
    pub const fn include_host_name(self) -> bool {
        self.include_host_name
    }

    /// Normalised comparison key for a URI; equal keys mean equal URIs.
    #[must_use]
    pub fn key(self, uri: &Url) -> String {
        let mut key = self.authority_key(uri);
        let path = uri.path().trim_end_matches('/');
        key.push_str(&path.to_ascii_lowercase());
        key
    }

    /// Returns `true` when both URIs address the same endpoint.
    #[must_use]
    pub fn equals(self, left: &Url, right: &Url) -> bool {
        self.key(left) == self.key(right)
    }

    /// Normalised scheme and authority, the root of every prefix comparison.
    #[must_use]
    pub fn authority_key(self, uri: &Url) -> String {
        let mut key = uri.scheme().to_ascii_lowercase();
        key.push_str("://");
        if self.include_host_name {
            if let Some(host) = uri.host_str() {
                key.push_str(&host.to_ascii_lowercase());
            }
            if let Some(port) = uri.port_or_known_default() {
                key.push(':');
                key.push_str(&port.to_string());
            }
        }
        key
    }

    /// Lower-cased, non-empty path segments, or `None` for URIs that have no
    /// hierarchical path (for example `urn:` URIs).
    #[must_use]
    pub fn segments(uri: &Url) -> Option<Vec<String>> {
        uri.path_segments().map(|segments| {
            segments
                .filter(|segment| !segment.is_empty())
                .map(str::to_ascii_lowercase)
                .collect()
        })
    }

    /// Returns `true` when `prefix` addresses `uri` or one of its ancestors,
    /// segment by segment.
    #[must_use]
    pub fn is_prefix(self, prefix: &Url, uri: &Url) -> bool {
        if self.authority_key(prefix) != self.authority_key(uri) {
            return false;
        }
        match (Self::segments(prefix), Self::segments(uri)) {
            (Some(prefix_segments), Some(uri_segments)) => {
                uri_segments.starts_with(&prefix_segments)
            }
            _ => false,
        }
    }
}

impl Default for UriComparer {
    fn default() -> Self {
        Self::HOST_INCLUSIVE
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn url(raw: &str) -> Url {
        Url::parse(raw).expect("test URL")
    }

    #[rstest]
    #[case("http://a/svc", "HTTP://A/SVC/", true)]
    #[case("http://a/svc", "http://a:80/svc", true)]
    #[case("http://a/svc", "http://a:8080/svc", false)]
    #[case("http://a/svc", "http://b/svc", false)]
    #[case("http://a/svc", "http://a/svc2", false)]
    #[case("http://a/svc", "http://a/svc?x=1", true)]
    fn host_inclusive_equality(#[case] left: &str, #[case] right: &str, #[case] expected: bool) {
        assert_eq!(
            UriComparer::HOST_INCLUSIVE.equals(&url(left), &url(right)),
            expected
        );
    }

    #[test]
    fn host_agnostic_ignores_host_and_port() {
        assert!(UriComparer::HOST_AGNOSTIC.equals(&url("http://a/svc"), &url("http://b:81/svc")));
        assert!(!UriComparer::HOST_AGNOSTIC.equals(&url("http://a/svc"), &url("https://a/svc")));
    }

    #[rstest]
    #[case("http://a/svc", "http://a/svc/child", true)]
    #[case("http://a/svc", "http://a/svc", true)]
    #[case("http://a/svc", "http://a/svc2", false)]
    #[case("http://a/", "http://a/anything", true)]
    #[case("http://a/svc/deep", "http://a/svc", false)]
    fn prefix_matching_is_segment_aware(
        #[case] prefix: &str,
        #[case] uri: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(
            UriComparer::HOST_INCLUSIVE.is_prefix(&url(prefix), &url(uri)),
            expected
        );
    }
}
