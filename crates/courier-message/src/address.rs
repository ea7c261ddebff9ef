//! Endpoint addresses.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::header::HeaderElement;
use crate::headers::MessageHeaders;

/// Address of a service endpoint.
///
/// Besides the URI, an address may require out-of-band headers. A message
/// targets the endpoint only when it carries every one of them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EndpointAddress {
    uri: Url,
    headers: Vec<HeaderElement>,
}

impl EndpointAddress {
    /// Creates an address without required headers.
    #[must_use]
    pub const fn new(uri: Url) -> Self {
        Self {
            uri,
            headers: Vec::new(),
        }
    }

    /// Parses an address URI.
    ///
    /// # Errors
    ///
    /// Returns the parse error when `uri` is not an absolute URL.
    pub fn parse(uri: &str) -> Result<Self, url::ParseError> {
        Url::parse(uri).map(Self::new)
    }

    /// Adds a required header.
    #[must_use]
    pub fn with_header(mut self, header: HeaderElement) -> Self {
        self.headers.push(header);
        self
    }

    /// Endpoint URI.
    #[must_use]
    pub const fn uri(&self) -> &Url {
        &self.uri
    }

    /// Required out-of-band headers.
    #[must_use]
    pub fn headers(&self) -> &[HeaderElement] {
        &self.headers
    }

    /// Writes the address onto outbound headers: `To` plus every required
    /// header.
    pub fn apply_to(&self, headers: &mut MessageHeaders) {
        headers.set_to(Some(self.uri.clone()));
        for header in &self.headers {
            headers.push(header.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_to_copies_uri_and_headers() {
        let address = EndpointAddress::parse("http://host/svc")
            .expect("address")
            .with_header(HeaderElement::text("Tenant", "urn:t", "a"));
        let mut headers = MessageHeaders::new();
        address.apply_to(&mut headers);
        assert_eq!(headers.to().map(Url::as_str), Some("http://host/svc"));
        assert_eq!(headers.extra_len(), 1);
    }
}
