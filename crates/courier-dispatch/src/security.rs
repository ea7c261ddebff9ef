//! Authentication and authorization seams.
//!
//! The dispatcher calls [`ServiceAuthenticationManager::authenticate`]
//! before selecting an operation and
//! [`ServiceAuthorizationManager::check_access`] once the operation is known.
//! Hosts that do not plug in their own managers get the allow-all defaults
//! held by [`SecurityDefaults`], built once and passed to each runtime.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use courier_message::{Message, Url};
use thiserror::Error;

use crate::context::OperationContext;

/// Claims established for the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationPolicy {
    id: String,
    claims: BTreeMap<String, String>,
}

impl AuthorizationPolicy {
    /// Creates a policy with no claims.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            claims: BTreeMap::new(),
        }
    }

    /// Adds a claim.
    #[must_use]
    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.claims.insert(name.into(), value.into());
        self
    }

    /// Policy identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Value of a claim, if present.
    #[must_use]
    pub fn claim(&self, name: &str) -> Option<&str> {
        self.claims.get(name).map(String::as_str)
    }
}

/// Rejection raised by a security manager.
///
/// The message is logged but never returned to the caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct SecurityError {
    message: String,
}

impl SecurityError {
    /// Creates a rejection.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Establishes who sent a message.
pub trait ServiceAuthenticationManager: Send + Sync {
    /// Returns the policies that hold for the sender of `message`.
    ///
    /// # Errors
    ///
    /// Any error rejects the call with an authentication fault.
    fn authenticate(
        &self,
        policies: Vec<AuthorizationPolicy>,
        listen_uri: Option<&Url>,
        message: &mut Message,
    ) -> Result<Vec<AuthorizationPolicy>, SecurityError>;
}

/// Decides whether a caller may invoke an operation.
pub trait ServiceAuthorizationManager: Send + Sync {
    /// Returns `true` to allow the call.
    ///
    /// # Errors
    ///
    /// Any error rejects the call with an access-denied fault.
    fn check_access(
        &self,
        context: &OperationContext,
        message: &mut Message,
    ) -> Result<bool, SecurityError>;
}

/// Authentication manager that accepts every caller unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllAuthentication;

impl ServiceAuthenticationManager for AllowAllAuthentication {
    fn authenticate(
        &self,
        policies: Vec<AuthorizationPolicy>,
        _listen_uri: Option<&Url>,
        _message: &mut Message,
    ) -> Result<Vec<AuthorizationPolicy>, SecurityError> {
        Ok(policies)
    }
}

/// Authorization manager that allows every call.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllAuthorization;

impl ServiceAuthorizationManager for AllowAllAuthorization {
    fn check_access(
        &self,
        _context: &OperationContext,
        _message: &mut Message,
    ) -> Result<bool, SecurityError> {
        Ok(true)
    }
}

/// Security managers installed on runtimes that do not configure their own.
#[derive(Clone)]
pub struct SecurityDefaults {
    authentication: Arc<dyn ServiceAuthenticationManager>,
    authorization: Arc<dyn ServiceAuthorizationManager>,
}

impl fmt::Debug for SecurityDefaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityDefaults").finish_non_exhaustive()
    }
}

impl Default for SecurityDefaults {
    fn default() -> Self {
        Self::new()
    }
}

impl SecurityDefaults {
    /// Allow-all managers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            authentication: Arc::new(AllowAllAuthentication),
            authorization: Arc::new(AllowAllAuthorization),
        }
    }

    /// Replaces the authentication manager.
    #[must_use]
    pub fn with_authentication(mut self, manager: Arc<dyn ServiceAuthenticationManager>) -> Self {
        self.authentication = manager;
        self
    }

    /// Replaces the authorization manager.
    #[must_use]
    pub fn with_authorization(mut self, manager: Arc<dyn ServiceAuthorizationManager>) -> Self {
        self.authorization = manager;
        self
    }

    /// Default authentication manager.
    #[must_use]
    pub fn authentication(&self) -> Arc<dyn ServiceAuthenticationManager> {
        Arc::clone(&self.authentication)
    }

    /// Default authorization manager.
    #[must_use]
    pub fn authorization(&self) -> Arc<dyn ServiceAuthorizationManager> {
        Arc::clone(&self.authorization)
    }
}
