//! Request and decision models for the iSHARE PEP.

use http::Method;
use serde::{Deserialize, Serialize};

/// An inbound HTTP request as seen by the authorization layer.
///
/// Only the parts relevant to authorization are carried; headers are the
/// proxy's concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundRequest {
    pub method: Method,
    /// Request path, without the query string.
    pub path: String,
    /// Raw query string, without the leading `?`.
    pub query: Option<String>,
    /// Raw request body.
    pub body: Option<Vec<u8>>,
}

impl InboundRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            body: None,
        }
    }

    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        self.query = (!query.is_empty()).then_some(query);
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        let body = body.into();
        self.body = (!body.is_empty()).then_some(body);
        self
    }

    /// Action verb derived from the HTTP method (`GET`, `PATCH`, ...).
    #[must_use]
    pub fn action(&self) -> String {
        self.method.as_str().to_ascii_uppercase()
    }
}

/// A single operation derived from a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestedOperation {
    pub resource_type: String,
    /// Concrete identifier, or `*` when the request addresses all entities of a type.
    pub resource_identifier: String,
    pub action: String,
}

impl RequestedOperation {
    #[must_use]
    pub fn new(
        resource_type: impl Into<String>,
        resource_identifier: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            resource_identifier: resource_identifier.into(),
            action: action.into(),
        }
    }
}

/// Opaque reason code attached to a denial.
///
/// Deliberately carries no token or registry details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// No token was presented.
    MissingToken,
    /// Signature or structure of the token is invalid.
    InvalidToken,
    /// The token was not issued for this application.
    UnauthorizedApplication,
    /// The delegation evidence is outside its validity window.
    Expired,
    /// The evidence is delegated to a different subject.
    SubjectMismatch,
    /// The registry did not recognize the evidence, or could not be reached.
    Untrusted,
    /// No operation could be derived from the request.
    UnrecognizedRequest,
    /// At least one operation is not permitted by the evidence.
    NotPermitted,
}

impl DenyReason {
    /// Stable machine-readable code.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::MissingToken => "missing_token",
            Self::InvalidToken => "invalid_token",
            Self::UnauthorizedApplication => "unauthorized_application",
            Self::Expired => "expired",
            Self::SubjectMismatch => "subject_mismatch",
            Self::Untrusted => "untrusted",
            Self::UnrecognizedRequest => "unrecognized_request",
            Self::NotPermitted => "not_permitted",
        }
    }
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Authorization verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    #[must_use]
    pub fn is_allow(self) -> bool {
        matches!(self, Self::Allow)
    }

    #[must_use]
    pub fn deny_reason(self) -> Option<DenyReason> {
        match self {
            Self::Allow => None,
            Self::Deny(reason) => Some(reason),
        }
    }
}

/// Wire-facing decision handed to the proxy layer.
///
/// The proxy maps `allow=false` to the carried `http_status` (401) and
/// forwards the original request otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationDecision {
    pub allow: bool,
    pub http_status: u16,
    pub reason: Option<DenyReason>,
}

impl From<Decision> for AuthorizationDecision {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Allow => Self {
                allow: true,
                http_status: 200,
                reason: None,
            },
            Decision::Deny(reason) => Self {
                allow: false,
                http_status: 401,
                reason: Some(reason),
            },
        }
    }
}
