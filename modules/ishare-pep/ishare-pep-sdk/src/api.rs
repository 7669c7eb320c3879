//! Public API trait for the iSHARE PEP.

use async_trait::async_trait;

use crate::models::{AuthorizationDecision, InboundRequest};

/// Authorization entry point consumed by the proxy layer.
///
/// ```ignore
/// let decision = pep.authorize(token, &request).await;
/// if decision.allow {
///     // forward to the backend unchanged
/// }
/// ```
#[async_trait]
pub trait PepGatewayClient: Send + Sync {
    /// Authorize one inbound request.
    ///
    /// Never fails: every error path is folded into a denial carrying an
    /// opaque reason code.
    async fn authorize(
        &self,
        token: Option<&str>,
        request: &InboundRequest,
    ) -> AuthorizationDecision;
}
