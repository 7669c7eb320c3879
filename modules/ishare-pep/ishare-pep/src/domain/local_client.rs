//! Local (in-process) client for the PEP decision engine.

use std::sync::Arc;

use async_trait::async_trait;
use ishare_pep_sdk::{AuthorizationDecision, InboundRequest, PepGatewayClient};

use super::Service;

/// Local client wrapping the decision engine service.
pub struct PepGwLocalClient {
    svc: Arc<Service>,
}

impl PepGwLocalClient {
    #[must_use]
    pub fn new(svc: Arc<Service>) -> Self {
        Self { svc }
    }
}

#[async_trait]
impl PepGatewayClient for PepGwLocalClient {
    async fn authorize(
        &self,
        token: Option<&str>,
        request: &InboundRequest,
    ) -> AuthorizationDecision {
        self.svc.authorize(token, request).await.into()
    }
}
