//! Authorization orchestrator.
//!
//! Runs the pipeline for one request: dot-segment refusal, public-path bypass,
//! token verification,
//! application binding, evidence trust, normalization, policy matching. Every
//! failure becomes a `Decision::Deny` with an opaque reason. The only shared
//! state is the decision cache owned by this instance.

use std::sync::Arc;

use ishare_pep_sdk::{AuthorisationRegistryClient, Decision, DenyReason, InboundRequest};
use time::OffsetDateTime;
use tracing::debug;

use crate::config::PepConfig;
use crate::domain::cache::DecisionCache;
use crate::domain::error::DomainError;
use crate::domain::matcher::{MatchDenial, MatchVerdict, PolicyMatcher};
use crate::domain::normalizer::{has_dot_segments, normalize};
use crate::domain::public_paths::PublicPathMatcher;
use crate::domain::token::TokenVerifier;
use crate::domain::trust::{EvidenceTrustValidator, TrustError};
use crate::infra::registry_client::HttpRegistryClient;

pub struct Service {
    app_id: String,
    public_paths: PublicPathMatcher,
    verifier: TokenVerifier,
    trust: EvidenceTrustValidator,
    matcher: PolicyMatcher,
    cache: Arc<DecisionCache>,
}

impl Service {
    /// Build the service, with an HTTP registry client when `cfg.registry` is set.
    ///
    /// # Errors
    ///
    /// Returns `DomainError` if the token key, a public path pattern or the
    /// registry endpoint is invalid.
    pub fn from_config(cfg: &PepConfig) -> Result<Self, DomainError> {
        let registry = cfg
            .registry
            .as_ref()
            .map(|registry_cfg| {
                HttpRegistryClient::new(registry_cfg)
                    .map(|client| Arc::new(client) as Arc<dyn AuthorisationRegistryClient>)
            })
            .transpose()?;
        Self::new(cfg, registry)
    }

    /// Build the service around an explicit registry client.
    ///
    /// # Errors
    ///
    /// Returns `DomainError` if the token key or a public path pattern is invalid.
    pub fn new(
        cfg: &PepConfig,
        registry: Option<Arc<dyn AuthorisationRegistryClient>>,
    ) -> Result<Self, DomainError> {
        let verifier = TokenVerifier::from_config(&cfg.token)?;
        let public_paths = PublicPathMatcher::from_patterns(&cfg.public_paths)?;
        let cache = Arc::new(DecisionCache::new(cfg.cache_ttl()));
        let trust = EvidenceTrustValidator::new(
            registry,
            Arc::clone(&cache),
            cfg.trusted_issuers.iter().cloned(),
        );

        Ok(Self {
            app_id: cfg.app_id.clone(),
            public_paths,
            verifier,
            trust,
            matcher: PolicyMatcher::new(cfg.required_licenses.clone()),
            cache,
        })
    }

    /// Authorize `request` carrying `token` at the current time.
    pub async fn authorize(&self, token: Option<&str>, request: &InboundRequest) -> Decision {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        self.authorize_at(token, request, now).await
    }

    /// Authorize `request` carrying `token` at `now` (epoch seconds).
    #[tracing::instrument(skip_all, fields(method = %request.method, path = %request.path))]
    pub async fn authorize_at(
        &self,
        token: Option<&str>,
        request: &InboundRequest,
        now: i64,
    ) -> Decision {
        if has_dot_segments(&request.path) {
            return deny(DenyReason::UnrecognizedRequest);
        }

        if self.public_paths.is_public(&request.path) {
            debug!("public path, skipping authorization");
            return Decision::Allow;
        }

        let Some(raw) = token.filter(|t| !t.is_empty()) else {
            return deny(DenyReason::MissingToken);
        };

        let verified = match self.verifier.verify(raw) {
            Ok(verified) => verified,
            Err(e) => {
                debug!(error = %e, "token rejected");
                return deny(DenyReason::InvalidToken);
            }
        };

        if !self.app_id.is_empty() && !verified.is_issued_for(&self.app_id) {
            debug!(token_app = %verified.app_id, "token not issued for this application");
            return deny(DenyReason::UnauthorizedApplication);
        }

        let evidence = &verified.delegation_evidence;
        if let Err(e) = self
            .trust
            .validate(evidence, &verified.subject_id, now)
            .await
        {
            return deny(match e {
                TrustError::Expired => DenyReason::Expired,
                TrustError::SubjectMismatch => DenyReason::SubjectMismatch,
                TrustError::Untrusted => DenyReason::Untrusted,
            });
        }

        let operations = normalize(request);
        if operations.is_empty() {
            return deny(DenyReason::UnrecognizedRequest);
        }

        match self.matcher.evaluate(evidence, &operations) {
            MatchVerdict::Permit => Decision::Allow,
            MatchVerdict::Deny(MatchDenial::NoOperations) => deny(DenyReason::UnrecognizedRequest),
            MatchVerdict::Deny(
                MatchDenial::NoMatchingPolicy(op) | MatchDenial::ExplicitDeny(op),
            ) => {
                debug!(
                    resource_type = %op.resource_type,
                    resource_identifier = %op.resource_identifier,
                    action = %op.action,
                    "operation not permitted"
                );
                deny(DenyReason::NotPermitted)
            }
        }
    }

    /// Drop every cached trust outcome.
    pub fn flush_cache(&self) {
        self.cache.flush();
    }

    #[must_use]
    pub fn cache(&self) -> &DecisionCache {
        &self.cache
    }
}

fn deny(reason: DenyReason) -> Decision {
    debug!(reason = reason.code(), "request denied");
    Decision::Deny(reason)
}
