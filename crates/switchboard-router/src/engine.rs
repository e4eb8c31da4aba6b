use std::sync::Arc;

use chrono::Utc;
use switchboard_adapters::{AdapterRegistry, CallContext, ChunkStream, InvokeRequest, InvokeResponse};
use switchboard_auth::Principal;
use switchboard_catalog::{Catalog, ModelQuery, ModelTarget};
use switchboard_core::Deadline;
use switchboard_ratelimit::RateLimiter;
use switchboard_recorder::InvocationRecorder;

use crate::error::RouterError;
use crate::recording::{RecordingStream, draft_for_error, draft_for_response};
use crate::select::select_candidate;

/// Composes catalog, adapters, rate limiter, and recorder into the
/// request-serving pipeline
#[derive(Clone)]
pub struct RouterEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    catalog: Catalog,
    adapters: AdapterRegistry,
    limiter: RateLimiter,
    recorder: InvocationRecorder,
}

impl RouterEngine {
    pub fn new(catalog: Catalog, adapters: AdapterRegistry, limiter: RateLimiter, recorder: InvocationRecorder) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                catalog,
                adapters,
                limiter,
                recorder,
            }),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    pub fn recorder(&self) -> &InvocationRecorder {
        &self.inner.recorder
    }

    /// Direct mode: the caller names the target
    pub async fn invoke_direct(
        &self,
        provider: &str,
        model: &str,
        request: &InvokeRequest,
        principal: &Principal,
        deadline: Deadline,
    ) -> Result<InvokeResponse, RouterError> {
        let target = self.resolve_target(provider, model, principal)?;
        self.invoke_target(&target, request, principal, deadline).await
    }

    /// Tag-routed mode: the engine selects the target
    pub async fn invoke_routed(
        &self,
        query: &ModelQuery,
        request: &InvokeRequest,
        principal: &Principal,
        deadline: Deadline,
    ) -> Result<(ModelTarget, InvokeResponse), RouterError> {
        let target = select_candidate(&self.inner.catalog, query, principal)?;
        let response = self.invoke_target(&target, request, principal, deadline).await?;
        Ok((target, response))
    }

    /// Direct mode, streaming
    pub async fn stream_direct(
        &self,
        provider: &str,
        model: &str,
        request: &InvokeRequest,
        principal: &Principal,
        deadline: Deadline,
    ) -> Result<ChunkStream, RouterError> {
        let target = self.resolve_target(provider, model, principal)?;
        self.stream_target(&target, request, principal, deadline).await
    }

    /// Tag-routed mode, streaming
    pub async fn stream_routed(
        &self,
        query: &ModelQuery,
        request: &InvokeRequest,
        principal: &Principal,
        deadline: Deadline,
    ) -> Result<(ModelTarget, ChunkStream), RouterError> {
        let target = select_candidate(&self.inner.catalog, query, principal)?;
        let stream = self.stream_target(&target, request, principal, deadline).await?;
        Ok((target, stream))
    }

    /// Lookup, activity check, and allow-list check for direct mode
    fn resolve_target(&self, provider: &str, model: &str, principal: &Principal) -> Result<ModelTarget, RouterError> {
        let target = self.inner.catalog.get_model(provider, model)?;
        if !target.model.is_active || !target.provider.is_active {
            return Err(RouterError::ModelDisabled {
                provider: provider.to_owned(),
                model: model.to_owned(),
            });
        }
        principal.authorize(provider, model)?;
        Ok(target)
    }

    /// Shared tail of the pipeline: rate token, adapter call, record
    async fn invoke_target(
        &self,
        target: &ModelTarget,
        request: &InvokeRequest,
        principal: &Principal,
        deadline: Deadline,
    ) -> Result<InvokeResponse, RouterError> {
        request.validate()?;
        self.acquire_rate_token(target, deadline).await?;

        let adapter = self.inner.adapters.get(target.provider.provider_type);
        let ctx = CallContext::new(deadline).with_limits(principal.parameter_limits());
        let started_at = Utc::now();

        match adapter.invoke(target, request, &ctx).await {
            Ok(mut response) => {
                // Cost is computed from the upstream counts and pricing
                response.cost = response
                    .usage
                    .and_then(|u| target.model.config.cost(u.prompt_tokens, u.completion_tokens));
                self.inner
                    .recorder
                    .record(draft_for_response(target, request, started_at, &response));
                Ok(response)
            }
            Err(error) => {
                tracing::warn!(
                    provider = %target.model.provider_name,
                    model = %target.model.name,
                    error = %error,
                    "adapter invocation failed"
                );
                self.inner
                    .recorder
                    .record(draft_for_error(target, request, started_at, &error));
                Err(error.into())
            }
        }
    }

    async fn stream_target(
        &self,
        target: &ModelTarget,
        request: &InvokeRequest,
        principal: &Principal,
        deadline: Deadline,
    ) -> Result<ChunkStream, RouterError> {
        request.validate()?;
        self.acquire_rate_token(target, deadline).await?;

        let adapter = self.inner.adapters.get(target.provider.provider_type);
        let ctx = CallContext::new(deadline).with_limits(principal.parameter_limits());
        let started_at = Utc::now();

        match adapter.invoke_stream(target, request, &ctx).await {
            Ok(stream) => Ok(Box::pin(RecordingStream::new(
                stream,
                self.inner.recorder.clone(),
                target.clone(),
                request,
                started_at,
            ))),
            Err(error) => {
                self.inner
                    .recorder
                    .record(draft_for_error(target, request, started_at, &error));
                Err(error.into())
            }
        }
    }

    /// One token per call for rate-limited models; others bypass
    ///
    /// A token spent here is never refunded, even when the upstream call
    /// is abandoned later.
    async fn acquire_rate_token(&self, target: &ModelTarget, deadline: Deadline) -> Result<(), RouterError> {
        if let Some(limit) = target.model.rate_limit {
            self.inner
                .limiter
                .acquire(&target.model.qualified_name(), limit, deadline)
                .await?;
        }
        Ok(())
    }
}
