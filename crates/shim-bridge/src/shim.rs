//! Handle binding a [`ShimConfig`] to the invoker.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::codec::{decode_reply, encode_request};
use crate::compound::{self, ShimRunner};
use crate::config::ShimConfig;
use crate::error::Result;
use crate::invoker::{Invoker, Mode};
use crate::protocol::{CallStack, Request};

/// Entry point for talking to the ruby compatibility shim.
///
/// Cheap to clone. Every call spawns its own shim process and checks the
/// configured paths again first.
#[derive(Debug, Clone)]
pub struct Shim {
    config: ShimConfig,
    invoker: Invoker,
}

impl Shim {
    pub fn new(config: ShimConfig) -> Self {
        Self {
            config,
            invoker: Invoker::new(),
        }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(ShimConfig::from_env()?))
    }

    pub fn with_invoker(mut self, invoker: Invoker) -> Self {
        self.invoker = invoker;
        self
    }

    pub fn config(&self) -> &ShimConfig {
        &self.config
    }

    /// Run an agent action and decode its reply into `R`.
    pub async fn invoke_action<R: DeserializeOwned>(
        &self,
        request: &Request,
        timeout: Duration,
    ) -> Result<R> {
        let input = encode_request(request)?;
        tracing::debug!(
            agent = %request.agent,
            action = %request.action,
            request_id = %request.request_id,
            "Invoking ruby agent action"
        );
        let output = self.run(Mode::Action, timeout, &input).await?;
        decode_reply(&output)
    }

    pub async fn parse_compound_filter(&self, filter: &str) -> Result<CallStack> {
        compound::parse(self, filter).await
    }

    pub async fn validate_compound_call_stack(
        &self,
        stack: &CallStack,
        timeout: Duration,
    ) -> Result<bool> {
        compound::validate_call_stack(self, stack, timeout).await
    }

    pub async fn validate_compound_filter(&self, filter: &str, timeout: Duration) -> Result<bool> {
        compound::validate_filter(self, filter, timeout).await
    }
}

#[async_trait]
impl ShimRunner for Shim {
    async fn run(&self, mode: Mode, timeout: Duration, input: &[u8]) -> Result<Vec<u8>> {
        self.invoker
            .invoke(
                &self.config.executable,
                &self.config.config,
                timeout,
                mode,
                input,
            )
            .await
    }
}
