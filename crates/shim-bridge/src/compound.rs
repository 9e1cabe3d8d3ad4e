//! Two-phase compound filter evaluation.
//!
//! A filter such as `systemd=true and staging_http_get=crl` is first parsed
//! by the shim into a call stack, which is then handed back to the shim to be
//! validated against the current node. The grammar and the call stack format
//! belong to the runtime; this module only moves them across the process
//! boundary.

use std::time::Duration;

use async_trait::async_trait;

use crate::codec::{decode_reply, probe_field};
use crate::error::{Result, ShimError};
use crate::invoker::Mode;
use crate::protocol::{CallStack, ValidateReply};

/// Parsing is local to the runtime and cheap, so it gets a fixed budget
/// regardless of what the caller allows for validation.
pub const PARSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Field the runtime sets when it fails to handle a compound request.
const STATUS_FIELD: &str = "statusmsg";

/// Runs one shim invocation in the given mode and returns its raw stdout.
#[async_trait]
pub trait ShimRunner: Send + Sync {
    async fn run(&self, mode: Mode, timeout: Duration, input: &[u8]) -> Result<Vec<u8>>;
}

/// Parse a compound filter into the runtime's call stack.
///
/// Any `statusmsg` in the reply, even an empty one, marks a remote failure.
/// Otherwise the trimmed output is returned as-is.
pub async fn parse<R: ShimRunner + ?Sized>(runner: &R, filter: &str) -> Result<CallStack> {
    let output = runner
        .run(Mode::ParseCompound, PARSE_TIMEOUT, filter.as_bytes())
        .await?;

    if let Some(msg) = probe_field(&output, STATUS_FIELD) {
        tracing::debug!(%filter, error = %msg, "Compound filter parse failed");
        return Err(ShimError::Remote(msg));
    }

    let token = String::from_utf8(output).map_err(ShimError::CallStackEncoding)?;
    Ok(CallStack::from(token.trim().to_string()))
}

/// Validate a previously parsed call stack against the current node.
pub async fn validate_call_stack<R: ShimRunner + ?Sized>(
    runner: &R,
    stack: &CallStack,
    timeout: Duration,
) -> Result<bool> {
    let output = runner
        .run(Mode::ValidateCompound, timeout, stack.as_str().as_bytes())
        .await?;
    let reply: ValidateReply = decode_reply(&output)?;
    Ok(reply.matched)
}

/// Parse and validate a compound filter. Parse failures are wrapped so the
/// caller can tell an invalid filter from a failed validation.
pub async fn validate_filter<R: ShimRunner + ?Sized>(
    runner: &R,
    filter: &str,
    timeout: Duration,
) -> Result<bool> {
    let stack = parse(runner, filter)
        .await
        .map_err(|e| ShimError::FilterParse(Box::new(e)))?;
    validate_call_stack(runner, &stack, timeout).await
}
