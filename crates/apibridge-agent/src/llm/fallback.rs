//! Tool-set fallback ladder.
//!
//! Some providers reject tool-enabled requests that a plain request would
//! survive: payload too large, tool schema the endpoint cannot digest.  The
//! ladder degrades the request instead of failing the turn — full tool set,
//! then half, then none.  Only size/format-class rejections are retried;
//! auth and quota failures always propagate to the caller.

use tracing::warn;

use apibridge_plugins::LlmTool;

use crate::llm::backend::{BackendError, ChatBackend, ErrorClass};
use crate::llm::types::{ChatOutcome, Message};

/// One provider round-trip with tool-set degradation.
pub async fn chat_with_fallback(
    backend: &dyn ChatBackend,
    messages: &[Message],
    tools: &[LlmTool],
) -> std::result::Result<ChatOutcome, BackendError> {
    let first = match backend.chat(messages, tools).await {
        Ok(outcome) => return Ok(outcome),
        Err(err) => err,
    };
    if tools.is_empty() || first.class() != ErrorClass::SizeOrFormat {
        return Err(first);
    }

    let halved = &tools[..tools.len() / 2];
    warn!(
        backend = backend.name(),
        from = tools.len(),
        to = halved.len(),
        "tool-enabled request rejected; retrying with reduced tool set"
    );
    let second = match backend.chat(messages, halved).await {
        Ok(outcome) => return Ok(outcome),
        Err(err) => err,
    };
    if second.class() != ErrorClass::SizeOrFormat {
        return Err(second);
    }

    warn!(
        backend = backend.name(),
        "reduced tool set still rejected; retrying without tools"
    );
    backend.chat(messages, &[]).await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::backend::BackendKind;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Backend that rejects any request with more than `tolerated` tools.
    struct CappedBackend {
        tolerated: usize,
        attempts: Mutex<Vec<usize>>,
    }

    impl CappedBackend {
        fn new(tolerated: usize) -> Self {
            Self {
                tolerated,
                attempts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatBackend for CappedBackend {
        async fn chat(
            &self,
            _messages: &[Message],
            tools: &[LlmTool],
        ) -> std::result::Result<ChatOutcome, BackendError> {
            self.attempts.lock().unwrap().push(tools.len());
            if tools.len() > self.tolerated {
                return Err(BackendError::http(
                    BackendKind::OpenAi,
                    413,
                    "request too large",
                ));
            }
            Ok(ChatOutcome::text("ok"))
        }

        fn name(&self) -> &str {
            "capped"
        }
    }

    /// Backend that always fails with a fixed error.
    struct FailingBackend(BackendError);

    #[async_trait]
    impl ChatBackend for FailingBackend {
        async fn chat(
            &self,
            _messages: &[Message],
            _tools: &[LlmTool],
        ) -> std::result::Result<ChatOutcome, BackendError> {
            Err(self.0.clone())
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn tools(n: usize) -> Vec<LlmTool> {
        (0..n)
            .map(|i| LlmTool {
                name: format!("p{i}__a"),
                description: String::new(),
                parameters: json!({"type": "object"}),
            })
            .collect()
    }

    #[tokio::test]
    async fn full_set_accepted_first_try() {
        let backend = CappedBackend::new(10);
        let outcome = chat_with_fallback(&backend, &[], &tools(8)).await.unwrap();
        assert_eq!(outcome.text.as_deref(), Some("ok"));
        assert_eq!(*backend.attempts.lock().unwrap(), vec![8]);
    }

    #[tokio::test]
    async fn halved_set_succeeds_on_second_try() {
        let backend = CappedBackend::new(4);
        chat_with_fallback(&backend, &[], &tools(8)).await.unwrap();
        assert_eq!(*backend.attempts.lock().unwrap(), vec![8, 4]);
    }

    #[tokio::test]
    async fn final_rung_drops_all_tools() {
        let backend = CappedBackend::new(0);
        chat_with_fallback(&backend, &[], &tools(8)).await.unwrap();
        assert_eq!(*backend.attempts.lock().unwrap(), vec![8, 4, 0]);
    }

    #[tokio::test]
    async fn auth_failures_propagate_without_retry() {
        let backend = FailingBackend(BackendError::http(BackendKind::OpenAi, 401, "bad key"));
        let err = chat_with_fallback(&backend, &[], &tools(8)).await.unwrap_err();
        assert_eq!(err.status, Some(401));
    }

    #[tokio::test]
    async fn quota_failures_propagate_without_retry() {
        let backend = FailingBackend(BackendError::http(
            BackendKind::Anthropic,
            429,
            "rate limited",
        ));
        let err = chat_with_fallback(&backend, &[], &tools(8)).await.unwrap_err();
        assert_eq!(err.status, Some(429));
    }

    #[tokio::test]
    async fn toolless_request_is_not_retried() {
        let backend = FailingBackend(BackendError::http(BackendKind::OpenAi, 413, "too large"));
        let err = chat_with_fallback(&backend, &[], &[]).await.unwrap_err();
        assert_eq!(err.status, Some(413));
    }
}
