use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use gantt_core::{Catalog, GatewayError, LlmGateway, Message, NormalizedReply, ToolCall, ToolCallId};

/// Pre-programmed replies for deterministic testing without API calls.
#[derive(Clone, Debug)]
pub enum MockReply {
    Reply(NormalizedReply),
    Error(GatewayError),
    /// Wait a duration, then resolve the inner reply.
    Delay(Duration, Box<MockReply>),
}

impl MockReply {
    pub fn text(text: &str) -> Self {
        Self::Reply(NormalizedReply::text(text))
    }

    pub fn tool(name: &str, arguments: Value) -> Self {
        Self::Reply(NormalizedReply::tool(ToolCall {
            id: ToolCallId::new(),
            name: name.to_string(),
            arguments,
        }))
    }

    /// Free text and a tool call in the same reply.
    pub fn text_and_tool(text: &str, name: &str, arguments: Value) -> Self {
        Self::Reply(NormalizedReply {
            assistant_text: Some(text.to_string()),
            tool_call: Some(ToolCall {
                id: ToolCallId::new(),
                name: name.to_string(),
                arguments,
            }),
            usage: None,
        })
    }

    pub fn delayed(delay: Duration, inner: MockReply) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

/// Gateway returning scripted replies in order. Records the history it was
/// shown on each call.
pub struct MockGateway {
    replies: Mutex<VecDeque<MockReply>>,
    seen: Mutex<Vec<Vec<Message>>>,
    call_count: AtomicUsize,
}

impl MockGateway {
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            seen: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Histories passed to `complete`, oldest first.
    pub fn seen(&self) -> Vec<Vec<Message>> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Queue more replies after construction.
    pub fn push(&self, reply: MockReply) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }
}

#[async_trait]
impl LlmGateway for MockGateway {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn complete(
        &self,
        messages: &[Message],
        _catalog: &Catalog,
    ) -> Result<NormalizedReply, GatewayError> {
        let idx = self.call_count.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(messages.to_vec());
        }

        let next = self.replies.lock().ok().and_then(|mut r| r.pop_front());
        let Some(mut current) = next else {
            return Err(GatewayError::InvalidRequest(format!(
                "MockGateway: no reply configured for call {idx}"
            )));
        };

        loop {
            match current {
                MockReply::Reply(reply) => return Ok(reply),
                MockReply::Error(e) => return Err(e),
                MockReply::Delay(duration, inner) => {
                    tokio::time::sleep(duration).await;
                    current = *inner;
                }
            }
        }
    }
}
