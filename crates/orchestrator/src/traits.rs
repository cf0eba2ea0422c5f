//! The two opaque collaborators the composition root depends on but does
//! not implement: an inbound request stream and a persistence sink.

use async_trait::async_trait;
use core::{AppError, LlmRequest, LlmResponse};

/// Produces `LlmRequest` values, one at a time. Concrete implementations
/// (HTTP handlers, a CLI reader, a test fixture) live outside this crate.
#[async_trait]
pub trait RequestSource: Send + Sync {
    async fn next_request(&mut self) -> Option<LlmRequest>;
}

/// Idempotent upsert target for finished responses. Saving the same
/// response id twice must leave exactly one row with the latest payload.
#[async_trait]
pub trait LogSink: Send + Sync {
    async fn upsert(&self, response: &LlmResponse) -> Result<(), AppError>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    pub struct QueueSource(pub Mutex<VecDeque<LlmRequest>>);

    #[async_trait]
    impl RequestSource for QueueSource {
        async fn next_request(&mut self) -> Option<LlmRequest> {
            self.0.lock().pop_front()
        }
    }

    #[derive(Default)]
    pub struct RecordingSink(pub Mutex<Vec<LlmResponse>>);

    #[async_trait]
    impl LogSink for RecordingSink {
        async fn upsert(&self, response: &LlmResponse) -> Result<(), AppError> {
            let mut rows = self.0.lock();
            if let Some(existing) = rows.iter_mut().find(|r| r.id == response.id) {
                *existing = response.clone();
            } else {
                rows.push(response.clone());
            }
            Ok(())
        }
    }
}
