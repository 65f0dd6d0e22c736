use async_trait::async_trait;
use tracing::debug;

use blog_gateway::Registry;
use blog_types::events::Event;

/// Where committed mutations announce themselves.
///
/// Called strictly after the transaction that produced `event` has
/// committed. Implementations must not fail the caller.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: Event);
}

#[async_trait]
impl EventPublisher for Registry {
    async fn publish(&self, event: Event) {
        let report = self.broadcast(&event).await;
        debug!(
            "Published {} (delivered {}, dropped {})",
            event.kind(),
            report.delivered,
            report.dropped
        );
    }
}
