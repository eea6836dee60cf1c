//! # Event subscriber trait.
//!
//! [`Subscribe`] is the extension point for plugging event handlers into a
//! service. Each subscriber gets a dedicated worker task and its own bounded
//! queue, so a slow subscriber only delays itself.
//!
//! ## Rules
//! - Events are processed sequentially (FIFO) per subscriber.
//! - Queue overflow drops the event for that subscriber only.
//! - Panics are caught and reported as `EventKind::SubscriberPanicked`.

use async_trait::async_trait;

use crate::events::Event;

/// Event subscriber for runtime observability.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event.
    ///
    /// Called from the subscriber's worker task, never from the publisher.
    async fn on_event(&self, event: &Event);

    /// Returns the subscriber name used in overflow/panic reports.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Returns the preferred queue capacity (clamped to at least 1).
    ///
    /// Default: 1024.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
