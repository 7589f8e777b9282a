use std::{error::Error as StdError, future::Future, pin::Pin, sync::Arc, time::Duration};

use thiserror::Error;
use tracing::{debug, error, info, trace, warn, Level};

use crate::record::Batch;

/// Errors a transport may report for a batch.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The backend received the batch but refused it.
    #[error("batch rejected by backend: {reason}")]
    Rejected {
        /// Details about the rejection.
        reason: String,
    },

    /// The backend did not respond in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// An I/O error occurred while sending the batch.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other transport-specific error.
    #[error(transparent)]
    Other(Box<dyn StdError + Send + Sync + 'static>),
}

/// Convenience type for the future returned by [`Transport::send_batch`].
pub type TransportFuture =
    Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'static>>;

/// Sends batches of records to a backend.
///
/// This is the only network-facing seam in the pipeline. Implementations own their wire encoding, authentication,
/// and timeouts: the publisher adds no timeout of its own and never retries.
///
/// `send_batch` is always called from the batch's own task, so any synchronous work done before returning the future,
/// such as encoding, does not hold up other batches or the step loop.
pub trait Transport: Send + Sync + 'static {
    /// Sends a single batch under the given namespace.
    ///
    /// The call and the returned future both run on the batch's own task, concurrently with the other batches of the
    /// same step.
    fn send_batch(&self, namespace: &str, batch: Batch) -> TransportFuture;
}

impl<T> Transport for Arc<T>
where
    T: Transport + ?Sized,
{
    fn send_batch(&self, namespace: &str, batch: Batch) -> TransportFuture {
        (**self).send_batch(namespace, batch)
    }
}

// `tracing` needs the level at compile time.
macro_rules! log_at {
    ($level:expr, $($fields:tt)+) => {
        match $level {
            Level::TRACE => trace!($($fields)+),
            Level::DEBUG => debug!($($fields)+),
            Level::INFO => info!($($fields)+),
            Level::WARN => warn!($($fields)+),
            _ => error!($($fields)+),
        }
    };
}

/// A transport that writes every record to the log.
///
/// Useful during development, or as a fallback when no backend is reachable.
#[derive(Clone, Copy, Debug)]
pub struct LogTransport {
    level: Level,
}

impl LogTransport {
    /// Creates a new `LogTransport` that logs at the given level.
    pub fn new(level: Level) -> Self {
        LogTransport { level }
    }
}

impl Default for LogTransport {
    fn default() -> Self {
        LogTransport::new(Level::INFO)
    }
}

impl Transport for LogTransport {
    fn send_batch(&self, namespace: &str, batch: Batch) -> TransportFuture {
        let level = self.level;
        let namespace = namespace.to_string();
        Box::pin(async move {
            for record in &batch {
                let tags = record
                    .tags()
                    .iter()
                    .map(|t| format!("{}={}", t.key(), t.value()))
                    .collect::<Vec<_>>()
                    .join(",");

                log_at!(
                    level,
                    %namespace,
                    name = record.name(),
                    value = record.value(),
                    unit = %record.unit(),
                    timestamp = record.timestamp(),
                    %tags
                );
            }
            Ok(())
        })
    }
}
