//! Management boundary: controlled shutdown.
//!
//! The shutdown module is a declared singleton (exactly one instance,
//! under one well-known name) guarding a secret-checked stop operation.
//! A successful call triggers the registered stop handle asynchronously;
//! the caller observes the stop within its own timeout, not inline.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{ConfsyncError, Result};

/// The only instance name the shutdown module accepts.
pub const SHUTDOWN_INSTANCE_NAME: &str = "shutdown";

/// Receiver of the actual stop action (process/bundle termination).
pub trait StopHandle: Send + Sync {
    /// Stop the system. Called at most once per shutdown request, from a
    /// background task.
    fn stop(&self);
}

/// Secret-guarded shutdown entry point.
pub struct ShutdownModule {
    secret: String,
    handle: Arc<dyn StopHandle>,
}

impl std::fmt::Debug for ShutdownModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownModule")
            .field("secret", &self.secret)
            .finish_non_exhaustive()
    }
}

impl ShutdownModule {
    /// Create the module under `instance_name`.
    ///
    /// Only [`SHUTDOWN_INSTANCE_NAME`] is accepted; any other name fails
    /// singleton enforcement.
    pub fn create(instance_name: &str, handle: Arc<dyn StopHandle>) -> Result<Self> {
        if instance_name != SHUTDOWN_INSTANCE_NAME {
            return Err(ConfsyncError::Singleton {
                expected: SHUTDOWN_INSTANCE_NAME.to_string(),
                got: instance_name.to_string(),
            });
        }
        Ok(Self {
            secret: String::new(),
            handle,
        })
    }

    /// Configure the shutdown secret. The default (empty) secret lets an
    /// empty-string request through.
    pub fn set_secret(&mut self, secret: impl Into<String>) {
        self.secret = secret.into();
    }

    /// Request shutdown.
    ///
    /// The supplied secret must match the configured one exactly;
    /// otherwise the target is left untouched and
    /// [`ConfsyncError::InvalidSecret`] is returned. On a match the stop
    /// handle fires from a spawned task; callers should expect the stop
    /// to become observable within `max_wait`, not before this method
    /// returns.
    pub fn shutdown(
        &self,
        input_secret: &str,
        max_wait: Duration,
        reason: Option<String>,
    ) -> Result<()> {
        if input_secret != self.secret {
            tracing::warn!("shutdown attempt with invalid secret");
            return Err(ConfsyncError::InvalidSecret);
        }

        match &reason {
            Some(reason) => tracing::info!(%reason, "shutdown secret validated, stopping system"),
            None => tracing::info!("shutdown secret validated, stopping system"),
        }
        tracing::debug!(max_wait_ms = max_wait.as_millis() as u64, "stop expected within");

        let handle = Arc::clone(&self.handle);
        tokio::spawn(async move {
            handle.stop();
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    struct RecordingStop {
        stops: AtomicUsize,
        notify: Notify,
    }

    impl RecordingStop {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                stops: AtomicUsize::new(0),
                notify: Notify::new(),
            })
        }

        async fn wait_stopped(&self, timeout: Duration) -> bool {
            tokio::time::timeout(timeout, self.notify.notified()).await.is_ok()
        }
    }

    impl StopHandle for RecordingStop {
        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
            // notify_one stores a permit, so a waiter arriving later
            // still observes the stop
            self.notify.notify_one();
        }
    }

    #[tokio::test]
    async fn test_singleton_invalid_name() {
        let handle = RecordingStop::new();
        let result = ShutdownModule::create("foo", handle);
        match result {
            Err(e @ ConfsyncError::Singleton { .. }) => assert_eq!(
                e.to_string(),
                "Singleton enforcement failed. Expected instance name shutdown"
            ),
            other => panic!("expected singleton error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_without_secret() {
        let handle = RecordingStop::new();
        let module = ShutdownModule::create(SHUTDOWN_INSTANCE_NAME, Arc::clone(&handle) as _).unwrap();

        let result = module.shutdown("foo", Duration::from_secs(60), None);
        assert!(matches!(result, Err(ConfsyncError::InvalidSecret)));
        assert_eq!(handle.stops.load(Ordering::SeqCst), 0);

        module.shutdown("", Duration::from_secs(60), None).unwrap();
        assert!(handle.wait_stopped(Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn test_with_secret() {
        let handle = RecordingStop::new();
        let mut module =
            ShutdownModule::create(SHUTDOWN_INSTANCE_NAME, Arc::clone(&handle) as _).unwrap();
        module.set_secret("secret");

        let result = module.shutdown("", Duration::from_secs(60), None);
        assert!(matches!(result, Err(ConfsyncError::InvalidSecret)));

        let result = module.shutdown("foo", Duration::from_secs(60), None);
        assert!(matches!(result, Err(ConfsyncError::InvalidSecret)));
        assert_eq!(handle.stops.load(Ordering::SeqCst), 0);

        module
            .shutdown("secret", Duration::from_secs(60), Some("maintenance".to_string()))
            .unwrap();
        assert!(handle.wait_stopped(Duration::from_secs(2)).await);
        assert_eq!(handle.stops.load(Ordering::SeqCst), 1);
    }
}
