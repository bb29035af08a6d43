//! The two concrete sweepers (§4.4), each invoked on a fixed period by an
//! external ticker.

use std::sync::Arc;

use forge_core::ports::CheckSessionGateway;
use tokio_util::sync::CancellationToken;

use crate::error::{SweepError, SweepErrors, check_cancelled};

/// Deletes `resource_config_check_sessions` rows whose `expires_at` has
/// passed.
pub struct ExpiredCheckSessionSweeper {
    gateway: Arc<dyn CheckSessionGateway>,
}

impl ExpiredCheckSessionSweeper {
    #[must_use]
    pub fn new(gateway: Arc<dyn CheckSessionGateway>) -> Self {
        Self { gateway }
    }

    /// `Run(ctx) → error`. Grounded on
    /// `resourceConfigCheckSessionCollector.Run`'s
    /// `CleanExpiredResourceConfigCheckSessions` call.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<(), SweepError> {
        check_cancelled(cancel)?;
        let ids = self.gateway.expired_check_session_ids().await?;

        let mut errors = SweepErrors::default();
        for id in ids {
            check_cancelled(cancel)?;
            let outcome = self.gateway.try_delete_check_session(id).await;
            errors.record(id, outcome);
        }
        errors.finish()
    }
}


/// Deletes `resource_config_check_sessions` rows whose owning resource is
/// no longer active in any pipeline.
pub struct InactiveCheckSessionSweeper {
    gateway: Arc<dyn CheckSessionGateway>,
}

impl InactiveCheckSessionSweeper {
    #[must_use]
    pub fn new(gateway: Arc<dyn CheckSessionGateway>) -> Self {
        Self { gateway }
    }

    /// `Run(ctx) → error`. Grounded on
    /// `resourceConfigCheckSessionCollector.Run`'s
    /// `CleanInactiveResourceConfigCheckSessions` call.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<(), SweepError> {
        check_cancelled(cancel)?;
        let ids = self.gateway.inactive_check_session_ids().await?;

        let mut errors = SweepErrors::default();
        for id in ids {
            check_cancelled(cancel)?;
            let outcome = self.gateway.try_delete_check_session(id).await;
            errors.record(id, outcome);
        }
        errors.finish()
    }
}

#[cfg(test)]
mod inactive_tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use forge_core::CheckSessionId;
    use forge_core::error::{CoreError, Result};

    use super::*;

    #[derive(Default)]
    struct FakeGateway {
        inactive: Vec<CheckSessionId>,
        locked: Vec<CheckSessionId>,
        fails: Vec<CheckSessionId>,
        deleted: Mutex<Vec<CheckSessionId>>,
    }

    #[async_trait]
    impl CheckSessionGateway for FakeGateway {
        async fn expired_check_session_ids(&self) -> Result<Vec<CheckSessionId>> {
            Ok(Vec::new())
        }

        async fn inactive_check_session_ids(&self) -> Result<Vec<CheckSessionId>> {
            Ok(self.inactive.clone())
        }

        async fn try_delete_check_session(&self, id: CheckSessionId) -> Result<bool> {
            if self.fails.contains(&id) {
                return Err(CoreError::collaborator("db", "connection reset"));
            }
            if self.locked.contains(&id) {
                return Ok(false);
            }
            self.deleted.lock().unwrap().push(id);
            Ok(true)
        }
    }

    #[tokio::test]
    async fn deletes_every_inactive_row() {
        let gateway = Arc::new(FakeGateway { inactive: vec![CheckSessionId::new(7), CheckSessionId::new(8)], ..Default::default() });
        let sweeper = InactiveCheckSessionSweeper::new(gateway.clone());

        sweeper.run(&CancellationToken::new()).await.unwrap();

        assert_eq!(*gateway.deleted.lock().unwrap(), vec![CheckSessionId::new(7), CheckSessionId::new(8)]);
    }

    #[tokio::test]
    async fn locked_rows_are_skipped_without_error() {
        let gateway = Arc::new(FakeGateway { inactive: vec![CheckSessionId::new(7)], locked: vec![CheckSessionId::new(7)], ..Default::default() });
        let sweeper = InactiveCheckSessionSweeper::new(gateway.clone());

        sweeper.run(&CancellationToken::new()).await.unwrap();

        assert!(gateway.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn one_failing_row_does_not_block_the_others() {
        let gateway = Arc::new(FakeGateway {
            inactive: vec![CheckSessionId::new(7), CheckSessionId::new(8)],
            fails: vec![CheckSessionId::new(7)],
            ..Default::default()
        });
        let sweeper = InactiveCheckSessionSweeper::new(gateway.clone());

        let err = sweeper.run(&CancellationToken::new()).await.unwrap_err();

        assert_eq!(err.causes().len(), 1);
        assert_eq!(*gateway.deleted.lock().unwrap(), vec![CheckSessionId::new(8)]);
    }
}
