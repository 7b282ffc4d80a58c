//! Mock executor
//!
//! Succeeds at everything by default, with per-operation error
//! injection so tests can fail any step of a lifecycle and observe the
//! engine's compensation. Created and destroyed brick names are
//! journalled for assertions.

use crate::{BrickInfo, BrickRequest, Executor, VolumeInfo, VolumeRequest};
use async_trait::async_trait;
use brickio_common::{Error, Result};
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct Failures {
    brick_create: Option<String>,
    brick_destroy: Option<String>,
    brick_destroy_check: Option<String>,
    volume_create: Option<String>,
    volume_expand: Option<String>,
    volume_destroy: Option<String>,
    volume_destroy_check: Option<String>,
}

/// In-memory executor for tests and dry-run tooling
#[derive(Debug, Default)]
pub struct MockExecutor {
    failures: Mutex<Failures>,
    /// Brick names created so far, in call order
    created: Mutex<Vec<String>>,
    /// Brick names destroyed so far, in call order
    destroyed: Mutex<Vec<String>>,
}

impl MockExecutor {
    /// Create a mock that succeeds at everything
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_brick_create(&self, message: &str) {
        self.failures.lock().brick_create = Some(message.to_string());
    }

    pub fn fail_brick_destroy(&self, message: &str) {
        self.failures.lock().brick_destroy = Some(message.to_string());
    }

    pub fn fail_brick_destroy_check(&self, message: &str) {
        self.failures.lock().brick_destroy_check = Some(message.to_string());
    }

    pub fn fail_volume_create(&self, message: &str) {
        self.failures.lock().volume_create = Some(message.to_string());
    }

    pub fn fail_volume_expand(&self, message: &str) {
        self.failures.lock().volume_expand = Some(message.to_string());
    }

    pub fn fail_volume_destroy(&self, message: &str) {
        self.failures.lock().volume_destroy = Some(message.to_string());
    }

    pub fn fail_volume_destroy_check(&self, message: &str) {
        self.failures.lock().volume_destroy_check = Some(message.to_string());
    }

    /// Clear every injected failure
    pub fn clear_failures(&self) {
        *self.failures.lock() = Failures::default();
    }

    /// Brick names passed to `brick_create` so far
    #[must_use]
    pub fn created_bricks(&self) -> Vec<String> {
        self.created.lock().clone()
    }

    /// Brick names passed to `brick_destroy` so far
    #[must_use]
    pub fn destroyed_bricks(&self) -> Vec<String> {
        self.destroyed.lock().clone()
    }
}

fn check(failure: Option<&String>) -> Result<()> {
    failure.map_or(Ok(()), |message| Err(Error::executor(message)))
}

#[async_trait]
impl Executor for MockExecutor {
    async fn brick_create(&self, _host: &str, request: &BrickRequest) -> Result<BrickInfo> {
        check(self.failures.lock().brick_create.as_ref())?;
        self.created.lock().push(request.name.clone());
        Ok(BrickInfo {
            path: request.path.clone(),
        })
    }

    async fn brick_destroy(&self, _host: &str, request: &BrickRequest) -> Result<()> {
        check(self.failures.lock().brick_destroy.as_ref())?;
        self.destroyed.lock().push(request.name.clone());
        Ok(())
    }

    async fn brick_destroy_check(&self, _host: &str, _request: &BrickRequest) -> Result<()> {
        check(self.failures.lock().brick_destroy_check.as_ref())
    }

    async fn volume_create(&self, _host: &str, request: &VolumeRequest) -> Result<VolumeInfo> {
        check(self.failures.lock().volume_create.as_ref())?;
        Ok(VolumeInfo {
            name: request.name.clone(),
        })
    }

    async fn volume_expand(&self, _host: &str, request: &VolumeRequest) -> Result<VolumeInfo> {
        check(self.failures.lock().volume_expand.as_ref())?;
        Ok(VolumeInfo {
            name: request.name.clone(),
        })
    }

    async fn volume_destroy(&self, _host: &str, _volume: &str) -> Result<()> {
        check(self.failures.lock().volume_destroy.as_ref())
    }

    async fn volume_destroy_check(&self, _host: &str, _volume: &str) -> Result<()> {
        check(self.failures.lock().volume_destroy_check.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brick_request(name: &str) -> BrickRequest {
        BrickRequest {
            name: name.to_string(),
            size: 1,
            tp_size: 1,
            path: format!("/bricks/{name}"),
            vg: "vg_test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_journals_created_and_destroyed() {
        let mock = MockExecutor::new();
        mock.brick_create("host", &brick_request("b1")).await.unwrap();
        mock.brick_create("host", &brick_request("b2")).await.unwrap();
        mock.brick_destroy("host", &brick_request("b1")).await.unwrap();

        assert_eq!(mock.created_bricks(), ["b1", "b2"]);
        assert_eq!(mock.destroyed_bricks(), ["b1"]);
    }

    #[tokio::test]
    async fn test_injected_failure_and_clear() {
        let mock = MockExecutor::new();
        mock.fail_brick_create("MOCK");

        let err = mock
            .brick_create("host", &brick_request("b1"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "MOCK");
        assert!(mock.created_bricks().is_empty());

        mock.clear_failures();
        mock.brick_create("host", &brick_request("b1")).await.unwrap();
        assert_eq!(mock.created_bricks(), ["b1"]);
    }
}
