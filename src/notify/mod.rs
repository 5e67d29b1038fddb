//! Push notifications: the notifier seam, the LINE Notify sender and the
//! bounded retry wrapper.

mod line;
mod retry;

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

pub use line::LineNotifier;
pub use retry::{RetryPolicy, RetryingNotifier};

/// Delivers short text alerts to an external endpoint.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send a text message.
    async fn notify(&self, message: &str) -> Result<()>;

    /// Send a text message with an attached image.
    async fn notify_with_image(&self, message: &str, image: &Path) -> Result<()>;
}

/// Notifier used when no notification key is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _message: &str) -> Result<()> {
        Ok(())
    }

    async fn notify_with_image(&self, _message: &str, _image: &Path) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<N: Notifier + ?Sized> Notifier for Box<N> {
    async fn notify(&self, message: &str) -> Result<()> {
        (**self).notify(message).await
    }

    async fn notify_with_image(&self, message: &str, image: &Path) -> Result<()> {
        (**self).notify_with_image(message, image).await
    }
}
