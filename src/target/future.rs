//! Awaitable loads for callers without a display surface.
//!
//! `submit` on the builder compiles the request against a hidden target
//! whose only job is to forward the terminal result into a oneshot channel;
//! [`LoadFuture`] is the receiving half, plus a cancel handle back to the
//! request tree.

use crate::error::LoadError;
use crate::request::{Request, Transition};
use crate::resource::Resource;
use crate::target::{SizeCallback, Target};
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Target that resolves a oneshot channel instead of drawing.
pub(crate) struct FutureTarget {
    width: u32,
    height: u32,
    sender: Mutex<Option<oneshot::Sender<Result<Resource, LoadError>>>>,
}

impl FutureTarget {
    /// Creates the target and the receiver its result will arrive on.
    pub(crate) fn channel(
        width: u32,
        height: u32,
    ) -> (Arc<Self>, oneshot::Receiver<Result<Resource, LoadError>>) {
        let (sender, receiver) = oneshot::channel();
        let target = Arc::new(Self {
            width,
            height,
            sender: Mutex::new(Some(sender)),
        });
        (target, receiver)
    }

    fn resolve(&self, result: Result<Resource, LoadError>) {
        if let Some(sender) = self.sender.lock().take() {
            // The receiver may already be dropped; nothing to do then.
            let _ = sender.send(result);
        }
    }
}

impl Target for FutureTarget {
    fn get_size(&self, callback: SizeCallback) {
        callback(self.width, self.height);
    }

    fn on_load_started(&self) {}

    fn on_resource_ready(&self, resource: &Resource, _transition: Transition) {
        self.resolve(Ok(resource.clone()));
    }

    fn on_load_failed(&self, error: &LoadError) {
        self.resolve(Err(error.clone()));
    }

    fn on_load_cleared(&self) {
        self.resolve(Err(LoadError::permanent("load cancelled")));
    }
}

/// Handle to a submitted load: await it for the result, or cancel it.
///
/// Dropping the future does not cancel the underlying load; call
/// [`LoadFuture::cancel`] for that.
#[derive(Debug)]
pub struct LoadFuture {
    receiver: oneshot::Receiver<Result<Resource, LoadError>>,
    request: Arc<dyn Request>,
}

impl LoadFuture {
    pub(crate) fn new(
        receiver: oneshot::Receiver<Result<Resource, LoadError>>,
        request: Arc<dyn Request>,
    ) -> Self {
        Self { receiver, request }
    }

    /// Cancels the underlying load.
    ///
    /// A future cancelled before completion resolves to a permanent
    /// [`LoadError`].
    pub fn cancel(&self) {
        self.request.clear();
    }
}

impl Future for LoadFuture {
    type Output = Result<Resource, LoadError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => {
                Poll::Ready(Err(LoadError::permanent("load abandoned without a result")))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::DataSource;
    use crate::test_support::{make_resource, FakeRequest};

    #[test]
    fn test_get_size_is_synchronous() {
        let (target, _receiver) = FutureTarget::channel(64, 48);
        let delivered = Arc::new(Mutex::new(None));
        let sink = delivered.clone();
        target.get_size(Box::new(move |w, h| {
            *sink.lock() = Some((w, h));
        }));
        assert_eq!(*delivered.lock(), Some((64, 48)));
    }

    #[tokio::test]
    async fn test_resource_resolves_future() {
        let (target, receiver) = FutureTarget::channel(8, 8);
        let request = FakeRequest::new();
        let future = LoadFuture::new(receiver, request);

        target.on_resource_ready(&make_resource(8, 8, DataSource::Remote), Transition::None);

        let resource = future.await.expect("load should succeed");
        assert_eq!((resource.width, resource.height), (8, 8));
    }

    #[tokio::test]
    async fn test_failure_resolves_future_with_error() {
        let (target, receiver) = FutureTarget::channel(8, 8);
        let request = FakeRequest::new();
        let future = LoadFuture::new(receiver, request);

        target.on_load_failed(&LoadError::permanent("404"));

        let error = future.await.expect_err("load should fail");
        assert_eq!(error.message, "404");
    }

    #[tokio::test]
    async fn test_cancel_clears_request_and_resolves() {
        let (target, receiver) = FutureTarget::channel(8, 8);
        let request = FakeRequest::new();
        let future = LoadFuture::new(receiver, request.clone());

        future.cancel();
        assert_eq!(request.clear_count(), 1);

        // The cleared request notifies its target, which resolves the
        // channel; simulate that leg here.
        target.on_load_cleared();
        let error = future.await.expect_err("cancelled load should error");
        assert!(!error.is_retryable);
    }

    #[tokio::test]
    async fn test_only_first_result_wins() {
        let (target, receiver) = FutureTarget::channel(8, 8);
        let request = FakeRequest::new();
        let future = LoadFuture::new(receiver, request);

        target.on_resource_ready(&make_resource(8, 8, DataSource::DiskCache), Transition::None);
        target.on_load_failed(&LoadError::permanent("late failure"));

        let resource = future.await.expect("first result should win");
        assert_eq!(resource.source, DataSource::DiskCache);
    }
}
