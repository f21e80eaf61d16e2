//! Cancelable plugin operations.
//!
//! Cancellation is cooperative: the wrapped future is dropped at its next
//! suspension point and the operation resolves to [`Error::Canceled`].
//! Requests already sent to the host or a remote service are not recalled.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::{AbortHandle, Abortable, BoxFuture};

use crate::error::{Error, Result};

/// Handle that cancels a pending [`Cancelable`] from elsewhere.
#[derive(Debug, Clone)]
pub struct CancelHandle(AbortHandle);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.abort();
    }

    pub fn is_canceled(&self) -> bool {
        self.0.is_aborted()
    }
}

/// A pending `login` or `sign`.
#[must_use = "operations do nothing unless awaited"]
pub struct Cancelable<'a, T> {
    inner: Abortable<BoxFuture<'a, Result<T>>>,
    handle: AbortHandle,
}

impl<'a, T> Cancelable<'a, T> {
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'a,
    {
        let (handle, registration) = AbortHandle::new_pair();
        Self {
            inner: Abortable::new(future.boxed(), registration),
            handle,
        }
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(self.handle.clone())
    }
}

impl<T> Future for Cancelable<'_, T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.get_mut().inner.poll_unpin(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_aborted)) => Poll::Ready(Err(Error::Canceled)),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn completes_normally_when_not_canceled() {
        let op = Cancelable::new(async { Ok(7) });
        assert_eq!(op.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn cancel_before_poll_rejects() {
        let op = Cancelable::new(async { Ok(7) });
        op.cancel();
        assert!(op.await.unwrap_err().is_canceled());
    }

    #[tokio::test]
    async fn cancel_while_pending_rejects() {
        let op: Cancelable<'_, ()> = Cancelable::new(futures::future::pending());
        let handle = op.cancel_handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            handle.cancel();
        });
        let err = tokio::time::timeout(Duration::from_secs(2), op)
            .await
            .expect("cancellation should settle the operation")
            .unwrap_err();
        assert!(err.is_canceled());
    }

    #[test]
    fn abort_wakes_pending_operation() {
        let op: Cancelable<'_, ()> = Cancelable::new(futures::future::pending());
        let handle = op.cancel_handle();
        let mut task = tokio_test::task::spawn(op);
        tokio_test::assert_pending!(task.poll());

        handle.cancel();
        assert!(task.is_woken());
        assert!(handle.is_canceled());
        let err = tokio_test::assert_ready_err!(task.poll());
        assert!(err.is_canceled());
    }

    #[tokio::test]
    async fn inner_errors_pass_through() {
        let op: Cancelable<'_, ()> = Cancelable::new(async { Err(Error::NoSignatureReturned) });
        assert_eq!(op.await.unwrap_err().code(), "sign.no_signature");
    }
}
