//! A value that is either available now or will be produced by a future.
//!
//! Handlers registered with the SDK may answer synchronously or
//! asynchronously. Keeping the synchronous case synchronous lets the
//! transport acknowledge simple updates on the same turn they arrive.

use futures::future::{self, FutureExt, LocalBoxFuture};
use std::fmt;
use std::future::Future;

pub enum Deferred<T> {
    Ready(T),
    Pending(LocalBoxFuture<'static, T>),
}

impl<T: 'static> Deferred<T> {
    pub fn ready(value: T) -> Self {
        Deferred::Ready(value)
    }

    pub fn pending<F>(fut: F) -> Self
    where
        F: Future<Output = T> + 'static,
    {
        Deferred::Pending(fut.boxed_local())
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Deferred::Ready(_))
    }

    /// Take the value if it is already available
    pub fn into_ready(self) -> Result<T, Self> {
        match self {
            Deferred::Ready(value) => Ok(value),
            pending => Err(pending),
        }
    }

    pub fn map<U, F>(self, f: F) -> Deferred<U>
    where
        U: 'static,
        F: FnOnce(T) -> U + 'static,
    {
        match self {
            Deferred::Ready(value) => Deferred::Ready(f(value)),
            Deferred::Pending(fut) => Deferred::Pending(fut.map(f).boxed_local()),
        }
    }

    /// Chain another possibly-deferred step, staying synchronous while both are
    pub fn then<U, F>(self, f: F) -> Deferred<U>
    where
        U: 'static,
        F: FnOnce(T) -> Deferred<U> + 'static,
    {
        match self {
            Deferred::Ready(value) => f(value),
            Deferred::Pending(fut) => {
                Deferred::Pending(async move { f(fut.await).into_future().await }.boxed_local())
            }
        }
    }

    pub fn into_future(self) -> LocalBoxFuture<'static, T> {
        match self {
            Deferred::Ready(value) => future::ready(value).boxed_local(),
            Deferred::Pending(fut) => fut,
        }
    }
}

impl<T> From<T> for Deferred<T> {
    fn from(value: T) -> Self {
        Deferred::Ready(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Deferred::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Deferred::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_chain_stays_synchronous() {
        let value = Deferred::ready(2).map(|v| v * 3).then(|v| Deferred::ready(v + 1));
        assert!(value.is_ready());
        assert_eq!(value.into_ready().ok(), Some(7));
    }

    #[test]
    fn test_pending_chain() {
        let value = Deferred::pending(async { 2 })
            .map(|v| v * 3)
            .then(|v| Deferred::pending(async move { v + 1 }));
        assert!(!value.is_ready());
        assert_eq!(tokio_test::block_on(value.into_future()), 7);
    }

    #[test]
    fn test_from_value() {
        let value: Deferred<Option<u8>> = Some(1).into();
        assert_eq!(value.into_ready().ok(), Some(Some(1)));
    }
}
