use std::{any::Any, future::Future, panic::AssertUnwindSafe};

use futures_util::FutureExt;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Task panicked: {0}")]
pub struct PanicError(pub String);

/// Runs the future to completion, turning a panic inside it into an error instead of unwinding through the caller.
///
/// Anything the future owns when it panics (open database transactions included) is dropped before this returns.
pub async fn catch_panic<F, T>(fut: F) -> Result<T, PanicError>
where F: Future<Output = T> {
    AssertUnwindSafe(fut).catch_unwind().await.map_err(|payload| PanicError(panic_message(payload.as_ref())))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn panics_become_errors() {
        let result = catch_panic(async { panic!("boom") }).await;
        let err: PanicError = result.map(|_: ()| ()).unwrap_err();
        assert_eq!(err.0, "boom");
        let result = catch_panic(async { panic!("code {}", 7) }).await;
        assert_eq!(result.map(|_: ()| ()).unwrap_err().0, "code 7");
    }

    #[tokio::test]
    async fn values_pass_through() {
        let result = catch_panic(async { 21 * 2 }).await;
        assert_eq!(result.unwrap(), 42);
    }
}
