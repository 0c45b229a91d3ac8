use std::future::Future;

use tokio::runtime::Handle;

/// Spawn a detached task onto the given runtime. The handle is not awaited by the caller.
pub fn spawn_on<F>(handle: &Handle, future: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    // completion is observed through the queue status
    let _ = handle.spawn(future);
}
