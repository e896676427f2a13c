//! Runtime abstraction for the few places the core starts work on its own
//!
//! The session itself is runtime-agnostic: every operation is a plain future
//! the host awaits. Hosts that want fire-and-forget viewport handling go
//! through [`spawn`], which uses tokio when the `tokio-runtime` feature is on
//! and a runtime is running, and otherwise drives the future to completion
//! on the calling thread.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

pub type BoxedTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Object-safe task spawner
pub trait AsyncSpawner: Send + Sync + 'static {
    fn spawn_boxed(&self, future: BoxedTask) -> Box<dyn AsyncHandle>;
}

/// Handle to a spawned task
pub trait AsyncHandle: Send + Sync {
    fn is_finished(&self) -> bool;

    /// Stops the task if the runtime supports it
    fn cancel(&self);
}

pub fn spawn<F>(future: F) -> Box<dyn AsyncHandle>
where
    F: Future<Output = ()> + Send + 'static,
{
    runtime().spawn_boxed(Box::pin(future))
}

pub mod spawners {
    use super::*;

    /// Runs the task to completion before returning
    pub struct BlockingSpawner;

    impl AsyncSpawner for BlockingSpawner {
        fn spawn_boxed(&self, future: BoxedTask) -> Box<dyn AsyncHandle> {
            futures::executor::block_on(future);
            Box::new(FinishedHandle)
        }
    }

    struct FinishedHandle;

    impl AsyncHandle for FinishedHandle {
        fn is_finished(&self) -> bool {
            true
        }

        fn cancel(&self) {}
    }

    #[cfg(feature = "tokio-runtime")]
    pub mod tokio_impl {
        use super::*;
        use ::tokio::task::JoinHandle;

        /// Spawns onto the ambient tokio runtime
        pub struct TokioSpawner;

        impl AsyncSpawner for TokioSpawner {
            fn spawn_boxed(&self, future: BoxedTask) -> Box<dyn AsyncHandle> {
                match ::tokio::runtime::Handle::try_current() {
                    Ok(handle) => Box::new(TokioHandle(handle.spawn(future))),
                    Err(_) => {
                        log::debug!("no tokio runtime on this thread; running task inline");
                        BlockingSpawner.spawn_boxed(future)
                    }
                }
            }
        }

        struct TokioHandle(JoinHandle<()>);

        impl AsyncHandle for TokioHandle {
            fn is_finished(&self) -> bool {
                self.0.is_finished()
            }

            fn cancel(&self) {
                self.0.abort();
            }
        }
    }
}

static RUNTIME: OnceLock<Box<dyn AsyncSpawner>> = OnceLock::new();

pub fn runtime() -> &'static dyn AsyncSpawner {
    RUNTIME
        .get_or_init(|| {
            #[cfg(feature = "tokio-runtime")]
            {
                Box::new(spawners::tokio_impl::TokioSpawner)
            }

            #[cfg(not(feature = "tokio-runtime"))]
            {
                Box::new(spawners::BlockingSpawner)
            }
        })
        .as_ref()
}

/// Reentrancy flag that is held across suspension points.
///
/// Unlike a lock, a second caller never waits: [`BusyFlag::try_acquire`]
/// fails immediately and the caller drops its request.
#[derive(Debug, Default)]
pub struct BusyFlag(AtomicBool);

impl BusyFlag {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    pub fn try_acquire(&self) -> Option<BusyGuard<'_>> {
        if self.0.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(BusyGuard(&self.0))
        }
    }

    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Clears its flag on drop, on success, error and unwinding alike
#[derive(Debug)]
pub struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
