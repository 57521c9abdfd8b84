//! The one backend every export goes through.

use membase_core::Backend;

#[cfg(not(feature = "heap-backend"))]
mod active {
    use membase_core::{Backend, SystemBackend};

    static SYSTEM: SystemBackend = SystemBackend::new();

    pub(super) fn backend() -> &'static dyn Backend {
        &SYSTEM
    }
}

#[cfg(feature = "heap-backend")]
mod active {
    use std::sync::atomic::{AtomicPtr, AtomicU8, Ordering};

    use membase_core::{Backend, HeapBackend, fatal_abort_with};

    // Lifecycle states.
    const STATE_UNINIT: u8 = 0;
    const STATE_INITIALIZING: u8 = 1;
    const STATE_READY: u8 = 2;

    // UNINIT -> INITIALIZING -> READY. Losers of the race spin until the
    // winner publishes; the backend is leaked and lives for the process.
    static STATE: AtomicU8 = AtomicU8::new(STATE_UNINIT);
    static BACKEND: AtomicPtr<HeapBackend> = AtomicPtr::new(std::ptr::null_mut());

    pub(super) fn backend() -> &'static dyn Backend {
        loop {
            match STATE.load(Ordering::Acquire) {
                STATE_READY => {
                    // SAFETY: once READY, BACKEND is valid and never changes.
                    return unsafe { &*BACKEND.load(Ordering::Acquire) };
                }
                STATE_INITIALIZING => std::hint::spin_loop(),
                _ => {
                    if STATE
                        .compare_exchange(
                            STATE_UNINIT,
                            STATE_INITIALIZING,
                            Ordering::AcqRel,
                            Ordering::Relaxed,
                        )
                        .is_ok()
                    {
                        let backend = match <HeapBackend>::from_env() {
                            Ok(backend) => backend,
                            Err(err) => fatal_abort_with(&err),
                        };
                        BACKEND.store(Box::into_raw(Box::new(backend)), Ordering::Release);
                        STATE.store(STATE_READY, Ordering::Release);
                    }
                }
            }
        }
    }
}

/// Backend selected for this build, initialized on first use.
#[inline]
pub fn active_backend() -> &'static dyn Backend {
    active::backend()
}

/// Diagnostic name of the active backend.
pub fn active_backend_name() -> &'static str {
    active_backend().name()
}
