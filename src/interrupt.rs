//! SIGINT handling.
//!
//! Ctrl-C outside raw mode would otherwise kill the process and leave a
//! managed staging directory behind. The handler only raises a flag; key
//! sources and the executor poll it and the run unwinds normally, dropping
//! the staging directory on the way out.
use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

#[cfg(unix)]
extern "C" fn on_sigint(_signal: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Route SIGINT to the interrupt flag.
pub fn install() {
    #[cfg(unix)]
    {
        // SAFETY: the handler only stores to an atomic, which is async-signal-safe.
        unsafe {
            libc::signal(
                libc::SIGINT,
                on_sigint as extern "C" fn(libc::c_int) as libc::sighandler_t,
            );
        }
    }
}

pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}
