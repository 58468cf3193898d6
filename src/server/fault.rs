// Fault isolation
// A panic in one handler is logged and contained; the reactor keeps running

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::cell::RefCell;
use std::future::Future;
use std::panic::{self, catch_unwind, AssertUnwindSafe};
use std::sync::Once;

use crate::logger;

/// A panic caught at a task or command boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub message: String,
    /// `file:line:column` of the panic
    pub location: Option<String>,
    /// Only captured when `RUST_BACKTRACE` asks for it
    pub backtrace: Option<String>,
}

impl Fault {
    /// Build a fault from a panic payload and the site the hook recorded on
    /// this thread.
    fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let site = LAST_PANIC.try_with(RefCell::take).unwrap_or_default();
        Self {
            message: panic_message(payload),
            location: site.location,
            backtrace: site.backtrace,
        }
    }

    fn log(&self, context: &str) {
        logger::log_handler_fault(
            context,
            &self.message,
            self.location.as_deref(),
            self.backtrace.as_deref(),
        );
    }
}

#[derive(Debug, Default)]
struct PanicSite {
    location: Option<String>,
    backtrace: Option<String>,
}

thread_local! {
    static LAST_PANIC: RefCell<PanicSite> = RefCell::new(PanicSite::default());
}

static PANIC_HOOK: Once = Once::new();

/// Record the location and backtrace of every panic on the panicking thread,
/// then defer to the previous hook.
pub fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let location = info
                .location()
                .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()));
            let backtrace = Backtrace::capture();
            let backtrace =
                (backtrace.status() == BacktraceStatus::Captured).then(|| backtrace.to_string());
            let _ = LAST_PANIC.try_with(|site| {
                *site.borrow_mut() = PanicSite {
                    location,
                    backtrace,
                };
            });
            previous(info);
        }));
    });
}

/// Run `f`, returning the panic it raised as a [`Fault`]
pub fn catch_fault<T>(f: impl FnOnce() -> T) -> Result<T, Fault> {
    install_panic_hook();
    catch_unwind(AssertUnwindSafe(f)).map_err(|panic| Fault::from_payload(panic.as_ref()))
}

/// Run `f`, logging and swallowing any panic it raises.
/// Returns `None` if it panicked.
pub fn guarded<T>(context: &str, f: impl FnOnce() -> T) -> Option<T> {
    match catch_fault(f) {
        Ok(value) => Some(value),
        Err(fault) => {
            fault.log(context);
            None
        }
    }
}

/// Spawn a connection task on the current `LocalSet`, with a watcher that
/// logs it if the task panics.
pub fn spawn_supervised<F>(context: &'static str, future: F)
where
    F: Future<Output = ()> + 'static,
{
    install_panic_hook();
    let task = tokio::task::spawn_local(future);
    tokio::task::spawn_local(async move {
        if let Err(err) = task.await {
            if err.is_panic() {
                // Local tasks panic on this thread, so the recorded site is theirs
                Fault::from_payload(err.into_panic().as_ref()).log(context);
            }
        }
    });
}

pub fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
