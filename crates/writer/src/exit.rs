//! Exit-time cleanup of staged temp files
//!
//! An `ExitGuard` is held for the duration of every batch. While at least one
//! guard is alive, normal process exit sweeps the global `TempRegistry`.
//!
//! Guards that ask for signal handling also take over SIGINT, SIGTERM, SIGHUP
//! and SIGQUIT. The first such guard installs the handlers and the last one
//! to be dropped puts the previous dispositions back. While installed, a
//! signal whose previous disposition was the default action sweeps the
//! registry and then terminates the process the default way. A signal the
//! host already handles goes straight to the host's handler, and an ignored
//! signal stays ignored.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::registry::TempRegistry;

static ACTIVE: AtomicUsize = AtomicUsize::new(0);

/// Scoped registration of the exit cleanup handlers.
#[derive(Debug)]
#[must_use = "the exit hook is released as soon as the guard is dropped"]
pub struct ExitGuard {
    handle_signals: bool,
}

impl ExitGuard {
    /// Arm the exit hooks until the returned guard is dropped.
    ///
    /// `handle_signals` controls whether termination signals are intercepted
    /// in addition to normal exit.
    pub fn acquire(handle_signals: bool) -> Self {
        hooks::install_at_exit();
        ACTIVE.fetch_add(1, Ordering::SeqCst);
        if handle_signals {
            hooks::arm_signals();
        }
        Self { handle_signals }
    }

    /// Number of guards currently held in this process
    #[must_use]
    pub fn active() -> usize {
        ACTIVE.load(Ordering::SeqCst)
    }
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        if self.handle_signals {
            hooks::disarm_signals();
        }
        ACTIVE.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Sweep the global registry if a batch is in flight.
///
/// Returns `None` without touching the registry when no guard is held.
fn sweep_if_active() -> Option<usize> {
    if ExitGuard::active() == 0 {
        return None;
    }
    Some(TempRegistry::global().sweep())
}

#[cfg(unix)]
#[allow(unsafe_code)]
mod hooks {
    use std::fs::File;
    use std::io::{self, Read};
    use std::os::fd::FromRawFd;
    use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
    use std::sync::{Mutex, MutexGuard, Once, PoisonError};

    use libc::{c_int, c_void, siginfo_t};
    use signal_hook::consts::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};

    const HANDLED: [c_int; 4] = [SIGINT, SIGTERM, SIGHUP, SIGQUIT];

    static AT_EXIT: Once = Once::new();
    static NOTIFIER: Once = Once::new();

    /// Write end of the pipe that wakes the cleanup thread; -1 until created
    static NOTIFY_FD: AtomicI32 = AtomicI32::new(-1);
    static ARMED: AtomicBool = AtomicBool::new(false);

    /// Disposition each handled signal had before ours was installed. Read
    /// from the signal handler, so no locking.
    static PREVIOUS: [Previous; 4] = [const { Previous::new() }; 4];

    static INSTALLED: Mutex<Installed> = Mutex::new(Installed {
        guards: 0,
        replaced: None,
    });

    struct Previous {
        handler: AtomicUsize,
        flags: AtomicI32,
    }

    impl Previous {
        const fn new() -> Self {
            Self {
                handler: AtomicUsize::new(libc::SIG_DFL),
                flags: AtomicI32::new(0),
            }
        }
    }

    struct Installed {
        guards: usize,
        replaced: Option<[libc::sigaction; 4]>,
    }

    fn installed() -> MutexGuard<'static, Installed> {
        INSTALLED.lock().unwrap_or_else(PoisonError::into_inner)
    }

    extern "C" fn sweep_at_exit() {
        super::sweep_if_active();
    }

    pub(super) fn install_at_exit() {
        AT_EXIT.call_once(|| {
            // SAFETY: `sweep_at_exit` is a plain `extern "C"` function with no
            // arguments, which is exactly what atexit expects.
            let rc = unsafe { libc::atexit(sweep_at_exit) };
            if rc != 0 {
                tracing::warn!(rc, "failed to register atexit cleanup");
            }
        });
    }

    /// Only async-signal-safe calls: atomics, write(2), signal(2), raise(3)
    /// and the handler being chained to.
    extern "C" fn on_signal(signal: c_int, info: *mut siginfo_t, context: *mut c_void) {
        let Some(slot) = HANDLED.iter().position(|&handled| handled == signal) else {
            return;
        };
        let previous = PREVIOUS[slot].handler.load(Ordering::Acquire);

        if previous == libc::SIG_IGN {
            return;
        }
        if previous == libc::SIG_DFL {
            if ARMED.load(Ordering::Acquire) && !notify(signal) {
                // No cleanup thread to hand off to; terminate without sweeping.
                // SAFETY: both calls are async-signal-safe.
                unsafe {
                    libc::signal(signal, libc::SIG_DFL);
                    libc::raise(signal);
                }
            }
            return;
        }

        let flags = PREVIOUS[slot].flags.load(Ordering::Acquire);
        // SAFETY: `previous` came from sigaction for this signal and is
        // neither SIG_DFL nor SIG_IGN, so it is a handler of the shape that
        // SA_SIGINFO in `flags` describes.
        unsafe {
            if flags & libc::SA_SIGINFO == 0 {
                let handler: extern "C" fn(c_int) = std::mem::transmute(previous);
                handler(signal);
            } else {
                let handler: extern "C" fn(c_int, *mut siginfo_t, *mut c_void) =
                    std::mem::transmute(previous);
                handler(signal, info, context);
            }
        }
    }

    fn notify(signal: c_int) -> bool {
        let fd = NOTIFY_FD.load(Ordering::Acquire);
        let Ok(byte) = u8::try_from(signal) else {
            return false;
        };
        if fd < 0 {
            return false;
        }
        // SAFETY: write(2) is async-signal-safe and `byte` outlives the call.
        unsafe { libc::write(fd, std::ptr::addr_of!(byte).cast(), 1) == 1 }
    }

    /// Start the thread that sweeps and terminates on behalf of the handler.
    fn start_notifier() {
        NOTIFIER.call_once(|| {
            let mut fds: [c_int; 2] = [-1; 2];
            // SAFETY: `fds` has room for the two descriptors pipe(2) fills in.
            if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
                tracing::warn!(
                    error = %io::Error::last_os_error(),
                    "failed to create signal cleanup pipe"
                );
                return;
            }
            // SAFETY: both descriptors were just created and are open.
            unsafe {
                libc::fcntl(fds[0], libc::F_SETFD, libc::FD_CLOEXEC);
                libc::fcntl(fds[1], libc::F_SETFD, libc::FD_CLOEXEC);
                let flags = libc::fcntl(fds[1], libc::F_GETFL);
                libc::fcntl(fds[1], libc::F_SETFL, flags | libc::O_NONBLOCK);
            }

            // SAFETY: the read end is open and owned by nothing else.
            let reader = unsafe { File::from_raw_fd(fds[0]) };
            let spawned = std::thread::Builder::new()
                .name("batchwrite-exit".to_string())
                .spawn(move || cleanup_loop(reader));
            match spawned {
                Ok(_) => NOTIFY_FD.store(fds[1], Ordering::Release),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to start signal cleanup thread");
                    // SAFETY: the write end is open and was never shared.
                    unsafe { libc::close(fds[1]) };
                }
            }
        });
    }

    fn cleanup_loop(mut reader: File) {
        let mut buf = [0u8; 16];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => return,
                Ok(n) => {
                    for &signal in &buf[..n] {
                        terminate(c_int::from(signal));
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    tracing::warn!(error = %e, "signal cleanup pipe failed");
                    return;
                }
            }
        }
    }

    /// The signal arrived while armed and nothing else handles it.
    fn terminate(signal: c_int) {
        let removed = super::sweep_if_active().unwrap_or(0);
        tracing::debug!(signal, removed, "terminating after temp cleanup");
        if let Err(e) = signal_hook::low_level::emulate_default_handler(signal) {
            tracing::warn!(signal, error = %e, "failed to re-raise signal");
        }
    }

    fn handler_address() -> usize {
        on_signal as usize
    }

    /// Current disposition of `signal`
    fn query(signal: c_int) -> io::Result<libc::sigaction> {
        // SAFETY: a zeroed sigaction is a valid out-parameter, and passing a
        // null new action only reads the current one.
        unsafe {
            let mut current: libc::sigaction = std::mem::zeroed();
            if libc::sigaction(signal, std::ptr::null(), &mut current) != 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(current)
        }
    }

    fn install(signal: c_int, previous: &Previous) -> io::Result<libc::sigaction> {
        let replaced = query(signal)?;
        previous.handler.store(replaced.sa_sigaction, Ordering::Release);
        previous.flags.store(replaced.sa_flags, Ordering::Release);

        // SAFETY: `action` is fully initialised before it is passed on and
        // `on_signal` has the three-argument shape SA_SIGINFO requires.
        unsafe {
            let mut action: libc::sigaction = std::mem::zeroed();
            action.sa_sigaction = handler_address();
            action.sa_flags = libc::SA_SIGINFO | libc::SA_RESTART;
            libc::sigemptyset(&mut action.sa_mask);
            if libc::sigaction(signal, &action, std::ptr::null_mut()) != 0 {
                return Err(io::Error::last_os_error());
            }
        }
        Ok(replaced)
    }

    pub(super) fn arm_signals() {
        let mut state = installed();
        state.guards += 1;
        if state.guards > 1 {
            return;
        }

        start_notifier();
        // SAFETY: a zeroed sigaction is plain data (SIG_DFL, empty mask).
        let mut replaced: [libc::sigaction; 4] = unsafe { std::mem::zeroed() };
        for (slot, &signal) in HANDLED.iter().enumerate() {
            match install(signal, &PREVIOUS[slot]) {
                Ok(previous) => replaced[slot] = previous,
                Err(e) => tracing::warn!(signal, error = %e, "failed to install signal cleanup"),
            }
        }
        state.replaced = Some(replaced);
        ARMED.store(true, Ordering::Release);
    }

    pub(super) fn disarm_signals() {
        let mut state = installed();
        state.guards = state.guards.saturating_sub(1);
        if state.guards > 0 {
            return;
        }
        let Some(replaced) = state.replaced.take() else {
            return;
        };

        for (slot, &signal) in HANDLED.iter().enumerate() {
            match query(signal) {
                Ok(current) if current.sa_sigaction == handler_address() => {
                    // SAFETY: `replaced[slot]` is the action sigaction handed
                    // back when ours was installed.
                    if unsafe { libc::sigaction(signal, &replaced[slot], std::ptr::null_mut()) }
                        != 0
                    {
                        tracing::warn!(
                            signal,
                            error = %io::Error::last_os_error(),
                            "failed to restore signal disposition"
                        );
                    }
                }
                // Someone installed a handler over ours; it keeps chaining to
                // `on_signal`, which forwards to the original disposition.
                Ok(_) => tracing::debug!(signal, "signal handler replaced while armed"),
                Err(e) => tracing::warn!(signal, error = %e, "failed to query signal disposition"),
            }
        }
        ARMED.store(false, Ordering::Release);
    }

    #[cfg(test)]
    pub(super) fn is_installed(signal: c_int) -> bool {
        query(signal).is_ok_and(|current| current.sa_sigaction == handler_address())
    }
}

#[cfg(not(unix))]
mod hooks {
    pub(super) fn install_at_exit() {}

    pub(super) fn arm_signals() {}

    pub(super) fn disarm_signals() {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Guards in this module touch process-wide state.
    static GUARD_TEST_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn test_guard_counts_nest() {
        let _lock = GUARD_TEST_MUTEX.lock().unwrap();
        let outer = ExitGuard::acquire(false);
        let inner = ExitGuard::acquire(false);
        assert_eq!(ExitGuard::active(), 2);
        drop(inner);
        assert_eq!(ExitGuard::active(), 1);
        drop(outer);
        assert_eq!(ExitGuard::active(), 0);
    }

    #[test]
    fn test_sweep_needs_an_active_guard() {
        let _lock = GUARD_TEST_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let staged = dir.path().join(".batchwrite-staged");
        std::fs::write(&staged, b"staged").unwrap();
        TempRegistry::global().register(staged.clone());

        assert_eq!(sweep_if_active(), None);
        assert!(staged.exists());
        assert!(TempRegistry::global().contains(&staged));

        let guard = ExitGuard::acquire(false);
        assert_eq!(sweep_if_active(), Some(1));
        assert!(!staged.exists());
        assert!(TempRegistry::global().is_empty());
        drop(guard);
    }

    #[cfg(unix)]
    #[test]
    fn test_signal_handlers_live_only_while_guarded() {
        use signal_hook::consts::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};

        let _lock = GUARD_TEST_MUTEX.lock().unwrap();
        assert!(!hooks::is_installed(SIGHUP));

        let outer = ExitGuard::acquire(true);
        let inner = ExitGuard::acquire(true);
        for signal in [SIGINT, SIGTERM, SIGHUP, SIGQUIT] {
            assert!(hooks::is_installed(signal));
        }
        drop(inner);
        assert!(hooks::is_installed(SIGTERM));
        drop(outer);

        for signal in [SIGINT, SIGTERM, SIGHUP, SIGQUIT] {
            assert!(!hooks::is_installed(signal));
        }
    }

    #[test]
    fn test_guard_without_signals_installs_none() {
        let _lock = GUARD_TEST_MUTEX.lock().unwrap();
        let guard = ExitGuard::acquire(false);
        #[cfg(unix)]
        assert!(!hooks::is_installed(signal_hook::consts::SIGINT));
        drop(guard);
    }
}
