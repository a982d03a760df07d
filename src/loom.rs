#[cfg(not(all(test, loom)))]
pub mod sync {
    pub use parking_lot::{Condvar, Mutex};

    pub mod atomic {
        pub use core::sync::atomic::{AtomicUsize, Ordering};
    }
}

#[cfg(all(test, loom))]
pub mod sync {
    use core::fmt::{self, Debug, Formatter};

    pub mod atomic {
        pub use loom::sync::atomic::{AtomicUsize, Ordering};
    }

    /// `loom` mutex behind the `parking_lot` API: `lock` never fails.
    pub struct Mutex<T>(loom::sync::Mutex<T>);

    impl<T> Mutex<T> {
        pub fn new(value: T) -> Self {
            Self(loom::sync::Mutex::new(value))
        }

        pub fn lock(&self) -> MutexGuard<'_, T> {
            MutexGuard(Some(self.0.lock().unwrap()))
        }
    }

    impl<T> Debug for Mutex<T> {
        fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
            f.debug_struct("Mutex").finish_non_exhaustive()
        }
    }

    /// Only empty while the guard is parked in `Condvar::wait`.
    pub struct MutexGuard<'a, T>(Option<loom::sync::MutexGuard<'a, T>>);

    /// `loom` condvar behind the `parking_lot` API: `wait` takes the guard by reference.
    pub struct Condvar(loom::sync::Condvar);

    impl Condvar {
        pub fn new() -> Self {
            Self(loom::sync::Condvar::new())
        }

        pub fn wait<T>(&self, guard: &mut MutexGuard<'_, T>) {
            let inner = guard.0.take().unwrap();
            guard.0 = Some(self.0.wait(inner).unwrap());
        }

        pub fn notify_all(&self) {
            self.0.notify_all();
        }
    }

    impl Debug for Condvar {
        fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
            f.debug_struct("Condvar").finish_non_exhaustive()
        }
    }
}
