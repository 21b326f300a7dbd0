//! Lock/unlock throughput of the futex mutex against the platform pthread
//! mutex and `std::sync::Mutex`.

#[cfg(target_os = "linux")]
mod futex_benches {
    use std::cell::UnsafeCell;
    use std::sync::Mutex;

    use criterion::{criterion_group, Criterion};
    use lfsync::Futex;

    struct PthreadMutex {
        inner: UnsafeCell<libc::pthread_mutex_t>,
    }

    impl PthreadMutex {
        fn new() -> Self {
            Self {
                inner: UnsafeCell::new(libc::PTHREAD_MUTEX_INITIALIZER),
            }
        }

        fn lock(&self) {
            assert_eq!(unsafe { libc::pthread_mutex_lock(self.inner.get()) }, 0);
        }

        fn unlock(&self) {
            assert_eq!(unsafe { libc::pthread_mutex_unlock(self.inner.get()) }, 0);
        }
    }

    fn uncontended_lock_unlock(c: &mut Criterion) {
        let mut group = c.benchmark_group("uncontended_lock_unlock");

        let futex: Futex = Futex::new();
        group.bench_function("futex", |b| {
            b.iter(|| {
                futex.lock().unwrap();
                futex.unlock().unwrap();
            })
        });

        let pthread: PthreadMutex = PthreadMutex::new();
        group.bench_function("pthread", |b| {
            b.iter(|| {
                pthread.lock();
                pthread.unlock();
            })
        });

        let mutex: Mutex<()> = Mutex::new(());
        group.bench_function("std_mutex", |b| {
            b.iter(|| {
                drop(mutex.lock().unwrap());
            })
        });

        group.finish();
    }

    fn uncontended_trylock(c: &mut Criterion) {
        let mut group = c.benchmark_group("uncontended_trylock");

        let futex: Futex = Futex::new();
        group.bench_function("futex", |b| {
            b.iter(|| {
                assert!(futex.trylock());
                futex.unlock().unwrap();
            })
        });

        let mutex: Mutex<()> = Mutex::new(());
        group.bench_function("std_mutex", |b| {
            b.iter(|| {
                drop(mutex.try_lock().unwrap());
            })
        });

        group.finish();
    }

    fn trylock_on_a_held_lock(c: &mut Criterion) {
        let mut group = c.benchmark_group("trylock_held");

        let futex: Futex = Futex::new_locked();
        group.bench_function("futex", |b| {
            b.iter(|| {
                assert!(!futex.trylock());
            })
        });

        group.finish();
    }

    criterion_group!(
        benches,
        uncontended_lock_unlock,
        uncontended_trylock,
        trylock_on_a_held_lock
    );
}

#[cfg(target_os = "linux")]
fn main() {
    futex_benches::benches();
    criterion::Criterion::default()
        .configure_from_args()
        .final_summary();
}

#[cfg(not(target_os = "linux"))]
fn main() {}
