use crossbeam_channel::{bounded, unbounded};
use fixpool::prelude::*;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_mixed_tasks_scenario() {
    let pool = Pool::new(3).unwrap();

    let square = pool.submit(|| 4 * 4).unwrap();
    let slow = pool
        .submit(|| thread::sleep(Duration::from_millis(50)))
        .unwrap();
    let failing = pool
        .submit_fallible(|| Err::<(), _>("calculation failed"))
        .unwrap();
    let noop = pool.submit(|| ()).unwrap();
    pool.start().unwrap();

    assert_eq!(square.wait().unwrap(), 16);
    match failing.wait() {
        Err(TaskError::Failed(cause)) => assert_eq!(cause.to_string(), "calculation failed"),
        other => panic!("expected a failed task, got {:?}", other),
    }

    pool.shutdown(ShutdownMode::Graceful);

    for ready in [square.is_ready(), slow.is_ready(), failing.is_ready(), noop.is_ready()] {
        assert!(ready);
    }
    assert!(slow.get().unwrap().is_ok());
    assert!(noop.get().unwrap().is_ok());
}

#[test]
fn test_every_task_runs_exactly_once() {
    const N: usize = 500;

    let pool = Pool::new(4).unwrap();
    pool.start().unwrap();

    let runs: Arc<Vec<AtomicUsize>> = Arc::new((0..N).map(|_| AtomicUsize::new(0)).collect());
    let handles: Vec<_> = (0..N)
        .map(|i| {
            let runs = runs.clone();
            pool.submit(move || {
                runs[i].fetch_add(1, Ordering::SeqCst);
                i
            })
            .unwrap()
        })
        .collect();

    for (i, handle) in handles.iter().enumerate() {
        assert_eq!(handle.wait().unwrap(), i);
    }
    pool.shutdown(ShutdownMode::Graceful);

    assert!(runs.iter().all(|r| r.load(Ordering::SeqCst) == 1));
    assert_eq!(pool.stats().completed, N as u64);
}

#[test]
fn test_fifo_dequeue_order() {
    let pool = Pool::new(1).unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));

    for i in 0..50 {
        let order = order.clone();
        pool.submit(move || order.lock().push(i)).unwrap();
    }
    pool.start().unwrap();
    pool.shutdown(ShutdownMode::Graceful);

    assert_eq!(*order.lock(), (0..50).collect::<Vec<_>>());
}

#[test]
fn test_immediate_shutdown_cancels_undequeued_task() {
    let pool = Pool::new(2).unwrap();
    let handle = pool.submit(|| 42).unwrap();

    pool.shutdown(ShutdownMode::Immediate);

    assert!(matches!(handle.wait(), Err(TaskError::Cancelled)));
    assert_eq!(pool.state(), PoolState::Stopped);
}

#[test]
fn test_immediate_shutdown_while_busy() {
    let pool = Pool::new(2).unwrap();
    let (gate_tx, gate_rx) = unbounded::<()>();
    let (started_tx, started_rx) = unbounded::<()>();

    let blockers: Vec<_> = (0..2)
        .map(|_| {
            let gate_rx = gate_rx.clone();
            let started_tx = started_tx.clone();
            pool.submit(move || {
                started_tx.send(()).unwrap();
                gate_rx.recv().unwrap();
            })
            .unwrap()
        })
        .collect();
    let queued: Vec<_> = (0..10).map(|i| pool.submit(move || i).unwrap()).collect();

    pool.start().unwrap();
    started_rx.recv().unwrap();
    started_rx.recv().unwrap();

    let opener = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        gate_tx.send(()).unwrap();
        gate_tx.send(()).unwrap();
    });
    pool.shutdown(ShutdownMode::Immediate);
    opener.join().unwrap();

    for blocker in &blockers {
        assert!(blocker.wait().is_ok());
    }
    for handle in &queued {
        assert!(handle.wait().unwrap_err().is_cancelled());
    }
    assert_eq!(pool.stats().cancelled, 10);
}

#[test]
fn test_graceful_shutdown_runs_queued_tasks() {
    let pool = Pool::new(2).unwrap();
    pool.start().unwrap();

    let handles: Vec<_> = (0..20)
        .map(|i| {
            pool.submit(move || {
                thread::sleep(Duration::from_millis(2));
                i * 10
            })
            .unwrap()
        })
        .collect();

    pool.shutdown(ShutdownMode::Graceful);

    for (i, handle) in handles.iter().enumerate() {
        assert_eq!(handle.get().unwrap().unwrap(), i * 10);
    }
}

#[test]
fn test_shutdown_is_idempotent() {
    let pool = Pool::new(2).unwrap();
    pool.start().unwrap();

    pool.shutdown(ShutdownMode::Graceful);
    pool.shutdown(ShutdownMode::Immediate);
    pool.shutdown(ShutdownMode::Graceful);

    assert_eq!(pool.state(), PoolState::Stopped);
}

#[test]
fn test_concurrent_shutdown_callers() {
    let pool = Arc::new(Pool::new(3).unwrap());
    pool.start().unwrap();
    for _ in 0..30 {
        pool.submit(|| thread::sleep(Duration::from_millis(1))).unwrap();
    }

    let callers: Vec<_> = (0..4)
        .map(|_| {
            let pool = pool.clone();
            thread::spawn(move || {
                pool.shutdown(ShutdownMode::Graceful);
                pool.state()
            })
        })
        .collect();

    for caller in callers {
        assert_eq!(caller.join().unwrap(), PoolState::Stopped);
    }
}

#[test]
fn test_submit_rejected_after_shutdown() {
    let pool = Pool::new(1).unwrap();
    pool.start().unwrap();
    pool.shutdown(ShutdownMode::Graceful);

    assert!(matches!(pool.submit(|| 1), Err(PoolError::NotRunning)));
    assert!(matches!(
        pool.submit_fallible(|| Ok::<_, std::io::Error>(1)),
        Err(PoolError::NotRunning)
    ));
}

#[test]
fn test_panicking_task_does_not_kill_worker() {
    let config = Config::builder()
        .num_threads(1)
        .panic_strategy(PanicStrategy::Isolate)
        .build()
        .unwrap();
    let pool = Pool::with_config(config).unwrap();
    pool.start().unwrap();

    let bad = pool.submit(|| -> i32 { panic!("worker should survive") }).unwrap();
    let good = pool.submit(|| 7).unwrap();

    assert!(matches!(bad.wait(), Err(TaskError::Panicked(_))));
    assert_eq!(good.wait().unwrap(), 7);
}

#[test]
fn test_handle_shared_between_threads() {
    let pool = Pool::new(2).unwrap();
    let runs = Arc::new(AtomicUsize::new(0));

    let handle = {
        let runs = runs.clone();
        pool.submit(move || {
            runs.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            String::from("shared")
        })
        .unwrap()
    };

    let readers: Vec<_> = (0..6)
        .map(|_| {
            let handle = handle.clone();
            thread::spawn(move || handle.wait())
        })
        .collect();
    pool.start().unwrap();

    for reader in readers {
        assert_eq!(reader.join().unwrap().unwrap(), "shared");
    }
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_bounded_wait() {
    let pool = Pool::new(1).unwrap();
    let (release_tx, release_rx) = bounded::<()>(1);
    let handle = pool
        .submit(move || {
            release_rx.recv().unwrap();
            1
        })
        .unwrap();
    pool.start().unwrap();

    assert!(handle.wait_timeout(Duration::from_millis(20)).is_none());
    release_tx.send(()).unwrap();
    assert_eq!(handle.wait_timeout(Duration::from_secs(5)).unwrap().unwrap(), 1);
}

#[test]
fn test_drop_joins_worker_threads() {
    let (tx, rx) = unbounded();

    let pool = Pool::new(3).unwrap();
    pool.start().unwrap();
    for _ in 0..3 {
        let tx = tx.clone();
        pool.submit(move || {
            thread::sleep(Duration::from_millis(10));
            tx.send(thread::current().id()).unwrap();
        })
        .unwrap();
    }
    drop(tx);
    drop(pool);

    let finished: Vec<_> = rx.try_iter().collect();
    assert_eq!(finished.len(), 3);
}

#[test]
fn test_wait_idle() {
    let pool = Pool::new(2).unwrap();
    pool.start().unwrap();
    let counter = Arc::new(AtomicUsize::new(0));

    for _ in 0..25 {
        let counter = counter.clone();
        pool.submit(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }

    pool.wait_idle();
    assert_eq!(counter.load(Ordering::SeqCst), 25);
    assert_eq!(pool.pending_tasks(), 0);
    assert_eq!(pool.state(), PoolState::Running);
}

#[test]
fn test_join_non_clone_result() {
    struct Report {
        lines: Vec<String>,
    }

    let pool = Pool::new(1).unwrap();
    pool.start().unwrap();

    let handle = pool
        .submit(|| Report {
            lines: vec!["a".into(), "b".into()],
        })
        .unwrap();

    let report = handle.join().ok().unwrap();
    assert_eq!(report.lines.len(), 2);
}

fn finishes_within<F>(limit: Duration, f: F) -> bool
where
    F: FnOnce() + Send + 'static,
{
    let (done_tx, done_rx) = bounded(1);
    thread::spawn(move || {
        f();
        let _ = done_tx.send(());
    });
    done_rx.recv_timeout(limit).is_ok()
}

#[test]
fn test_task_reads_stats_during_shutdown() {
    let pool = Arc::new(Pool::new(1).unwrap());
    pool.start().unwrap();

    let task_pool = pool.clone();
    let snapshot = pool
        .submit(move || {
            thread::sleep(Duration::from_millis(50));
            (task_pool.stats(), task_pool.worker_statuses())
        })
        .unwrap();

    let stopper = pool.clone();
    assert!(finishes_within(Duration::from_secs(5), move || {
        stopper.shutdown(ShutdownMode::Graceful)
    }));

    let (stats, statuses) = snapshot.wait().unwrap();
    assert_eq!(stats.submitted, 1);
    assert_eq!(statuses, vec![fixpool::executor::WorkerStatus::Executing]);
    assert_eq!(pool.state(), PoolState::Stopped);
}

#[test]
fn test_task_shuts_down_during_external_shutdown() {
    let pool = Arc::new(Pool::new(2).unwrap());
    pool.start().unwrap();

    let task_pool = pool.clone();
    let inner = pool
        .submit(move || {
            thread::sleep(Duration::from_millis(50));
            task_pool.shutdown(ShutdownMode::Graceful);
        })
        .unwrap();

    let stopper = pool.clone();
    assert!(finishes_within(Duration::from_secs(5), move || {
        stopper.shutdown(ShutdownMode::Graceful)
    }));

    assert!(inner.wait().is_ok());
    assert_eq!(pool.state(), PoolState::Stopped);
}

#[test]
fn test_shutdown_from_inside_task() {
    let pool = Arc::new(Pool::new(2).unwrap());
    pool.start().unwrap();

    let task_pool = pool.clone();
    let handle = pool
        .submit(move || {
            task_pool.shutdown(ShutdownMode::Graceful);
            task_pool.state()
        })
        .unwrap();

    assert_eq!(handle.wait().unwrap(), PoolState::Stopped);
    assert!(matches!(pool.submit(|| ()), Err(PoolError::NotRunning)));
    // the second call from outside returns instead of waiting on a join
    pool.shutdown(ShutdownMode::Graceful);
}

#[test]
fn test_drop_before_start_cancels_queued_tasks() {
    let pool = Pool::new(2).unwrap();
    let handles: Vec<_> = (0..3).map(|i| pool.submit(move || i).unwrap()).collect();

    drop(pool);

    for handle in &handles {
        assert!(matches!(handle.wait(), Err(TaskError::Cancelled)));
    }
}

#[test]
fn test_wait_idle_before_start_returns() {
    let pool = Arc::new(Pool::new(1).unwrap());
    let handle = pool.submit(|| 3).unwrap();

    let waiter = pool.clone();
    assert!(finishes_within(Duration::from_secs(5), move || waiter.wait_idle()));
    assert!(!handle.is_ready());

    pool.start().unwrap();
    pool.wait_idle();
    assert_eq!(handle.get().unwrap().unwrap(), 3);
}

#[test]
fn test_stats_report_busy_time() {
    let pool = Pool::new(1).unwrap();
    pool.start().unwrap();

    pool.submit(|| thread::sleep(Duration::from_millis(20)))
        .unwrap()
        .wait()
        .unwrap();
    pool.wait_idle();

    assert!(pool.stats().busy_time >= Duration::from_millis(20));
}
