//! Fan-out/fan-in over a rayon worker pool.
//!
//! Tasks are immutable descriptors; each produces its own result and results
//! come back in task order, so callers can impose a final ordering by sorting
//! once everything has been collected. A panicking task is turned into an
//! `Err` for that task only.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use tracing::warn;

/// Run `f` over `tasks` with up to `parallelism` threads.
///
/// `parallelism <= 1`, or a pool that cannot be started, runs sequentially
/// with identical output.
pub fn run_indexed<T, R, F>(tasks: Vec<T>, parallelism: usize, f: F) -> Vec<Result<R, String>>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync,
{
    let run = |task: T| catch_unwind(AssertUnwindSafe(|| f(task))).map_err(panic_message);

    if parallelism <= 1 || tasks.len() <= 1 {
        return tasks.into_iter().map(run).collect();
    }

    match ThreadPoolBuilder::new().num_threads(parallelism).build() {
        Ok(pool) => pool.install(|| tasks.into_par_iter().map(run).collect()),
        Err(err) => {
            warn!(%err, "worker pool unavailable; running sequentially");
            tasks.into_iter().map(run).collect()
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("worker panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("worker panicked: {s}")
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parallel_and_sequential_agree() {
        let tasks: Vec<u64> = (0..64).collect();
        let seq = run_indexed(tasks.clone(), 1, |x| x * x);
        let par = run_indexed(tasks, 4, |x| x * x);
        assert_eq!(seq, par);
        assert_eq!(seq[5], Ok(25));
    }

    #[test]
    fn panics_are_isolated_to_their_task() {
        let out = run_indexed(vec![1, 2, 3], 2, |x: i32| {
            if x == 2 {
                panic!("bad task");
            }
            x
        });
        assert_eq!(out[0], Ok(1));
        assert!(out[1].as_ref().unwrap_err().contains("bad task"));
        assert_eq!(out[2], Ok(3));
    }
}
