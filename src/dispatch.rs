//! 命令分发：一条命令一个工作线程，全部汇合后在调用线程上执行收尾命令。

use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::error::{PlastError, Result};

/// 一个独立的工作单元
pub trait Command: Send {
    fn execute(&mut self);
}

impl<F: FnMut() + Send> Command for F {
    fn execute(&mut self) {
        self()
    }
}

pub struct CommandDispatcher {
    pool: Option<ThreadPool>,
}

impl CommandDispatcher {
    /// 在调用线程上逐个执行
    pub fn serial() -> Self {
        Self { pool: None }
    }

    /// `threads == 1` 时退化为串行
    pub fn parallel(threads: usize) -> Result<Self> {
        if threads <= 1 {
            return Ok(Self::serial());
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("plast-worker-{}", i))
            .build()
            .map_err(|e| PlastError::Config(format!("cannot start worker pool: {}", e)))?;
        Ok(Self { pool: Some(pool) })
    }

    pub fn threads(&self) -> usize {
        self.pool.as_ref().map_or(1, ThreadPool::current_num_threads)
    }

    /// 执行全部命令并等待结束，然后运行 `post`
    pub fn dispatch_commands<'c, P: FnOnce()>(&self, commands: Vec<Box<dyn Command + 'c>>, post: P) {
        let n = commands.len();
        match &self.pool {
            None => {
                for mut cmd in commands {
                    cmd.execute();
                }
            }
            Some(pool) => pool.scope(|s| {
                for mut cmd in commands {
                    s.spawn(move |_| cmd.execute());
                }
            }),
        }
        debug!(commands = n, "dispatch joined");
        post();
    }
}

/// 多个工作线程按块领取 [begin, end) 中互不相交的子区间
#[derive(Debug)]
pub struct RangeIterator {
    next: AtomicUsize,
    end: usize,
    chunk: usize,
}

impl RangeIterator {
    pub fn new(begin: usize, end: usize, chunk: usize) -> Self {
        Self { next: AtomicUsize::new(begin), end, chunk: chunk.max(1) }
    }

    pub fn retrieve(&self) -> Option<Range<usize>> {
        let start = self.next.fetch_add(self.chunk, Ordering::Relaxed);
        if start >= self.end {
            return None;
        }
        Some(start..(start + self.chunk).min(self.end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn every_command_runs_before_post_treatment() {
        for threads in [1, 4] {
            let dispatcher = CommandDispatcher::parallel(threads).unwrap();
            let seen = Mutex::new(Vec::new());
            let commands: Vec<Box<dyn Command + '_>> = (0..8)
                .map(|i| {
                    let seen = &seen;
                    Box::new(move || seen.lock().push(i)) as Box<dyn Command + '_>
                })
                .collect();
            let post_ran = AtomicBool::new(false);
            dispatcher.dispatch_commands(commands, || {
                assert_eq!(seen.lock().len(), 8);
                post_ran.store(true, Ordering::SeqCst);
            });
            assert!(post_ran.load(Ordering::SeqCst));
            let mut v = seen.into_inner();
            v.sort_unstable();
            assert_eq!(v, (0..8).collect::<Vec<_>>());
        }
    }

    #[test]
    fn range_iterator_hands_out_disjoint_chunks() {
        let it = RangeIterator::new(0, 10, 4);
        assert_eq!(it.retrieve(), Some(0..4));
        assert_eq!(it.retrieve(), Some(4..8));
        assert_eq!(it.retrieve(), Some(8..10));
        assert_eq!(it.retrieve(), None);
    }

    #[test]
    fn range_iterator_under_contention() {
        let it = RangeIterator::new(0, 1000, 7);
        let total = AtomicUsize::new(0);
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    while let Some(r) = it.retrieve() {
                        total.fetch_add(r.len(), Ordering::Relaxed);
                    }
                });
            }
        });
        assert_eq!(total.load(Ordering::Relaxed), 1000);
    }
}
