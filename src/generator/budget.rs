//! 整次运行共享的工具调用预算

use std::sync::atomic::{AtomicU32, Ordering};

/// 原子计数的调用预算，并发下也不会超出上限
#[derive(Debug)]
pub struct ToolCallBudget {
    limit: Option<u32>,
    used: AtomicU32,
}

impl ToolCallBudget {
    pub fn new(limit: Option<u32>) -> Self {
        Self {
            limit,
            used: AtomicU32::new(0),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(None)
    }

    /// 占用一次调用额度，额度耗尽时返回false且计数不变
    pub fn try_acquire(&self) -> bool {
        match self.limit {
            None => {
                self.used.fetch_add(1, Ordering::SeqCst);
                true
            }
            Some(limit) => self
                .used
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                    (used < limit).then_some(used + 1)
                })
                .is_ok(),
        }
    }

    pub fn used(&self) -> u32 {
        self.used.load(Ordering::SeqCst)
    }

    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    pub fn is_exhausted(&self) -> bool {
        self.limit.is_some_and(|limit| self.used() >= limit)
    }
}
