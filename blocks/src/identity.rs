use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-unique identity of a schema node.
/// Two bindings of the same schema instance share one `BlockId`, which is
/// what one-time declarations are deduplicated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u64);

impl BlockId {
    /// The definition-scope prefix used to namespace one-time declarations.
    pub fn definition_prefix(&self) -> String {
        format!("blockdef-{}", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source of identity tokens for newly constructed schemas.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> BlockId;
}

/// Monotonic counter shared by the whole process. Never reset.
#[derive(Debug)]
pub struct ProcessCounter {
    next: AtomicU64,
}

impl ProcessCounter {
    const fn new() -> Self {
        ProcessCounter {
            next: AtomicU64::new(0),
        }
    }
}

impl IdGenerator for ProcessCounter {
    fn next_id(&self) -> BlockId {
        BlockId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

static PROCESS_COUNTER: ProcessCounter = ProcessCounter::new();

/// The process-wide identity counter.
pub fn process_counter() -> &'static ProcessCounter {
    &PROCESS_COUNTER
}

/// Deterministic generator for tests: hands out `start, start + 1, ...`.
#[derive(Debug)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl SequentialIds {
    pub fn starting_at(start: u64) -> Self {
        SequentialIds {
            next: AtomicU64::new(start),
        }
    }

    /// The id the next call to `next_id` will return.
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> BlockId {
        BlockId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}
