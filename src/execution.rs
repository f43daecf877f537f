use crate::error::Result;
use rayon::{ThreadPool, ThreadPoolBuilder};

/// Handle to the parallel environment every bulk operation runs on.
///
/// Each construction, query and clustering stage is issued as a data-parallel loop
/// inside this space's thread pool. Returning from a stage is its barrier: nothing
/// in a later stage observes a partially written result of an earlier one.
///
/// Create one space per process (or per benchmark configuration) and pass it by
/// reference; it is cheap to share between threads.
pub struct ExecutionSpace {
    pool: ThreadPool,
}

impl ExecutionSpace {
    /// Creates a space with `num_threads` workers. Zero selects rayon's default.
    pub fn new(num_threads: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("bvhscan-{i}"))
            .build()?;
        Ok(Self { pool })
    }

    pub fn concurrency(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Runs `op` with this space's pool as the target of all nested parallel loops.
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }
}

impl Default for ExecutionSpace {
    /// A space sized to the machine.
    ///
    /// # Panics
    ///
    /// If the operating system refuses to spawn worker threads.
    fn default() -> Self {
        Self::new(0).expect("failed to spawn the default execution space")
    }
}

impl std::fmt::Debug for ExecutionSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionSpace")
            .field("concurrency", &self.concurrency())
            .finish()
    }
}

/// Options controlling how predicates are traversed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TraversalPolicy {
    /// Traverse predicates in space-filling-curve order of their boxes so that
    /// neighbouring lanes walk similar paths. Callbacks always receive the
    /// original predicate index.
    pub sort_predicates: bool,
}

impl TraversalPolicy {
    pub fn with_sort_predicates(mut self, sort_predicates: bool) -> Self {
        self.sort_predicates = sort_predicates;
        self
    }
}

impl Default for TraversalPolicy {
    fn default() -> Self {
        Self {
            sort_predicates: true,
        }
    }
}
