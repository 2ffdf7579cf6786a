//! Cancellation: CancellationToken + generation guard.
//! Ensures a stale timer or tick loop cannot write into a session that has
//! since been restarted, re-armed or stopped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

/// Each restart advances the generation, cancels every task issued under the
/// previous one, and hands out a fresh CancellationToken.
pub struct TaskGeneration {
    current_token: RwLock<CancellationToken>,
    generation: Arc<AtomicU64>,
}

impl TaskGeneration {
    pub fn new() -> Self {
        Self {
            current_token: RwLock::new(CancellationToken::new()),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Cancel current tasks, advance the generation, and return a guard for
    /// the task about to be spawned.
    pub fn cancel_and_advance(&self) -> GenerationGuard {
        let mut token_guard = self.current_token.write();
        token_guard.cancel();
        let new_root = CancellationToken::new();
        let child = new_root.child_token();
        *token_guard = new_root;
        let gen = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        GenerationGuard::new(Arc::clone(&self.generation), gen, child)
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Cancel current tasks and advance, issuing nothing new.
    pub fn cancel_all(&self) {
        let mut token_guard = self.current_token.write();
        token_guard.cancel();
        *token_guard = CancellationToken::new();
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

impl Default for TaskGeneration {
    fn default() -> Self {
        Self::new()
    }
}

/// Checked by a task before it writes results.
/// Stale once the generation has advanced past `my_generation`.
#[derive(Clone)]
pub struct GenerationGuard {
    generation: Arc<AtomicU64>,
    my_generation: u64,
    token: CancellationToken,
}

impl GenerationGuard {
    pub fn new(generation: Arc<AtomicU64>, my_generation: u64, token: CancellationToken) -> Self {
        Self {
            generation,
            my_generation,
            token,
        }
    }

    #[inline]
    pub fn is_current(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.my_generation
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Not cancelled and still current.
    #[inline]
    pub fn should_continue(&self) -> bool {
        !self.is_cancelled() && self.is_current()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn my_generation(&self) -> u64 {
        self.my_generation
    }
}

/// Per-session coordinator: one generation for the frame loop, one for the
/// silence timer.
pub struct CancelCoordinator {
    pub ticks: TaskGeneration,
    pub pause_timer: TaskGeneration,
}

impl CancelCoordinator {
    pub fn new() -> Self {
        Self {
            ticks: TaskGeneration::new(),
            pause_timer: TaskGeneration::new(),
        }
    }

    /// Cancel the frame loop and any pending silence timer.
    pub fn cancel_all(&self) {
        self.ticks.cancel_all();
        self.pause_timer.cancel_all();
    }
}

impl Default for CancelCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advancing_cancels_previous_guard() {
        let gen = TaskGeneration::new();
        let first = gen.cancel_and_advance();
        assert!(first.should_continue());
        let second = gen.cancel_and_advance();
        assert!(first.is_cancelled());
        assert!(!first.is_current());
        assert!(second.should_continue());
        assert_eq!(second.my_generation(), 2);
    }

    #[test]
    fn cancel_all_stales_outstanding_guards() {
        let coordinator = CancelCoordinator::new();
        let tick = coordinator.ticks.cancel_and_advance();
        let timer = coordinator.pause_timer.cancel_and_advance();
        coordinator.cancel_all();
        assert!(!tick.should_continue());
        assert!(!timer.should_continue());
        assert!(coordinator.ticks.cancel_and_advance().should_continue());
    }
}
