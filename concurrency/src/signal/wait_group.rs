use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::signal::waitable::{Done, Generation, Waitable};

#[derive(Debug)]
struct WaitGroupState {
    count: i64,
    generation: Arc<Generation>,
}

impl WaitGroupState {
    /// Moves the counter to `count`, firing or replacing the generation on a boundary crossing.
    fn set(&mut self, count: i64) {
        let previous = self.count;
        self.count = count;

        if previous > 0 && count <= 0 {
            self.generation.fire();
        } else if previous <= 0 && count > 0 {
            self.generation = Arc::new(Generation::pending());
        }
    }
}

/// A counter that is satisfied whenever its value is less than or equal to zero.
///
/// Waiters are released when the counter crosses from positive to non-positive. Crossing back
/// to positive starts a new generation, so waiters that were already released stay released.
/// Arithmetic wraps; the counter may go arbitrarily negative.
#[derive(Debug)]
pub struct WaitGroup {
    state: Mutex<WaitGroupState>,
}

impl WaitGroup {
    /// Creates a group whose counter starts at `initial`, done if that is not positive.
    pub fn new(initial: i64) -> Self {
        let generation = if initial > 0 {
            Generation::pending()
        } else {
            Generation::triggered()
        };

        Self {
            state: Mutex::new(WaitGroupState {
                count: initial,
                generation: Arc::new(generation),
            }),
        }
    }

    /// Adjusts the counter by `delta`.
    pub fn add(&self, delta: i64) {
        let mut state = self.state.lock();
        let count = state.count.wrapping_add(delta);
        state.set(count);
    }

    /// Sets the counter to `count`.
    pub fn reset(&self, count: i64) {
        self.state.lock().set(count);
    }

    /// Returns the current counter value.
    pub fn count(&self) -> i64 {
        self.state.lock().count
    }

    /// Returns `true` while the counter is zero or negative.
    pub fn is_done(&self) -> bool {
        self.state.lock().generation.is_done()
    }

    /// Waits until the counter is satisfied.
    pub async fn wait(&self) {
        self.done().wait().await
    }

    /// Waits for at most `duration`, returning whether the counter was satisfied.
    pub async fn wait_with_timeout(&self, duration: Duration) -> bool {
        crate::signal::wait_with_timeout(self, duration).await
    }
}

impl Default for WaitGroup {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Waitable for WaitGroup {
    fn done(&self) -> Done {
        Done::from_generation(self.state.lock().generation.clone())
    }
}
