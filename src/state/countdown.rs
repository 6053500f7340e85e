use dashmap::DashMap;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Handle to a running countdown task for one race.
pub struct CountdownHandle {
    token: Uuid,
    task: JoinHandle<()>,
}

impl CountdownHandle {
    fn stop(&self) {
        self.task.abort();
    }
}

/// Registry of per-race countdown tasks.
///
/// At most one countdown runs per race. Registering a new task replaces and
/// aborts the previous one, which is how a rescheduled (shortened) start takes
/// over from the countdown already in flight. Each task carries a token so a
/// finished task only deregisters itself, never a successor that replaced it.
pub struct CountdownRegistry {
    tasks: DashMap<String, CountdownHandle>,
}

impl CountdownRegistry {
    pub fn new() -> Self {
        Self {
            tasks: DashMap::new(),
        }
    }

    /// Register a countdown task for a race, aborting any previous one.
    pub fn register(&self, race_id: String, token: Uuid, task: JoinHandle<()>) {
        if let Some(previous) = self.tasks.insert(race_id, CountdownHandle { token, task }) {
            previous.stop();
        }
    }

    /// Abort and remove the countdown for a race, if one is running.
    pub fn stop(&self, race_id: &str) {
        if let Some((_, handle)) = self.tasks.remove(race_id) {
            handle.stop();
        }
    }

    /// Remove a countdown entry from within its own task.
    ///
    /// Only removes the entry if the token still matches, so a task that was
    /// replaced while finishing does not tear down its successor.
    pub fn deregister(&self, race_id: &str, token: Uuid) {
        self.tasks.remove_if(race_id, |_, handle| handle.token == token);
    }

    /// Whether a countdown is currently registered for a race.
    pub fn is_running(&self, race_id: &str) -> bool {
        self.tasks.contains_key(race_id)
    }
}

impl Default for CountdownRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn parked_task() -> JoinHandle<()> {
        tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        })
    }

    #[tokio::test]
    async fn registering_replaces_and_aborts_previous_task() {
        let registry = CountdownRegistry::new();
        let first = parked_task();
        registry.register("race".into(), Uuid::new_v4(), first);
        let second = parked_task();
        registry.register("race".into(), Uuid::new_v4(), second);

        assert!(registry.is_running("race"));
        registry.stop("race");
        assert!(!registry.is_running("race"));
    }

    #[tokio::test]
    async fn deregister_requires_matching_token() {
        let registry = CountdownRegistry::new();
        let token = Uuid::new_v4();
        registry.register("race".into(), token, parked_task());

        registry.deregister("race", Uuid::new_v4());
        assert!(registry.is_running("race"));

        registry.deregister("race", token);
        assert!(!registry.is_running("race"));
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let registry = CountdownRegistry::new();
        registry.register("race".into(), Uuid::new_v4(), parked_task());
        registry.stop("race");
        registry.stop("race");
        assert!(!registry.is_running("race"));
    }
}
