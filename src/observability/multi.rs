use super::traits::{PlanEvent, PlanObserver};

/// Fans every event out to several observers, in order.
pub struct MultiObserver {
    observers: Vec<Box<dyn PlanObserver>>,
}

impl MultiObserver {
    pub fn new(observers: Vec<Box<dyn PlanObserver>>) -> Self {
        Self { observers }
    }
}

impl PlanObserver for MultiObserver {
    fn on_event(&self, event: &PlanEvent) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }

    fn name(&self) -> &str {
        "multi"
    }
}
