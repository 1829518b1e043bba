use super::traits::{PlanEvent, PlanObserver};

/// Zero-overhead observer
pub struct NoopObserver;

impl PlanObserver for NoopObserver {
    #[inline(always)]
    fn on_event(&self, _event: &PlanEvent) {}

    fn name(&self) -> &str {
        "noop"
    }
}
