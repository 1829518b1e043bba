pub mod compatible;
pub mod prompt;
pub mod reliable;
pub mod traits;

pub use compatible::CompatibleGenerator;
pub use prompt::{PLAN_FORMAT, build_adaptation_prompt, build_plan_prompt};
pub use reliable::ReliableGenerator;
pub use traits::{PlanPrompt, PlanTextGenerator};
