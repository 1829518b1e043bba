pub mod builtin;
pub mod context;
pub mod naming;
pub mod registry;
pub mod traits;

pub use builtin::{ReplyCapability, ThinkCapability, WaitCapability, builtin_registry};
pub use context::{CapabilityContext, RequestContext, WorkingMemory};
pub use naming::{CapabilityIndex, normalize_name};
pub use registry::CapabilityRegistry;
pub use traits::{Capability, CapabilitySpec, Outcome, ParameterSpec};
