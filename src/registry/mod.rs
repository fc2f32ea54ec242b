// Registry module - ONBOARDING
// Record builders with onboarding defaults, create-only registration and lookups

mod builder;
mod onboarding;

pub use builder::{BuildError, PackageBuilder, ParticipantBuilder};
pub use onboarding::{demo_network, Registry, RegistryError};
