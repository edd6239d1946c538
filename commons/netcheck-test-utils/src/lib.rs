//! Helpers shared by the harness unit tests and the cluster scenarios.

pub mod env;
pub mod k8s;
pub mod names;

pub use env::{EnvGuard, set_env_guarded, set_envs_guarded};
pub use k8s::NamespaceGuard;
pub use names::{DIGITS, random_namespace, uniq};
