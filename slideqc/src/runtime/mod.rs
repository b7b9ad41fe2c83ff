//! Toolchain location and validation.

mod resolver;

pub use resolver::{EnvResolver, RuntimeEnvironment, HOME_ENV_VAR};
