pub mod platform;
pub mod resolver;

pub use platform::{Platform, Quality};
pub use resolver::{resolve, ResolveOptions, ResolvedStream};
