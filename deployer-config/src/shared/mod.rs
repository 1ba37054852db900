mod application;
mod kubernetes;
mod sentry;

pub use application::*;
pub use kubernetes::*;
pub use sentry::*;
