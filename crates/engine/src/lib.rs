pub mod registry;
pub mod resolver;

pub use registry::build_resolver;
pub use resolver::CaptchaResolver;
