pub mod env;
pub mod logging;
pub mod profiling;

pub use env::load_env;
pub use logging::init_tracing;
