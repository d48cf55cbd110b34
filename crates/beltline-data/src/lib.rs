pub mod loader;
pub mod schema;

pub use loader::{DataLoadError, load_registry, resolve_registry};
