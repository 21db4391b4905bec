pub mod error;
pub mod list_cache;
pub mod model;
pub mod poller;
pub mod render;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use error::*;
pub use list_cache::*;
pub use model::*;
pub use poller::*;
pub use render::*;
pub use session::*;
