pub mod client;
pub mod error;
pub mod transport;
pub mod types;

pub use client::*;
pub use error::*;
pub use transport::*;
pub use types::*;
