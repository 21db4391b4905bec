pub mod config;
pub mod projection;
pub mod reconcile;
pub mod state;
pub mod types;
pub mod validation;

pub use config::*;
pub use projection::*;
pub use reconcile::*;
pub use state::*;
pub use types::*;
pub use validation::*;
