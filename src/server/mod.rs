pub mod routes;
mod runtime;
pub mod state;

pub use runtime::{serve, start_server};
pub use state::AppState;
