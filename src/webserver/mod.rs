//! JSON API layer over the runtime core.
//!
//! `create_router` wires the route handlers to an injected
//! [`state::AppState`]; server bootstrap belongs to the embedding
//! process.

pub mod routes;
pub mod state;
pub mod utils;

pub use routes::create_router;
pub use state::AppState;
