//! HTTP surface for `vodr serve`.

pub mod error;
pub mod routes;
pub mod server;

pub use server::{ApiServer, AppState};
