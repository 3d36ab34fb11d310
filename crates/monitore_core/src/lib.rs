pub mod access;
pub mod auth;
pub mod bootstrap;
pub mod db;
pub mod error;
pub mod ids;
pub mod lifecycle;
pub mod notify;
pub mod schema;

pub use access::{Decision, Principal};
pub use error::{CoreError, CoreResult};
