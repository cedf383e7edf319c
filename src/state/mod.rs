pub mod database;
pub mod schema;

pub use database::{Database, LoggedTurn};
