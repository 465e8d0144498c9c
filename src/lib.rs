//! Spreadsheet templates for data entry and lookup export, served over HTTP.

pub mod config;
pub mod error;
pub mod filler;
pub mod lookup;
pub mod schema;
pub mod server;
pub mod template;

pub use config::Config;
pub use error::ExportError;
pub use lookup::{LookupData, LookupStore};
pub use schema::Schema;
