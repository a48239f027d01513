pub mod client;
pub mod config;
pub mod error;
pub mod form;
pub mod instance;
pub mod logging;
pub mod output;
pub mod registry;
pub mod sanitize;
pub mod schema;
pub mod tree_view;
pub mod ui;

pub use error::{Error, Result};
