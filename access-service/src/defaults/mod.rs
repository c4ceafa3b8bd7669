//! Static default tables compiled into the service.

pub mod config;
pub mod packs;
pub mod views;

pub use config::{builtin, DefaultTable};
