pub mod alert;
pub mod config;
pub mod error;
pub mod record;
pub mod timestamp;

pub use alert::*;
pub use config::Config;
pub use error::*;
pub use record::*;
