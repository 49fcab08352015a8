//! The few platform services the crate needs, with one implementation backed
//! by std and another by the browser.
mod fileio;
mod time;

pub use fileio::load_as_string;
pub use time::SystemTime;
