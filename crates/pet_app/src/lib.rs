pub mod app;
pub mod config;
pub mod file_store;

pub use crate::app::{Advisory, LoggingScheduler, PetApp, PetAppBuilder};
pub use crate::config::AppConfig;
pub use crate::file_store::FileStore;
