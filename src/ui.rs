pub mod app;
pub mod scope;
pub mod settings;
pub mod theme;

pub use app::{UiConfig, run};
