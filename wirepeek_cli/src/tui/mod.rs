//! Terminal User Interface for the traffic viewer

mod app;
mod ui;

pub use app::{TuiApp, TuiEvent, ViewerOptions};
pub use ui::{body_rows, draw, truncate_str};
