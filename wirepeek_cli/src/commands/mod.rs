//! CLI command implementations

pub mod ignore;
pub mod status;
pub mod tail;
pub mod watch;
