//! Headless front ends: one-shot runs and file watching.

pub mod run;
pub mod watch;

pub use run::RunHandler;
pub use watch::WatchHandler;
