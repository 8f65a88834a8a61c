// Library root: exposes internal modules for integration tests in `tests/`.
// Production entry point remains `src/main.rs`.

pub mod api;
pub mod coordinator;
pub mod derived;
pub mod error;
pub mod feed;
pub mod metrics;
pub mod registry;
pub mod scheduler;
pub mod services;
pub mod source;
pub mod trigger;
pub mod types;

// Only needed by the binary, kept public so the binary can share them.
pub mod cli;
pub mod config;
pub mod logging;
