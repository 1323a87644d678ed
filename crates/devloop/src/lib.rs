//! # devloop
//!
//! Development-loop supervisor.
//!
//! Builds one artifact from a source entry point, runs it, waits until it
//! accepts TCP connections, and rebuilds/restarts it on demand. The child's
//! error stream is mirrored to the console and scanned for a failure
//! signature so runtime panics stand out from ordinary log lines.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use devloop::{App, AppConfig};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let app = App::new(AppConfig::new("main.go", 8080));
//! app.watch_signals();
//!
//! if let Err(e) = app.start(true).await {
//!     eprintln!("{}", e);
//! }
//! app.register_listeners();
//! app.wait_for_shutdown().await;
//! # }
//! ```

pub mod builder;
pub mod classify;
pub mod config;
pub mod control;
pub mod error;
pub mod gate;
pub mod output;
pub mod paths;
pub mod probe;
pub mod supervisor;
pub mod types;

pub use classify::{BuildClassifier, FailureDetector};
pub use config::{load_config, AppConfig, ConfigFile};
pub use error::AppError;
pub use supervisor::App;
pub use types::*;
