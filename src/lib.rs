//! Assembler library
//!
//! Turns a declarative bundler configuration (entry, output patterns,
//! aliases, module rules and plugins) into a validated [`BuildConfig`] and
//! submits it to a [`BuildEngine`], once or on every change in watch mode.
//!
//! ```no_run
//! use assembler_lib::Assembler;
//!
//! let assembler = Assembler::new();
//! let config = assembler.load("assembler.toml")?;
//! let config = assembler.validate(config)?;
//! let result = assembler.submit(&config)?;
//! println!("wrote {} files", result.artifacts.len());
//! # Ok::<(), assembler_lib::AssemblerError>(())
//! ```

pub mod assembler;
pub mod bundler;
pub mod cli;
pub mod config;
pub mod error;
pub mod filename;
pub mod plugins;
pub mod resolver;
pub mod transform;
pub mod utils;
pub mod watch;

pub use assembler::Assembler;
pub use bundler::{Artifact, BuildEngine, BuildResult, Bundler};
pub use cli::Cli;
pub use config::{BuildConfig, Mode};
pub use error::{AssemblerError, EngineError, ValidationError, ValidationIssue};
pub use watch::WatchHandle;
