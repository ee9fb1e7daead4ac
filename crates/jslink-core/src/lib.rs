//! Linking engine of a JavaScript/CSS bundler.
//!
//! Entry points are resolved and loaded through plugins or the default
//! resolver, parsed into [`parse::ParsedModule`]s, linked into a
//! [`graph::ModuleGraph`], tree shaken, split into chunks, renamed and printed
//! with optional source maps and a [`metafile::Metafile`].

pub mod bundler;
pub mod cache;
pub mod chunker;
pub mod error;
pub mod fs;
pub mod graph;
pub mod ids;
pub mod loader;
pub mod metafile;
pub mod options;
pub mod parse;
pub mod plugin;
pub mod printer;
pub mod renamer;
pub mod resolver;
pub mod scheduler;
pub mod shaker;
pub mod sourcemap;

pub use bundler::{build, AbortHandle, BuildResult, Bundler, OutputFile};
pub use error::{BuildError, BuildFailure, Location, Warning};
pub use metafile::{analyze_metafile, Metafile};
pub use options::{BuildOptions, OutputFormat, SourceMapMode};
pub use plugin::{HookFilter, LoadArgs, LoadOutcome, ModuleKey, Plugin, PluginError, ResolveArgs, ResolveOutcome};
