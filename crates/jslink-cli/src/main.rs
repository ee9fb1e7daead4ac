use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, ValueEnum};
use jslink_core::cache::ParseCache;
use jslink_core::loader::Loader;
use jslink_core::{analyze_metafile, BuildOptions, Bundler, OutputFormat, SourceMapMode};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "jslink")]
#[command(about = "Bundle JavaScript and CSS modules", long_about = None)]
#[command(version)]
struct Cli {
    /// Entry points, resolved from the working directory
    #[arg(value_name = "ENTRY", required = true)]
    entry_points: Vec<String>,

    /// Output directory
    #[arg(long, value_name = "DIR", conflicts_with = "outfile")]
    outdir: Option<PathBuf>,

    /// Output file, for builds with a single output
    #[arg(long, value_name = "FILE")]
    outfile: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Format::Esm)]
    format: Format,

    /// Keep every entry self-contained instead of sharing chunks
    #[arg(long)]
    no_splitting: bool,

    #[arg(long, value_enum, num_args = 0..=1, default_missing_value = "linked")]
    sourcemap: Option<SourceMap>,

    /// Write the metafile JSON to this path
    #[arg(long, value_name = "FILE")]
    metafile: Option<PathBuf>,

    /// Print a size breakdown of every output
    #[arg(long)]
    analyze: bool,

    /// Leave matching imports in the output (`*` is a wildcard)
    #[arg(long, value_name = "PATTERN")]
    external: Vec<String>,

    /// Variable receiving the entry exports in iife format
    #[arg(long)]
    global_name: Option<String>,

    #[arg(long)]
    banner: Option<String>,

    #[arg(long)]
    footer: Option<String>,

    /// Names never given to bundled symbols
    #[arg(long = "reserve", value_name = "NAME")]
    reserved_names: Vec<String>,

    /// Top-level name of an entry module to keep as written
    #[arg(long = "pin", value_name = "NAME")]
    pinned_names: Vec<String>,

    /// Loader override, e.g. `.txt=text`
    #[arg(long = "loader", value_name = "EXT=LOADER", value_parser = parse_loader)]
    loaders: Vec<(String, Loader)>,

    /// Worker threads for resolving, loading and parsing
    #[arg(long)]
    workers: Option<usize>,

    /// Parse cache file, read before and written after the build
    #[arg(long, value_name = "FILE")]
    cache: Option<PathBuf>,

    /// Directory entry points and outputs are relative to
    #[arg(long, value_name = "DIR")]
    working_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Esm,
    Iife,
    Cjs,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SourceMap {
    Linked,
    External,
    Inline,
}

fn parse_loader(arg: &str) -> Result<(String, Loader), String> {
    let (ext, loader) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected EXT=LOADER, got {arg:?}"))?;
    if !ext.starts_with('.') {
        return Err(format!("extension {ext:?} must start with '.'"));
    }
    let loader: Loader = serde_json::from_value(serde_json::Value::String(loader.to_string()))
        .map_err(|_| format!("unknown loader {loader:?}"))?;
    Ok((ext.to_string(), loader))
}

impl Cli {
    fn build_options(&self) -> Result<BuildOptions> {
        let working_dir = match &self.working_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().context("Failed to read the current directory")?,
        };
        let mut options = BuildOptions {
            entry_points: self.entry_points.clone(),
            working_dir,
            outdir: self.outdir.clone(),
            outfile: self.outfile.clone(),
            format: match self.format {
                Format::Esm => OutputFormat::Esm,
                Format::Iife => OutputFormat::Iife,
                Format::Cjs => OutputFormat::Cjs,
            },
            splitting: !self.no_splitting,
            sourcemap: match self.sourcemap {
                None => SourceMapMode::None,
                Some(SourceMap::Linked) => SourceMapMode::Linked,
                Some(SourceMap::External) => SourceMapMode::External,
                Some(SourceMap::Inline) => SourceMapMode::Inline,
            },
            metafile: self.metafile.is_some() || self.analyze,
            write: true,
            external: self.external.clone(),
            global_name: self.global_name.clone(),
            banner: self.banner.clone(),
            footer: self.footer.clone(),
            reserved_names: self.reserved_names.clone(),
            pinned_names: self.pinned_names.clone(),
            ..BuildOptions::default()
        };
        if let Some(workers) = self.workers {
            if workers == 0 {
                bail!("--workers must be at least 1");
            }
            options.workers = workers;
        }
        options.loaders.extend(self.loaders.iter().cloned());
        Ok(options)
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_cache(path: &Path) -> Option<ParseCache> {
    if !path.exists() {
        return None;
    }
    match ParseCache::load(path) {
        Ok(cache) => {
            debug!(modules = cache.len(), "loaded parse cache");
            Some(cache)
        }
        Err(e) => {
            warn!("ignoring parse cache {}: {e}", path.display());
            None
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let options = cli.build_options()?;
    let mut bundler = Bundler::new(options);
    if let Some(cache) = cli.cache.as_deref().and_then(load_cache) {
        bundler = bundler.with_cache(cache);
    }

    let result = match bundler.build() {
        Ok(result) => result,
        Err(failure) => {
            for warning in &failure.warnings {
                eprintln!("{warning}");
            }
            eprint!("{}", failure.render());
            return Err(anyhow!("{failure}"));
        }
    };
    for warning in &result.warnings {
        eprintln!("{warning}");
    }

    if let Some(metafile) = &result.metafile {
        if let Some(path) = &cli.metafile {
            let json = metafile.to_json().context("Failed to serialize the metafile")?;
            std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        }
        if cli.analyze {
            eprint!("{}", analyze_metafile(metafile));
        }
    }
    if let Some(path) = &cli.cache {
        bundler
            .cache()
            .save(path)
            .with_context(|| format!("Failed to write parse cache {}", path.display()))?;
    }
    debug!(files = result.output_files.len(), "done");
    Ok(())
}
