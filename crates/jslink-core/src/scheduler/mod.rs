//! Concurrent module discovery.
//!
//! A bounded `rayon` pool runs resolve, load and parse work. Each import record
//! is its own task, so plugin callbacks that block only hold one worker. The
//! module table is claimed check-then-insert under a single lock, which is what
//! guarantees that every resolved identity is loaded and parsed at most once.
//! Resolutions are memoized per (specifier, importer, namespace) in
//! single-assignment cells: a second task asking the same question waits for
//! the first answer instead of asking the plugins again.
//!
//! The scope join is the drain: errors are only reported after every in-flight
//! task has finished. Module ids handed out here are provisional; the graph
//! renumbers them deterministically.

use crate::bundler::AbortHandle;
use crate::cache::{hash_source, ParseCache};
use crate::error::{BuildError, BuildFailure, ErrorCollector, Location};
use crate::fs::{relative_path, FileSystem};
use crate::loader::{lower, Loader};
use crate::options::BuildOptions;
use crate::parse::{ImportKind, ModuleParser, ParseInput, ParsedModule};
use crate::plugin::{
    LoadArgs, LoadOutcome, ModuleKey, Plugin, PluginData, ResolveArgs, ResolveOutcome,
    FILE_NAMESPACE,
};
use crate::resolver::{Resolution, Resolver};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, debug_span, trace};

/// Where an import record points after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanTarget {
    /// Provisional module id.
    Module(usize),
    /// Left as an import in the output; holds the path to print.
    External(String),
}

/// One discovered module.
#[derive(Debug, Clone)]
pub struct ScannedModule {
    pub key: ModuleKey,
    pub pretty_path: String,
    pub source: Arc<str>,
    pub loader: Loader,
    pub parsed: Arc<ParsedModule>,
    pub side_effects: Option<bool>,
    /// Targets of `parsed.import_records`, index for index.
    pub targets: Vec<ScanTarget>,
    pub source_hash: String,
    /// False when the parse came from the cache.
    pub freshly_parsed: bool,
}

#[derive(Debug)]
pub struct ScanResult {
    pub modules: Vec<ScannedModule>,
    /// Provisional ids of the entry points, in configured order.
    pub entries: Vec<usize>,
}

/// Everything a scan task may touch. Borrowed for the duration of one scan.
pub struct ScanContext<'a> {
    pub options: &'a BuildOptions,
    pub plugins: &'a [Plugin],
    pub parser: &'a dyn ModuleParser,
    pub resolver: &'a Resolver,
    pub fs: &'a dyn FileSystem,
    pub cache: &'a ParseCache,
    pub abort: &'a AbortHandle,
}

#[derive(Debug, Clone)]
struct Resolved {
    key: ModuleKey,
    side_effects: Option<bool>,
    plugin_data: PluginData,
}

#[derive(Debug, Clone)]
enum ResolveAnswer {
    Module(Resolved),
    External(String),
}

#[derive(Debug, Clone)]
enum ResolveFailure {
    NotFound,
    Plugin { plugin: String, message: String },
}

type ResolveMemoKey = (String, Option<ModuleKey>, String);
type ResolveCell = Arc<OnceCell<Result<ResolveAnswer, ResolveFailure>>>;

/// A claimed module slot that has been loaded and parsed.
struct Loaded {
    key: ModuleKey,
    pretty_path: String,
    source: Arc<str>,
    loader: Loader,
    parsed: Arc<ParsedModule>,
    side_effects: Option<bool>,
    resolve_dir: Option<PathBuf>,
    source_hash: String,
    freshly_parsed: bool,
}

struct ScanState<'a> {
    ctx: &'a ScanContext<'a>,
    by_key: Mutex<FxHashMap<ModuleKey, usize>>,
    modules: Mutex<Vec<Option<Arc<Loaded>>>>,
    targets: Mutex<Vec<Vec<Option<ScanTarget>>>>,
    memo: Mutex<FxHashMap<ResolveMemoKey, ResolveCell>>,
    entries: Mutex<Vec<Option<usize>>>,
    errors: Mutex<ErrorCollector>,
}

/// Discover, load and parse every module reachable from the entry points.
pub fn scan(ctx: &ScanContext<'_>) -> Result<ScanResult, BuildFailure> {
    let _span = debug_span!("scan", entries = ctx.options.entry_points.len()).entered();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(ctx.options.workers.max(1))
        .thread_name(|i| format!("jslink-worker-{i}"))
        .build()
        .map_err(|e| BuildFailure::single(BuildError::Internal(format!("worker pool: {e}"))))?;

    let state = ScanState {
        ctx,
        by_key: Mutex::new(FxHashMap::default()),
        modules: Mutex::new(Vec::new()),
        targets: Mutex::new(Vec::new()),
        memo: Mutex::new(FxHashMap::default()),
        entries: Mutex::new(vec![None; ctx.options.entry_points.len()]),
        errors: Mutex::new(ErrorCollector::default()),
    };

    pool.scope(|scope| {
        for (index, specifier) in ctx.options.entry_points.iter().enumerate() {
            let state = &state;
            scope.spawn(move |scope| state.resolve_entry(scope, index, specifier));
        }
    });

    state.finish()
}

impl<'a> ScanState<'a> {
    fn aborted(&self) -> bool {
        self.ctx.abort.is_aborted()
    }

    fn error(&self, error: BuildError) {
        self.errors.lock().push(error);
    }

    fn resolve_entry<'s>(&'s self, scope: &rayon::Scope<'s>, index: usize, specifier: &str) {
        if self.aborted() {
            return;
        }
        let args = ResolveArgs {
            path: specifier.to_string(),
            importer: None,
            namespace: FILE_NAMESPACE.to_string(),
            resolve_dir: Some(self.ctx.options.working_dir.clone()),
            kind: ImportKind::EntryPoint,
            plugin_data: None,
        };
        match self.resolve_memoized(&args, None) {
            Ok(ResolveAnswer::Module(resolved)) => {
                let id = self.claim(scope, resolved);
                self.entries.lock()[index] = Some(id);
            }
            Ok(ResolveAnswer::External(_)) => self.error(BuildError::Unresolved {
                specifier: specifier.to_string(),
                importer: None,
                location: None,
            }),
            Err(error) => self.error(self.resolve_error(error, specifier, None, None)),
        }
    }

    /// Return the id for `resolved`, spawning its load task the first time.
    fn claim<'s>(&'s self, scope: &rayon::Scope<'s>, resolved: Resolved) -> usize {
        let mut by_key = self.by_key.lock();
        if let Some(&id) = by_key.get(&resolved.key) {
            return id;
        }
        let id = {
            let mut modules = self.modules.lock();
            modules.push(None);
            self.targets.lock().push(Vec::new());
            modules.len() - 1
        };
        by_key.insert(resolved.key.clone(), id);
        drop(by_key);

        trace!(id, key = %resolved.key, "claimed module");
        scope.spawn(move |scope| self.load_module(scope, id, resolved));
        id
    }

    fn load_module<'s>(&'s self, scope: &rayon::Scope<'s>, id: usize, resolved: Resolved) {
        if self.aborted() {
            return;
        }
        let loaded = match self.load_and_parse(resolved) {
            Ok(loaded) => Arc::new(loaded),
            Err(error) => {
                self.error(error);
                return;
            }
        };
        let record_count = loaded.parsed.import_records.len();
        self.targets.lock()[id] = vec![None; record_count];
        self.modules.lock()[id] = Some(Arc::clone(&loaded));

        for record in 0..record_count {
            let loaded = Arc::clone(&loaded);
            scope.spawn(move |scope| self.resolve_record(scope, id, &loaded, record));
        }
    }

    fn load_and_parse(&self, resolved: Resolved) -> Result<Loaded, BuildError> {
        let ctx = self.ctx;
        let key = resolved.key;
        let pretty_path = pretty_path(&key, &ctx.options.working_dir);

        let (contents, declared_loader, resolve_dir) = self.load(&key, &pretty_path, resolved.plugin_data)?;
        let loader = select_loader(declared_loader, &key.path, ctx.options);
        let source = lower(loader, &contents).map_err(|reason| BuildError::Load {
            module: pretty_path.clone(),
            reason,
            location: None,
        })?;
        let parse_loader = if loader.is_script() || loader.is_css() {
            loader
        } else {
            Loader::Js
        };

        let source_hash = hash_source(&source);
        let (parsed, freshly_parsed) = match ctx.cache.get(&key, &source_hash) {
            Some(parsed) => {
                trace!(module = %pretty_path, "parse cache hit");
                (parsed.clone(), false)
            }
            None => {
                let input = ParseInput {
                    path: &pretty_path,
                    source: &source,
                    loader: parse_loader,
                };
                let parsed = ctx.parser.parse(&input).map_err(|error| BuildError::Parse {
                    location: Some(Location::from_offset(&pretty_path, &source, error.offset)),
                    message: error.message,
                })?;
                (parsed, true)
            }
        };

        let resolve_dir = resolve_dir.or_else(|| {
            key.is_file()
                .then(|| Path::new(&key.path).parent().map(Path::to_path_buf))
                .flatten()
        });

        Ok(Loaded {
            key,
            pretty_path,
            source: Arc::from(source),
            loader: parse_loader,
            parsed: Arc::new(parsed),
            side_effects: resolved.side_effects,
            resolve_dir,
            source_hash,
            freshly_parsed,
        })
    }

    /// Plugins first, then the file system for the `file` namespace.
    fn load(
        &self,
        key: &ModuleKey,
        pretty_path: &str,
        plugin_data: PluginData,
    ) -> Result<(Vec<u8>, Loader, Option<PathBuf>), BuildError> {
        let args = LoadArgs {
            path: key.path.clone(),
            namespace: key.namespace.clone(),
            plugin_data,
        };
        for plugin in self.ctx.plugins {
            match plugin.load(&args) {
                Ok(LoadOutcome::Loaded {
                    contents,
                    loader,
                    resolve_dir,
                }) => {
                    trace!(plugin = plugin.name(), module = pretty_path, "loaded by plugin");
                    return Ok((contents, loader, resolve_dir));
                }
                Ok(LoadOutcome::Declined) => {}
                Err(error) => {
                    return Err(BuildError::Plugin {
                        plugin: plugin.name().to_string(),
                        hook: "onLoad",
                        message: error.message,
                        location: None,
                    })
                }
            }
        }
        if !key.is_file() {
            return Err(BuildError::Load {
                module: pretty_path.to_string(),
                reason: format!("no plugin loads the \"{}\" namespace", key.namespace),
                location: None,
            });
        }
        let contents = self
            .ctx
            .fs
            .read(Path::new(&key.path))
            .map_err(|error| BuildError::Load {
                module: pretty_path.to_string(),
                reason: error.to_string(),
                location: None,
            })?;
        Ok((contents, Loader::Default, None))
    }

    fn resolve_record<'s>(
        &'s self,
        scope: &rayon::Scope<'s>,
        id: usize,
        importer: &Loaded,
        record_index: usize,
    ) {
        if self.aborted() {
            return;
        }
        let record = &importer.parsed.import_records[record_index];
        let args = ResolveArgs {
            path: record.specifier.clone(),
            importer: Some(importer.pretty_path.clone()),
            namespace: importer.key.namespace.clone(),
            resolve_dir: importer.resolve_dir.clone(),
            kind: record.kind,
            plugin_data: None,
        };
        let target = match self.resolve_memoized(&args, Some(&importer.key)) {
            Ok(ResolveAnswer::Module(resolved)) => ScanTarget::Module(self.claim(scope, resolved)),
            Ok(ResolveAnswer::External(path)) => ScanTarget::External(path),
            Err(error) => {
                let location = Location::from_offset(
                    &importer.pretty_path,
                    &importer.source,
                    record.span.start as usize,
                );
                self.error(self.resolve_error(
                    error,
                    &record.specifier,
                    Some(&importer.pretty_path),
                    Some(location),
                ));
                return;
            }
        };
        self.targets.lock()[id][record_index] = Some(target);
    }

    fn resolve_memoized(
        &self,
        args: &ResolveArgs,
        importer: Option<&ModuleKey>,
    ) -> Result<ResolveAnswer, ResolveFailure> {
        let memo_key = (args.path.clone(), importer.cloned(), args.namespace.clone());
        let cell = Arc::clone(self.memo.lock().entry(memo_key).or_default());
        cell.get_or_init(|| self.resolve(args)).clone()
    }

    /// Plugins in registration order, then the default resolver.
    fn resolve(&self, args: &ResolveArgs) -> Result<ResolveAnswer, ResolveFailure> {
        for plugin in self.ctx.plugins {
            match plugin.resolve(args) {
                Ok(ResolveOutcome::Resolved {
                    path,
                    namespace,
                    side_effects,
                    plugin_data,
                }) => {
                    trace!(plugin = plugin.name(), specifier = %args.path, "resolved by plugin");
                    return Ok(ResolveAnswer::Module(Resolved {
                        key: ModuleKey::new(namespace, path),
                        side_effects,
                        plugin_data,
                    }));
                }
                Ok(ResolveOutcome::External) => {
                    return Ok(ResolveAnswer::External(args.path.clone()));
                }
                Ok(ResolveOutcome::Declined) => {}
                Err(error) => {
                    return Err(ResolveFailure::Plugin {
                        plugin: plugin.name().to_string(),
                        message: error.message,
                    });
                }
            }
        }
        let Some(resolve_dir) = &args.resolve_dir else {
            return Err(ResolveFailure::NotFound);
        };
        match self.ctx.resolver.resolve(&args.path, resolve_dir) {
            Resolution::Path { path, side_effects } => Ok(ResolveAnswer::Module(Resolved {
                key: ModuleKey::file(path.to_string_lossy().into_owned()),
                side_effects,
                plugin_data: None,
            })),
            Resolution::External => Ok(ResolveAnswer::External(args.path.clone())),
            Resolution::NotFound => Err(ResolveFailure::NotFound),
        }
    }

    fn resolve_error(
        &self,
        failure: ResolveFailure,
        specifier: &str,
        importer: Option<&str>,
        location: Option<Location>,
    ) -> BuildError {
        match failure {
            ResolveFailure::Plugin { plugin, message } => BuildError::Plugin {
                plugin,
                hook: "onResolve",
                message,
                location,
            },
            ResolveFailure::NotFound => BuildError::Unresolved {
                specifier: specifier.to_string(),
                importer: importer.map(str::to_string),
                location,
            },
        }
    }

    fn finish(self) -> Result<ScanResult, BuildFailure> {
        let mut errors = self.errors.into_inner();
        if self.ctx.abort.is_aborted() {
            errors.push(BuildError::Aborted);
        }
        if !errors.is_empty() {
            debug!(errors = errors.len(), "scan failed");
            return Err(errors.into_failure(Vec::new()));
        }

        let modules = self.modules.into_inner();
        let targets = self.targets.into_inner();
        let mut scanned = Vec::with_capacity(modules.len());
        for (id, (slot, targets)) in modules.into_iter().zip(targets).enumerate() {
            let Some(loaded) = slot else {
                return Err(BuildFailure::single(BuildError::Internal(format!(
                    "module {id} was claimed but never loaded"
                ))));
            };
            let loaded = Arc::try_unwrap(loaded).unwrap_or_else(|shared| Loaded {
                key: shared.key.clone(),
                pretty_path: shared.pretty_path.clone(),
                source: Arc::clone(&shared.source),
                loader: shared.loader,
                parsed: Arc::clone(&shared.parsed),
                side_effects: shared.side_effects,
                resolve_dir: shared.resolve_dir.clone(),
                source_hash: shared.source_hash.clone(),
                freshly_parsed: shared.freshly_parsed,
            });
            let targets = targets.into_iter().collect::<Option<Vec<_>>>().ok_or_else(|| {
                BuildFailure::single(BuildError::Internal(format!(
                    "unresolved import record in {}",
                    loaded.pretty_path
                )))
            })?;
            scanned.push(ScannedModule {
                key: loaded.key,
                pretty_path: loaded.pretty_path,
                source: loaded.source,
                loader: loaded.loader,
                parsed: loaded.parsed,
                side_effects: loaded.side_effects,
                targets,
                source_hash: loaded.source_hash,
                freshly_parsed: loaded.freshly_parsed,
            });
        }

        let entries = self
            .entries
            .into_inner()
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                BuildFailure::single(BuildError::Internal("entry point was not claimed".into()))
            })?;

        debug!(modules = scanned.len(), "scan finished");
        Ok(ScanResult {
            modules: scanned,
            entries,
        })
    }
}

/// Relative to the working directory for files, `namespace:path` otherwise.
pub fn pretty_path(key: &ModuleKey, working_dir: &Path) -> String {
    if !key.is_file() {
        return key.to_string();
    }
    let path = Path::new(&key.path);
    if path.is_relative() {
        return key.path.clone();
    }
    let working_dir = if working_dir.is_absolute() {
        working_dir.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(working_dir))
            .unwrap_or_else(|_| working_dir.to_path_buf())
    };
    relative_path(&working_dir, path).unwrap_or_else(|| key.path.clone())
}

fn select_loader(declared: Loader, path: &str, options: &BuildOptions) -> Loader {
    if declared != Loader::Default {
        return declared;
    }
    let file_name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    if let Some((_, ext)) = file_name.rsplit_once('.') {
        if let Some(loader) = options.loaders.get(&format!(".{ext}")) {
            return *loader;
        }
    }
    Loader::from_path(path).unwrap_or(Loader::Js)
}
