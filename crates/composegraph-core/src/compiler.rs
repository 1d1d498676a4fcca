use crate::builder::GraphBuilder;
use crate::concurrency::shutdown_requested;
use crate::config::Config;
use crate::CoreError;
use chrono::{DateTime, Utc};
use composegraph_schema::{
    parse_manifest_file, parse_manifest_str, FieldWarning, IdentityScheme, IdentityScope,
    ManifestError, NormalizedManifest,
};
use composegraph_store::{ExecSummary, GraphStore, Statement};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// One unit of compilation work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Unit {
    /// Upsert of every service the manifest declares.
    Base,
    /// Relationship reset and rebuild of one service.
    Service { name: String },
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unit::Base => write!(f, "base pass"),
            Unit::Service { name } => write!(f, "service '{name}'"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitFailure {
    /// Index of the failing statement; `None` when no session could be opened.
    pub statement_index: Option<usize>,
    pub statement: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    #[serde(flatten)]
    pub unit: Unit,
    pub statements: usize,
    pub executed: usize,
    pub summary: ExecSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<UnitFailure>,
}

impl UnitReport {
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ManifestOutcome {
    Compiled {
        services: usize,
        units: Vec<UnitReport>,
        warnings: Vec<FieldWarning>,
    },
    Skipped {
        error: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ManifestReport {
    pub source_file: String,
    #[serde(flatten)]
    pub outcome: ManifestOutcome,
}

impl ManifestReport {
    pub fn units(&self) -> &[UnitReport] {
        match &self.outcome {
            ManifestOutcome::Compiled { units, .. } => units,
            ManifestOutcome::Skipped { .. } => &[],
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, ManifestOutcome::Skipped { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompileReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub scope: IdentityScope,
    pub manifests: Vec<ManifestReport>,
    pub aborted: bool,
}

impl CompileReport {
    pub fn failed_units(&self) -> usize {
        self.manifests
            .iter()
            .flat_map(ManifestReport::units)
            .filter(|u| !u.succeeded())
            .count()
    }

    pub fn skipped_manifests(&self) -> usize {
        self.manifests.iter().filter(|m| m.is_skipped()).count()
    }

    pub fn totals(&self) -> ExecSummary {
        let mut total = ExecSummary::default();
        for unit in self.manifests.iter().flat_map(ManifestReport::units) {
            total += unit.summary;
        }
        total
    }

    /// Every manifest parsed and every unit committed.
    pub fn is_complete(&self) -> bool {
        !self.aborted && self.failed_units() == 0 && self.skipped_manifests() == 0
    }
}

/// A manifest ready to compile, or the reason it cannot be.
struct Input {
    source_file: String,
    manifest: Result<NormalizedManifest, ManifestError>,
}

/// Compiles manifests into a graph store, one unit at a time.
pub struct Compiler<'a> {
    store: &'a dyn GraphStore,
    builder: GraphBuilder,
    manifest_dir: PathBuf,
    matcher: globset::GlobMatcher,
    abort_check: fn() -> bool,
}

impl<'a> Compiler<'a> {
    pub fn new(store: &'a dyn GraphStore, config: &Config) -> Result<Self, CoreError> {
        Ok(Self {
            store,
            builder: GraphBuilder::new(IdentityScheme::new(config.identity.scope)),
            manifest_dir: config.manifests.dir.clone(),
            matcher: config.manifest_matcher()?,
            abort_check: shutdown_requested,
        })
    }

    /// Replace the operator-abort check consulted between units.
    #[must_use]
    pub fn with_abort_check(mut self, check: fn() -> bool) -> Self {
        self.abort_check = check;
        self
    }

    pub fn scope(&self) -> IdentityScope {
        self.builder.scheme().scope()
    }

    /// Manifest files in `dir` whose file name matches the configured
    /// pattern, sorted by name.
    pub fn discover(&self, dir: &Path) -> Result<Vec<PathBuf>, CoreError> {
        let entries = std::fs::read_dir(dir).map_err(|source| CoreError::Discovery {
            dir: dir.to_path_buf(),
            source,
        })?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            let matched = path
                .file_name()
                .is_some_and(|name| self.matcher.is_match(Path::new(name)));
            if matched {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Compile every manifest in the configured directory.
    pub fn compile(&self) -> Result<CompileReport, CoreError> {
        self.compile_dir(&self.manifest_dir)
    }

    pub fn compile_dir(&self, dir: &Path) -> Result<CompileReport, CoreError> {
        let files = self.discover(dir)?;
        info!("found {} manifest(s) in {}", files.len(), dir.display());
        let inputs = files.iter().map(|path| load_file(path)).collect();
        Ok(self.run(inputs))
    }

    pub fn compile_file(&self, path: &Path) -> CompileReport {
        self.run(vec![load_file(path)])
    }

    pub fn compile_source(&self, source_file: &str, yaml: &str) -> CompileReport {
        let manifest = parse_manifest_str(yaml).map(|m| m.normalize(source_file));
        self.run(vec![Input {
            source_file: source_file.to_owned(),
            manifest,
        }])
    }

    fn run(&self, inputs: Vec<Input>) -> CompileReport {
        let started_at = Utc::now();
        let mut reports = Vec::with_capacity(inputs.len());
        let mut manifests = Vec::new();

        for input in inputs {
            match input.manifest {
                Ok(manifest) => {
                    info!(
                        "compiling {} ({} service(s))",
                        manifest.source_file,
                        manifest.services.len()
                    );
                    let mut warnings = manifest.warnings.clone();
                    for w in &warnings {
                        warn!("{}: {w}", manifest.source_file);
                    }
                    for service in &manifest.services {
                        for dep in GraphBuilder::undeclared_dependencies(&manifest, service) {
                            warn!(
                                "{}: service '{}' depends on '{dep}', which this manifest does not declare",
                                manifest.source_file, service.name
                            );
                            warnings.push(FieldWarning {
                                service: service.name.clone(),
                                field: "depends_on".to_owned(),
                                message: format!("depends on undeclared service '{dep}'"),
                            });
                        }
                    }
                    reports.push(ManifestReport {
                        source_file: manifest.source_file.clone(),
                        outcome: ManifestOutcome::Compiled {
                            services: manifest.services.len(),
                            units: Vec::new(),
                            warnings,
                        },
                    });
                    manifests.push((reports.len() - 1, manifest));
                }
                Err(e) => {
                    error!("skipping {}: {e}", input.source_file);
                    reports.push(ManifestReport {
                        source_file: input.source_file,
                        outcome: ManifestOutcome::Skipped {
                            error: e.to_string(),
                        },
                    });
                }
            }
        }

        if self.scope() == IdentityScope::Global {
            for (slot, warning) in redeclarations(&manifests) {
                warn!("{}: {warning}", reports[slot].source_file);
                if let ManifestOutcome::Compiled { warnings, .. } = &mut reports[slot].outcome {
                    warnings.push(warning);
                }
            }
        }

        let mut aborted = false;
        let mut record = |slot: usize, unit: UnitReport| {
            if let ManifestOutcome::Compiled { units, .. } = &mut reports[slot].outcome {
                units.push(unit);
            }
        };

        match self.scope() {
            IdentityScope::File => {
                'manifests: for (slot, manifest) in &manifests {
                    for (unit, statements) in self.units(manifest) {
                        if (self.abort_check)() {
                            aborted = true;
                            break 'manifests;
                        }
                        record(*slot, self.execute(manifest, unit, &statements));
                    }
                }
            }
            IdentityScope::Global => {
                // Every service must exist before any dependency edge is merged.
                let base = manifests.iter().map(|(slot, m)| {
                    (*slot, m, Unit::Base, self.builder.base_statements(m))
                });
                let details = manifests.iter().flat_map(|(slot, m)| {
                    m.services.iter().map(move |s| {
                        (
                            *slot,
                            m,
                            Unit::Service {
                                name: s.name.clone(),
                            },
                            self.builder.detail_statements(m, s),
                        )
                    })
                });
                for (slot, manifest, unit, statements) in base.chain(details) {
                    if (self.abort_check)() {
                        aborted = true;
                        break;
                    }
                    record(slot, self.execute(manifest, unit, &statements));
                }
            }
        }

        if aborted {
            warn!("compilation aborted by operator");
        }
        let report = CompileReport {
            started_at,
            finished_at: Utc::now(),
            scope: self.scope(),
            manifests: reports,
            aborted,
        };
        let totals = report.totals();
        info!(
            "compiled {} manifest(s): {} skipped, {} failed unit(s), {} node(s) and {} relationship(s) created",
            report.manifests.len(),
            report.skipped_manifests(),
            report.failed_units(),
            totals.nodes_created,
            totals.relationships_created
        );
        report
    }

    fn units(&self, manifest: &NormalizedManifest) -> Vec<(Unit, Vec<Statement>)> {
        let mut units = vec![(Unit::Base, self.builder.base_statements(manifest))];
        for service in &manifest.services {
            units.push((
                Unit::Service {
                    name: service.name.clone(),
                },
                self.builder.detail_statements(manifest, service),
            ));
        }
        units
    }

    /// Run one unit in its own session. Failures stop the unit, never the run.
    fn execute(&self, manifest: &NormalizedManifest, unit: Unit, statements: &[Statement]) -> UnitReport {
        let file = &manifest.source_file;
        debug!("{file}: {unit}, {} statement(s)", statements.len());
        let mut report = UnitReport {
            unit,
            statements: statements.len(),
            executed: 0,
            summary: ExecSummary::default(),
            failure: None,
        };

        let mut session = match self.store.open_session() {
            Ok(session) => session,
            Err(e) => {
                error!("{file}: {} failed: {e}", report.unit);
                report.failure = Some(UnitFailure {
                    statement_index: None,
                    statement: None,
                    error: e.to_string(),
                });
                return report;
            }
        };

        for (index, statement) in statements.iter().enumerate() {
            match session.run(statement) {
                Ok(summary) => {
                    report.summary += summary;
                    report.executed += 1;
                }
                Err(e) => {
                    let description = statement.describe();
                    error!(
                        "{file}: {} failed at statement {index} ({description}): {e}",
                        report.unit
                    );
                    report.failure = Some(UnitFailure {
                        statement_index: Some(index),
                        statement: Some(description),
                        error: e.to_string(),
                    });
                    break;
                }
            }
        }

        if let Err(e) = session.close() {
            error!("{file}: {} failed to commit: {e}", report.unit);
            if report.failure.is_none() {
                report.failure = Some(UnitFailure {
                    statement_index: None,
                    statement: None,
                    error: format!("commit failed: {e}"),
                });
            }
        }
        report
    }
}

/// Under global identity a service name is one node, so a second manifest
/// declaring it rebuilds the relationships the first one created.
fn redeclarations(manifests: &[(usize, NormalizedManifest)]) -> Vec<(usize, FieldWarning)> {
    let mut first_seen: BTreeMap<&str, &str> = BTreeMap::new();
    let mut warnings = Vec::new();
    for (slot, manifest) in manifests {
        for service in &manifest.services {
            match first_seen.get(service.name.as_str()) {
                Some(&earlier) => warnings.push((
                    *slot,
                    FieldWarning {
                        service: service.name.clone(),
                        field: "services".to_owned(),
                        message: format!(
                            "also declared in {earlier}; relationships from the earlier declaration are replaced"
                        ),
                    },
                )),
                None => {
                    first_seen.insert(&service.name, &manifest.source_file);
                }
            }
        }
    }
    warnings
}

fn load_file(path: &Path) -> Input {
    let source_file = path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    );
    let manifest = parse_manifest_file(path).map(|m| m.normalize(&source_file));
    Input {
        source_file,
        manifest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use composegraph_store::MemoryGraphStore;
    use std::fs;

    fn never() -> bool {
        false
    }

    fn always() -> bool {
        true
    }

    fn compiler(store: &MemoryGraphStore) -> Compiler<'_> {
        Compiler::new(store, &Config::default())
            .unwrap()
            .with_abort_check(never)
    }

    #[test]
    fn discovery_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.yml", "a.yaml", "notes.txt", "c.yml.bak"] {
            fs::write(dir.path().join(name), "services: {}\n").unwrap();
        }
        fs::create_dir(dir.path().join("nested.yml")).unwrap();
        let store = MemoryGraphStore::new();
        let files = compiler(&store).discover(dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.yaml", "b.yml"]);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let store = MemoryGraphStore::new();
        let err = compiler(&store)
            .compile_dir(Path::new("/nonexistent/composegraph"))
            .unwrap_err();
        assert!(matches!(err, CoreError::Discovery { .. }));
    }

    #[test]
    fn one_base_unit_then_one_unit_per_service() {
        let store = MemoryGraphStore::new();
        let report = compiler(&store).compile_source(
            "app.yml",
            "services:\n  web:\n    image: nginx\n  db:\n    image: postgres\n",
        );
        let units = report.manifests[0].units();
        assert_eq!(units.len(), 3);
        assert_eq!(units[0].unit, Unit::Base);
        assert!(units.iter().all(UnitReport::succeeded));
        assert!(report.is_complete());
    }

    #[test]
    fn parse_error_skips_manifest() {
        let store = MemoryGraphStore::new();
        let report = compiler(&store).compile_source("bad.yml", "services: [unclosed");
        assert_eq!(report.skipped_manifests(), 1);
        assert!(!report.is_complete());
        assert_eq!(store.snapshot().unwrap().node_count(), 0);
    }

    #[test]
    fn undeclared_dependency_is_a_warning() {
        let store = MemoryGraphStore::new();
        let report =
            compiler(&store).compile_source("app.yml", "services:\n  web:\n    depends_on: [ghost]\n");
        let ManifestOutcome::Compiled { warnings, .. } = &report.manifests[0].outcome else {
            panic!("manifest should compile");
        };
        assert!(warnings.iter().any(|w| w.message.contains("ghost")));
        assert_eq!(report.failed_units(), 0);
    }

    #[test]
    fn abort_stops_before_first_unit() {
        let store = MemoryGraphStore::new();
        let report = Compiler::new(&store, &Config::default())
            .unwrap()
            .with_abort_check(always)
            .compile_source("app.yml", "services:\n  web: {}\n");
        assert!(report.aborted);
        assert!(report.manifests[0].units().is_empty());
        assert_eq!(store.snapshot().unwrap().node_count(), 0);
    }

    #[test]
    fn report_serializes_outcomes() {
        let store = MemoryGraphStore::new();
        let report = compiler(&store).compile_source("app.yml", "services:\n  web: {}\n");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["manifests"][0]["outcome"], "compiled");
        assert_eq!(json["manifests"][0]["units"][1]["kind"], "service");
        assert_eq!(json["manifests"][0]["units"][1]["name"], "web");
        assert_eq!(json["scope"], "file");
    }
}
