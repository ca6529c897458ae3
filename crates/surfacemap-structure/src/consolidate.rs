//! Deduplication and annotation of the form catalog

use crate::index::DescriptionIndex;
use crate::lock::CatalogLock;
use crate::normalize::normalize_action;
use crate::signature::FormSignature;
use chrono::Local;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use surfacemap_core::artifact::{read_json, write_json};
use surfacemap_core::{EndpointsArtifact, Error, Result, StructureArtifact};
use tracing::{debug, info};

/// Counts from one consolidation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsolidationReport {
    /// Forms read from the catalog
    pub loaded: usize,
    /// Forms dropped as duplicates
    pub duplicates: usize,
    /// Forms written back
    pub unique: usize,
    /// Surviving forms with a non-empty feedback
    pub annotated: usize,
    /// Snapshot of the original catalog, if one was taken
    pub backup: Option<PathBuf>,
}

/// Deduplicate `structure` and attach descriptions from `endpoints`.
///
/// The first form of each signature survives with its own fields; its action
/// is replaced by the normalized path. A form whose lookup yields nothing
/// keeps any feedback it already had and otherwise gets an empty one.
pub fn consolidate(
    mut structure: StructureArtifact,
    endpoints: &EndpointsArtifact,
) -> (StructureArtifact, ConsolidationReport) {
    let index = DescriptionIndex::from_endpoints(endpoints);
    let loaded = structure.forms.len();

    let mut seen = HashSet::new();
    let mut forms = Vec::with_capacity(loaded);

    for mut form in structure.forms.drain(..) {
        if !seen.insert(FormSignature::of(&form)) {
            continue;
        }

        form.action = normalize_action(form.action.trim());
        match index.lookup(&form.action) {
            Some(description) => form.feedback = Some(description.to_string()),
            None => {
                form.feedback.get_or_insert_with(String::new);
            }
        }
        forms.push(form);
    }

    let report = ConsolidationReport {
        loaded,
        duplicates: loaded - forms.len(),
        unique: forms.len(),
        annotated: forms.iter().filter(|f| !f.feedback().is_empty()).count(),
        backup: None,
    };
    structure.forms = forms;
    (structure, report)
}

/// Rewrites a `structure.json` in place from an `endpoints.json`
#[derive(Debug, Clone)]
pub struct Consolidator {
    structure_path: PathBuf,
    endpoints_path: PathBuf,
    backup: bool,
}

impl Consolidator {
    pub fn new(structure_path: impl Into<PathBuf>, endpoints_path: impl Into<PathBuf>) -> Self {
        Self {
            structure_path: structure_path.into(),
            endpoints_path: endpoints_path.into(),
            backup: false,
        }
    }

    /// Snapshot the original catalog before overwriting it
    pub fn with_backup(mut self, backup: bool) -> Self {
        self.backup = backup;
        self
    }

    pub fn structure_path(&self) -> &Path {
        &self.structure_path
    }

    pub fn endpoints_path(&self) -> &Path {
        &self.endpoints_path
    }

    /// Run one consolidation.
    ///
    /// Nothing is written unless both inputs exist and decode.
    pub fn run(&self) -> Result<ConsolidationReport> {
        for path in [&self.structure_path, &self.endpoints_path] {
            if !path.is_file() {
                return Err(Error::ConsolidationInputMissing {
                    path: path.display().to_string(),
                });
            }
        }

        let _lock = CatalogLock::acquire(&self.structure_path)?;

        let structure: StructureArtifact = read_json(&self.structure_path)?;
        let endpoints: EndpointsArtifact = read_json(&self.endpoints_path)?;
        info!(
            "Loaded {} forms from {}",
            structure.forms.len(),
            self.structure_path.display()
        );

        let (consolidated, mut report) = consolidate(structure, &endpoints);
        info!(
            "Removed {} duplicate forms; {} unique remain",
            report.duplicates, report.unique
        );

        if self.backup {
            let backup = snapshot(&self.structure_path)?;
            info!("Backup saved to {}", backup.display());
            report.backup = Some(backup);
        }

        write_json(&self.structure_path, &consolidated)?;
        debug!("{} forms annotated", report.annotated);
        info!("Updated structure saved to {}", self.structure_path.display());

        Ok(report)
    }
}

/// Snapshots kept per catalog within one clock second
const MAX_SNAPSHOTS_PER_SECOND: u32 = 100;

/// Copy the catalog to `<catalog>.bak.<YYYYmmdd_HHMMSS>`
fn snapshot(catalog: &Path) -> Result<PathBuf> {
    snapshot_with_stamp(catalog, &Local::now().format("%Y%m%d_%H%M%S").to_string())
}

/// Existing snapshots are never overwritten; a second one taken with the
/// same stamp gets a `.1`, `.2`, ... suffix
fn snapshot_with_stamp(catalog: &Path, stamp: &str) -> Result<PathBuf> {
    let mut source = File::open(catalog)?;

    for n in 0..MAX_SNAPSHOTS_PER_SECOND {
        let mut name = catalog.as_os_str().to_os_string();
        name.push(format!(".bak.{}", stamp));
        if n > 0 {
            name.push(format!(".{}", n));
        }
        let path = PathBuf::from(name);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                std::io::copy(&mut source, &mut file)?;
                file.sync_all()?;
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Err(Error::Io(std::io::Error::new(
        ErrorKind::AlreadyExists,
        format!("too many backups of {} at {}", catalog.display(), stamp),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use surfacemap_core::{AttackSurface, Extra, Form, Input};
    use tempfile::TempDir;

    fn user_input() -> Input {
        Input::new("user", "text").required(true)
    }

    fn surface(url: &str, description: &str) -> AttackSurface {
        AttackSurface {
            url: url.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    fn structure(forms: Vec<Form>) -> StructureArtifact {
        StructureArtifact {
            forms,
            extra: Extra::new(),
        }
    }

    fn login_scenario() -> (StructureArtifact, EndpointsArtifact) {
        (
            structure(vec![
                Form::new("/login", "POST", vec![user_input()]),
                Form::new("http://t/login/", "post", vec![user_input()]),
            ]),
            EndpointsArtifact {
                endpoints: vec![],
                attack_surfaces: vec![surface("http://t/login", "SQLi risk")],
            },
        )
    }

    #[test]
    fn test_login_scenario() {
        let (forms, endpoints) = login_scenario();
        let (out, report) = consolidate(forms, &endpoints);

        assert_eq!(out.forms.len(), 1);
        assert_eq!(out.forms[0].action, "/login");
        assert_eq!(out.forms[0].method, "POST");
        assert_eq!(out.forms[0].feedback(), "SQLi risk");
        assert_eq!(
            report,
            ConsolidationReport {
                loaded: 2,
                duplicates: 1,
                unique: 1,
                annotated: 1,
                backup: None,
            }
        );
    }

    #[test]
    fn test_first_duplicate_survives() {
        let mut first = Form::new("/a", "get", vec![Input::new("q", "text").with_id("first")]);
        first.extra.insert("found_on".into(), "http://t/one".into());
        let second = Form::new("/a/", "GET", vec![Input::new("q", "text").with_id("second")]);

        let (out, report) = consolidate(structure(vec![first, second]), &EndpointsArtifact::default());
        assert_eq!(report.duplicates, 1);
        assert_eq!(out.forms[0].inputs[0].id, "first");
        assert_eq!(out.forms[0].extra["found_on"], "http://t/one");
        assert_eq!(out.forms[0].method, "get");
    }

    #[test]
    fn test_reordered_inputs_collapse() {
        let a = Form::new(
            "/signup",
            "post",
            vec![Input::new("email", "email"), Input::new("pw", "password")],
        );
        let b = Form::new(
            "/signup",
            "post",
            vec![Input::new("pw", "password"), Input::new("email", "email")],
        );
        let (out, _) = consolidate(structure(vec![a, b]), &EndpointsArtifact::default());
        assert_eq!(out.forms.len(), 1);
    }

    #[test]
    fn test_feedback_always_present() {
        let (out, report) = consolidate(
            structure(vec![Form::new("", "get", vec![])]),
            &EndpointsArtifact::default(),
        );
        assert_eq!(out.forms[0].action, "/");
        assert_eq!(out.forms[0].feedback, Some(String::new()));
        assert_eq!(report.annotated, 0);
    }

    #[test]
    fn test_empty_description_never_clears_feedback() {
        let mut form = Form::new("/login", "post", vec![]);
        form.feedback = Some("Earlier finding".into());
        let endpoints = EndpointsArtifact {
            endpoints: vec!["http://t/login".into()],
            attack_surfaces: vec![surface("http://t/login", "")],
        };

        let (out, _) = consolidate(structure(vec![form]), &endpoints);
        assert_eq!(out.forms[0].feedback(), "Earlier finding");
    }

    #[test]
    fn test_exact_match_beats_fuzzy() {
        let endpoints = EndpointsArtifact {
            endpoints: vec![],
            attack_surfaces: vec![
                surface("http://t/admin/login", "fuzzy"),
                surface("http://t/login", "exact"),
            ],
        };
        let (out, _) = consolidate(
            structure(vec![
                Form::new("/login", "post", vec![]),
                Form::new("/portal/admin/login", "post", vec![]),
            ]),
            &endpoints,
        );
        assert_eq!(out.forms[0].feedback(), "exact");
        assert_eq!(out.forms[1].feedback(), "fuzzy");
    }

    #[test]
    fn test_idempotent() {
        let mut forms = login_scenario().0.forms;
        forms.push(Form::new("search.php", "get", vec![Input::new("q", "text")]));
        forms.push(Form::new("/contact/", "post", vec![Input::new("msg", "textarea")]));
        let endpoints = EndpointsArtifact {
            endpoints: vec!["http://t/contact".into(), "http://t/search.php".into()],
            attack_surfaces: vec![
                surface("http://t/login", "SQLi risk"),
                surface("http://t/api/search.php", "Reflected XSS"),
            ],
        };

        let (once, first) = consolidate(structure(forms), &endpoints);
        let (twice, second) = consolidate(once.clone(), &endpoints);

        assert_eq!(twice, once);
        assert_eq!(second.unique, first.unique);
        assert_eq!(second.duplicates, 0);
        assert_eq!(once.forms[1].feedback(), "Reflected XSS");
        assert_eq!(once.forms[2].feedback(), "");
    }

    #[test]
    fn test_run_rewrites_catalog_with_backup() {
        let tmp = TempDir::new().unwrap();
        let structure_path = tmp.path().join("structure.json");
        let endpoints_path = tmp.path().join("endpoints.json");
        let (forms, endpoints) = login_scenario();
        write_json(&structure_path, &forms).unwrap();
        write_json(&endpoints_path, &endpoints).unwrap();
        let original = std::fs::read_to_string(&structure_path).unwrap();

        let report = Consolidator::new(&structure_path, &endpoints_path)
            .with_backup(true)
            .run()
            .unwrap();

        assert_eq!((report.loaded, report.duplicates, report.unique), (2, 1, 1));
        let backup = report.backup.unwrap();
        assert!(backup
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("structure.json.bak."));
        assert_eq!(std::fs::read_to_string(&backup).unwrap(), original);

        let rewritten: StructureArtifact = read_json(&structure_path).unwrap();
        assert_eq!(rewritten.forms.len(), 1);
        assert_eq!(rewritten.forms[0].feedback(), "SQLi risk");
        assert!(!CatalogLock::lock_path(&structure_path).exists());
    }

    #[test]
    fn test_missing_input_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let structure_path = tmp.path().join("structure.json");
        write_json(&structure_path, &login_scenario().0).unwrap();
        let before = std::fs::read_to_string(&structure_path).unwrap();

        let err = Consolidator::new(&structure_path, tmp.path().join("endpoints.json"))
            .run()
            .unwrap_err();
        assert!(matches!(err, Error::ConsolidationInputMissing { .. }));
        assert_eq!(std::fs::read_to_string(&structure_path).unwrap(), before);

        let err = Consolidator::new(tmp.path().join("nope.json"), &structure_path)
            .run()
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_concurrent_run_is_refused() {
        let tmp = TempDir::new().unwrap();
        let structure_path = tmp.path().join("structure.json");
        let endpoints_path = tmp.path().join("endpoints.json");
        let (forms, endpoints) = login_scenario();
        write_json(&structure_path, &forms).unwrap();
        write_json(&endpoints_path, &endpoints).unwrap();

        let _held = CatalogLock::acquire(&structure_path).unwrap();
        let err = Consolidator::new(&structure_path, &endpoints_path)
            .run()
            .unwrap_err();
        assert!(matches!(err, Error::Locked { .. }));
        let untouched: StructureArtifact = read_json(&structure_path).unwrap();
        assert_eq!(untouched.forms.len(), 2);
    }

    #[test]
    fn test_snapshot_never_overwrites() {
        let tmp = TempDir::new().unwrap();
        let catalog = tmp.path().join("structure.json");
        std::fs::write(&catalog, "first").unwrap();

        let first = snapshot_with_stamp(&catalog, "20240101_120000").unwrap();
        std::fs::write(&catalog, "second").unwrap();
        let second = snapshot_with_stamp(&catalog, "20240101_120000").unwrap();

        assert_eq!(first, tmp.path().join("structure.json.bak.20240101_120000"));
        assert_eq!(second, tmp.path().join("structure.json.bak.20240101_120000.1"));
        assert_eq!(std::fs::read_to_string(&first).unwrap(), "first");
        assert_eq!(std::fs::read_to_string(&second).unwrap(), "second");
    }

    #[test]
    fn test_back_to_back_backups_keep_original() {
        let tmp = TempDir::new().unwrap();
        let structure_path = tmp.path().join("structure.json");
        let endpoints_path = tmp.path().join("endpoints.json");
        let (forms, endpoints) = login_scenario();
        write_json(&structure_path, &forms).unwrap();
        write_json(&endpoints_path, &endpoints).unwrap();
        let original = std::fs::read_to_string(&structure_path).unwrap();

        let consolidator = Consolidator::new(&structure_path, &endpoints_path).with_backup(true);
        let first = consolidator.run().unwrap().backup.unwrap();
        let second = consolidator.run().unwrap().backup.unwrap();

        assert_ne!(first, second);
        assert_eq!(std::fs::read_to_string(&first).unwrap(), original);
    }

    #[test]
    fn test_run_accepts_attribute_style_required() {
        let tmp = TempDir::new().unwrap();
        let structure_path = tmp.path().join("structure.json");
        let endpoints_path = tmp.path().join("endpoints.json");
        std::fs::write(
            &structure_path,
            r#"{"forms": [
                {"action": "/search", "method": "get", "inputs": [{"name": "q", "required": "required"}]},
                {"action": "/search/", "method": "GET", "inputs": [{"name": "q", "required": 1}]},
                {"action": "/search", "method": "get", "inputs": [{"name": "q", "required": ""}]}
            ]}"#,
        )
        .unwrap();
        write_json(&endpoints_path, &EndpointsArtifact::default()).unwrap();

        let report = Consolidator::new(&structure_path, &endpoints_path)
            .run()
            .unwrap();
        assert_eq!((report.loaded, report.duplicates, report.unique), (3, 1, 2));

        let rewritten: StructureArtifact = read_json(&structure_path).unwrap();
        assert!(rewritten.forms[0].inputs[0].required);
        assert!(!rewritten.forms[1].inputs[0].required);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_run_takes_over_lock_of_dead_process() {
        let tmp = TempDir::new().unwrap();
        let structure_path = tmp.path().join("structure.json");
        let endpoints_path = tmp.path().join("endpoints.json");
        let (forms, endpoints) = login_scenario();
        write_json(&structure_path, &forms).unwrap();
        write_json(&endpoints_path, &endpoints).unwrap();
        // Above the kernel's pid_max, so never a live process
        std::fs::write(CatalogLock::lock_path(&structure_path), "999999999\n").unwrap();

        let report = Consolidator::new(&structure_path, &endpoints_path)
            .run()
            .unwrap();
        assert_eq!(report.unique, 1);
        assert!(!CatalogLock::lock_path(&structure_path).exists());
    }
}
