//! Upload inventory - which survey files are already in the inspection record
//!
//! The inventory is a JSON document `{folder: [filename, ...]}`. It only
//! grows through [`InventoryTracker::commit`] after a file has been
//! durably uploaded, so re-running ingestion never double-uploads.

use miette::Diagnostic;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Files per component folder
///
/// Sets are sorted by name. The inventory records which files were
/// uploaded, not the order they went in; the run log carries the order.
/// A folder key with an empty set means the folder is tracked but held no
/// uploads yet.
pub type Snapshot = BTreeMap<String, BTreeSet<String>>;

#[derive(Debug, Error, Diagnostic)]
pub enum InventoryError {
    #[error("Inventory file {} is corrupt: {message}", path.display())]
    #[diagnostic(
        code(rwogp::inventory::corrupt),
        help("Restore the file from a backup or fix it by hand; it is never reset automatically")
    )]
    Corrupt { path: PathBuf, message: String },

    #[error("Survey directory not found: {}", path.display())]
    #[diagnostic(
        code(rwogp::inventory::no_survey_dir),
        help("Set survey_dir in rwogp.yaml or RWOGP_SURVEY_DIR")
    )]
    SurveyDirMissing { path: PathBuf },

    #[error("Inventory I/O failed for {}", path.display())]
    #[diagnostic(code(rwogp::inventory::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl InventoryError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Finds report files in the immediate subdirectories of the survey root
#[derive(Debug, Clone)]
pub struct SurveyScanner {
    root: PathBuf,
    extensions: Vec<String>,
}

impl SurveyScanner {
    pub fn new(root: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        Self {
            root: root.into(),
            extensions,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a file reported by [`scan`](Self::scan)
    pub fn path_of(&self, folder: &str, file: &str) -> PathBuf {
        self.root.join(folder).join(file)
    }

    /// Current on-disk files, optionally restricted to one folder
    pub fn scan(&self, filter: Option<&str>) -> Result<Snapshot, InventoryError> {
        if !self.root.is_dir() {
            return Err(InventoryError::SurveyDirMissing {
                path: self.root.clone(),
            });
        }

        let mut snapshot = Snapshot::new();
        let walker = WalkDir::new(&self.root)
            .min_depth(2)
            .max_depth(2)
            .sort_by_file_name();

        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| self.root.clone());
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory loop"));
                InventoryError::Io { path, source }
            })?;

            if !entry.file_type().is_file() || !self.is_report(entry.path()) {
                continue;
            }

            let Some(folder) = entry
                .path()
                .parent()
                .and_then(Path::file_name)
                .and_then(|n| n.to_str())
            else {
                continue;
            };
            if folder.starts_with('.') || !matches_filter(folder, filter) {
                continue;
            }
            let Some(file) = entry.file_name().to_str() else {
                tracing::warn!(path = %entry.path().display(), "skipping non UTF-8 file name");
                continue;
            };

            snapshot
                .entry(folder.to_string())
                .or_default()
                .insert(file.to_string());
        }

        Ok(snapshot)
    }

    fn is_report(&self, path: &Path) -> bool {
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'));
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);
        !hidden && ext.is_some_and(|e| self.extensions.contains(&e))
    }
}

fn matches_filter(folder: &str, filter: Option<&str>) -> bool {
    filter.map_or(true, |f| folder.eq_ignore_ascii_case(f))
}

/// Files that appeared or disappeared since the last commit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventoryDelta {
    pub added: Snapshot,
    pub removed: Snapshot,
}

impl InventoryDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    pub fn added_count(&self) -> usize {
        self.added.values().map(BTreeSet::len).sum()
    }

    pub fn removed_count(&self) -> usize {
        self.removed.values().map(BTreeSet::len).sum()
    }

    /// Added files in processing order
    pub fn added_files(&self) -> impl Iterator<Item = (&str, &str)> {
        self.added
            .iter()
            .flat_map(|(folder, files)| files.iter().map(move |f| (folder.as_str(), f.as_str())))
    }
}

/// Persisted record of uploaded files
#[derive(Debug)]
pub struct InventoryTracker {
    path: PathBuf,
    known: Snapshot,
    first_run: bool,
}

impl InventoryTracker {
    /// Load the inventory; a missing file means a first run
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, InventoryError> {
        let path = path.into();
        if !path.exists() {
            tracing::info!(path = %path.display(), "no inventory yet, treating as first run");
            return Ok(Self {
                path,
                known: Snapshot::new(),
                first_run: true,
            });
        }

        let contents = fs::read_to_string(&path).map_err(|e| InventoryError::io(&path, e))?;
        if contents.trim().is_empty() {
            return Err(InventoryError::Corrupt {
                path,
                message: "file is empty".to_string(),
            });
        }
        let known: Snapshot =
            serde_json::from_str(&contents).map_err(|e| InventoryError::Corrupt {
                path: path.clone(),
                message: e.to_string(),
            })?;

        Ok(Self {
            path,
            known,
            first_run: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True until something has been written
    pub fn is_first_run(&self) -> bool {
        self.first_run
    }

    pub fn known(&self) -> &Snapshot {
        &self.known
    }

    pub fn contains(&self, folder: &str, file: &str) -> bool {
        self.known.get(folder).is_some_and(|files| files.contains(file))
    }

    /// Compare a scan against the inventory, per folder
    pub fn diff(&self, current: &Snapshot, filter: Option<&str>) -> InventoryDelta {
        let mut delta = InventoryDelta::default();

        for (folder, files) in current.iter().filter(|(f, _)| matches_filter(f, filter)) {
            let known = self.known.get(folder);
            let added: BTreeSet<String> = files
                .iter()
                .filter(|f| !known.is_some_and(|k| k.contains(*f)))
                .cloned()
                .collect();
            if !added.is_empty() {
                delta.added.insert(folder.clone(), added);
            }
        }

        for (folder, files) in self.known.iter().filter(|(f, _)| matches_filter(f, filter)) {
            let present = current.get(folder);
            let removed: BTreeSet<String> = files
                .iter()
                .filter(|f| !present.is_some_and(|p| p.contains(*f)))
                .cloned()
                .collect();
            if !removed.is_empty() {
                delta.removed.insert(folder.clone(), removed);
            }
        }

        delta
    }

    /// Record one uploaded file and persist; committing twice is a no-op
    pub fn commit(&mut self, folder: &str, file: &str) -> Result<(), InventoryError> {
        let inserted = self
            .known
            .entry(folder.to_string())
            .or_default()
            .insert(file.to_string());
        if inserted || self.first_run {
            self.save()?;
        }
        tracing::debug!(folder, file, "committed to inventory");
        Ok(())
    }

    /// Folders of `current` the inventory has never tracked, with their files
    ///
    /// These get the backfill decision a whole first run gets, so filtering
    /// the first run to one folder does not silently backfill the others.
    pub fn untracked(&self, current: &Snapshot) -> Snapshot {
        current
            .iter()
            .filter(|(folder, _)| !self.known.keys().any(|k| k.eq_ignore_ascii_case(folder)))
            .map(|(folder, files)| (folder.clone(), files.clone()))
            .collect()
    }

    /// Start tracking folders without recording any files
    pub fn track<'f>(&mut self, folders: impl IntoIterator<Item = &'f str>) -> Result<(), InventoryError> {
        let mut added = false;
        for folder in folders {
            if !self.known.keys().any(|k| k.eq_ignore_ascii_case(folder)) {
                self.known.insert(folder.to_string(), BTreeSet::new());
                added = true;
            }
        }
        if added || self.first_run {
            self.save()?;
        }
        Ok(())
    }

    /// Record a whole snapshot as already handled without uploading it
    pub fn baseline(&mut self, snapshot: &Snapshot) -> Result<(), InventoryError> {
        for (folder, files) in snapshot {
            self.known
                .entry(folder.clone())
                .or_default()
                .extend(files.iter().cloned());
        }
        tracing::info!(files = snapshot.values().map(BTreeSet::len).sum::<usize>(), "inventory baseline recorded");
        self.save()
    }

    /// Forget one folder's history; returns how many entries were dropped
    ///
    /// The folder becomes untracked, so the next run offers to backfill it.
    pub fn clear(&mut self, folder: &str) -> Result<usize, InventoryError> {
        let key = self
            .known
            .keys()
            .find(|k| k.eq_ignore_ascii_case(folder))
            .cloned();
        let dropped = key
            .and_then(|k| self.known.remove(&k))
            .map_or(0, |files| files.len());
        self.save()?;
        Ok(dropped)
    }

    /// Drop entries for files no longer on disk
    pub fn prune(&mut self, current: &Snapshot) -> Result<usize, InventoryError> {
        let mut dropped = 0;
        for (folder, files) in self.known.iter_mut() {
            let before = files.len();
            match current.get(folder) {
                Some(present) => files.retain(|f| present.contains(f)),
                None => files.clear(),
            }
            dropped += before - files.len();
        }
        if dropped > 0 {
            self.save()?;
        }
        Ok(dropped)
    }

    /// Write via a sibling temp file and rename
    fn save(&mut self) -> Result<(), InventoryError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| InventoryError::io(parent, e))?;
        }

        let json = serde_json::to_string_pretty(&self.known).map_err(|e| InventoryError::Corrupt {
            path: self.path.clone(),
            message: e.to_string(),
        })?;

        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp = self.path.with_file_name(tmp_name);

        fs::write(&tmp, json).map_err(|e| InventoryError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| InventoryError::io(&self.path, e))?;
        self.first_run = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, folder: &str, file: &str) {
        let dir = root.join(folder);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(file), "x").unwrap();
    }

    fn scanner(root: &Path) -> SurveyScanner {
        SurveyScanner::new(root, vec!["txt".to_string()])
    }

    #[test]
    fn test_scan_immediate_subdirectories_only() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "modules", "a.txt");
        touch(tmp.path(), "modules", "b.TXT");
        touch(tmp.path(), "modules", "notes.pdf");
        touch(tmp.path(), "modules/nested", "deep.txt");
        fs::write(tmp.path().join("top.txt"), "x").unwrap();

        let snap = scanner(tmp.path()).scan(None).unwrap();
        assert_eq!(snap.len(), 1);
        let files: Vec<_> = snap["modules"].iter().map(String::as_str).collect();
        assert_eq!(files, vec!["a.txt", "b.TXT"]);
    }

    #[test]
    fn test_scan_filter() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "modules", "a.txt");
        touch(tmp.path(), "baseplates", "b.txt");

        let snap = scanner(tmp.path()).scan(Some("Baseplates")).unwrap();
        assert_eq!(snap.keys().collect::<Vec<_>>(), vec!["baseplates"]);
    }

    #[test]
    fn test_scan_missing_root() {
        let tmp = TempDir::new().unwrap();
        let err = scanner(&tmp.path().join("absent")).scan(None).unwrap_err();
        assert!(matches!(err, InventoryError::SurveyDirMissing { .. }));
    }

    #[test]
    fn test_first_run_everything_new() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "modules", "a.txt");
        let snap = scanner(tmp.path()).scan(None).unwrap();

        let tracker = InventoryTracker::load(tmp.path().join("inventory.json")).unwrap();
        assert!(tracker.is_first_run());
        let delta = tracker.diff(&snap, None);
        assert_eq!(delta.added_count(), 1);
        assert_eq!(delta.removed_count(), 0);
    }

    #[test]
    fn test_commit_idempotent_and_persisted() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state/inventory.json");

        let mut tracker = InventoryTracker::load(&path).unwrap();
        tracker.commit("modules", "a.txt").unwrap();
        tracker.commit("modules", "a.txt").unwrap();
        assert!(!tracker.is_first_run());

        let reloaded = InventoryTracker::load(&path).unwrap();
        assert_eq!(reloaded.known()["modules"].len(), 1);
        assert!(reloaded.contains("modules", "a.txt"));
        assert!(!path.with_file_name("inventory.json.tmp").exists());
    }

    #[test]
    fn test_second_diff_empty_after_commit() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("surveys");
        touch(&root, "modules", "a.txt");
        touch(&root, "hexaboards", "h.txt");
        let snap = scanner(&root).scan(None).unwrap();

        let mut tracker = InventoryTracker::load(tmp.path().join("inv.json")).unwrap();
        let delta = tracker.diff(&snap, None);
        let added: Vec<(String, String)> = delta
            .added_files()
            .map(|(d, f)| (d.to_string(), f.to_string()))
            .collect();
        for (folder, file) in &added {
            tracker.commit(folder, file).unwrap();
        }
        assert!(tracker.diff(&snap, None).is_empty());
    }

    #[test]
    fn test_removed_files_reported_not_dropped() {
        let tmp = TempDir::new().unwrap();
        let mut tracker = InventoryTracker::load(tmp.path().join("inv.json")).unwrap();
        tracker.commit("modules", "gone.txt").unwrap();

        let delta = tracker.diff(&Snapshot::new(), None);
        assert_eq!(delta.removed_count(), 1);
        assert!(tracker.contains("modules", "gone.txt"));
    }

    #[test]
    fn test_diff_filter_limits_both_sides() {
        let tmp = TempDir::new().unwrap();
        let mut tracker = InventoryTracker::load(tmp.path().join("inv.json")).unwrap();
        tracker.commit("modules", "old.txt").unwrap();

        let mut current = Snapshot::new();
        current.entry("baseplates".into()).or_default().insert("b.txt".into());

        let delta = tracker.diff(&current, Some("baseplates"));
        assert_eq!(delta.added_count(), 1);
        assert_eq!(delta.removed_count(), 0);
    }

    #[test]
    fn test_corrupt_inventory_surfaces() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("inv.json");

        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            InventoryTracker::load(&path),
            Err(InventoryError::Corrupt { .. })
        ));

        fs::write(&path, "").unwrap();
        assert!(matches!(
            InventoryTracker::load(&path),
            Err(InventoryError::Corrupt { .. })
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_baseline_clear_prune() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("inv.json");
        let mut tracker = InventoryTracker::load(&path).unwrap();

        let mut snap = Snapshot::new();
        snap.entry("modules".into()).or_default().extend(["a.txt".to_string(), "b.txt".to_string()]);
        snap.entry("baseplates".into()).or_default().insert("p.txt".into());
        tracker.baseline(&snap).unwrap();
        assert!(tracker.diff(&snap, None).is_empty());

        assert_eq!(tracker.clear("Baseplates").unwrap(), 1);
        assert!(!tracker.known().contains_key("baseplates"));

        let mut on_disk = Snapshot::new();
        on_disk.entry("modules".into()).or_default().insert("a.txt".into());
        assert_eq!(tracker.prune(&on_disk).unwrap(), 1);

        let reloaded = InventoryTracker::load(&path).unwrap();
        assert_eq!(reloaded.known()["modules"].len(), 1);
    }

    #[test]
    fn test_untracked_folders_after_filtered_first_run() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("surveys");
        touch(&root, "baseplates", "b.txt");
        touch(&root, "modules", "m.txt");
        touch(&root, "hexaboards", "h.txt");

        let mut tracker = InventoryTracker::load(tmp.path().join("inv.json")).unwrap();
        let first = scanner(&root).scan(Some("baseplates")).unwrap();
        assert_eq!(tracker.untracked(&first), first);
        tracker.commit("baseplates", "b.txt").unwrap();

        let everything = scanner(&root).scan(None).unwrap();
        let untracked = tracker.untracked(&everything);
        assert_eq!(untracked.keys().collect::<Vec<_>>(), vec!["hexaboards", "modules"]);

        tracker.track(["hexaboards", "Modules"]).unwrap();
        assert!(tracker.untracked(&everything).is_empty());
        assert_eq!(tracker.diff(&everything, None).added_count(), 2);

        let reloaded = InventoryTracker::load(tmp.path().join("inv.json")).unwrap();
        assert!(reloaded.known()["hexaboards"].is_empty());
        assert!(reloaded.untracked(&everything).is_empty());
    }

    #[test]
    fn test_persisted_lists_sorted_and_unique() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("inv.json");
        let mut tracker = InventoryTracker::load(&path).unwrap();
        for file in ["c.txt", "a.txt", "c.txt", "b.txt"] {
            tracker.commit("modules", file).unwrap();
        }

        let persisted: BTreeMap<String, Vec<String>> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(persisted["modules"], vec!["a.txt", "b.txt", "c.txt"]);
    }

    #[test]
    fn test_prune_keeps_folder_tracked() {
        let tmp = TempDir::new().unwrap();
        let mut tracker = InventoryTracker::load(tmp.path().join("inv.json")).unwrap();
        tracker.commit("modules", "gone.txt").unwrap();

        assert_eq!(tracker.prune(&Snapshot::new()).unwrap(), 1);
        let mut later = Snapshot::new();
        later.entry("modules".into()).or_default().insert("new.txt".into());
        assert!(tracker.untracked(&later).is_empty());
    }
}
