//! Script module change detection
//!
//! notify delivers events on its own thread; they are only collected here and
//! acted upon when the simulation thread calls [`ModuleWatcher::poll`].

use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use super::ScriptError;

/// File extension of script sources
pub const SCRIPT_EXTENSION: &str = "rhai";

/// Watches a script module directory
pub struct ModuleWatcher {
    // Dropping the watcher stops the notifications
    _watcher: RecommendedWatcher,
    events: Receiver<notify::Result<Event>>,
    root: PathBuf,
}

impl ModuleWatcher {
    /// Start watching `root` recursively
    pub fn new(root: impl AsRef<Path>) -> Result<Self, ScriptError> {
        let root = root.as_ref().to_path_buf();
        let (sender, events) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(sender).map_err(|err| ScriptError::Watch(err.to_string()))?;
        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|err| ScriptError::Watch(format!("{}: {err}", root.display())))?;
        log::debug!("Watching script module {}", root.display());
        Ok(Self {
            _watcher: watcher,
            events,
            root,
        })
    }

    /// Watched directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Drain pending events; returns whether any touched a script file
    pub fn poll(&self) -> bool {
        let mut changed = false;
        for event in self.events.try_iter() {
            match event {
                Ok(event) => changed |= is_relevant(&event),
                Err(err) => log::warn!("Script watcher error: {err}"),
            }
        }
        changed
    }
}

/// Whether an event creates, modifies or removes a script source
pub fn is_relevant(event: &Event) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_))
        && event.paths.iter().any(|path| is_script(path))
}

pub(crate) fn is_script(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == SCRIPT_EXTENSION)
}

/// Every script under `root` with its class name, sorted by class name
///
/// `Sandbox/Player.rhai` becomes `Sandbox.Player`.
pub fn module_sources(root: &Path) -> io::Result<Vec<(String, PathBuf)>> {
    let mut sources = Vec::new();
    collect(root, root, &mut sources)?;
    sources.sort();
    Ok(sources)
}

fn collect(root: &Path, dir: &Path, out: &mut Vec<(String, PathBuf)>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect(root, &path, out)?;
        } else if is_script(&path) {
            if let Some(name) = class_name(root, &path) {
                out.push((name, path));
            }
        }
    }
    Ok(())
}

fn class_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?.with_extension("");
    let parts: Vec<_> = relative
        .components()
        .map(|part| part.as_os_str().to_string_lossy().into_owned())
        .collect();
    (!parts.is_empty()).then(|| parts.join("."))
}

/// Digest of every script's path and content under `root`
pub fn module_digest(root: &Path) -> io::Result<u64> {
    let mut hasher = DefaultHasher::new();
    for (name, path) in module_sources(root)? {
        name.hash(&mut hasher);
        fs::read(&path)?.hash(&mut hasher);
    }
    Ok(hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind};

    #[test]
    fn test_only_script_changes_are_relevant() {
        let script = Event::new(EventKind::Modify(ModifyKind::Any)).add_path(PathBuf::from("mod/Player.rhai"));
        let other = Event::new(EventKind::Create(CreateKind::File)).add_path(PathBuf::from("mod/readme.txt"));
        let access = Event::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path(PathBuf::from("mod/Player.rhai"));
        assert!(is_relevant(&script));
        assert!(!is_relevant(&other));
        assert!(!is_relevant(&access));
    }

    #[test]
    fn test_class_names_follow_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Sandbox")).unwrap();
        fs::write(dir.path().join("Sandbox/Player.rhai"), "let speed = 1.0;").unwrap();
        fs::write(dir.path().join("Camera.rhai"), "").unwrap();
        fs::write(dir.path().join("notes.md"), "").unwrap();

        let names: Vec<String> = module_sources(dir.path()).unwrap().into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["Camera".to_string(), "Sandbox.Player".to_string()]);
    }

    #[test]
    fn test_digest_tracks_content() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("Player.rhai");
        fs::write(&file, "let speed = 1.0;").unwrap();
        let before = module_digest(dir.path()).unwrap();
        assert_eq!(before, module_digest(dir.path()).unwrap());

        fs::write(&file, "let speed = 2.0;").unwrap();
        assert_ne!(before, module_digest(dir.path()).unwrap());
    }

    #[test]
    fn test_missing_module_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(module_sources(&dir.path().join("missing")).is_err());
    }
}
