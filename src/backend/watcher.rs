use std::collections::HashSet;
use std::path::{Path, PathBuf};

use notify::{recommended_watcher, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

/// Which watched file changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchEvent {
    Entries,
    Settings,
}

/// Watches the directories holding the entries and settings files and reports
/// changes to those files only. Dropping it stops the watch.
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
}

impl ConfigWatcher {
    pub fn start(
        targets: &[(PathBuf, WatchEvent)],
    ) -> notify::Result<(Self, flume::Receiver<WatchEvent>)> {
        let (tx, rx) = flume::unbounded();
        let targets: Vec<(PathBuf, WatchEvent)> = targets
            .iter()
            .map(|(path, event)| (absolute(path), *event))
            .collect();
        let matchers = targets.clone();

        let mut watcher = recommended_watcher(move |res: notify::Result<notify::Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    log::warn!("File watch error: {}", e);
                    return;
                }
            };
            if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                return;
            }
            for (path, kind) in &matchers {
                if event.paths.iter().any(|p| p == path) {
                    let _ = tx.send(*kind);
                }
            }
        })?;

        let mut dirs = HashSet::new();
        for (path, _) in &targets {
            if let Some(dir) = path.parent() {
                if !dir.is_dir() {
                    log::warn!("Not watching {}: no such directory", path.display());
                    continue;
                }
                if dirs.insert(dir.to_path_buf()) {
                    watcher.watch(dir, RecursiveMode::NonRecursive)?;
                    log::info!("Watching {}", dir.display());
                }
            }
        }

        Ok((Self { _watcher: watcher }, rx))
    }
}

/// Collapse a burst of events (editors write files in several steps) into one
/// event per file, in first-seen order.
pub fn coalesce(first: WatchEvent, rx: &flume::Receiver<WatchEvent>) -> Vec<WatchEvent> {
    let mut batch = vec![first];
    for event in rx.drain() {
        if !batch.contains(&event) {
            batch.push(event);
        }
    }
    batch
}

/// Canonical parent directory joined with the file name, so the path compares
/// equal to what the watcher reports even when the file does not exist yet.
fn absolute(path: &Path) -> PathBuf {
    let name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::canonicalize(&parent)
        .unwrap_or(parent)
        .join(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coalesce_dedups_bursts() {
        let (tx, rx) = flume::unbounded();
        tx.send(WatchEvent::Entries).unwrap();
        tx.send(WatchEvent::Settings).unwrap();
        tx.send(WatchEvent::Entries).unwrap();

        let batch = coalesce(WatchEvent::Entries, &rx);
        assert_eq!(batch, vec![WatchEvent::Entries, WatchEvent::Settings]);
        assert!(rx.is_empty());
    }

    #[test]
    fn absolute_resolves_parent() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("entries.json");
        let resolved = absolute(&file);
        assert_eq!(resolved, std::fs::canonicalize(dir.path()).unwrap().join("entries.json"));
    }

    #[test]
    fn reports_writes_to_watched_file() {
        let dir = tempfile::tempdir().unwrap();
        let entries = dir.path().join("entries.json");
        std::fs::write(&entries, "{}").unwrap();

        let (_watcher, rx) =
            ConfigWatcher::start(&[(entries.clone(), WatchEvent::Entries)]).unwrap();
        std::fs::write(dir.path().join("other.json"), "{}").unwrap();
        std::fs::write(&entries, r#"{"entries": []}"#).unwrap();

        let event = rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("no watch event");
        assert_eq!(event, WatchEvent::Entries);
    }
}
