use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::backend::notifier::{Category, DesktopNotifier, Notifier};
use crate::backend::watcher::{self, ConfigWatcher, WatchEvent};
use crate::backend::{load_config, load_file, EntryTree, Executor};
use crate::config::Settings;
use crate::context::ExecutionContext;
use crate::error::ConfigError;
use crate::model::{Entry, MenuItem};

enum Step {
    Pulse,
    Changed(Vec<WatchEvent>),
    Stop,
}

/// The controller: settings, the live entry tree and the engine that drives it.
pub struct ToggleApp {
    settings: Settings,
    settings_path: PathBuf,
    entries_path: PathBuf,
    notifier: Rc<DesktopNotifier>,
    ctx: Rc<ExecutionContext>,
    tree: Option<EntryTree>,
}

impl ToggleApp {
    pub fn new(settings: Settings, settings_path: PathBuf, entries_path: PathBuf) -> Self {
        let notifier = Rc::new(DesktopNotifier::new(settings.notification_cond.clone()));
        let executor = Executor::with_shell(settings.spawn_tick(), &settings.shell);
        let ctx = ExecutionContext::new(executor, notifier.clone());

        Self {
            settings,
            settings_path,
            entries_path,
            notifier,
            ctx,
            tree: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn entries_path(&self) -> &Path {
        &self.entries_path
    }

    pub fn context(&self) -> &Rc<ExecutionContext> {
        &self.ctx
    }

    pub fn tree(&self) -> Option<&EntryTree> {
        self.tree.as_ref()
    }

    /// Reload the entries file. On failure the previous tree stays live and the
    /// error is reported under `ext`.
    pub fn reload_entries(&mut self) -> Result<(), ConfigError> {
        match load_file(&self.entries_path, &self.ctx) {
            Ok(tree) => {
                self.tree = Some(tree);
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to load {}: {}", self.entries_path.display(), e);
                self.notifier.notify(
                    Category::Ext,
                    &format!("Failed to load {}", self.entries_path.display()),
                    Some(&e.to_string()),
                );
                Err(e)
            }
        }
    }

    /// Replace the tree from an in-memory document. Errors are returned, not notified.
    pub fn load_document(&mut self, source: &str) -> Result<(), ConfigError> {
        let tree = load_config(source, &self.ctx)?;
        self.tree = Some(tree);
        Ok(())
    }

    /// Re-read the settings file and apply what can change live. Returns whether
    /// the detection interval changed.
    pub fn reload_settings(&mut self) -> bool {
        let fresh = Settings::load_from(&self.settings_path);
        if fresh == self.settings {
            return false;
        }

        self.ctx.executor().set_tick(fresh.spawn_tick());
        self.notifier.set_categories(fresh.notification_cond.clone());
        if fresh.shell != self.settings.shell || fresh.entries_file != self.settings.entries_file {
            log::warn!("Changes to shell and entries_file take effect after a restart");
        }

        let interval_changed = fresh.detection_interval() != self.settings.detection_interval();
        log::info!("Settings reloaded from {}", self.settings_path.display());
        self.settings = fresh;
        interval_changed
    }

    /// Queue one detection per toggler.
    pub fn pulse(&self) {
        if let Some(tree) = &self.tree {
            tree.pulse(&self.ctx);
        }
    }

    /// Wait for every queued and running job, including restarts they trigger.
    pub async fn settle(&self) {
        self.ctx.executor().idle().await;
    }

    pub fn menu(&self) -> Vec<MenuItem> {
        self.tree
            .as_ref()
            .map(EntryTree::materialize)
            .unwrap_or_default()
    }

    pub fn search(&self, pattern: &str) -> Vec<&Entry> {
        self.tree
            .as_ref()
            .map(|tree| tree.search(pattern))
            .unwrap_or_default()
    }

    /// Perform the first entry matching `pattern` and return its title.
    pub fn perform(&self, pattern: &str) -> Option<String> {
        let entry = self.search(pattern).into_iter().next()?;
        entry.perform(&self.ctx);
        Some(entry.title().to_string())
    }

    /// Detect every toggler once and wait for the results. `auto_on` togglers
    /// found off are shown as off and left alone.
    pub async fn refresh(&self) {
        let restarts = self.ctx.auto_restart();
        self.ctx.set_auto_restart(false);
        self.pulse();
        self.settle().await;
        self.ctx.set_auto_restart(restarts);
    }

    /// `perform` for one-shot use. A toggler's command is waited for; a launched
    /// program is only started.
    pub async fn perform_and_wait(&self, pattern: &str) -> Option<String> {
        let entry = self.search(pattern).into_iter().next()?;
        entry.perform(&self.ctx);
        match entry {
            Entry::Launcher(_) => self.ctx.executor().drained().await,
            _ => self.settle().await,
        }
        Some(entry.title().to_string())
    }

    /// Parse the entries file without touching the live tree or notifying.
    /// Returns the number of top-level entries.
    pub fn check(&self) -> Result<usize, ConfigError> {
        load_file(&self.entries_path, &self.ctx).map(|tree| tree.entries().len())
    }

    /// Pulse on a timer and follow the entries and settings files until Ctrl-C.
    pub async fn run(&mut self) -> notify::Result<()> {
        let (_watcher, events) = ConfigWatcher::start(&[
            (self.entries_path.clone(), WatchEvent::Entries),
            (self.settings_path.clone(), WatchEvent::Settings),
        ])?;

        let interrupted = tokio::signal::ctrl_c();
        tokio::pin!(interrupted);
        let mut ticker = tokio::time::interval(self.settings.detection_interval());
        log::info!(
            "Pulsing every {} ms",
            self.settings.detection_interval().as_millis()
        );

        loop {
            let step = tokio::select! {
                _ = ticker.tick() => Step::Pulse,
                event = events.recv_async() => match event {
                    Ok(first) => Step::Changed(watcher::coalesce(first, &events)),
                    Err(_) => Step::Stop,
                },
                _ = &mut interrupted => Step::Stop,
            };

            match step {
                Step::Pulse => self.pulse(),
                Step::Changed(changes) => {
                    for change in changes {
                        match change {
                            WatchEvent::Entries => {
                                let _ = self.reload_entries();
                            }
                            WatchEvent::Settings => {
                                if self.reload_settings() {
                                    ticker =
                                        tokio::time::interval(self.settings.detection_interval());
                                }
                            }
                        }
                    }
                }
                Step::Stop => {
                    log::info!("Shutting down");
                    break;
                }
            }
        }
        Ok(())
    }
}
