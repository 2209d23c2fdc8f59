pub mod executor;
pub mod loader;
pub mod notifier;
pub mod search;
pub mod state_cache;
pub mod watcher;

pub use executor::{Env, Executor, JobId, ProcOutput};
pub use loader::{load_config, load_file, EntryTree};
pub use notifier::{Category, DesktopNotifier, Notifier};
pub use state_cache::{Fingerprint, StateCache};
pub use watcher::{ConfigWatcher, WatchEvent};
