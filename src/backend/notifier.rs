use std::cell::RefCell;
use std::fmt;

use notify_rust::Notification;
use serde::{Deserialize, Serialize};

const APP_NAME: &str = "Quick Toggler";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// A spawned command exited with a nonzero status.
    Proc,
    /// The controller itself, e.g. an entries file that failed to load.
    Ext,
    /// A toggler changed state.
    State,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Proc, Category::Ext, Category::State];
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Category::Proc => "proc",
            Category::Ext => "ext",
            Category::State => "state",
        })
    }
}

pub trait Notifier {
    fn notify(&self, category: Category, message: &str, details: Option<&str>);
}

/// Logs every notification and forwards the enabled categories to the desktop
/// over the freedesktop notification bus. Without a notification daemon it is log-only.
pub struct DesktopNotifier {
    enabled: RefCell<Vec<Category>>,
}

impl DesktopNotifier {
    pub fn new(enabled: Vec<Category>) -> Self {
        Self {
            enabled: RefCell::new(enabled),
        }
    }

    pub fn set_categories(&self, enabled: Vec<Category>) {
        *self.enabled.borrow_mut() = enabled;
    }

    pub fn is_enabled(&self, category: Category) -> bool {
        self.enabled.borrow().contains(&category)
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, category: Category, message: &str, details: Option<&str>) {
        let details = details.filter(|d| !d.is_empty());
        match (category, details) {
            (Category::State, _) => log::info!("[{}] {}", category, message),
            (_, Some(details)) => log::warn!("[{}] {}: {}", category, message, details),
            (_, None) => log::warn!("[{}] {}", category, message),
        }

        if !self.is_enabled(category) {
            return;
        }

        let notification = desktop_notification(message, details.unwrap_or_default());
        // show() blocks on the session bus
        std::thread::spawn(move || {
            if let Err(e) = notification.show() {
                log::debug!("Desktop notification failed, logged only: {}", e);
            }
        });
    }
}

fn desktop_notification(summary: &str, body: &str) -> Notification {
    let mut notification = Notification::new();
    notification.appname(APP_NAME).summary(summary).body(body);
    notification
}
