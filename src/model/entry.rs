use std::cell::Cell;
use std::rc::Rc;

use serde_json::Value;

use super::menu_item::{ItemKind, MenuItem};
use super::props::{prop_bool, prop_string, Props};
use crate::backend::executor::Env;
use crate::backend::state_cache::{self, Fingerprint, StateCache};
use crate::context::ExecutionContext;

/// Which detected transitions deserve a notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotifyWhen {
    pub on: bool,
    pub off: bool,
}

impl NotifyWhen {
    pub fn from_props(props: &Props) -> Self {
        let mut when = Self::default();
        match props.get("notify_when") {
            None | Some(Value::Null) => {}
            Some(Value::Array(items)) => {
                for item in items {
                    match item.as_str() {
                        Some("on") => when.on = true,
                        Some("off") => when.off = true,
                        _ => log::warn!("Ignoring unknown notify_when value {}", item),
                    }
                }
            }
            Some(other) => log::warn!("notify_when must be an array, got {}", other),
        }
        when
    }

    pub fn wants(self, state: bool) -> bool {
        if state {
            self.on
        } else {
            self.off
        }
    }
}

/// Resolve the `envVars` names against the instance properties.
pub fn resolve_env(props: &Props, vars: &[String]) -> Env {
    vars.iter()
        .map(|name| (name.clone(), prop_string(props, name)))
        .collect()
}

#[derive(Debug)]
pub struct LauncherEntry {
    type_name: String,
    title: String,
    pub command: String,
    pub env: Env,
}

impl LauncherEntry {
    pub fn from_props(type_name: String, props: &Props, env: Env) -> Self {
        Self {
            type_name,
            title: prop_string(props, "title"),
            command: prop_string(props, "command"),
            env,
        }
    }
}

/// Configuration and runtime state of a toggler, shared with in-flight detections.
#[derive(Debug)]
pub struct Switch {
    pub command_on: String,
    pub command_off: String,
    pub detector: String,
    pub env: Env,
    pub auto_on: bool,
    pub notify_when: NotifyWhen,
    fingerprint: Fingerprint,
    displayed: Cell<bool>,
    manually_off: Cell<bool>,
}

impl Switch {
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// The state currently shown to the user.
    pub fn is_on(&self) -> bool {
        self.displayed.get()
    }

    pub fn set_displayed(&self, on: bool) {
        self.displayed.set(on);
    }

    pub fn manually_switched_off(&self) -> bool {
        self.manually_off.get()
    }

    /// No detector: never refreshed, never restarted.
    pub fn is_inert(&self) -> bool {
        self.detector.trim().is_empty()
    }

    /// Programmatic toggle: run the matching command, touch no state.
    pub fn switch_to(&self, ctx: &ExecutionContext, title: &str, on: bool) {
        let command = if on { &self.command_on } else { &self.command_off };
        if command.trim().is_empty() {
            log::debug!("'{}' has no command to turn {}", title, on_off(on));
            return;
        }
        log::info!("Turning '{}' {}", title, on_off(on));
        ctx.general_spawn(command, self.env.clone(), title);
    }

    /// User toggle: flip the displayed state, remember whether the user turned it
    /// off, then run the command.
    pub fn toggle_manually(&self, ctx: &ExecutionContext, title: &str) {
        let on = !self.displayed.get();
        self.displayed.set(on);
        self.manually_off.set(!on);
        self.switch_to(ctx, title, on);
    }
}

#[derive(Debug)]
pub struct TogglerEntry {
    type_name: String,
    title: String,
    switch: Rc<Switch>,
}

impl TogglerEntry {
    /// The displayed state starts from the cache so a reload does not flash "off".
    pub fn from_props(type_name: String, props: &Props, env: Env, cache: &StateCache) -> Self {
        let detector = prop_string(props, "detector");
        let fingerprint = Fingerprint::new(env.clone(), detector.clone());
        let displayed = cache.get(&fingerprint).unwrap_or(false);

        Self {
            type_name,
            title: prop_string(props, "title"),
            switch: Rc::new(Switch {
                command_on: prop_string(props, "command_on"),
                command_off: prop_string(props, "command_off"),
                detector,
                env,
                auto_on: prop_bool(props, "auto_on"),
                notify_when: NotifyWhen::from_props(props),
                fingerprint,
                displayed: Cell::new(displayed),
                manually_off: Cell::new(false),
            }),
        }
    }

    pub fn switch(&self) -> &Rc<Switch> {
        &self.switch
    }

    pub fn is_on(&self) -> bool {
        self.switch.is_on()
    }
}

#[derive(Debug)]
pub struct SubMenuEntry {
    type_name: String,
    title: String,
    pub entries: Vec<Entry>,
}

impl SubMenuEntry {
    pub fn from_props(type_name: String, props: &Props, entries: Vec<Entry>) -> Self {
        Self {
            type_name,
            title: prop_string(props, "title"),
            entries,
        }
    }
}

#[derive(Debug)]
pub struct SeparatorEntry {
    type_name: String,
}

impl SeparatorEntry {
    pub fn new(type_name: String) -> Self {
        Self { type_name }
    }
}

/// A node of the menu tree.
#[derive(Debug)]
pub enum Entry {
    Launcher(LauncherEntry),
    Toggler(TogglerEntry),
    SubMenu(SubMenuEntry),
    Separator(SeparatorEntry),
}

impl Entry {
    pub fn type_name(&self) -> &str {
        match self {
            Entry::Launcher(e) => &e.type_name,
            Entry::Toggler(e) => &e.type_name,
            Entry::SubMenu(e) => &e.type_name,
            Entry::Separator(e) => &e.type_name,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Entry::Launcher(e) => &e.title,
            Entry::Toggler(e) => &e.title,
            Entry::SubMenu(e) => &e.title,
            Entry::Separator(_) => "",
        }
    }

    pub fn set_title(&mut self, text: &str) {
        match self {
            Entry::Launcher(e) => e.title = text.to_string(),
            Entry::Toggler(e) => e.title = text.to_string(),
            Entry::SubMenu(e) => e.title = text.to_string(),
            Entry::Separator(_) => {}
        }
    }

    pub fn children(&self) -> Option<&[Entry]> {
        match self {
            Entry::SubMenu(menu) => Some(&menu.entries),
            _ => None,
        }
    }

    pub fn is_performable(&self) -> bool {
        matches!(self, Entry::Launcher(_) | Entry::Toggler(_))
    }

    pub fn pulse(&self, ctx: &Rc<ExecutionContext>) {
        match self {
            Entry::SubMenu(menu) => {
                for child in &menu.entries {
                    child.pulse(ctx);
                }
            }
            Entry::Toggler(toggler) => state_cache::detect(&toggler.title, &toggler.switch, ctx),
            Entry::Launcher(_) | Entry::Separator(_) => {}
        }
    }

    pub fn perform(&self, ctx: &ExecutionContext) {
        match self {
            Entry::Launcher(launcher) => {
                if launcher.command.trim().is_empty() {
                    log::debug!("Launcher '{}' has no command", launcher.title);
                    return;
                }
                log::info!("Launching '{}'", launcher.title);
                ctx.general_spawn(&launcher.command, launcher.env.clone(), &launcher.title);
            }
            Entry::Toggler(toggler) => toggler.switch.toggle_manually(ctx, &toggler.title),
            Entry::SubMenu(_) | Entry::Separator(_) => {
                log::debug!("Entry of type '{}' cannot be performed", self.type_name());
            }
        }
    }

    pub fn materialize(&self) -> MenuItem {
        let (kind, toggled, children) = match self {
            Entry::Launcher(_) => (ItemKind::Launcher, None, Vec::new()),
            Entry::Toggler(toggler) => (ItemKind::Toggler, Some(toggler.is_on()), Vec::new()),
            Entry::SubMenu(menu) => (
                ItemKind::SubMenu,
                None,
                menu.entries.iter().map(Entry::materialize).collect(),
            ),
            Entry::Separator(_) => (ItemKind::Separator, None, Vec::new()),
        };
        MenuItem {
            kind,
            type_name: self.type_name().to_string(),
            title: self.title().to_string(),
            toggled,
            children,
        }
    }
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: Value) -> Props {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn notify_when_parses_known_directions() {
        let when = NotifyWhen::from_props(&props(json!({ "notify_when": ["on", "bogus"] })));
        assert!(when.wants(true));
        assert!(!when.wants(false));
        assert_eq!(NotifyWhen::from_props(&props(json!({}))), NotifyWhen::default());
    }

    #[test]
    fn toggler_defaults_for_omitted_fields() {
        let cache = StateCache::default();
        let entry = TogglerEntry::from_props("toggler".into(), &props(json!({})), Vec::new(), &cache);
        let switch = entry.switch();
        assert_eq!(switch.command_on, "");
        assert_eq!(switch.command_off, "");
        assert!(switch.is_inert());
        assert!(!switch.auto_on);
        assert!(!entry.is_on());
        assert!(!switch.manually_switched_off());
    }

    #[test]
    fn toggler_seeds_display_from_cache() {
        let cache = StateCache::default();
        let env = vec![("unit".to_string(), "sshd".to_string())];
        cache.observe(&Fingerprint::new(env.clone(), "probe".into()), true);

        let entry = TogglerEntry::from_props(
            "systemd".into(),
            &props(json!({ "detector": "probe" })),
            env,
            &cache,
        );
        assert!(entry.is_on());
    }

    #[test]
    fn separator_ignores_titles() {
        let mut entry = Entry::Separator(SeparatorEntry::new("separator".into()));
        entry.set_title("ignored");
        assert_eq!(entry.title(), "");
        assert!(!entry.is_performable());
        assert!(entry.children().is_none());
    }

    #[test]
    fn materialize_reports_toggle_state() {
        let cache = StateCache::default();
        let entry = Entry::Toggler(TogglerEntry::from_props(
            "toggler".into(),
            &props(json!({ "title": "VPN", "detector": "x" })),
            Vec::new(),
            &cache,
        ));
        let item = entry.materialize();
        assert_eq!(item.kind, ItemKind::Toggler);
        assert_eq!(item.title, "VPN");
        assert_eq!(item.toggled, Some(false));
    }
}
