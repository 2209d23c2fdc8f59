use std::fs;
use std::path::Path;
use std::rc::Rc;

use serde_json::Value;

use crate::backend::search;
use crate::backend::state_cache::StateCache;
use crate::context::ExecutionContext;
use crate::error::ConfigError;
use crate::model::{
    resolve_env, BuiltinKind, Entry, LauncherEntry, MenuItem, SeparatorEntry, SubMenuEntry,
    TogglerEntry, TypeRegistry,
};

/// The entries of one successfully loaded document.
#[derive(Debug)]
pub struct EntryTree {
    entries: Vec<Entry>,
    generation: u64,
}

impl EntryTree {
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut [Entry] {
        &mut self.entries
    }

    /// Load generation this tree was built in.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn pulse(&self, ctx: &Rc<ExecutionContext>) {
        for entry in &self.entries {
            entry.pulse(ctx);
        }
    }

    pub fn search(&self, pattern: &str) -> Vec<&Entry> {
        search::search(&self.entries, pattern)
    }

    pub fn materialize(&self) -> Vec<MenuItem> {
        self.entries.iter().map(Entry::materialize).collect()
    }
}

pub fn load_file(path: &Path, ctx: &ExecutionContext) -> Result<EntryTree, ConfigError> {
    let source = fs::read_to_string(path)?;
    load_config(&source, ctx)
}

/// Parse an entries document and build its tree.
///
/// The document gets a fresh registry; it becomes the live one only once every
/// entry has been built, so a failure leaves the context as it was.
pub fn load_config(source: &str, ctx: &ExecutionContext) -> Result<EntryTree, ConfigError> {
    let root: Value = serde_json::from_str(source)?;
    let root = root.as_object().ok_or_else(|| ConfigError::InvalidField {
        key: "<root>".to_string(),
        expected: "an object",
    })?;

    let entries = root
        .get("entries")
        .ok_or_else(|| ConfigError::MissingKey("entries".to_string()))?;
    let entries = as_entry_list(entries, "entries")?;

    let mut registry = TypeRegistry::with_builtins();
    if let Some(deftype) = root.get("deftype") {
        let defs = deftype.as_object().ok_or_else(|| ConfigError::InvalidField {
            key: "deftype".to_string(),
            expected: "an object",
        })?;
        for (name, template) in defs {
            registry.define(name, template)?;
        }
    }

    let built = entries
        .iter()
        .map(|value| create_entry(value, &registry, ctx.cache()))
        .collect::<Result<Vec<_>, _>>()?;

    let generation = ctx.install_registry(registry);
    log::info!("Loaded {} entries (load {})", built.len(), generation);

    Ok(EntryTree {
        entries: built,
        generation,
    })
}

/// Build one entry (and, for submenus, its children) from its properties.
pub fn create_entry(
    value: &Value,
    registry: &TypeRegistry,
    cache: &StateCache,
) -> Result<Entry, ConfigError> {
    let props = value.as_object().ok_or_else(|| ConfigError::InvalidField {
        key: "entries[]".to_string(),
        expected: "an object",
    })?;

    let resolved = registry.resolve(props)?;
    let env = resolve_env(&resolved.props, &resolved.env_vars);

    let entry = match resolved.kind {
        BuiltinKind::Launcher => {
            Entry::Launcher(LauncherEntry::from_props(resolved.type_name, &resolved.props, env))
        }
        BuiltinKind::Toggler => Entry::Toggler(TogglerEntry::from_props(
            resolved.type_name,
            &resolved.props,
            env,
            cache,
        )),
        BuiltinKind::SubMenu => {
            let children = match resolved.props.get("entries") {
                Some(list) => as_entry_list(list, "entries")?
                    .iter()
                    .map(|child| create_entry(child, registry, cache))
                    .collect::<Result<Vec<_>, _>>()?,
                None => Vec::new(),
            };
            Entry::SubMenu(SubMenuEntry::from_props(
                resolved.type_name,
                &resolved.props,
                children,
            ))
        }
        BuiltinKind::Separator => Entry::Separator(SeparatorEntry::new(resolved.type_name)),
    };
    Ok(entry)
}

fn as_entry_list<'a>(value: &'a Value, key: &str) -> Result<&'a Vec<Value>, ConfigError> {
    value.as_array().ok_or_else(|| ConfigError::InvalidField {
        key: key.to_string(),
        expected: "an array",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::executor::Executor;
    use crate::backend::notifier::tests::RecordingNotifier;
    use crate::model::ItemKind;

    fn context() -> Rc<ExecutionContext> {
        ExecutionContext::new(
            Executor::new(std::time::Duration::from_millis(2)),
            Rc::new(RecordingNotifier::default()),
        )
    }

    const DOC: &str = r#"{
        "deftype": {
            "echoer": { "base": "toggler", "vars": ["unit"], "command_on": "echo ${unit}" }
        },
        "entries": [
            { "type": "launcher", "title": "Terminal", "command": "xterm" },
            { "type": "separator" },
            { "type": "submenu", "title": "Services", "entries": [
                { "type": "systemd", "title": "SSH", "unit": "sshd" },
                { "type": "echoer", "title": "Echo", "unit": "foo" }
            ]},
            { "type": "toggler", "title": "Bare" }
        ]
    }"#;

    #[test]
    fn builds_every_variant() {
        let ctx = context();
        let tree = load_config(DOC, &ctx).unwrap();
        let kinds: Vec<ItemKind> = tree.materialize().iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![ItemKind::Launcher, ItemKind::Separator, ItemKind::SubMenu, ItemKind::Toggler]
        );

        let services = tree.entries()[2].children().unwrap();
        assert_eq!(services.len(), 2);
        match &services[1] {
            Entry::Toggler(t) => {
                assert_eq!(t.switch().command_on, "echo foo");
                assert_eq!(t.switch().env, vec![("unit".to_string(), "foo".to_string())]);
            }
            other => panic!("expected toggler, got {:?}", other),
        }
        match &tree.entries()[3] {
            Entry::Toggler(t) => {
                assert_eq!(t.switch().detector, "");
                assert!(!t.switch().auto_on);
            }
            other => panic!("expected toggler, got {:?}", other),
        }
        assert!(ctx.registry().contains("echoer"));
        assert_eq!(tree.generation(), 1);
    }

    #[test]
    fn missing_entries_key_is_fatal() {
        let ctx = context();
        let err = load_config(r#"{ "deftype": {} }"#, &ctx).unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey(key) if key == "entries"));
        assert_eq!(ctx.generation(), 0);
    }

    #[test]
    fn failed_load_keeps_previous_registry() {
        let ctx = context();
        load_config(DOC, &ctx).unwrap();

        let dup = r#"{
            "deftype": {
                "mine": { "base": "launcher" },
                "toggler": { "base": "launcher" }
            },
            "entries": []
        }"#;
        let err = load_config(dup, &ctx).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateType(name) if name == "toggler"));
        assert!(ctx.registry().contains("echoer"));
        assert!(!ctx.registry().contains("mine"));
        assert_eq!(ctx.generation(), 1);
    }

    #[test]
    fn nested_derivation_fails_the_load() {
        let ctx = context();
        let doc = r#"{
            "deftype": { "ssh": { "base": "systemd", "unit": "sshd" } },
            "entries": [ { "type": "submenu", "entries": [ { "type": "ssh" } ] } ]
        }"#;
        assert!(matches!(
            load_config(doc, &ctx),
            Err(ConfigError::NestedDerivation { .. })
        ));
    }

    #[test]
    fn unknown_type_deep_in_a_submenu() {
        let ctx = context();
        let doc = r#"{ "entries": [ { "type": "submenu", "entries": [ { "type": "rocket" } ] } ] }"#;
        assert!(matches!(
            load_config(doc, &ctx),
            Err(ConfigError::UnknownType(name)) if name == "rocket"
        ));
    }

    #[test]
    fn malformed_documents() {
        let ctx = context();
        assert!(matches!(load_config("{", &ctx), Err(ConfigError::Parse(_))));
        assert!(matches!(
            load_config(r#"{ "entries": {} }"#, &ctx),
            Err(ConfigError::InvalidField { .. })
        ));
        assert!(matches!(
            load_config(r#"{ "entries": [ 3 ] }"#, &ctx),
            Err(ConfigError::InvalidField { .. })
        ));
    }

    #[test]
    fn reloading_the_same_document_is_idempotent() {
        let ctx = context();
        let first = load_config(DOC, &ctx).unwrap().materialize();
        let second = load_config(DOC, &ctx).unwrap().materialize();
        assert_eq!(first, second);
        assert_eq!(ctx.generation(), 2);
    }

    #[test]
    fn search_skips_containers_and_separators() {
        let ctx = context();
        let tree = load_config(DOC, &ctx).unwrap();
        assert!(tree.search("").is_empty());

        let titles: Vec<&str> = tree.search("s").iter().map(|e| e.title()).collect();
        assert_eq!(titles, vec!["SSH"]);

        let titles: Vec<&str> = tree.search("e").iter().map(|e| e.title()).collect();
        assert_eq!(titles, vec!["Terminal", "Echo", "Bare"]);
    }
}
