use std::collections::HashMap;
use std::rc::Rc;

use once_cell::sync::Lazy;
use serde_json::{json, Value};

use super::props::{prop_strings, Props};
use super::template;
use crate::error::ConfigError;

/// Derived types every load starts with, on top of the built-in variants.
static PREDEFINED: Lazy<Value> = Lazy::new(|| {
    json!({
        "systemd": {
            "base": "toggler",
            "vars": ["unit"],
            "command_on": "pkexec systemctl start ${unit}",
            "command_off": "pkexec systemctl stop ${unit}",
            "detector": "systemctl status --no-pager ${unit} | grep \"Active: active\""
        },
        "tmux": {
            "base": "toggler",
            "vars": ["session", "command"],
            "command_on": "tmux new -d -s ${session} sh -c \"${command}\"",
            "command_off": "tmux kill-session -t ${session}",
            "detector": "tmux ls 2>/dev/null | grep \"^${session}:\""
        }
    })
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinKind {
    Launcher,
    Toggler,
    SubMenu,
    Separator,
}

impl BuiltinKind {
    pub const ALL: [BuiltinKind; 4] = [
        BuiltinKind::Launcher,
        BuiltinKind::Toggler,
        BuiltinKind::SubMenu,
        BuiltinKind::Separator,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BuiltinKind::Launcher => "launcher",
            BuiltinKind::Toggler => "toggler",
            BuiltinKind::SubMenu => "submenu",
            BuiltinKind::Separator => "separator",
        }
    }
}

/// A `deftype` template: a built-in base plus properties that may contain `${var}` tokens.
#[derive(Debug, Clone)]
pub struct DerivedType {
    pub name: String,
    pub base: String,
    pub vars: Vec<String>,
    pub template: Props,
}

impl DerivedType {
    pub fn from_value(name: &str, value: &Value) -> Result<Self, ConfigError> {
        let object = value.as_object().ok_or_else(|| ConfigError::InvalidField {
            key: format!("deftype.{}", name),
            expected: "an object",
        })?;

        let base = match object.get("base") {
            Some(Value::String(base)) => base.clone(),
            other => {
                return Err(ConfigError::InvalidBase {
                    name: name.to_string(),
                    base: other.map(|v| v.to_string()).unwrap_or_default(),
                })
            }
        };

        if matches!(object.get("vars"), Some(v) if !v.is_array()) {
            return Err(ConfigError::InvalidField {
                key: format!("deftype.{}.vars", name),
                expected: "an array of strings",
            });
        }
        let vars = prop_strings(object, "vars");

        let template = object
            .iter()
            .filter(|(key, _)| key.as_str() != "base" && key.as_str() != "vars")
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(Self {
            name: name.to_string(),
            base,
            vars,
            template,
        })
    }

    /// Merge the template over the caller's properties. Template keys win; string
    /// template values get their `${var}` tokens filled from the caller's properties.
    pub fn instantiate(&self, caller: &Props) -> Props {
        let mut props = caller.clone();
        for (key, value) in &self.template {
            let value = match value {
                Value::String(text) => Value::String(template::substitute(text, &self.vars, caller)),
                other => other.clone(),
            };
            props.insert(key.clone(), value);
        }
        props
    }
}

#[derive(Debug, Clone)]
pub enum TypeDef {
    Builtin(BuiltinKind),
    Derived(Rc<DerivedType>),
}

/// What `TypeRegistry::resolve` hands to the entry constructors.
#[derive(Debug)]
pub struct Resolved {
    pub kind: BuiltinKind,
    pub type_name: String,
    pub props: Props,
    pub env_vars: Vec<String>,
}

/// Type name -> constructor or template. Rebuilt from scratch for every load.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: HashMap<String, TypeDef>,
}

impl TypeRegistry {
    /// The four built-in variants plus the predefined `systemd` and `tmux` types.
    pub fn with_builtins() -> Self {
        let mut registry = Self {
            types: HashMap::new(),
        };
        for kind in BuiltinKind::ALL {
            registry
                .types
                .insert(kind.name().to_string(), TypeDef::Builtin(kind));
        }
        if let Some(predefined) = PREDEFINED.as_object() {
            for (name, template) in predefined {
                if let Err(e) = registry.define(name, template) {
                    log::error!("Predefined type '{}' is broken: {}", name, e);
                }
            }
        }
        registry
    }

    pub fn define(&mut self, name: &str, template: &Value) -> Result<(), ConfigError> {
        if self.types.contains_key(name) {
            return Err(ConfigError::DuplicateType(name.to_string()));
        }
        let derived = DerivedType::from_value(name, template)?;
        self.types
            .insert(name.to_string(), TypeDef::Derived(Rc::new(derived)));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.types.keys().cloned().collect();
        names.sort();
        names
    }

    /// Look up `props["type"]` and, for derived types, expand the template.
    pub fn resolve(&self, props: &Props) -> Result<Resolved, ConfigError> {
        let type_name = match props.get("type") {
            Some(Value::String(name)) => name.clone(),
            Some(_) => {
                return Err(ConfigError::InvalidField {
                    key: "type".to_string(),
                    expected: "a string",
                })
            }
            None => return Err(ConfigError::MissingKey("type".to_string())),
        };

        match self.types.get(&type_name) {
            None => Err(ConfigError::UnknownType(type_name)),
            Some(TypeDef::Builtin(kind)) => Ok(Resolved {
                kind: *kind,
                env_vars: prop_strings(props, "env_vars"),
                props: props.clone(),
                type_name,
            }),
            Some(TypeDef::Derived(derived)) => match self.types.get(&derived.base) {
                Some(TypeDef::Builtin(kind)) => Ok(Resolved {
                    kind: *kind,
                    props: derived.instantiate(props),
                    env_vars: derived.vars.clone(),
                    type_name,
                }),
                Some(TypeDef::Derived(_)) => Err(ConfigError::NestedDerivation {
                    name: type_name,
                    base: derived.base.clone(),
                }),
                None => Err(ConfigError::InvalidBase {
                    name: type_name,
                    base: derived.base.clone(),
                }),
            },
        }
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(value: Value) -> Props {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn starts_with_builtins_and_predefined_types() {
        let registry = TypeRegistry::with_builtins();
        assert_eq!(
            registry.names(),
            vec!["launcher", "separator", "submenu", "systemd", "tmux", "toggler"]
        );
    }

    #[test]
    fn derived_template_wins_and_substitutes() {
        let mut registry = TypeRegistry::with_builtins();
        registry
            .define(
                "echoer",
                &json!({ "base": "toggler", "vars": ["unit"], "command_on": "echo ${unit}" }),
            )
            .unwrap();

        let resolved = registry
            .resolve(&props(json!({ "type": "echoer", "unit": "foo", "command_on": "ignored" })))
            .unwrap();
        assert_eq!(resolved.kind, BuiltinKind::Toggler);
        assert_eq!(resolved.type_name, "echoer");
        assert_eq!(resolved.props["command_on"], json!("echo foo"));
        assert_eq!(resolved.env_vars, vec!["unit".to_string()]);
    }

    #[test]
    fn builtin_names_cannot_be_redefined() {
        let mut registry = TypeRegistry::with_builtins();
        let err = registry
            .define("launcher", &json!({ "base": "toggler" }))
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateType(name) if name == "launcher"));

        let err = registry.define("tmux", &json!({ "base": "toggler" })).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateType(_)));
    }

    #[test]
    fn deriving_from_a_derived_type_is_rejected_on_use() {
        let mut registry = TypeRegistry::with_builtins();
        registry
            .define("my-unit", &json!({ "base": "systemd", "unit": "sshd" }))
            .unwrap();
        let err = registry
            .resolve(&props(json!({ "type": "my-unit" })))
            .unwrap_err();
        assert!(matches!(err, ConfigError::NestedDerivation { ref base, .. } if base == "systemd"));
    }

    #[test]
    fn base_must_exist_and_be_a_string() {
        let mut registry = TypeRegistry::with_builtins();
        let err = registry.define("nobase", &json!({ "vars": [] })).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBase { .. }));

        registry.define("ghost", &json!({ "base": "nothing" })).unwrap();
        let err = registry.resolve(&props(json!({ "type": "ghost" }))).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBase { ref base, .. } if base == "nothing"));
    }

    #[test]
    fn unknown_and_missing_types() {
        let registry = TypeRegistry::with_builtins();
        assert!(matches!(
            registry.resolve(&props(json!({ "type": "rocket" }))),
            Err(ConfigError::UnknownType(name)) if name == "rocket"
        ));
        assert!(matches!(
            registry.resolve(&props(json!({ "title": "x" }))),
            Err(ConfigError::MissingKey(key)) if key == "type"
        ));
    }

    #[test]
    fn systemd_type_expands_unit() {
        let registry = TypeRegistry::with_builtins();
        let resolved = registry
            .resolve(&props(json!({ "type": "systemd", "title": "SSH", "unit": "sshd" })))
            .unwrap();
        assert_eq!(resolved.props["command_on"], json!("pkexec systemctl start sshd"));
        assert_eq!(resolved.props["title"], json!("SSH"));
    }
}
