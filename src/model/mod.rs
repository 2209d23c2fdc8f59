mod entry;
mod menu_item;
mod props;
mod registry;
mod template;

pub use entry::{
    resolve_env, Entry, LauncherEntry, NotifyWhen, SeparatorEntry, SubMenuEntry, Switch,
    TogglerEntry,
};
pub use menu_item::{ItemKind, MenuItem};
pub use props::{prop_bool, prop_string, prop_strings, Props};
pub use registry::{BuiltinKind, DerivedType, Resolved, TypeDef, TypeRegistry};
pub use template::substitute;
