use serde::Serialize;
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Launcher,
    Toggler,
    SubMenu,
    Separator,
}

/// Presentation-neutral snapshot of an entry, handed to whatever draws the menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuItem {
    pub kind: ItemKind,
    pub type_name: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toggled: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<MenuItem>,
}

impl MenuItem {
    /// Indented plain-text rendering used by the `list` command.
    pub fn render(items: &[MenuItem]) -> String {
        let mut out = String::new();
        for item in items {
            item.render_into(&mut out, 0);
        }
        out
    }

    fn render_into(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        let _ = match (self.kind, self.toggled) {
            (ItemKind::Separator, _) => writeln!(out, "{}----", indent),
            (ItemKind::SubMenu, _) => writeln!(out, "{}{} >", indent, self.title),
            (_, Some(true)) => writeln!(out, "{}[on]  {}", indent, self.title),
            (_, Some(false)) => writeln!(out, "{}[off] {}", indent, self.title),
            (_, None) => writeln!(out, "{}{}", indent, self.title),
        };
        for child in &self.children {
            child.render_into(out, depth + 1);
        }
    }
}
