//! Script instance tree
//!
//! Assembles a hierarchical node tree from flat (logical path, source) pairs.
//! The tree is strictly owned: children are unique by name within a parent and
//! carry no back references.

use serde::{Deserialize, Serialize};

/// A node in the script tree
///
/// The root node has an empty name and no source. Intermediate nodes created
/// while inserting a deeper path carry no source until a script is inserted
/// at their own path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScriptInstance {
    /// Name of the script.
    pub name: String,

    /// Source of the script.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Children of the script, unique by name.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ScriptInstance>,
}

impl ScriptInstance {
    pub fn new(name: impl Into<String>) -> Self {
        ScriptInstance {
            name: name.into(),
            source: None,
            children: Vec::new(),
        }
    }

    /// The root of an empty tree.
    pub fn root() -> Self {
        ScriptInstance::default()
    }

    /// Insert a script source at a slash-delimited path below this node,
    /// creating intermediate children as needed.
    ///
    /// Inserting `A/B/C` and later `A/B` leaves node `B` with both a source
    /// and the child `C`.
    pub fn add_script(&mut self, path: &str, source: &str) {
        match path.split_once('/') {
            Some((name, remainder)) => self.child_mut(name).add_script(remainder, source),
            None => self.child_mut(path).source = Some(source.to_string()),
        }
    }

    /// Look up a child by exact name.
    pub fn child(&self, name: &str) -> Option<&ScriptInstance> {
        self.children.iter().find(|child| child.name == name)
    }

    /// Look up a child by name, creating it if absent.
    fn child_mut(&mut self, name: &str) -> &mut ScriptInstance {
        let index = match self.children.iter().position(|child| child.name == name) {
            Some(index) => index,
            None => {
                self.children.push(ScriptInstance::new(name));
                self.children.len() - 1
            }
        };
        &mut self.children[index]
    }
}
