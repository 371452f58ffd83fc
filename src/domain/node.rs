//! The resolved curriculum hierarchy and its structural compression.

use super::course::Course;

/// Type tag for grouping nodes synthesized from anonymous composite rules.
pub const GROUPING_KIND: &str = "grouping";

/// A node in the resolved curriculum hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// A module group or synthesized grouping with children.
    Module(Module),
    /// A leaf course.
    Course(Course),
}

/// A named group of modules and courses.
///
/// Invariant: a module with zero children is discarded by its parent during
/// resolution and never appears in the final tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    /// The display name, used as the cluster label.
    pub name: String,

    /// The module kind, e.g. `"StudyModule"`, or [`GROUPING_KIND`].
    pub kind: String,

    /// Child modules and courses, in rule order.
    pub children: Vec<Node>,
}

/// Collapses single-child wrapper modules in the top-level list.
///
/// Each top-level module whose only child is itself a module is replaced by
/// that child, discarding the wrapper's name and type. Deeper levels are
/// deliberately left alone; recursing would change the output shape. Each
/// slot is collapsed to a fixpoint, so running the pass twice yields no
/// further change.
pub fn compress(top_level: &mut [Node]) {
    for slot in top_level.iter_mut() {
        loop {
            let replacement = match slot {
                Node::Module(module)
                    if module.children.len() == 1
                        && matches!(module.children[0], Node::Module(_)) =>
                {
                    Some(module.children.remove(0))
                }
                _ => None,
            };
            match replacement {
                Some(child) => *slot = child,
                None => break,
            }
        }
    }
}
