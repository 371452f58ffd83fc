//! Domain model: typed Sisu payloads, the normalized course entity, the
//! resolved hierarchy, and the recursive resolver that builds it.

mod course;
mod node;
mod resolver;
pub mod rule;

pub use course::Course;
pub use node::{GROUPING_KIND, Module, Node, compress};
pub use resolver::{ResolveError, Resolver};
pub use rule::{
    CourseUnitRecord, DegreeProgramme, LocalizedText, ModuleGroupVariant, PrerequisiteGroup,
    PrerequisiteItem, Rule,
};
