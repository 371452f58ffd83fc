//! Recursive resolution of a degree programme into a course hierarchy.
//!
//! The [`Resolver`] is an explicit context object threaded through every
//! recursive call: it owns the course registry and the deferred prerequisite
//! work list, and borrows the API. Resolution is two-phase: phase one builds
//! the tree and records which courses have prerequisite lists awaiting
//! validation, phase two ([`Resolver::finalize_prerequisites`]) filters those
//! lists once the registry is complete.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::warn;

use super::{
    course::Course,
    node::{GROUPING_KIND, Module, Node},
    rule::{LocalizedText, PrerequisiteGroup, Rule},
};
use crate::api::{ApiError, SisuApi};

/// Errors that abort the whole run during resolution.
///
/// Most irregularities (failed fetches, unknown rule kinds, unrepresentable
/// prerequisites) degrade to warnings instead; only malformed names, API
/// layer failures and an unrecognizable programme document are fatal.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The API layer failed (cache I/O, malformed payload).
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A course record carries neither a Finnish nor an English name.
    #[error("course {id} ({code}) has no Finnish or English name")]
    MissingName {
        /// The course-unit group id.
        id: String,
        /// The course code.
        code: String,
    },

    /// A module group variant carries neither a Finnish nor an English name.
    #[error("module group {id} has no Finnish or English name")]
    MissingGroupName {
        /// The module group id.
        id: String,
    },

    /// The degree programme itself could not be fetched.
    #[error("degree programme {id} not found")]
    ProgrammeNotFound {
        /// The programme id.
        id: String,
    },

    /// The programme document does not nest its module list the way this
    /// tool expects.
    #[error("degree programme {id} has an unexpected rule shape")]
    ProgrammeShape {
        /// The programme id.
        id: String,
    },
}

/// Whether a course lookup originates from the main tree walk or from
/// prerequisite validation. Only in-tree occurrences participate in
/// key-collision suffixing and deferred-validation bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    InTree,
    OffTree,
}

/// Resolution context for one invocation: target curriculum period, course
/// registry and deferred prerequisite lists.
#[derive(Debug)]
pub struct Resolver<'a, A> {
    api: &'a A,
    curriculum: String,
    registry: BTreeMap<String, Course>,
    /// Ids of registered courses whose prerequisite lists await validation.
    pending: Vec<String>,
}

impl<'a, A: SisuApi> Resolver<'a, A> {
    /// Creates a resolver for the given curriculum period code
    /// (e.g. `"uta-lvv-2022"`).
    pub fn new(api: &'a A, curriculum: impl Into<String>) -> Self {
        Self {
            api,
            curriculum: curriculum.into(),
            registry: BTreeMap::new(),
            pending: Vec::new(),
        }
    }

    /// The registry of resolved courses, keyed by course-unit group id.
    #[must_use]
    pub fn registry(&self) -> &BTreeMap<String, Course> {
        &self.registry
    }

    /// Consumes the resolver, returning the registry.
    #[must_use]
    pub fn into_registry(self) -> BTreeMap<String, Course> {
        self.registry
    }

    /// Resolves a degree programme into its top-level modules.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::ProgrammeNotFound`] when the programme cannot
    /// be fetched, [`ResolveError::ProgrammeShape`] when its rule tree does
    /// not have the expected two-level nesting, and propagates any fatal
    /// resolution error from the recursive walk.
    pub fn resolve_programme(&mut self, programme_id: &str) -> Result<Vec<Node>, ResolveError> {
        let programme =
            self.api
                .degree_programme(programme_id)?
                .ok_or_else(|| ResolveError::ProgrammeNotFound {
                    id: programme_id.to_string(),
                })?;

        let group_ids: Vec<String> = programme
            .top_level_module_groups()
            .ok_or_else(|| ResolveError::ProgrammeShape {
                id: programme_id.to_string(),
            })?
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut top_level = Vec::new();
        for group_id in &group_ids {
            if let Some(module) = self.resolve_module_group(group_id)? {
                top_level.push(Node::Module(module));
            }
        }
        Ok(top_level)
    }

    /// Phase two of prerequisite handling: runs once after the whole tree is
    /// built and drops every prerequisite reference that does not resolve
    /// for the active curriculum (e.g. filtered out by curriculum period).
    ///
    /// Resolution here registers prerequisite-only courses, which later
    /// surface as loose nodes in the graph. Already-registered targets are
    /// left untouched.
    ///
    /// # Errors
    ///
    /// Propagates fatal resolution errors from the lookups.
    pub fn finalize_prerequisites(&mut self) -> Result<(), ResolveError> {
        let pending = std::mem::take(&mut self.pending);
        for id in pending {
            let (recommended, compulsory) = match self.registry.get(&id) {
                Some(course) => (course.recommended.clone(), course.compulsory.clone()),
                None => continue,
            };
            let recommended = self.retain_resolvable(recommended)?;
            let compulsory = self.retain_resolvable(compulsory)?;
            if let Some(course) = self.registry.get_mut(&id) {
                course.recommended = recommended;
                course.compulsory = compulsory;
            }
        }
        Ok(())
    }

    fn retain_resolvable(&mut self, ids: Vec<String>) -> Result<Vec<String>, ResolveError> {
        let mut kept = Vec::new();
        for id in ids {
            if self.resolve_course(&id, Placement::OffTree)?.is_some() {
                kept.push(id);
            }
        }
        Ok(kept)
    }

    /// Resolves a module group into a [`Module`], selecting the first
    /// variant valid for the active curriculum period. Variants with an
    /// empty period list are valid for every period. Returns `None` when no
    /// variant matches, the fetch failed, or the resolved children list is
    /// empty.
    fn resolve_module_group(&mut self, group_id: &str) -> Result<Option<Module>, ResolveError> {
        let Some(variants) = self.api.module_group(group_id)? else {
            return Ok(None);
        };

        for variant in variants {
            if !self.accepts_curriculum(&variant.curriculum_period_ids) {
                continue;
            }
            let name = variant
                .name
                .preferred()
                .ok_or_else(|| ResolveError::MissingGroupName {
                    id: group_id.to_string(),
                })?
                .to_string();
            let children = self.parse_rule(&variant.rule)?;
            if children.is_empty() {
                continue;
            }
            return Ok(Some(Module {
                name,
                kind: variant.kind,
                children,
            }));
        }
        Ok(None)
    }

    /// Recursively interprets a rule, returning the nodes it contributes.
    /// An empty result means the rule resolved to nothing and its parent
    /// should not emit a node for it.
    fn parse_rule(&mut self, rule: &Rule) -> Result<Vec<Node>, ResolveError> {
        match rule {
            // Transparent: the credit amounts carry no graph structure.
            Rule::CreditsRule { rule } => self.parse_rule(rule),

            Rule::CompositeRule { rules, .. } => {
                let mut children = Vec::new();
                for member in rules {
                    match member {
                        Rule::ModuleRule { module_group_id } => {
                            if let Some(module) = self.resolve_module_group(module_group_id)? {
                                children.push(Node::Module(module));
                            }
                        }
                        Rule::CourseUnitRule {
                            course_unit_group_id,
                        } => {
                            if let Some(course) =
                                self.resolve_course(course_unit_group_id, Placement::InTree)?
                            {
                                children.push(Node::Course(course));
                            }
                        }
                        nested => {
                            let name = grouping_name(nested);
                            let grandchildren = self.parse_rule(nested)?;
                            if !grandchildren.is_empty() {
                                children.push(Node::Module(Module {
                                    name,
                                    kind: GROUPING_KIND.to_string(),
                                    children: grandchildren,
                                }));
                            }
                        }
                    }
                }
                Ok(children)
            }

            Rule::CourseUnitRule {
                course_unit_group_id,
            } => Ok(self
                .resolve_course(course_unit_group_id, Placement::InTree)?
                .map(Node::Course)
                .into_iter()
                .collect()),

            Rule::ModuleRule { module_group_id } => Ok(self
                .resolve_module_group(module_group_id)?
                .map(Node::Module)
                .into_iter()
                .collect()),

            Rule::Unknown => {
                warn!("skipping unrecognized rule kind");
                Ok(Vec::new())
            }
        }
    }

    /// Resolves a course-unit group into a [`Course`], selecting the first
    /// record valid for the active curriculum period.
    ///
    /// In-tree resolution registers the course, enqueues its prerequisite
    /// lists for deferred validation, and suffixes the node key with `_alt`
    /// when the id was already resolved once (the same course can sit in
    /// alternative module groups; the registry slot is overwritten, which is
    /// lossy for ids appearing three or more times). Off-tree resolution
    /// returns the registered entity when present and otherwise registers
    /// without suffixing.
    fn resolve_course(
        &mut self,
        id: &str,
        placement: Placement,
    ) -> Result<Option<Course>, ResolveError> {
        if placement == Placement::OffTree {
            if let Some(existing) = self.registry.get(id) {
                return Ok(Some(existing.clone()));
            }
        }

        let Some(records) = self.api.course_units(id)? else {
            return Ok(None);
        };

        for record in records {
            if !self.accepts_curriculum(&record.curriculum_period_ids) {
                continue;
            }
            let name = record
                .name
                .preferred()
                .ok_or_else(|| ResolveError::MissingName {
                    id: id.to_string(),
                    code: record.code.clone(),
                })?
                .to_string();

            let mut key = Course::key_for(&record.code);
            if placement == Placement::InTree && self.registry.contains_key(id) {
                key.push_str("_alt");
            }

            let course = Course {
                id: id.to_string(),
                code: record.code,
                name,
                key,
                compulsory: collect_prerequisites(&record.compulsory_formal_prerequisites),
                recommended: collect_prerequisites(&record.recommended_formal_prerequisites),
            };

            if placement == Placement::InTree {
                self.pending.push(id.to_string());
            }
            self.registry.insert(id.to_string(), course.clone());
            return Ok(Some(course));
        }
        Ok(None)
    }

    fn accepts_curriculum(&self, periods: &[String]) -> bool {
        periods.is_empty() || periods.iter().any(|period| *period == self.curriculum)
    }
}

/// The display name for a grouping node synthesized from an anonymous
/// composite member: its description stripped of a wrapping paragraph tag,
/// else `"Pakolliset"` when the all-mandatory flag is set, else empty.
fn grouping_name(rule: &Rule) -> String {
    let Rule::CompositeRule {
        description,
        all_mandatory,
        ..
    } = rule
    else {
        return String::new();
    };
    if let Some(text) = description.as_ref().and_then(LocalizedText::preferred) {
        return strip_paragraph(text);
    }
    if all_mandatory.unwrap_or(false) {
        return "Pakolliset".to_string();
    }
    String::new()
}

fn strip_paragraph(text: &str) -> String {
    let text = text.trim();
    let text = text.strip_prefix("<p>").unwrap_or(text);
    let text = text.strip_suffix("</p>").unwrap_or(text);
    text.trim().to_string()
}

/// Flattens prerequisite groups into an ordered, de-duplicated id list.
/// Items that are not course units cannot be drawn as edges and are skipped
/// with a warning.
fn collect_prerequisites(groups: &[PrerequisiteGroup]) -> Vec<String> {
    let mut ids = Vec::new();
    for group in groups {
        for item in &group.prerequisites {
            if item.kind != "CourseUnit" {
                warn!(kind = %item.kind, "skipping non-course prerequisite");
                continue;
            }
            let Some(id) = &item.course_unit_group_id else {
                warn!("skipping course prerequisite without a group id");
                continue;
            };
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
    }
    ids
}
