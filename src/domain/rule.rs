//! Typed models of the Sisu API payloads.
//!
//! Rule kinds are modelled as an explicit tagged enum so the recursive parser
//! dispatches once on the variant instead of sniffing for field presence.

use std::collections::BTreeMap;

use serde::Deserialize;

/// Text localized per locale code (`"fi"`, `"en"`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LocalizedText(BTreeMap<String, String>);

impl LocalizedText {
    /// The Finnish text, falling back to English. `None` when neither locale
    /// is present.
    #[must_use]
    pub fn preferred(&self) -> Option<&str> {
        self.0
            .get("fi")
            .or_else(|| self.0.get("en"))
            .map(String::as_str)
    }
}

/// A requirement rule in the Sisu curriculum data.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum Rule {
    /// A credit-threshold wrapper around a single child rule. The credit
    /// amounts are irrelevant to the graph and are not modelled.
    CreditsRule {
        /// The wrapped rule.
        rule: Box<Rule>,
    },

    /// An ordered collection of sub-rules.
    CompositeRule {
        /// The sub-rules.
        #[serde(default)]
        rules: Vec<Rule>,

        /// Freeform description, used to label anonymous groupings.
        #[serde(default)]
        description: Option<LocalizedText>,

        /// Whether every sub-rule is mandatory.
        #[serde(default, rename = "allMandatory")]
        all_mandatory: Option<bool>,
    },

    /// A reference to a module group.
    ModuleRule {
        /// The referenced module group id.
        #[serde(rename = "moduleGroupId")]
        module_group_id: String,
    },

    /// A reference to a single course-unit group.
    CourseUnitRule {
        /// The referenced course-unit group id.
        #[serde(rename = "courseUnitGroupId")]
        course_unit_group_id: String,
    },

    /// Any rule kind this tool does not understand. Skipped with a warning.
    #[serde(other)]
    Unknown,
}

/// One typed entry in a prerequisite group.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrerequisiteItem {
    /// The prerequisite kind, e.g. `"CourseUnit"`. Other kinds cannot be
    /// represented as graph edges.
    #[serde(rename = "type")]
    pub kind: String,

    /// The course-unit group this prerequisite points at, when `kind` is
    /// `"CourseUnit"`.
    #[serde(default)]
    pub course_unit_group_id: Option<String>,
}

/// One alternative group of prerequisites for a course.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrerequisiteGroup {
    /// The individual prerequisite items.
    #[serde(default)]
    pub prerequisites: Vec<PrerequisiteItem>,
}

/// One curriculum-period variant of a course unit.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseUnitRecord {
    /// The curriculum periods this variant is valid for. Empty means valid
    /// for every period.
    #[serde(default)]
    pub curriculum_period_ids: Vec<String>,

    /// The dotted course code, e.g. `"COMP.CS.100"`.
    pub code: String,

    /// The localized course name.
    pub name: LocalizedText,

    /// Recommended formal prerequisites.
    #[serde(default)]
    pub recommended_formal_prerequisites: Vec<PrerequisiteGroup>,

    /// Compulsory formal prerequisites.
    #[serde(default)]
    pub compulsory_formal_prerequisites: Vec<PrerequisiteGroup>,
}

/// One curriculum-period variant of a module group.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleGroupVariant {
    /// The curriculum periods this variant is valid for. Empty means valid
    /// for every period.
    #[serde(default)]
    pub curriculum_period_ids: Vec<String>,

    /// The localized module name.
    pub name: LocalizedText,

    /// The module kind, e.g. `"StudyModule"`.
    #[serde(rename = "type")]
    pub kind: String,

    /// The rule tree describing the module contents.
    pub rule: Rule,
}

/// A degree programme document.
#[derive(Debug, Clone, Deserialize)]
pub struct DegreeProgramme {
    /// The localized programme name.
    #[serde(default)]
    pub name: Option<LocalizedText>,

    /// The top-level rule tree.
    pub rule: Rule,
}

impl DegreeProgramme {
    /// The module groups referenced under `rule.rules[0].rules`.
    ///
    /// Programme documents nest their module list two composites deep;
    /// returns `None` when the document does not have that shape.
    #[must_use]
    pub fn top_level_module_groups(&self) -> Option<Vec<&str>> {
        let Rule::CompositeRule { rules, .. } = &self.rule else {
            return None;
        };
        let Some(Rule::CompositeRule { rules: members, .. }) = rules.first() else {
            return None;
        };
        Some(
            members
                .iter()
                .filter_map(|member| match member {
                    Rule::ModuleRule { module_group_id } => Some(module_group_id.as_str()),
                    _ => None,
                })
                .collect(),
        )
    }
}
