//! Graphviz DOT emission for the resolved curriculum.

use std::{
    collections::{BTreeMap, HashSet},
    fmt::Write as _,
    io,
    path::Path,
};

use crate::{
    domain::{Course, Module, Node},
    supplement::Supplement,
};

/// Rendering options for [`render`].
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Draw recommended prerequisites as dashed edges.
    pub include_recommended: bool,

    /// Graph node keys excluded from clusters and edges.
    pub blacklist: Vec<String>,
}

/// Course names are wrapped to this many columns in node labels.
const LABEL_WIDTH: usize = 20;
/// At most this many wrapped lines are kept, the last marked with an
/// ellipsis when the name was truncated.
const LABEL_MAX_LINES: usize = 3;

/// Renders the compressed hierarchy and the prerequisite edge lists into a
/// complete DOT document.
///
/// Modules become nested `cluster` subgraphs, courses become table-label
/// nodes, and prerequisite edges are drawn in three styles: compulsory
/// (plain), recommended (dashed, when enabled) and manual (dotted, from the
/// supplementary data). Registry courses that were never placed in a cluster
/// but source at least one drawn edge are collected in a `rank=source` set
/// and rendered individually.
#[must_use]
pub fn render(
    hierarchy: &[Node],
    registry: &BTreeMap<String, Course>,
    supplement: &Supplement,
    options: &RenderOptions,
) -> String {
    let blacklist: HashSet<&str> = options.blacklist.iter().map(String::as_str).collect();
    let mut emitter = Emitter {
        out: String::with_capacity(4096),
        indent: 0,
        next_cluster: 1,
        compulsory: Vec::new(),
        recommended: Vec::new(),
        placed: HashSet::new(),
        registry,
        supplement,
    };

    let _ = writeln!(emitter.out, "digraph G {{");
    let _ = writeln!(emitter.out, "rankdir=\"LR\";");

    for node in hierarchy {
        match node {
            Node::Module(module) => emitter.write_cluster(module, &blacklist),
            Node::Course(course) => {
                if !blacklist.contains(course.key.as_str()) {
                    emitter.write_course(course);
                    emitter.placed.insert(course.key.clone());
                }
            }
        }
    }

    // Edge sources are "active" even when the edge itself is skipped for a
    // blacklisted destination; only blacklisted sources are excluded from the
    // loose pass below (by their own key).
    let mut active: HashSet<String> = HashSet::new();

    let compulsory = std::mem::take(&mut emitter.compulsory);
    emitter.write_edges(&compulsory, &blacklist, None);
    active.extend(compulsory.into_iter().map(|(source, _)| source));

    if options.include_recommended {
        let recommended = std::mem::take(&mut emitter.recommended);
        emitter.write_edges(&recommended, &blacklist, Some("dashed"));
        active.extend(recommended.into_iter().map(|(source, _)| source));
    }

    let manual = supplement.manual_edges();
    if !manual.is_empty() {
        emitter.write_edges(&manual, &blacklist, Some("dotted"));
        active.extend(manual.into_iter().map(|(source, _)| source));
    }

    // Courses that only appear as prerequisite sources: a shared rank set,
    // then the nodes themselves. Their own outgoing edges are not drawn.
    let loose: Vec<&Course> = registry
        .values()
        .filter(|course| {
            !emitter.placed.contains(&course.key)
                && !blacklist.contains(course.key.as_str())
                && active.contains(&course.key)
        })
        .collect();

    let _ = write!(emitter.out, "{{ rank=source; ");
    for course in &loose {
        let _ = write!(emitter.out, "{}; ", course.key);
    }
    let _ = writeln!(emitter.out, "}}");

    for course in loose {
        emitter.write_course(course);
    }

    let _ = writeln!(emitter.out, "}}");
    emitter.out
}

/// Writes `contents` to `path` via a temporary file in the same directory,
/// renamed into place on success, so a failed run never leaves a truncated
/// artifact.
///
/// # Errors
///
/// Returns any I/O error from creating, writing or persisting the file.
pub fn write_atomic(path: &Path, contents: &str) -> io::Result<()> {
    use std::io::Write;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(contents.as_bytes())?;
    file.persist(path).map_err(|error| error.error)?;
    Ok(())
}

/// Emission state: output buffer, indentation depth, cluster counter, edge
/// accumulators and the set of keys already placed inside a cluster.
struct Emitter<'a> {
    out: String,
    indent: usize,
    next_cluster: usize,
    compulsory: Vec<(String, String)>,
    recommended: Vec<(String, String)>,
    placed: HashSet<String>,
    registry: &'a BTreeMap<String, Course>,
    supplement: &'a Supplement,
}

impl Emitter<'_> {
    fn pad(&self) -> String {
        "  ".repeat(self.indent)
    }

    fn write_cluster(&mut self, module: &Module, blacklist: &HashSet<&str>) {
        let _ = writeln!(
            self.out,
            "{}subgraph cluster_{} {{",
            self.pad(),
            self.next_cluster
        );
        self.next_cluster += 1;
        self.indent += 1;
        let _ = writeln!(self.out, "{}label = \"{}\";", self.pad(), module.name);

        for child in &module.children {
            match child {
                Node::Module(inner) => self.write_cluster(inner, blacklist),
                Node::Course(course) => {
                    if blacklist.contains(course.key.as_str()) {
                        continue;
                    }
                    self.write_course(course);
                    self.placed.insert(course.key.clone());
                }
            }
        }

        self.indent -= 1;
        let _ = writeln!(self.out, "{}}}", self.pad());
    }

    /// Writes one table-label node and accumulates the course's prerequisite
    /// edges, resolving targets through the registry so unresolved
    /// references never become edges.
    fn write_course(&mut self, course: &Course) {
        let icon = self
            .supplement
            .course_icons
            .get(&course.key)
            .map(|icon| format!(" {icon}"))
            .unwrap_or_default();
        let label = wrap_label(&course.name);

        let pad = self.pad();
        let pad1 = "  ".repeat(self.indent + 1);
        let pad2 = "  ".repeat(self.indent + 2);
        let _ = writeln!(self.out, "{pad}{} [shape=plaintext, label=<", course.key);
        let _ = writeln!(
            self.out,
            "{pad1}<TABLE BORDER=\"0\" CELLBORDER=\"1\" CELLSPACING=\"0\">"
        );
        let _ = writeln!(self.out, "{pad2}<TR><TD>{}{icon}</TD></TR>", course.code);
        let _ = writeln!(self.out, "{pad2}<TR><TD>{label}</TD></TR>");
        let _ = writeln!(self.out, "{pad1}</TABLE> > ];");

        for id in &course.compulsory {
            if let Some(target) = self.registry.get(id) {
                self.compulsory.push((target.key.clone(), course.key.clone()));
            }
        }
        for id in &course.recommended {
            if let Some(target) = self.registry.get(id) {
                self.recommended
                    .push((target.key.clone(), course.key.clone()));
            }
        }
    }

    fn write_edges(
        &mut self,
        edges: &[(String, String)],
        blacklist: &HashSet<&str>,
        style: Option<&str>,
    ) {
        let pad = self.pad();
        for (source, destination) in edges {
            if blacklist.contains(source.as_str()) || blacklist.contains(destination.as_str()) {
                continue;
            }
            match style {
                Some(style) => {
                    let _ = writeln!(
                        self.out,
                        "{pad}{source}->{destination} [style=\"{style}\"];"
                    );
                }
                None => {
                    let _ = writeln!(self.out, "{pad}{source}->{destination};");
                }
            }
        }
    }
}

/// Wraps a course name to the label width, keeping at most
/// [`LABEL_MAX_LINES`] lines with an ellipsis marker on truncation, joined
/// with `<BR/>`.
fn wrap_label(name: &str) -> String {
    let lines = textwrap::wrap(name, LABEL_WIDTH);
    let truncated = lines.len() > LABEL_MAX_LINES;
    let mut kept: Vec<String> = lines
        .into_iter()
        .take(LABEL_MAX_LINES)
        .map(|line| line.into_owned())
        .collect();
    if truncated {
        if let Some(last) = kept.last_mut() {
            last.push_str("...");
        }
    }
    kept.join("<BR/>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GROUPING_KIND;

    fn course(id: &str, code: &str, compulsory: Vec<&str>, recommended: Vec<&str>) -> Course {
        Course {
            id: id.to_string(),
            code: code.to_string(),
            name: format!("Kurssi {code}"),
            key: Course::key_for(code),
            compulsory: compulsory.into_iter().map(str::to_string).collect(),
            recommended: recommended.into_iter().map(str::to_string).collect(),
        }
    }

    fn module(name: &str, children: Vec<Node>) -> Node {
        Node::Module(Module {
            name: name.to_string(),
            kind: GROUPING_KIND.to_string(),
            children,
        })
    }

    fn registry_of(courses: &[Course]) -> BTreeMap<String, Course> {
        courses
            .iter()
            .map(|course| (course.id.clone(), course.clone()))
            .collect()
    }

    #[test]
    fn clusters_nest_and_are_labelled() {
        let a = course("c1", "A.1", vec![], vec![]);
        let hierarchy = vec![module(
            "Perusopinnot",
            vec![module("Matematiikka", vec![Node::Course(a.clone())])],
        )];
        let registry = registry_of(&[a]);

        let dot = render(
            &hierarchy,
            &registry,
            &Supplement::default(),
            &RenderOptions::default(),
        );

        assert!(dot.starts_with("digraph G {\nrankdir=\"LR\";\n"));
        assert!(dot.contains("subgraph cluster_1 {"));
        assert!(dot.contains("subgraph cluster_2 {"));
        assert!(dot.contains("label = \"Perusopinnot\";"));
        assert!(dot.contains("label = \"Matematiikka\";"));
        assert!(dot.contains("A_1 [shape=plaintext, label=<"));
        assert!(dot.ends_with("}\n"));
    }

    #[test]
    fn node_keys_are_emitted_once() {
        let a = course("c1", "A.1", vec![], vec![]);
        let b = course("c2", "B.1", vec!["c1"], vec![]);
        let hierarchy = vec![module(
            "Opinnot",
            vec![Node::Course(a.clone()), Node::Course(b.clone())],
        )];
        let registry = registry_of(&[a, b]);

        let dot = render(
            &hierarchy,
            &registry,
            &Supplement::default(),
            &RenderOptions::default(),
        );

        assert_eq!(dot.matches("A_1 [shape=plaintext").count(), 1);
        assert_eq!(dot.matches("B_1 [shape=plaintext").count(), 1);
    }

    #[test]
    fn compulsory_edges_are_plain_and_point_at_the_dependent() {
        let a = course("c1", "A.1", vec![], vec![]);
        let b = course("c2", "B.1", vec!["c1"], vec![]);
        let hierarchy = vec![module(
            "Opinnot",
            vec![Node::Course(a.clone()), Node::Course(b.clone())],
        )];
        let registry = registry_of(&[a, b]);

        let dot = render(
            &hierarchy,
            &registry,
            &Supplement::default(),
            &RenderOptions::default(),
        );

        assert!(dot.contains("A_1->B_1;"));
    }

    #[test]
    fn recommended_edges_require_the_flag() {
        let a = course("c1", "A.1", vec![], vec![]);
        let b = course("c2", "B.1", vec![], vec!["c1"]);
        let hierarchy = vec![module(
            "Opinnot",
            vec![Node::Course(a.clone()), Node::Course(b.clone())],
        )];
        let registry = registry_of(&[a, b]);

        let without = render(
            &hierarchy,
            &registry,
            &Supplement::default(),
            &RenderOptions::default(),
        );
        assert!(!without.contains("A_1->B_1"));

        let with = render(
            &hierarchy,
            &registry,
            &Supplement::default(),
            &RenderOptions {
                include_recommended: true,
                blacklist: Vec::new(),
            },
        );
        assert!(with.contains("A_1->B_1 [style=\"dashed\"];"));
    }

    #[test]
    fn unresolved_prerequisites_never_become_edges() {
        let b = course("c2", "B.1", vec!["c-unresolved"], vec![]);
        let hierarchy = vec![module("Opinnot", vec![Node::Course(b.clone())])];
        let registry = registry_of(&[b]);

        let dot = render(
            &hierarchy,
            &registry,
            &Supplement::default(),
            &RenderOptions::default(),
        );

        assert!(!dot.contains("->"));
    }

    #[test]
    fn blacklisted_courses_are_omitted_entirely() {
        let a = course("c1", "A.1", vec![], vec![]);
        let b = course("c2", "B.1", vec!["c1"], vec![]);
        let hierarchy = vec![module(
            "Opinnot",
            vec![Node::Course(a.clone()), Node::Course(b.clone())],
        )];
        let registry = registry_of(&[a, b]);

        let dot = render(
            &hierarchy,
            &registry,
            &Supplement::default(),
            &RenderOptions {
                include_recommended: false,
                blacklist: vec!["B_1".to_string()],
            },
        );

        assert!(!dot.contains("B_1 [shape=plaintext"));
        assert!(!dot.contains("A_1->B_1"));
    }

    #[test]
    fn manual_edges_are_dotted() {
        let a = course("c1", "A.1", vec![], vec![]);
        let b = course("c2", "B.1", vec![], vec![]);
        let hierarchy = vec![module(
            "Opinnot",
            vec![Node::Course(a.clone()), Node::Course(b.clone())],
        )];
        let registry = registry_of(&[a, b]);
        let supplement: Supplement = serde_json::from_str(
            r#"{"manual_prerequisites": [{"A_1": "B_1"}]}"#,
        )
        .unwrap();

        let dot = render(&hierarchy, &registry, &supplement, &RenderOptions::default());

        assert!(dot.contains("A_1->B_1 [style=\"dotted\"];"));
    }

    #[test]
    fn icon_annotation_lands_in_the_code_cell() {
        let a = course("c1", "A.1", vec![], vec![]);
        let hierarchy = vec![module("Opinnot", vec![Node::Course(a.clone())])];
        let registry = registry_of(&[a]);
        let supplement: Supplement =
            serde_json::from_str(r#"{"course_icons": {"A_1": "*"}}"#).unwrap();

        let dot = render(&hierarchy, &registry, &supplement, &RenderOptions::default());

        assert!(dot.contains("<TR><TD>A.1 *</TD></TR>"));
    }

    #[test]
    fn prerequisite_only_courses_are_rendered_loose() {
        // "c1" is in the registry (registered during prerequisite
        // finalization) but not in any cluster.
        let loose = course("c1", "A.1", vec![], vec![]);
        let b = course("c2", "B.1", vec!["c1"], vec![]);
        let hierarchy = vec![module("Opinnot", vec![Node::Course(b.clone())])];
        let registry = registry_of(&[loose, b]);

        let dot = render(
            &hierarchy,
            &registry,
            &Supplement::default(),
            &RenderOptions::default(),
        );

        assert!(dot.contains("{ rank=source; A_1; }"));
        assert_eq!(dot.matches("A_1 [shape=plaintext").count(), 1);
        assert!(dot.contains("A_1->B_1;"));
    }

    #[test]
    fn registry_courses_without_active_edges_stay_hidden() {
        let orphan = course("c1", "A.1", vec![], vec![]);
        let b = course("c2", "B.1", vec![], vec![]);
        let hierarchy = vec![module("Opinnot", vec![Node::Course(b.clone())])];
        let registry = registry_of(&[orphan, b]);

        let dot = render(
            &hierarchy,
            &registry,
            &Supplement::default(),
            &RenderOptions::default(),
        );

        assert!(!dot.contains("A_1"));
        assert!(dot.contains("{ rank=source; }"));
    }

    #[test]
    fn long_names_wrap_and_truncate_with_ellipsis() {
        let wrapped = wrap_label("Ohjelmistotuotannon perusteet ja ohjelmistoprojektin hallinta syventävä");
        let lines: Vec<&str> = wrapped.split("<BR/>").collect();
        assert!(lines.len() <= 3);
        assert!(lines.last().unwrap().ends_with("..."));
    }

    #[test]
    fn short_names_are_left_on_one_line() {
        assert_eq!(wrap_label("Ohjelmointi 1"), "Ohjelmointi 1");
    }

    #[test]
    fn write_atomic_replaces_the_target() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("out.gv");
        std::fs::write(&target, "old contents").unwrap();

        write_atomic(&target, "digraph G {\n}\n").unwrap();

        assert_eq!(std::fs::read_to_string(&target).unwrap(), "digraph G {\n}\n");
    }
}
