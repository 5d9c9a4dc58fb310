//! Kinematic validation for parsed URDF documents.
//!
//! URDF joints form a flat edge list over link names, so a parsed document
//! can reference links that do not exist or close a loop. These problems are
//! recorded on the parse context as recoverable errors and warnings; the
//! document itself still parses.

use std::collections::{HashMap, HashSet};

use crate::context::ParseContext;
use crate::schema::{CommonSchema, WORLD_LINK};

/// Check kinematic consistency and record problems on the context.
///
/// Dangling joint references and kinematic loops are errors; links that are
/// neither a root nor reachable through any joint are warnings.
pub(crate) fn check_kinematics(schema: &CommonSchema, ctx: &mut ParseContext) {
    let link_names: HashSet<&str> = schema.links.iter().map(|l| l.name.as_str()).collect();

    let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut child_set: HashSet<&str> = HashSet::new();

    for joint in &schema.joints {
        if joint.parent_link != WORLD_LINK && !link_names.contains(joint.parent_link.as_str()) {
            ctx.add_error(
                &format!("joint '{}'", joint.name),
                format!("references undefined parent link '{}'", joint.parent_link),
            );
        }
        if !link_names.contains(joint.child_link.as_str()) {
            ctx.add_error(
                &format!("joint '{}'", joint.name),
                format!("references undefined child link '{}'", joint.child_link),
            );
        }
        children
            .entry(joint.parent_link.as_str())
            .or_default()
            .push(joint.child_link.as_str());
        // World-anchored children still count as roots for reachability.
        if joint.parent_link != WORLD_LINK {
            child_set.insert(joint.child_link.as_str());
        }
    }

    // Cycle detection: DFS from every root with a recursion stack. A link
    // that is a child of more than one joint also closes a loop.
    let mut parent_counts: HashMap<&str, usize> = HashMap::new();
    for joint in &schema.joints {
        *parent_counts.entry(joint.child_link.as_str()).or_default() += 1;
    }
    for (link, count) in &parent_counts {
        if *count > 1 {
            ctx.add_error(
                &format!("link '{link}'"),
                format!("has {count} parent joints (kinematic loop)"),
            );
        }
    }

    let roots: Vec<&str> = schema
        .links
        .iter()
        .map(|l| l.name.as_str())
        .filter(|name| !child_set.contains(name))
        .collect();

    if roots.is_empty() && !schema.links.is_empty() {
        ctx.add_error("kinematic tree", "no root link (every link has a parent)");
        return;
    }

    // A link that no joint touches at all is an orphan. Only meaningful when
    // the document has joints; a bare list of links is a valid static scene.
    if !schema.joints.is_empty() {
        let endpoints: HashSet<&str> = schema
            .joints
            .iter()
            .flat_map(|j| [j.parent_link.as_str(), j.child_link.as_str()])
            .collect();
        for link in &schema.links {
            if !endpoints.contains(link.name.as_str()) {
                ctx.add_warning(format!(
                    "link '{}' is not connected to any joint",
                    link.name
                ));
            }
        }
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut visiting: HashSet<&str> = HashSet::new();
    for root in &roots {
        visit(root, &children, &mut visited, &mut visiting, ctx);
    }
    // Joints rooted at the world sentinel reach their subtrees too.
    visit(WORLD_LINK, &children, &mut visited, &mut visiting, ctx);

    for link in &schema.links {
        if !visited.contains(link.name.as_str()) {
            ctx.add_warning(format!(
                "link '{}' is not reachable from any root",
                link.name
            ));
        }
    }
}

fn visit<'a>(
    link: &'a str,
    children: &HashMap<&'a str, Vec<&'a str>>,
    visited: &mut HashSet<&'a str>,
    visiting: &mut HashSet<&'a str>,
    ctx: &mut ParseContext,
) {
    if visited.contains(link) {
        return;
    }
    if visiting.contains(link) {
        ctx.add_error(
            &format!("link '{link}'"),
            "cycle detected in kinematic tree",
        );
        return;
    }

    visiting.insert(link);
    if let Some(kids) = children.get(link) {
        for child in kids {
            visit(child, children, visited, visiting, ctx);
        }
    }
    visiting.remove(link);
    visited.insert(link);
}
