//! MJCF XML exporter.
//!
//! Rebuilds the nested MJCF body tree from the schema's flat joint list and
//! converts full sizes back to MJCF half-extents. Quaternions go out
//! scalar-first; all angles are written in radians with a matching
//! `<compiler>` declaration.

use std::collections::BTreeMap;
use std::fs;
use std::io::Cursor;
use std::path::Path;

use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use tracing::warn;

use crate::error::Result;
use crate::schema::{
    Actuator, ActuatorType, CommonSchema, Geometry, Joint, JointType, Link, Material, Pose,
    Sensor, WORLD_LINK,
};
use crate::xml::{fmt_float, fmt_vector3};

type XmlWriter = Writer<Cursor<Vec<u8>>>;

/// Serialize a schema as an MJCF document.
pub fn export_mjcf_string(schema: &CommonSchema) -> Result<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    let mut mujoco = BytesStart::new("mujoco");
    mujoco.push_attribute(("model", schema.metadata.name.as_str()));
    writer.write_event(Event::Start(mujoco))?;

    let mut compiler = BytesStart::new("compiler");
    compiler.push_attribute(("angle", "radian"));
    writer.write_event(Event::Empty(compiler))?;

    let materials = collect_materials(schema);
    let meshes = collect_mesh_assets(schema);
    if !materials.is_empty() || !meshes.is_empty() {
        write_asset(&mut writer, &materials, &meshes)?;
    }

    write_worldbody(&mut writer, schema)?;

    if !schema.actuators.is_empty() {
        write_actuators(&mut writer, &schema.actuators)?;
    }
    if !schema.sensors.is_empty() {
        write_sensors(&mut writer, &schema.sensors)?;
    }

    writer.write_event(Event::End(BytesEnd::new("mujoco")))?;

    let bytes = writer.into_inner().into_inner();
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Write a schema to an MJCF file.
pub fn export_mjcf_file(schema: &CommonSchema, path: &Path) -> Result<()> {
    let xml = export_mjcf_string(schema)?;
    fs::write(path, xml)?;
    Ok(())
}

/// Gather named materials used by any visual, deduplicated by name.
fn collect_materials(schema: &CommonSchema) -> BTreeMap<String, Material> {
    let mut materials = BTreeMap::new();
    for link in &schema.links {
        for visual in &link.visuals {
            if let Some(ref material) = visual.material {
                if let Some(ref name) = material.name {
                    materials
                        .entry(name.clone())
                        .or_insert_with(|| material.clone());
                }
            }
        }
    }
    materials
}

/// Gather mesh geometries as asset name to file path, preferring the
/// resolved paths recorded at parse time.
fn collect_mesh_assets(schema: &CommonSchema) -> BTreeMap<String, String> {
    let resolved = schema.extensions.get("meshes").and_then(|v| v.as_object());
    let mut meshes = BTreeMap::new();
    for link in &schema.links {
        let geometries = link
            .visuals
            .iter()
            .filter_map(|v| v.geometry.as_ref())
            .chain(link.collisions.iter().filter_map(|c| c.geometry.as_ref()));
        for geometry in geometries {
            if let Geometry::Mesh { filename, .. } = geometry {
                let file = resolved
                    .and_then(|m| m.get(filename))
                    .and_then(|v| v.as_str())
                    .unwrap_or(filename)
                    .to_string();
                meshes.entry(mesh_asset_name(filename)).or_insert(file);
            }
        }
    }
    meshes
}

fn write_asset(
    writer: &mut XmlWriter,
    materials: &BTreeMap<String, Material>,
    meshes: &BTreeMap<String, String>,
) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("asset")))?;
    for (name, file) in meshes {
        let mut e = BytesStart::new("mesh");
        e.push_attribute(("name", name.as_str()));
        e.push_attribute(("file", file.as_str()));
        writer.write_event(Event::Empty(e))?;
    }
    for (name, material) in materials {
        let mut e = BytesStart::new("material");
        e.push_attribute(("name", name.as_str()));
        if let Some(color) = material.color {
            let rgba = format!(
                "{} {} {} {}",
                fmt_float(color[0]),
                fmt_float(color[1]),
                fmt_float(color[2]),
                fmt_float(color[3])
            );
            e.push_attribute(("rgba", rgba.as_str()));
        }
        if let Some(ref texture) = material.texture {
            e.push_attribute(("texture", texture.as_str()));
        }
        writer.write_event(Event::Empty(e))?;
    }
    writer.write_event(Event::End(BytesEnd::new("asset")))?;
    Ok(())
}

fn write_worldbody(writer: &mut XmlWriter, schema: &CommonSchema) -> Result<()> {
    // Rebuild the tree: each link's inbound joint (if any) and its children.
    let mut inbound: BTreeMap<&str, &Joint> = BTreeMap::new();
    let mut children: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for joint in &schema.joints {
        inbound.insert(joint.child_link.as_str(), joint);
        children
            .entry(joint.parent_link.as_str())
            .or_default()
            .push(joint.child_link.as_str());
    }

    let links: BTreeMap<&str, &Link> =
        schema.links.iter().map(|l| (l.name.as_str(), l)).collect();

    // Top-level bodies: root links plus children of world-anchored joints.
    let mut top_level: Vec<&str> = schema
        .links
        .iter()
        .map(|l| l.name.as_str())
        .filter(|name| {
            inbound
                .get(name)
                .map_or(true, |j| j.parent_link == WORLD_LINK)
        })
        .collect();
    top_level.sort_unstable();

    writer.write_event(Event::Start(BytesStart::new("worldbody")))?;

    let mut visited = std::collections::HashSet::new();
    for name in top_level {
        write_body(writer, name, &links, &inbound, &children, &mut visited)?;
    }

    writer.write_event(Event::End(BytesEnd::new("worldbody")))?;

    for link in &schema.links {
        if !visited.contains(link.name.as_str()) {
            warn!(
                "link '{}' is not reachable from any root, skipping in MJCF export",
                link.name
            );
        }
    }

    Ok(())
}

fn write_body(
    writer: &mut XmlWriter,
    name: &str,
    links: &BTreeMap<&str, &Link>,
    inbound: &BTreeMap<&str, &Joint>,
    children: &BTreeMap<&str, Vec<&str>>,
    visited: &mut std::collections::HashSet<String>,
) -> Result<()> {
    if !visited.insert(name.to_string()) {
        // Already written; a second inbound edge means a loop.
        warn!("link '{name}' appears twice in the kinematic tree, skipping");
        return Ok(());
    }
    let Some(link) = links.get(name) else {
        warn!("joint references unknown link '{name}', skipping in MJCF export");
        return Ok(());
    };

    let mut body = BytesStart::new("body");
    body.push_attribute(("name", name));
    if let Some(joint) = inbound.get(name) {
        push_pose_attrs(&mut body, &joint.pose);
    }
    writer.write_event(Event::Start(body))?;

    if let Some(joint) = inbound.get(name) {
        write_joint(writer, joint)?;
    }
    write_inertial(writer, link)?;
    write_geoms(writer, link)?;

    if let Some(kids) = children.get(name) {
        for child in kids {
            write_body(writer, child, links, inbound, children, visited)?;
        }
    }

    writer.write_event(Event::End(BytesEnd::new("body")))?;
    Ok(())
}

fn push_pose_attrs(e: &mut BytesStart, pose: &Pose) {
    if pose.position != nalgebra::Vector3::zeros() {
        e.push_attribute(("pos", fmt_vector3(&pose.position).as_str()));
    }
    if !pose.orientation.is_identity() {
        let [w, x, y, z] = pose.orientation.to_wxyz();
        let quat = format!(
            "{} {} {} {}",
            fmt_float(w),
            fmt_float(x),
            fmt_float(y),
            fmt_float(z)
        );
        e.push_attribute(("quat", quat.as_str()));
    }
}

fn write_joint(writer: &mut XmlWriter, joint: &Joint) -> Result<()> {
    let type_str = match joint.joint_type {
        // A fixed connection is simply a body without a joint in MJCF.
        JointType::Fixed => return Ok(()),
        JointType::Floating => {
            let mut e = BytesStart::new("freejoint");
            e.push_attribute(("name", joint.name.as_str()));
            writer.write_event(Event::Empty(e))?;
            return Ok(());
        }
        JointType::Revolute | JointType::Continuous => "hinge",
        JointType::Prismatic => "slide",
        JointType::Spherical => "ball",
        JointType::Planar => {
            warn!(
                "joint '{}' is planar with no MJCF equivalent, exporting as slide",
                joint.name
            );
            "slide"
        }
        JointType::Universal => {
            warn!(
                "joint '{}' is universal with no MJCF equivalent, exporting as ball",
                joint.name
            );
            "ball"
        }
    };

    let mut e = BytesStart::new("joint");
    e.push_attribute(("name", joint.name.as_str()));
    e.push_attribute(("type", type_str));
    e.push_attribute(("axis", fmt_vector3(&joint.axis).as_str()));

    if let Some(limits) = joint.limits {
        if let (Some(lower), Some(upper)) = (limits.lower, limits.upper) {
            e.push_attribute(("limited", "true"));
            let range = format!("{} {}", fmt_float(lower), fmt_float(upper));
            e.push_attribute(("range", range.as_str()));
        }
    }
    if let Some(dynamics) = joint.dynamics {
        if dynamics.damping != 0.0 {
            e.push_attribute(("damping", fmt_float(dynamics.damping).as_str()));
        }
        if dynamics.friction != 0.0 {
            e.push_attribute(("frictionloss", fmt_float(dynamics.friction).as_str()));
        }
    }

    writer.write_event(Event::Empty(e))?;
    Ok(())
}

fn write_inertial(writer: &mut XmlWriter, link: &Link) -> Result<()> {
    if link.mass <= 0.0 {
        return Ok(());
    }

    let mut e = BytesStart::new("inertial");
    e.push_attribute(("pos", fmt_vector3(&link.center_of_mass).as_str()));
    e.push_attribute(("mass", fmt_float(link.mass).as_str()));

    let i = link.inertia;
    let diagonal_only = i.ixy == 0.0 && i.ixz == 0.0 && i.iyz == 0.0;
    if diagonal_only {
        let diag = format!(
            "{} {} {}",
            fmt_float(i.ixx),
            fmt_float(i.iyy),
            fmt_float(i.izz)
        );
        e.push_attribute(("diaginertia", diag.as_str()));
    } else {
        let full = format!(
            "{} {} {} {} {} {}",
            fmt_float(i.ixx),
            fmt_float(i.iyy),
            fmt_float(i.izz),
            fmt_float(i.ixy),
            fmt_float(i.ixz),
            fmt_float(i.iyz)
        );
        e.push_attribute(("fullinertia", full.as_str()));
    }

    writer.write_event(Event::Empty(e))?;
    Ok(())
}

/// Write the link's collision shapes as geoms, picking up material or color
/// from the visual that shares the shape.
fn write_geoms(writer: &mut XmlWriter, link: &Link) -> Result<()> {
    for (index, collision) in link.collisions.iter().enumerate() {
        let Some(ref geometry) = collision.geometry else {
            continue;
        };

        let mut e = BytesStart::new("geom");
        if let Some(ref name) = collision.name {
            e.push_attribute(("name", name.as_str()));
        }
        push_pose_attrs(&mut e, &collision.pose);

        let (type_str, size) = geom_type_and_size(geometry);
        e.push_attribute(("type", type_str));
        if let Some(size) = size {
            e.push_attribute(("size", size.as_str()));
        }
        if let Geometry::Mesh { filename, .. } = geometry {
            e.push_attribute(("mesh", mesh_asset_name(filename).as_str()));
        }

        let material = link
            .visuals
            .get(index)
            .filter(|v| v.geometry.as_ref() == Some(geometry))
            .and_then(|v| v.material.as_ref());
        if let Some(material) = material {
            if let Some(ref name) = material.name {
                e.push_attribute(("material", name.as_str()));
            } else if let Some(color) = material.color {
                let rgba = format!(
                    "{} {} {} {}",
                    fmt_float(color[0]),
                    fmt_float(color[1]),
                    fmt_float(color[2]),
                    fmt_float(color[3])
                );
                e.push_attribute(("rgba", rgba.as_str()));
            }
        }

        if let Some(surface) = collision.surface {
            if let Some(mu) = surface.mu_static.or(surface.mu_dynamic) {
                let friction = format!("{} 0.005 0.0001", fmt_float(mu));
                e.push_attribute(("friction", friction.as_str()));
            }
        }

        writer.write_event(Event::Empty(e))?;
    }

    // Visuals with shapes no collision covers still deserve a geom.
    for visual in link.visuals.iter().skip(link.collisions.len()) {
        let Some(ref geometry) = visual.geometry else {
            continue;
        };
        let mut e = BytesStart::new("geom");
        push_pose_attrs(&mut e, &visual.pose);
        let (type_str, size) = geom_type_and_size(geometry);
        e.push_attribute(("type", type_str));
        if let Some(size) = size {
            e.push_attribute(("size", size.as_str()));
        }
        if let Geometry::Mesh { filename, .. } = geometry {
            e.push_attribute(("mesh", mesh_asset_name(filename).as_str()));
        }
        // Visual-only geom: disable collisions.
        e.push_attribute(("contype", "0"));
        e.push_attribute(("conaffinity", "0"));
        writer.write_event(Event::Empty(e))?;
    }

    Ok(())
}

/// Convert a schema geometry to MJCF type and size strings, halving sizes
/// where MJCF expects half-extents.
fn geom_type_and_size(geometry: &Geometry) -> (&'static str, Option<String>) {
    match geometry {
        Geometry::Sphere { radius } => ("sphere", Some(fmt_float(*radius))),
        Geometry::Box { size } => (
            "box",
            Some(format!(
                "{} {} {}",
                fmt_float(size.x / 2.0),
                fmt_float(size.y / 2.0),
                fmt_float(size.z / 2.0)
            )),
        ),
        Geometry::Cylinder { radius, length } => (
            "cylinder",
            Some(format!(
                "{} {}",
                fmt_float(*radius),
                fmt_float(length / 2.0)
            )),
        ),
        Geometry::Capsule { radius, length } => (
            "capsule",
            Some(format!(
                "{} {}",
                fmt_float(*radius),
                fmt_float(length / 2.0)
            )),
        ),
        Geometry::Ellipsoid { radii } => ("ellipsoid", Some(fmt_vector3(radii))),
        Geometry::Plane => ("plane", Some("1.0 1.0 0.1".to_string())),
        // The matching <mesh> asset is emitted by write_asset.
        Geometry::Mesh { .. } => ("mesh", None),
    }
}

/// Derive an asset name from a mesh path, matching import behavior.
fn mesh_asset_name(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string())
}

fn write_actuators(writer: &mut XmlWriter, actuators: &[Actuator]) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("actuator")))?;

    for actuator in actuators {
        let element = match actuator.actuator_type {
            ActuatorType::Motor | ActuatorType::Torque => "motor",
            ActuatorType::Position | ActuatorType::Servo => "position",
            ActuatorType::Velocity => "velocity",
            ActuatorType::Muscle => "muscle",
        };
        let mut e = BytesStart::new(element);
        e.push_attribute(("name", actuator.name.as_str()));
        e.push_attribute(("joint", actuator.joint.as_str()));
        if let Some(gear) = actuator.gear_ratio {
            e.push_attribute(("gear", fmt_float(gear).as_str()));
        }
        if let Some((lo, hi)) = actuator.control_range {
            e.push_attribute(("ctrlrange", format!("{} {}", fmt_float(lo), fmt_float(hi)).as_str()));
        }
        writer.write_event(Event::Empty(e))?;
    }

    writer.write_event(Event::End(BytesEnd::new("actuator")))?;
    Ok(())
}

fn write_sensors(writer: &mut XmlWriter, sensors: &[Sensor]) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("sensor")))?;

    for sensor in sensors {
        let mut e = BytesStart::new(sensor.sensor_type.as_str());
        e.push_attribute(("name", sensor.name.as_str()));
        for (key, value) in &sensor.parameters {
            if let Some(s) = value.as_str() {
                e.push_attribute((key.as_str(), s));
            }
        }
        writer.write_event(Event::Empty(e))?;
    }

    writer.write_event(Event::End(BytesEnd::new("sensor")))?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mjcf::parser::parse_mjcf_str;
    use crate::schema::{Collision, Inertia, JointLimits, Metadata, Visual};
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn two_link_arm() -> CommonSchema {
        CommonSchema::new(Metadata::new("arm"))
            .with_link(
                Link::new("base")
                    .with_mass(1.0)
                    .with_inertia(Inertia::from_diagonal(0.1, 0.1, 0.1))
                    .with_collision(Collision {
                        name: None,
                        pose: Pose::default(),
                        geometry: Some(Geometry::Box {
                            size: Vector3::new(0.4, 0.3, 0.2),
                        }),
                        surface: None,
                    }),
            )
            .with_link(
                Link::new("upper_arm")
                    .with_mass(0.5)
                    .with_inertia(Inertia::from_diagonal(0.05, 0.05, 0.01)),
            )
            .with_joint(
                Joint::new("shoulder", JointType::Revolute, "base", "upper_arm")
                    .with_axis(Vector3::y())
                    .with_limits(JointLimits {
                        lower: Some(-1.57),
                        upper: Some(1.57),
                        effort: Some(20.0),
                        velocity: Some(3.0),
                    }),
            )
    }

    #[test]
    fn test_export_structure() {
        let xml = export_mjcf_string(&two_link_arm()).expect("should export");
        assert!(xml.contains(r#"<mujoco model="arm">"#));
        assert!(xml.contains(r#"<compiler angle="radian"/>"#));
        assert!(xml.contains(r#"<body name="base">"#));
        assert!(xml.contains(r#"type="hinge""#));
        assert!(xml.contains(r#"range="-1.57 1.57""#));
    }

    #[test]
    fn test_box_sizes_are_halved() {
        let xml = export_mjcf_string(&two_link_arm()).expect("should export");
        assert!(xml.contains(r#"size="0.2 0.15 0.1""#));
    }

    #[test]
    fn test_export_parse_roundtrip() {
        let schema = two_link_arm();
        let xml = export_mjcf_string(&schema).expect("should export");
        let back = parse_mjcf_str(&xml).expect("should reparse");

        assert_eq!(back.links.len(), 2);
        assert_eq!(back.joints.len(), 1);

        let base = back.link("base").expect("base");
        assert_relative_eq!(base.mass, 1.0);
        assert_relative_eq!(base.inertia.ixx, 0.1);
        // Half-extent conversion is self-inverse.
        match base.collisions[0].geometry.as_ref().expect("box") {
            Geometry::Box { size } => {
                assert_relative_eq!(size.x, 0.4, epsilon = 1e-10);
                assert_relative_eq!(size.y, 0.3, epsilon = 1e-10);
                assert_relative_eq!(size.z, 0.2, epsilon = 1e-10);
            }
            other => panic!("expected box, got {other:?}"),
        }

        let joint = back.joint("shoulder").expect("shoulder");
        assert_eq!(joint.joint_type, JointType::Revolute);
        assert_relative_eq!(joint.axis.y, 1.0);
    }

    #[test]
    fn test_fixed_joint_has_no_joint_element() {
        let schema = CommonSchema::new(Metadata::new("m"))
            .with_link(Link::new("a"))
            .with_link(Link::new("b"))
            .with_joint(Joint::new("weld", JointType::Fixed, "a", "b"));

        let xml = export_mjcf_string(&schema).expect("should export");
        assert!(!xml.contains("<joint"));
        assert!(xml.contains(r#"<body name="b">"#));
    }

    #[test]
    fn test_floating_becomes_freejoint() {
        let schema = CommonSchema::new(Metadata::new("m"))
            .with_link(Link::new("ball"))
            .with_joint(Joint::new("free", JointType::Floating, WORLD_LINK, "ball"));

        let xml = export_mjcf_string(&schema).expect("should export");
        assert!(xml.contains(r#"<freejoint name="free"/>"#));
    }

    #[test]
    fn test_quat_is_scalar_first() {
        let mut joint = Joint::new("j", JointType::Revolute, "a", "b");
        joint.pose = Pose {
            position: Vector3::zeros(),
            orientation: crate::schema::Quaternion::from_rpy(0.0, 0.0, std::f64::consts::FRAC_PI_2),
        };
        let schema = CommonSchema::new(Metadata::new("m"))
            .with_link(Link::new("a"))
            .with_link(Link::new("b"))
            .with_joint(joint);

        let xml = export_mjcf_string(&schema).expect("should export");
        // w comes first: ~0.7071 0 0 ~0.7071.
        assert!(xml.contains("quat=\"0.707"));
        assert!(xml.contains("0.0 0.0 0.707"));
    }

    #[test]
    fn test_unreachable_link_is_skipped() {
        // b and c form a loop hanging off nothing reachable.
        let schema = CommonSchema::new(Metadata::new("m"))
            .with_link(Link::new("a"))
            .with_link(Link::new("b"))
            .with_link(Link::new("c"))
            .with_joint(Joint::new("j1", JointType::Fixed, "b", "c"))
            .with_joint(Joint::new("j2", JointType::Fixed, "c", "b"));

        let xml = export_mjcf_string(&schema).expect("should export");
        assert!(xml.contains(r#"<body name="a">"#));
        assert!(!xml.contains(r#"<body name="b""#));
        assert!(!xml.contains(r#"<body name="c""#));
    }

    #[test]
    fn test_materials_deduplicated_in_asset() {
        let material = Material {
            name: Some("steel".to_string()),
            color: Some([0.6, 0.6, 0.7, 1.0]),
            ..Material::default()
        };
        let visual = |m: &Material| Visual {
            name: None,
            pose: Pose::default(),
            geometry: Some(Geometry::Sphere { radius: 0.1 }),
            material: Some(m.clone()),
        };
        let schema = CommonSchema::new(Metadata::new("m"))
            .with_link(Link::new("a").with_visual(visual(&material)))
            .with_link(Link::new("b").with_visual(visual(&material)));

        let xml = export_mjcf_string(&schema).expect("should export");
        assert_eq!(xml.matches(r#"<material name="steel""#).count(), 1);
    }

    #[test]
    fn test_mesh_geom_gets_an_asset() {
        let mut schema = CommonSchema::new(Metadata::new("m")).with_link(
            Link::new("hand").with_collision(Collision {
                name: None,
                pose: Pose::default(),
                geometry: Some(Geometry::Mesh {
                    filename: "meshes/palm.stl".to_string(),
                    scale: None,
                }),
                surface: None,
            }),
        );
        schema.extensions.insert(
            "meshes".to_string(),
            serde_json::json!({ "meshes/palm.stl": "/models/meshes/palm.stl" }),
        );

        let xml = export_mjcf_string(&schema).expect("should export");
        assert!(xml.contains(r#"<mesh name="palm" file="/models/meshes/palm.stl"/>"#));
        assert!(xml.contains(r#"type="mesh" mesh="palm""#));
    }

    #[test]
    fn test_actuator_export() {
        let mut schema = two_link_arm();
        schema.actuators.push(Actuator {
            name: "shoulder_motor".to_string(),
            joint: "shoulder".to_string(),
            actuator_type: ActuatorType::Motor,
            gear_ratio: Some(50.0),
            control_range: Some((-1.0, 1.0)),
        });

        let xml = export_mjcf_string(&schema).expect("should export");
        assert!(xml.contains(r#"<motor name="shoulder_motor" joint="shoulder" gear="50.0" ctrlrange="-1.0 1.0"/>"#));
    }
}
