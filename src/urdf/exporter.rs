//! URDF XML exporter.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use tracing::warn;

use crate::error::Result;
use crate::schema::{
    Collision, CommonSchema, Geometry, Joint, JointType, Link, Material, Pose, Visual,
};
use crate::xml::{fmt_float, fmt_vector3};

/// Serialize a schema as a URDF document.
pub fn export_urdf_string(schema: &CommonSchema) -> Result<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut robot = BytesStart::new("robot");
    robot.push_attribute(("name", schema.metadata.name.as_str()));
    writer.write_event(Event::Start(robot))?;

    for link in &schema.links {
        write_link(&mut writer, link)?;
    }
    for joint in &schema.joints {
        write_joint(&mut writer, joint)?;
    }

    writer.write_event(Event::End(BytesEnd::new("robot")))?;

    let bytes = writer.into_inner().into_inner();
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Write a schema to a URDF file.
pub fn export_urdf_file(schema: &CommonSchema, path: &Path) -> Result<()> {
    let xml = export_urdf_string(schema)?;
    fs::write(path, xml)?;
    Ok(())
}

type XmlWriter = Writer<Cursor<Vec<u8>>>;

fn write_link(writer: &mut XmlWriter, link: &Link) -> Result<()> {
    let mut elem = BytesStart::new("link");
    elem.push_attribute(("name", link.name.as_str()));

    let has_content = link.mass != 0.0
        || link.inertia != crate::schema::Inertia::default()
        || !link.visuals.is_empty()
        || !link.collisions.is_empty();
    if !has_content {
        writer.write_event(Event::Empty(elem))?;
        return Ok(());
    }

    writer.write_event(Event::Start(elem))?;

    if link.mass != 0.0 || link.inertia != crate::schema::Inertia::default() {
        writer.write_event(Event::Start(BytesStart::new("inertial")))?;

        if link.center_of_mass != nalgebra::Vector3::zeros() {
            let mut origin = BytesStart::new("origin");
            origin.push_attribute(("xyz", fmt_vector3(&link.center_of_mass).as_str()));
            writer.write_event(Event::Empty(origin))?;
        }

        let mut mass = BytesStart::new("mass");
        mass.push_attribute(("value", fmt_float(link.mass).as_str()));
        writer.write_event(Event::Empty(mass))?;

        let mut inertia = BytesStart::new("inertia");
        inertia.push_attribute(("ixx", fmt_float(link.inertia.ixx).as_str()));
        inertia.push_attribute(("iyy", fmt_float(link.inertia.iyy).as_str()));
        inertia.push_attribute(("izz", fmt_float(link.inertia.izz).as_str()));
        inertia.push_attribute(("ixy", fmt_float(link.inertia.ixy).as_str()));
        inertia.push_attribute(("ixz", fmt_float(link.inertia.ixz).as_str()));
        inertia.push_attribute(("iyz", fmt_float(link.inertia.iyz).as_str()));
        writer.write_event(Event::Empty(inertia))?;

        writer.write_event(Event::End(BytesEnd::new("inertial")))?;
    }

    for visual in &link.visuals {
        write_visual(writer, visual)?;
    }
    for collision in &link.collisions {
        write_collision(writer, collision)?;
    }

    writer.write_event(Event::End(BytesEnd::new("link")))?;
    Ok(())
}

fn write_visual(writer: &mut XmlWriter, visual: &Visual) -> Result<()> {
    let mut elem = BytesStart::new("visual");
    if let Some(ref name) = visual.name {
        elem.push_attribute(("name", name.as_str()));
    }
    writer.write_event(Event::Start(elem))?;

    write_origin(writer, &visual.pose)?;
    if let Some(ref geometry) = visual.geometry {
        write_geometry(writer, geometry)?;
    }
    if let Some(ref material) = visual.material {
        write_material(writer, material)?;
    }

    writer.write_event(Event::End(BytesEnd::new("visual")))?;
    Ok(())
}

fn write_collision(writer: &mut XmlWriter, collision: &Collision) -> Result<()> {
    let mut elem = BytesStart::new("collision");
    if let Some(ref name) = collision.name {
        elem.push_attribute(("name", name.as_str()));
    }
    writer.write_event(Event::Start(elem))?;

    write_origin(writer, &collision.pose)?;
    if let Some(ref geometry) = collision.geometry {
        write_geometry(writer, geometry)?;
    }

    writer.write_event(Event::End(BytesEnd::new("collision")))?;
    Ok(())
}

/// Write an `<origin xyz rpy/>` element, omitted entirely for the identity
/// pose.
fn write_origin(writer: &mut XmlWriter, pose: &Pose) -> Result<()> {
    let is_identity = pose.position == nalgebra::Vector3::zeros() && pose.orientation.is_identity();
    if is_identity {
        return Ok(());
    }

    let mut origin = BytesStart::new("origin");
    origin.push_attribute(("xyz", fmt_vector3(&pose.position).as_str()));
    if !pose.orientation.is_identity() {
        let (roll, pitch, yaw) = pose.orientation.to_rpy();
        let rpy = format!(
            "{} {} {}",
            fmt_float(roll),
            fmt_float(pitch),
            fmt_float(yaw)
        );
        origin.push_attribute(("rpy", rpy.as_str()));
    }
    writer.write_event(Event::Empty(origin))?;
    Ok(())
}

fn write_geometry(writer: &mut XmlWriter, geometry: &Geometry) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("geometry")))?;

    match geometry {
        Geometry::Box { size } => {
            let mut e = BytesStart::new("box");
            e.push_attribute(("size", fmt_vector3(size).as_str()));
            writer.write_event(Event::Empty(e))?;
        }
        Geometry::Cylinder { radius, length } => {
            let mut e = BytesStart::new("cylinder");
            e.push_attribute(("radius", fmt_float(*radius).as_str()));
            e.push_attribute(("length", fmt_float(*length).as_str()));
            writer.write_event(Event::Empty(e))?;
        }
        Geometry::Sphere { radius } => {
            let mut e = BytesStart::new("sphere");
            e.push_attribute(("radius", fmt_float(*radius).as_str()));
            writer.write_event(Event::Empty(e))?;
        }
        Geometry::Mesh { filename, scale } => {
            let mut e = BytesStart::new("mesh");
            e.push_attribute(("filename", filename.as_str()));
            if let Some(scale) = scale {
                e.push_attribute(("scale", fmt_vector3(scale).as_str()));
            }
            writer.write_event(Event::Empty(e))?;
        }
        // URDF has no capsule or ellipsoid primitive; approximate with the
        // closest shape so the geometry is not lost.
        Geometry::Capsule { radius, length } => {
            warn!("URDF has no capsule primitive, exporting as cylinder");
            let mut e = BytesStart::new("cylinder");
            e.push_attribute(("radius", fmt_float(*radius).as_str()));
            e.push_attribute(("length", fmt_float(*length).as_str()));
            writer.write_event(Event::Empty(e))?;
        }
        Geometry::Ellipsoid { radii } => {
            warn!("URDF has no ellipsoid primitive, exporting bounding sphere");
            let mut e = BytesStart::new("sphere");
            e.push_attribute(("radius", fmt_float(radii.max()).as_str()));
            writer.write_event(Event::Empty(e))?;
        }
        Geometry::Plane => {
            warn!("URDF has no plane primitive, exporting thin box");
            let mut e = BytesStart::new("box");
            e.push_attribute(("size", "10.0 10.0 0.001"));
            writer.write_event(Event::Empty(e))?;
        }
    }

    writer.write_event(Event::End(BytesEnd::new("geometry")))?;
    Ok(())
}

fn write_material(writer: &mut XmlWriter, material: &Material) -> Result<()> {
    let mut elem = BytesStart::new("material");
    let name = material.name.clone().unwrap_or_else(|| "default".to_string());
    elem.push_attribute(("name", name.as_str()));

    if material.color.is_none() && material.texture.is_none() {
        writer.write_event(Event::Empty(elem))?;
        return Ok(());
    }

    writer.write_event(Event::Start(elem))?;
    if let Some(color) = material.color {
        let mut e = BytesStart::new("color");
        let rgba = format!(
            "{} {} {} {}",
            fmt_float(color[0]),
            fmt_float(color[1]),
            fmt_float(color[2]),
            fmt_float(color[3])
        );
        e.push_attribute(("rgba", rgba.as_str()));
        writer.write_event(Event::Empty(e))?;
    }
    if let Some(ref texture) = material.texture {
        let mut e = BytesStart::new("texture");
        e.push_attribute(("filename", texture.as_str()));
        writer.write_event(Event::Empty(e))?;
    }
    writer.write_event(Event::End(BytesEnd::new("material")))?;
    Ok(())
}

fn write_joint(writer: &mut XmlWriter, joint: &Joint) -> Result<()> {
    // URDF's joint vocabulary has no spherical or universal type; a fixed
    // joint at least preserves the attachment.
    let joint_type = match joint.joint_type {
        JointType::Spherical | JointType::Universal => {
            warn!(
                "joint '{}' has type '{}' with no URDF equivalent, exporting as fixed",
                joint.name,
                joint.joint_type.as_str()
            );
            JointType::Fixed
        }
        other => other,
    };

    let mut elem = BytesStart::new("joint");
    elem.push_attribute(("name", joint.name.as_str()));
    elem.push_attribute(("type", joint_type.as_str()));
    writer.write_event(Event::Start(elem))?;

    let mut parent = BytesStart::new("parent");
    parent.push_attribute(("link", joint.parent_link.as_str()));
    writer.write_event(Event::Empty(parent))?;

    let mut child = BytesStart::new("child");
    child.push_attribute(("link", joint.child_link.as_str()));
    writer.write_event(Event::Empty(child))?;

    write_origin(writer, &joint.pose)?;

    if joint_type != JointType::Fixed && joint_type != JointType::Floating {
        let mut axis = BytesStart::new("axis");
        axis.push_attribute(("xyz", fmt_vector3(&joint.axis).as_str()));
        writer.write_event(Event::Empty(axis))?;
    }

    if let Some(limits) = joint.limits {
        let mut e = BytesStart::new("limit");
        if let Some(lower) = limits.lower {
            e.push_attribute(("lower", fmt_float(lower).as_str()));
        }
        if let Some(upper) = limits.upper {
            e.push_attribute(("upper", fmt_float(upper).as_str()));
        }
        if let Some(effort) = limits.effort {
            e.push_attribute(("effort", fmt_float(effort).as_str()));
        }
        if let Some(velocity) = limits.velocity {
            e.push_attribute(("velocity", fmt_float(velocity).as_str()));
        }
        writer.write_event(Event::Empty(e))?;
    }

    if let Some(dynamics) = joint.dynamics {
        let mut e = BytesStart::new("dynamics");
        e.push_attribute(("damping", fmt_float(dynamics.damping).as_str()));
        e.push_attribute(("friction", fmt_float(dynamics.friction).as_str()));
        writer.write_event(Event::Empty(e))?;
    }

    writer.write_event(Event::End(BytesEnd::new("joint")))?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::schema::{Inertia, JointLimits, Metadata};
    use crate::urdf::parser::parse_urdf_str;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn two_link_arm() -> CommonSchema {
        CommonSchema::new(Metadata::new("arm"))
            .with_link(
                Link::new("base")
                    .with_mass(1.0)
                    .with_inertia(Inertia::from_diagonal(0.1, 0.1, 0.1)),
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
        let xml = export_urdf_string(&two_link_arm()).expect("should export");
        assert!(xml.contains(r#"<robot name="arm">"#));
        assert!(xml.contains(r#"<joint name="shoulder" type="revolute">"#));
        assert!(xml.contains(r#"<parent link="base"/>"#));
        assert!(xml.contains(r#"<child link="upper_arm"/>"#));
    }

    #[test]
    fn test_export_parse_roundtrip() {
        let schema = two_link_arm();
        let xml = export_urdf_string(&schema).expect("should export");
        let back = parse_urdf_str(&xml).expect("should reparse");

        assert_eq!(back.links.len(), 2);
        assert_eq!(back.joints.len(), 1);

        let base = back.link("base").expect("base");
        assert_relative_eq!(base.mass, 1.0);
        assert_relative_eq!(base.inertia.ixx, 0.1);

        let joint = back.joint("shoulder").expect("shoulder");
        assert_eq!(joint.joint_type, JointType::Revolute);
        assert_relative_eq!(joint.axis.y, 1.0);
        assert_relative_eq!(joint.limits.unwrap().effort.unwrap(), 20.0);
    }

    #[test]
    fn test_spherical_joint_falls_back_to_fixed() {
        let schema = CommonSchema::new(Metadata::new("test"))
            .with_link(Link::new("a"))
            .with_link(Link::new("b"))
            .with_joint(Joint::new("ball", JointType::Spherical, "a", "b"));

        let xml = export_urdf_string(&schema).expect("should export");
        assert!(xml.contains(r#"type="fixed""#));
        assert!(!xml.contains(r#"type="spherical""#));
    }

    #[test]
    fn test_fixed_joint_has_no_axis() {
        let schema = CommonSchema::new(Metadata::new("test"))
            .with_link(Link::new("a"))
            .with_link(Link::new("b"))
            .with_joint(Joint::new("weld", JointType::Fixed, "a", "b"));

        let xml = export_urdf_string(&schema).expect("should export");
        assert!(!xml.contains("<axis"));
    }

    #[test]
    fn test_empty_link_is_self_closing() {
        let schema = CommonSchema::new(Metadata::new("test")).with_link(Link::new("frame"));
        let xml = export_urdf_string(&schema).expect("should export");
        assert!(xml.contains(r#"<link name="frame"/>"#));
    }

    #[test]
    fn test_material_export() {
        let mut schema = CommonSchema::new(Metadata::new("test"));
        let link = Link::new("base").with_visual(Visual {
            name: None,
            pose: Pose::default(),
            geometry: Some(Geometry::Sphere { radius: 0.1 }),
            material: Some(Material {
                name: Some("red".to_string()),
                color: Some([1.0, 0.0, 0.0, 1.0]),
                ..Material::default()
            }),
        });
        schema.links.push(link);

        let xml = export_urdf_string(&schema).expect("should export");
        assert!(xml.contains(r#"<material name="red">"#));
        assert!(xml.contains(r#"rgba="1.0 0.0 0.0 1.0""#));
    }
}
