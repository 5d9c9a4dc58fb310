//! URDF XML parser.
//!
//! Parses URDF XML into the common schema. Element-level problems (unknown
//! joint types, malformed numbers, zero-length axes) are recorded on the
//! parse context and the offending element is skipped or defaulted; only a
//! malformed document or a missing root element aborts the parse.

use std::fs;
use std::io::BufRead;
use std::path::Path;

use nalgebra::Vector3;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;

use crate::context::{ParseContext, normalize_axis};
use crate::error::{ConvertError, Result};
use crate::schema::{
    Collision, CommonSchema, Geometry, Inertia, Joint, JointDynamics, JointLimits, JointType,
    Link, Material, Metadata, Pose, Visual,
};
use crate::urdf::validation::check_kinematics;
use crate::xml::{
    get_attribute, get_attribute_opt, parse_float_attr, parse_float_list, parse_vector3,
    skip_element,
};

/// Parse a URDF file into the common schema.
pub fn parse_urdf_file(path: &Path) -> Result<CommonSchema> {
    let xml = fs::read_to_string(path)?;
    parse_urdf_with(&xml, ParseContext::for_file(path))
}

/// Parse a URDF string into the common schema.
pub fn parse_urdf_str(xml: &str) -> Result<CommonSchema> {
    parse_urdf_with(xml, ParseContext::new())
}

fn parse_urdf_with(xml: &str, mut ctx: ParseContext) -> Result<CommonSchema> {
    // Materials may be declared at robot scope and referenced by name from
    // any visual, including visuals that appear earlier in the document, so
    // collect them in a first pass.
    collect_materials(xml, &mut ctx)?;

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut schema: Option<CommonSchema> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"robot" => {
                schema = Some(parse_robot(&mut reader, e, &mut ctx)?);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(ConvertError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    let mut schema =
        schema.ok_or_else(|| ConvertError::missing_element("robot", "URDF document"))?;

    check_kinematics(&schema, &mut ctx);
    ctx.attach(&mut schema);

    debug!(
        links = schema.links.len(),
        joints = schema.joints.len(),
        "parsed URDF document"
    );
    Ok(schema)
}

/// First pass: collect robot-scope material definitions.
fn collect_materials(xml: &str, ctx: &mut ParseContext) -> Result<()> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    // Depth below <robot>; only depth-1 materials are global.
    let mut depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                if depth == 1 && e.name().as_ref() == b"material" {
                    if let Some(material) = parse_material_element(&mut reader, e, ctx)? {
                        if let Some(name) = material.name.clone() {
                            ctx.materials.insert(name, material);
                        }
                    }
                } else {
                    depth += 1;
                }
            }
            Ok(Event::End(_)) => {
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(ConvertError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(())
}

/// Parse the robot element and its children.
fn parse_robot<R: BufRead>(
    reader: &mut Reader<R>,
    start: &BytesStart,
    ctx: &mut ParseContext,
) -> Result<CommonSchema> {
    let name = get_attribute(start, "name")?;
    let mut schema = CommonSchema::new(Metadata::new(name).with_source_format("urdf"));
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                match elem_name.as_slice() {
                    b"link" => match parse_link(reader, e, ctx) {
                        Ok(link) => schema.links.push(link),
                        Err(err) => ctx.add_error("link", err.to_string()),
                    },
                    b"joint" => match parse_joint(reader, e, ctx) {
                        Ok(Some(joint)) => schema.joints.push(joint),
                        Ok(None) => {}
                        Err(err) => ctx.add_error("joint", err.to_string()),
                    },
                    // Global materials were handled by the first pass.
                    _ => skip_element(reader, &elem_name)?,
                }
            }
            Ok(Event::Empty(ref e)) => {
                if e.name().as_ref() == b"link" {
                    let name = get_attribute(e, "name")?;
                    schema.links.push(Link::new(name));
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"robot" => break,
            Ok(Event::Eof) => {
                return Err(ConvertError::XmlParse("unexpected EOF in robot".into()));
            }
            Ok(_) => {}
            Err(e) => return Err(ConvertError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(schema)
}

/// Parse a link element.
fn parse_link<R: BufRead>(
    reader: &mut Reader<R>,
    start: &BytesStart,
    ctx: &mut ParseContext,
) -> Result<Link> {
    let name = get_attribute(start, "name")?;
    let mut link = Link::new(name);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                match elem_name.as_slice() {
                    b"inertial" => parse_inertial(reader, &mut link, ctx)?,
                    b"visual" => {
                        let visual = parse_visual(reader, e, ctx)?;
                        link.visuals.push(visual);
                    }
                    b"collision" => {
                        let collision = parse_collision(reader, e, ctx)?;
                        link.collisions.push(collision);
                    }
                    _ => skip_element(reader, &elem_name)?,
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"link" => break,
            Ok(Event::Eof) => {
                return Err(ConvertError::XmlParse("unexpected EOF in link".into()));
            }
            Ok(_) => {}
            Err(e) => return Err(ConvertError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    if link.mass < 0.0 {
        ctx.add_warning(format!(
            "link '{}' has negative mass {}",
            link.name, link.mass
        ));
    }

    Ok(link)
}

/// Parse an inertial element into the link's mass properties.
fn parse_inertial<R: BufRead>(
    reader: &mut Reader<R>,
    link: &mut Link,
    ctx: &mut ParseContext,
) -> Result<()> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"origin" => {
                    link.center_of_mass = get_attribute_opt(e, "xyz")
                        .map(|s| parse_vector3(&s))
                        .transpose()?
                        .unwrap_or_else(Vector3::zeros);
                }
                b"mass" => match get_attribute(e, "value")?.parse() {
                    Ok(mass) => link.mass = mass,
                    Err(_) => {
                        ctx.add_error(
                            &format!("link '{}'", link.name),
                            "mass value is not a number",
                        );
                    }
                },
                b"inertia" => {
                    link.inertia = Inertia {
                        ixx: parse_float_attr(e, "ixx").unwrap_or(0.0),
                        iyy: parse_float_attr(e, "iyy").unwrap_or(0.0),
                        izz: parse_float_attr(e, "izz").unwrap_or(0.0),
                        ixy: parse_float_attr(e, "ixy").unwrap_or(0.0),
                        ixz: parse_float_attr(e, "ixz").unwrap_or(0.0),
                        iyz: parse_float_attr(e, "iyz").unwrap_or(0.0),
                    };
                }
                _ => {}
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"inertial" => break,
            Ok(Event::Eof) => {
                return Err(ConvertError::XmlParse("unexpected EOF in inertial".into()));
            }
            Ok(_) => {}
            Err(e) => return Err(ConvertError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(())
}

/// Parse origin element attributes into a pose.
fn parse_origin(e: &BytesStart) -> Result<Pose> {
    let xyz = get_attribute_opt(e, "xyz")
        .map(|s| parse_vector3(&s))
        .transpose()?
        .unwrap_or_else(Vector3::zeros);
    let rpy = get_attribute_opt(e, "rpy")
        .map(|s| parse_vector3(&s))
        .transpose()?
        .unwrap_or_else(Vector3::zeros);
    Ok(Pose::from_xyz_rpy(xyz, rpy))
}

/// Parse a visual element.
fn parse_visual<R: BufRead>(
    reader: &mut Reader<R>,
    start: &BytesStart,
    ctx: &mut ParseContext,
) -> Result<Visual> {
    let name = get_attribute_opt(start, "name");
    let mut visual = Visual {
        name,
        ..Visual::default()
    };
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                match elem_name.as_slice() {
                    b"origin" => visual.pose = parse_origin(e)?,
                    b"geometry" => visual.geometry = parse_geometry(reader, ctx)?,
                    b"material" => {
                        visual.material = parse_material_element(reader, e, ctx)?;
                    }
                    _ => skip_element(reader, &elem_name)?,
                }
            }
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"origin" => visual.pose = parse_origin(e)?,
                b"material" => {
                    visual.material = material_reference(e, ctx);
                }
                _ => {}
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"visual" => break,
            Ok(Event::Eof) => {
                return Err(ConvertError::XmlParse("unexpected EOF in visual".into()));
            }
            Ok(_) => {}
            Err(e) => return Err(ConvertError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(visual)
}

/// Parse a collision element.
fn parse_collision<R: BufRead>(
    reader: &mut Reader<R>,
    start: &BytesStart,
    ctx: &mut ParseContext,
) -> Result<Collision> {
    let name = get_attribute_opt(start, "name");
    let mut collision = Collision {
        name,
        ..Collision::default()
    };
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                match elem_name.as_slice() {
                    b"origin" => collision.pose = parse_origin(e)?,
                    b"geometry" => collision.geometry = parse_geometry(reader, ctx)?,
                    _ => skip_element(reader, &elem_name)?,
                }
            }
            Ok(Event::Empty(ref e)) => {
                if e.name().as_ref() == b"origin" {
                    collision.pose = parse_origin(e)?;
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"collision" => break,
            Ok(Event::Eof) => {
                return Err(ConvertError::XmlParse("unexpected EOF in collision".into()));
            }
            Ok(_) => {}
            Err(e) => return Err(ConvertError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(collision)
}

/// Parse a geometry element. An unknown or malformed shape is recorded on
/// the context and the geometry stays empty.
fn parse_geometry<R: BufRead>(
    reader: &mut Reader<R>,
    ctx: &mut ParseContext,
) -> Result<Option<Geometry>> {
    let mut buf = Vec::new();
    let mut geometry: Option<Geometry> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                match parse_shape(e, ctx) {
                    Ok(Some(shape)) => geometry = Some(shape),
                    Ok(None) => {}
                    Err(err) => {
                        ctx.add_error("geometry", err.to_string());
                    }
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"geometry" => break,
            Ok(Event::Eof) => {
                return Err(ConvertError::XmlParse("unexpected EOF in geometry".into()));
            }
            Ok(_) => {}
            Err(e) => return Err(ConvertError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(geometry)
}

fn parse_shape(e: &BytesStart, ctx: &mut ParseContext) -> Result<Option<Geometry>> {
    match e.name().as_ref() {
        b"box" => {
            let size = parse_vector3(&get_attribute(e, "size")?)?;
            Ok(Some(Geometry::Box { size }))
        }
        b"cylinder" => {
            let radius = parse_float_attr(e, "radius")
                .ok_or_else(|| ConvertError::missing_attribute("radius", "cylinder"))?;
            let length = parse_float_attr(e, "length")
                .ok_or_else(|| ConvertError::missing_attribute("length", "cylinder"))?;
            Ok(Some(Geometry::Cylinder { radius, length }))
        }
        b"sphere" => {
            let radius = parse_float_attr(e, "radius")
                .ok_or_else(|| ConvertError::missing_attribute("radius", "sphere"))?;
            Ok(Some(Geometry::Sphere { radius }))
        }
        b"mesh" => {
            let filename = get_attribute(e, "filename")?;
            let scale = get_attribute_opt(e, "scale")
                .map(|s| parse_vector3(&s))
                .transpose()?;
            ctx.resolve_mesh(&filename, &filename);
            Ok(Some(Geometry::Mesh { filename, scale }))
        }
        _ => Ok(None),
    }
}

/// Parse a `<material>` start element and its children.
///
/// A bare `<material name="..."/>` is a reference to a robot-scope material;
/// one with `<color>` or `<texture>` children is a definition.
fn parse_material_element<R: BufRead>(
    reader: &mut Reader<R>,
    start: &BytesStart,
    ctx: &mut ParseContext,
) -> Result<Option<Material>> {
    let name = get_attribute_opt(start, "name");
    let mut color: Option<[f64; 4]> = None;
    let mut texture: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"color" => {
                    if let Some(rgba) = get_attribute_opt(e, "rgba") {
                        match parse_float_list(&rgba) {
                            Ok(values) if values.len() == 4 => {
                                color = Some([values[0], values[1], values[2], values[3]]);
                            }
                            _ => {
                                ctx.add_error("material", format!("invalid rgba value: {rgba}"));
                            }
                        }
                    }
                }
                b"texture" => {
                    texture = get_attribute_opt(e, "filename");
                }
                _ => {}
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"material" => break,
            Ok(Event::Eof) => {
                return Err(ConvertError::XmlParse("unexpected EOF in material".into()));
            }
            Ok(_) => {}
            Err(e) => return Err(ConvertError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    if color.is_none() && texture.is_none() {
        // Pure reference; resolve against the robot-scope definitions.
        if let Some(ref name) = name {
            if let Some(resolved) = ctx.materials.get(name) {
                return Ok(Some(resolved.clone()));
            }
        }
    }

    Ok(Some(Material {
        name,
        color,
        texture,
        specular: None,
        shininess: None,
    }))
}

/// Resolve a self-closing `<material name="..."/>` reference.
fn material_reference(e: &BytesStart, ctx: &ParseContext) -> Option<Material> {
    let name = get_attribute_opt(e, "name")?;
    match ctx.materials.get(&name) {
        Some(resolved) => Some(resolved.clone()),
        None => Some(Material {
            name: Some(name),
            ..Material::default()
        }),
    }
}

/// Parse a joint element. Returns None (with an error recorded) when the
/// joint is unusable: missing name or type, unknown type, or missing
/// parent/child. The element is always consumed so the parse continues.
fn parse_joint<R: BufRead>(
    reader: &mut Reader<R>,
    start: &BytesStart,
    ctx: &mut ParseContext,
) -> Result<Option<Joint>> {
    let name = get_attribute_opt(start, "name");
    let type_str = get_attribute_opt(start, "type");

    let mut parent: Option<String> = None;
    let mut child: Option<String> = None;
    let mut pose = Pose::default();
    let mut axis: Option<Vector3<f64>> = None;
    let mut limits: Option<JointLimits> = None;
    let mut dynamics: Option<JointDynamics> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                match elem_name.as_slice() {
                    b"parent" => parent = Some(get_attribute(e, "link")?),
                    b"child" => child = Some(get_attribute(e, "link")?),
                    b"origin" => pose = parse_origin(e)?,
                    b"axis" => {
                        if let Some(xyz) = get_attribute_opt(e, "xyz") {
                            axis = Some(parse_vector3(&xyz)?);
                        }
                    }
                    b"limit" => {
                        limits = Some(JointLimits {
                            lower: parse_float_attr(e, "lower"),
                            upper: parse_float_attr(e, "upper"),
                            effort: parse_float_attr(e, "effort"),
                            velocity: parse_float_attr(e, "velocity"),
                        });
                    }
                    b"dynamics" => {
                        dynamics = Some(JointDynamics {
                            damping: parse_float_attr(e, "damping").unwrap_or(0.0),
                            friction: parse_float_attr(e, "friction").unwrap_or(0.0),
                        });
                    }
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"joint" => break,
            Ok(Event::Eof) => {
                return Err(ConvertError::XmlParse("unexpected EOF in joint".into()));
            }
            Ok(_) => {}
            Err(e) => return Err(ConvertError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    let Some(name) = name else {
        ctx.add_error("joint", "missing name attribute");
        return Ok(None);
    };
    let Some(type_str) = type_str else {
        ctx.add_error(&format!("joint '{name}'"), "missing type attribute");
        return Ok(None);
    };
    let Some(joint_type) = JointType::from_str(&type_str) else {
        ctx.add_error(
            &format!("joint '{name}'"),
            format!("unknown joint type '{type_str}'"),
        );
        return Ok(None);
    };
    let Some(parent) = parent else {
        ctx.add_error(&format!("joint '{name}'"), "missing parent element");
        return Ok(None);
    };
    let Some(child) = child else {
        ctx.add_error(&format!("joint '{name}'"), "missing child element");
        return Ok(None);
    };

    let axis = normalize_axis(axis, &name, ctx);

    let mut joint = Joint::new(name, joint_type, parent, child)
        .with_pose(pose)
        .with_axis(axis);
    if let Some(l) = limits {
        joint = joint.with_limits(l);
    }
    if let Some(d) = dynamics {
        joint = joint.with_dynamics(d);
    }

    Ok(Some(joint))
}
