//! MJCF XML parser.
//!
//! Parses MJCF XML into the common schema. MJCF declares the kinematic tree
//! by nesting `<body>` elements, stores quaternions scalar-first, and gives
//! box and capsule sizes as half-extents; all of that is normalized here so
//! the rest of the crate never sees MJCF conventions.

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
    Actuator, ActuatorType, Collision, CommonSchema, Geometry, Inertia, Joint, JointDynamics,
    JointLimits, JointType, Link, Material, Metadata, Pose, Quaternion, Sensor,
    SurfaceCoefficients, Visual, WORLD_LINK,
};
use crate::xml::{
    get_attribute, get_attribute_opt, parse_float_attr, parse_float_list, parse_vector3,
    skip_element,
};

/// Parse an MJCF file into the common schema.
pub fn parse_mjcf_file(path: &Path) -> Result<CommonSchema> {
    let xml = fs::read_to_string(path)?;
    parse_mjcf_with(&xml, ParseContext::for_file(path))
}

/// Parse an MJCF string into the common schema.
pub fn parse_mjcf_str(xml: &str) -> Result<CommonSchema> {
    parse_mjcf_with(xml, ParseContext::new())
}

fn parse_mjcf_with(xml: &str, mut ctx: ParseContext) -> Result<CommonSchema> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut schema: Option<CommonSchema> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"mujoco" => {
                schema = Some(parse_mujoco(&mut reader, e, &mut ctx)?);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(ConvertError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    let mut schema =
        schema.ok_or_else(|| ConvertError::missing_element("mujoco", "MJCF document"))?;
    ctx.attach(&mut schema);

    debug!(
        links = schema.links.len(),
        joints = schema.joints.len(),
        actuators = schema.actuators.len(),
        "parsed MJCF document"
    );
    Ok(schema)
}

/// Parser state shared across the body recursion.
struct MjcfState {
    schema: CommonSchema,
    /// Angles in degrees unless `<compiler angle="radian"/>` says otherwise.
    degrees: bool,
}

/// Parse the mujoco root element and its children.
fn parse_mujoco<R: BufRead>(
    reader: &mut Reader<R>,
    start: &BytesStart,
    ctx: &mut ParseContext,
) -> Result<CommonSchema> {
    let name = get_attribute_opt(start, "model").unwrap_or_else(|| "unnamed".to_string());
    let mut state = MjcfState {
        schema: CommonSchema::new(Metadata::new(name).with_source_format("mjcf")),
        degrees: true,
    };
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                match elem_name.as_slice() {
                    b"compiler" => {
                        if let Some(angle) = get_attribute_opt(e, "angle") {
                            state.degrees = angle != "radian";
                        }
                        skip_element(reader, &elem_name)?;
                    }
                    b"asset" => parse_asset(reader, ctx)?,
                    b"worldbody" => parse_worldbody(reader, &mut state, ctx)?,
                    b"actuator" => parse_actuators(reader, &mut state, ctx)?,
                    b"sensor" => parse_sensors(reader, &mut state)?,
                    b"contact" => parse_contact_pairs(reader, &mut state)?,
                    _ => skip_element(reader, &elem_name)?,
                }
            }
            Ok(Event::Empty(ref e)) => {
                if e.name().as_ref() == b"compiler" {
                    if let Some(angle) = get_attribute_opt(e, "angle") {
                        state.degrees = angle != "radian";
                    }
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"mujoco" => break,
            Ok(Event::Eof) => {
                return Err(ConvertError::XmlParse("unexpected EOF in mujoco".into()));
            }
            Ok(_) => {}
            Err(e) => return Err(ConvertError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(state.schema)
}

/// Parse the asset section: named materials and mesh files.
fn parse_asset<R: BufRead>(reader: &mut Reader<R>, ctx: &mut ParseContext) -> Result<()> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"material" => {
                    let name = get_attribute(e, "name")?;
                    let color = get_attribute_opt(e, "rgba")
                        .and_then(|s| parse_rgba(&s, ctx));
                    ctx.materials.insert(
                        name.clone(),
                        Material {
                            name: Some(name),
                            color,
                            texture: get_attribute_opt(e, "texture"),
                            specular: None,
                            shininess: parse_float_attr(e, "shininess"),
                        },
                    );
                }
                b"mesh" => {
                    let file = get_attribute_opt(e, "file").unwrap_or_default();
                    let name = get_attribute_opt(e, "name").unwrap_or_else(|| {
                        Path::new(&file)
                            .file_stem()
                            .map(|s| s.to_string_lossy().into_owned())
                            .unwrap_or_default()
                    });
                    if !name.is_empty() {
                        ctx.resolve_mesh(&name, &file);
                    }
                }
                _ => {}
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"asset" => break,
            Ok(Event::Eof) => {
                return Err(ConvertError::XmlParse("unexpected EOF in asset".into()));
            }
            Ok(_) => {}
            Err(e) => return Err(ConvertError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(())
}

fn parse_rgba(s: &str, ctx: &mut ParseContext) -> Option<[f64; 4]> {
    match parse_float_list(s) {
        Ok(values) if values.len() == 4 => Some([values[0], values[1], values[2], values[3]]),
        _ => {
            ctx.add_error("material", format!("invalid rgba value: {s}"));
            None
        }
    }
}

/// Parse worldbody: recurse into the nested body tree.
fn parse_worldbody<R: BufRead>(
    reader: &mut Reader<R>,
    state: &mut MjcfState,
    ctx: &mut ParseContext,
) -> Result<()> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                match elem_name.as_slice() {
                    b"body" => parse_body(reader, e, WORLD_LINK, state, ctx)?,
                    // Static geoms attached directly to the world (floors,
                    // walls) have no link to live on; note and move on.
                    b"geom" => {
                        ctx.add_warning("ignoring static geom attached to worldbody");
                        skip_element(reader, &elem_name)?;
                    }
                    _ => skip_element(reader, &elem_name)?,
                }
            }
            Ok(Event::Empty(ref e)) => {
                if e.name().as_ref() == b"geom" {
                    ctx.add_warning("ignoring static geom attached to worldbody");
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"worldbody" => break,
            Ok(Event::Eof) => {
                return Err(ConvertError::XmlParse("unexpected EOF in worldbody".into()));
            }
            Ok(_) => {}
            Err(e) => return Err(ConvertError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(())
}

/// A joint declaration inside a body, before it is turned into an edge.
struct BodyJoint {
    name: Option<String>,
    joint_type: JointType,
    pos: Vector3<f64>,
    axis: Vector3<f64>,
    limits: Option<JointLimits>,
    dynamics: Option<JointDynamics>,
}

/// Parse a body element and recurse into its children.
///
/// The nested MJCF body tree is flattened into schema links and joints as it
/// is walked; `parent` is the name of the enclosing body or the world
/// sentinel for top-level bodies.
fn parse_body<R: BufRead>(
    reader: &mut Reader<R>,
    start: &BytesStart,
    parent: &str,
    state: &mut MjcfState,
    ctx: &mut ParseContext,
) -> Result<()> {
    let name = get_attribute_opt(start, "name")
        .unwrap_or_else(|| format!("body{}", state.schema.links.len()));
    let body_pose = parse_body_pose(start, state.degrees)?;

    let mut link = Link::new(name.clone());
    let mut joints: Vec<BodyJoint> = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                match elem_name.as_slice() {
                    b"body" => parse_body(reader, e, &name, state, ctx)?,
                    b"joint" => {
                        if let Some(joint) = parse_body_joint(e, &name, state.degrees, ctx)? {
                            joints.push(joint);
                        }
                        skip_element(reader, &elem_name)?;
                    }
                    b"freejoint" => {
                        joints.push(BodyJoint {
                            name: get_attribute_opt(e, "name"),
                            joint_type: JointType::Floating,
                            pos: Vector3::zeros(),
                            axis: Vector3::z(),
                            limits: None,
                            dynamics: None,
                        });
                        skip_element(reader, &elem_name)?;
                    }
                    b"geom" => {
                        parse_geom(e, &mut link, state.degrees, ctx)?;
                        skip_element(reader, &elem_name)?;
                    }
                    b"inertial" => {
                        parse_inertial(e, &mut link, ctx);
                        skip_element(reader, &elem_name)?;
                    }
                    _ => skip_element(reader, &elem_name)?,
                }
            }
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"joint" => {
                    if let Some(joint) = parse_body_joint(e, &name, state.degrees, ctx)? {
                        joints.push(joint);
                    }
                }
                b"freejoint" => {
                    joints.push(BodyJoint {
                        name: get_attribute_opt(e, "name"),
                        joint_type: JointType::Floating,
                        pos: Vector3::zeros(),
                        axis: Vector3::z(),
                        limits: None,
                        dynamics: None,
                    });
                }
                b"geom" => parse_geom(e, &mut link, state.degrees, ctx)?,
                b"inertial" => parse_inertial(e, &mut link, ctx),
                _ => {}
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"body" => break,
            Ok(Event::Eof) => {
                return Err(ConvertError::XmlParse("unexpected EOF in body".into()));
            }
            Ok(_) => {}
            Err(e) => return Err(ConvertError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    state.schema.links.push(link);
    connect_body(&name, parent, body_pose, joints, state, ctx);
    Ok(())
}

/// Turn a body's joint declarations into a schema joint edge.
fn connect_body(
    name: &str,
    parent: &str,
    body_pose: Pose,
    mut joints: Vec<BodyJoint>,
    state: &mut MjcfState,
    ctx: &mut ParseContext,
) {
    if joints.len() > 1 {
        ctx.add_warning(format!(
            "body '{name}' declares {} joints, keeping the first (composite joints are \
             represented as a single joint)",
            joints.len()
        ));
        joints.truncate(1);
    }

    let joint = match joints.pop() {
        Some(decl) => {
            let joint_name = decl
                .name
                .unwrap_or_else(|| format!("{name}_{}", decl.joint_type.as_str()));
            let mut pose = body_pose;
            pose.position += decl.pos;
            let mut joint = Joint::new(joint_name, decl.joint_type, parent, name)
                .with_pose(pose)
                .with_axis(decl.axis);
            if let Some(l) = decl.limits {
                joint = joint.with_limits(l);
            }
            if let Some(d) = decl.dynamics {
                joint = joint.with_dynamics(d);
            }
            Some(joint)
        }
        // A jointless body is welded to its parent. Top-level bodies stay
        // roots so the tree keeps a root link.
        None if parent != WORLD_LINK => Some(
            Joint::new(format!("{name}_fixed"), JointType::Fixed, parent, name)
                .with_pose(body_pose),
        ),
        None => None,
    };

    if let Some(joint) = joint {
        state.schema.joints.push(joint);
    }
}

/// Parse body pos/quat/euler attributes into a pose.
fn parse_body_pose(e: &BytesStart, degrees: bool) -> Result<Pose> {
    let position = get_attribute_opt(e, "pos")
        .map(|s| parse_vector3(&s))
        .transpose()?
        .unwrap_or_else(Vector3::zeros);

    let orientation = if let Some(quat) = get_attribute_opt(e, "quat") {
        let values = parse_float_list(&quat)?;
        if values.len() != 4 {
            return Err(ConvertError::invalid_attribute(
                "quat",
                "body",
                "expected 4 values",
            ));
        }
        // MJCF quaternions are scalar-first.
        Quaternion::from_wxyz(values[0], values[1], values[2], values[3])
    } else if let Some(euler) = get_attribute_opt(e, "euler") {
        let mut rpy = parse_vector3(&euler)?;
        if degrees {
            rpy *= std::f64::consts::PI / 180.0;
        }
        Quaternion::from_rpy(rpy.x, rpy.y, rpy.z)
    } else {
        Quaternion::identity()
    };

    Ok(Pose {
        position,
        orientation,
    })
}

/// Parse a joint declaration. Unknown types are recorded and skipped.
fn parse_body_joint(
    e: &BytesStart,
    body: &str,
    degrees: bool,
    ctx: &mut ParseContext,
) -> Result<Option<BodyJoint>> {
    let name = get_attribute_opt(e, "name");
    let type_str = get_attribute_opt(e, "type").unwrap_or_else(|| "hinge".to_string());
    let joint_type = match type_str.as_str() {
        "hinge" => JointType::Revolute,
        "slide" => JointType::Prismatic,
        "ball" => JointType::Spherical,
        "free" => JointType::Floating,
        other => {
            ctx.add_error(
                &format!("body '{body}'"),
                format!("unknown joint type '{other}'"),
            );
            return Ok(None);
        }
    };

    let pos = get_attribute_opt(e, "pos")
        .map(|s| parse_vector3(&s))
        .transpose()?
        .unwrap_or_else(Vector3::zeros);
    let axis = get_attribute_opt(e, "axis")
        .map(|s| parse_vector3(&s))
        .transpose()?;
    let axis = normalize_axis(axis, name.as_deref().unwrap_or(body), ctx);

    // Rotational ranges follow the compiler angle mode, like euler attrs.
    let rotational = matches!(joint_type, JointType::Revolute | JointType::Spherical);
    let angle_scale = if degrees && rotational {
        std::f64::consts::PI / 180.0
    } else {
        1.0
    };

    let limits = match get_attribute_opt(e, "range") {
        Some(range) => {
            let values = parse_float_list(&range)?;
            if values.len() == 2 {
                Some(JointLimits {
                    lower: Some(values[0] * angle_scale),
                    upper: Some(values[1] * angle_scale),
                    effort: None,
                    velocity: None,
                })
            } else {
                ctx.add_error(&format!("body '{body}'"), format!("invalid range: {range}"));
                None
            }
        }
        None => None,
    };

    let damping = parse_float_attr(e, "damping");
    let friction = parse_float_attr(e, "frictionloss");
    let dynamics = if damping.is_some() || friction.is_some() {
        Some(JointDynamics {
            damping: damping.unwrap_or(0.0),
            friction: friction.unwrap_or(0.0),
        })
    } else {
        None
    };

    // Hinge joints without a range stay revolute; MJCF has no separate
    // continuous type.
    Ok(Some(BodyJoint {
        name,
        joint_type,
        pos,
        axis,
        limits,
        dynamics,
    }))
}

/// Parse an inertial element into the link's mass properties.
fn parse_inertial(e: &BytesStart, link: &mut Link, ctx: &mut ParseContext) {
    if let Some(mass) = parse_float_attr(e, "mass") {
        link.mass = mass;
        if mass < 0.0 {
            ctx.add_warning(format!("link '{}' has negative mass {mass}", link.name));
        }
    }
    if let Some(pos) = get_attribute_opt(e, "pos") {
        if let Ok(com) = parse_vector3(&pos) {
            link.center_of_mass = com;
        }
    }
    if let Some(diag) = get_attribute_opt(e, "diaginertia") {
        match parse_vector3(&diag) {
            Ok(d) => link.inertia = Inertia::from_diagonal(d.x, d.y, d.z),
            Err(_) => {
                ctx.add_error(
                    &format!("link '{}'", link.name),
                    format!("invalid diaginertia: {diag}"),
                );
            }
        }
    } else if let Some(full) = get_attribute_opt(e, "fullinertia") {
        // Order: ixx iyy izz ixy ixz iyz.
        match parse_float_list(&full) {
            Ok(v) if v.len() == 6 => {
                link.inertia = Inertia {
                    ixx: v[0],
                    iyy: v[1],
                    izz: v[2],
                    ixy: v[3],
                    ixz: v[4],
                    iyz: v[5],
                };
            }
            _ => {
                ctx.add_error(
                    &format!("link '{}'", link.name),
                    format!("invalid fullinertia: {full}"),
                );
            }
        }
    }
}

/// Parse a geom element into the link's visual and collision lists.
///
/// MJCF geoms serve both purposes, so each geom becomes one visual and one
/// collision with the same shape and pose.
fn parse_geom(e: &BytesStart, link: &mut Link, degrees: bool, ctx: &mut ParseContext) -> Result<()> {
    let name = get_attribute_opt(e, "name");
    let pose = parse_body_pose(e, degrees)?;
    let geometry = parse_geom_shape(e, ctx)?;

    let material = match get_attribute_opt(e, "material") {
        Some(name) => match ctx.materials.get(&name) {
            Some(resolved) => Some(resolved.clone()),
            None => Some(Material {
                name: Some(name),
                ..Material::default()
            }),
        },
        None => get_attribute_opt(e, "rgba")
            .and_then(|s| parse_rgba(&s, ctx))
            .map(|color| Material {
                name: None,
                color: Some(color),
                ..Material::default()
            }),
    };

    // MJCF friction: sliding, torsional, rolling.
    let surface = get_attribute_opt(e, "friction").map(|s| {
        let values = parse_float_list(&s).unwrap_or_default();
        SurfaceCoefficients {
            mu_static: values.first().copied(),
            mu_dynamic: values.first().copied(),
            restitution: None,
            stiffness: None,
            damping: None,
        }
    });

    link.visuals.push(Visual {
        name: name.clone(),
        pose,
        geometry: geometry.clone(),
        material,
    });
    link.collisions.push(Collision {
        name,
        pose,
        geometry,
        surface,
    });
    Ok(())
}

/// Decode a geom's type and size, converting MJCF half-extents and
/// half-lengths to full sizes.
fn parse_geom_shape(e: &BytesStart, ctx: &mut ParseContext) -> Result<Option<Geometry>> {
    let type_str = get_attribute_opt(e, "type").unwrap_or_else(|| "sphere".to_string());
    let size = get_attribute_opt(e, "size")
        .map(|s| parse_float_list(&s))
        .transpose()?
        .unwrap_or_default();

    let shape = match type_str.as_str() {
        "sphere" => match size.first() {
            Some(&radius) => Some(Geometry::Sphere { radius }),
            None => {
                ctx.add_error("geom", "sphere requires a size");
                None
            }
        },
        "box" => {
            if size.len() >= 3 {
                Some(Geometry::Box {
                    size: Vector3::new(size[0] * 2.0, size[1] * 2.0, size[2] * 2.0),
                })
            } else {
                ctx.add_error("geom", "box requires 3 size values");
                None
            }
        }
        "cylinder" => {
            if size.len() >= 2 {
                Some(Geometry::Cylinder {
                    radius: size[0],
                    length: size[1] * 2.0,
                })
            } else {
                ctx.add_error("geom", "cylinder requires 2 size values");
                None
            }
        }
        "capsule" => {
            if size.len() >= 2 {
                Some(Geometry::Capsule {
                    radius: size[0],
                    length: size[1] * 2.0,
                })
            } else {
                ctx.add_error("geom", "capsule requires 2 size values");
                None
            }
        }
        "ellipsoid" => {
            if size.len() >= 3 {
                Some(Geometry::Ellipsoid {
                    radii: Vector3::new(size[0], size[1], size[2]),
                })
            } else {
                ctx.add_error("geom", "ellipsoid requires 3 size values");
                None
            }
        }
        "plane" => Some(Geometry::Plane),
        "mesh" => {
            let mesh_name = get_attribute_opt(e, "mesh").unwrap_or_default();
            let filename = ctx
                .meshes
                .get(&mesh_name)
                .cloned()
                .unwrap_or_else(|| mesh_name.clone());
            Some(Geometry::Mesh {
                filename,
                scale: None,
            })
        }
        other => {
            ctx.add_error("geom", format!("unknown geom type '{other}'"));
            None
        }
    };

    Ok(shape)
}

/// Parse the actuator section.
fn parse_actuators<R: BufRead>(
    reader: &mut Reader<R>,
    state: &mut MjcfState,
    ctx: &mut ParseContext,
) -> Result<()> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let actuator_type = match e.name().as_ref() {
                    b"motor" | b"general" => Some(ActuatorType::Motor),
                    b"position" => Some(ActuatorType::Position),
                    b"velocity" => Some(ActuatorType::Velocity),
                    b"muscle" => Some(ActuatorType::Muscle),
                    _ => None,
                };
                if let Some(actuator_type) = actuator_type {
                    match parse_actuator(e, actuator_type) {
                        Ok(actuator) => state.schema.actuators.push(actuator),
                        Err(err) => ctx.add_error("actuator", err.to_string()),
                    }
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"actuator" => break,
            Ok(Event::Eof) => {
                return Err(ConvertError::XmlParse("unexpected EOF in actuator".into()));
            }
            Ok(_) => {}
            Err(e) => return Err(ConvertError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(())
}

fn parse_actuator(e: &BytesStart, actuator_type: ActuatorType) -> Result<Actuator> {
    let joint = get_attribute(e, "joint")?;
    let name = get_attribute_opt(e, "name")
        .unwrap_or_else(|| format!("{joint}_{}", actuator_type.as_str()));

    let gear_ratio = get_attribute_opt(e, "gear").and_then(|s| {
        parse_float_list(&s)
            .ok()
            .and_then(|v| v.first().copied())
    });
    let control_range = get_attribute_opt(e, "ctrlrange").and_then(|s| {
        parse_float_list(&s)
            .ok()
            .filter(|v| v.len() == 2)
            .map(|v| (v[0], v[1]))
    });

    Ok(Actuator {
        name,
        joint,
        actuator_type,
        gear_ratio,
        control_range,
    })
}

/// Parse the sensor section. The sensor element name becomes the schema
/// sensor type; attachment attributes land in the parameter map.
fn parse_sensors<R: BufRead>(reader: &mut Reader<R>, state: &mut MjcfState) -> Result<()> {
    let mut buf = Vec::new();
    let mut counter = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let sensor_type = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let name = get_attribute_opt(e, "name").unwrap_or_else(|| {
                    counter += 1;
                    format!("{sensor_type}_{counter}")
                });

                let mut parameters = std::collections::BTreeMap::new();
                for key in ["site", "joint", "objtype", "objname", "noise", "cutoff"] {
                    if let Some(value) = get_attribute_opt(e, key) {
                        parameters.insert(key.to_string(), serde_json::json!(value));
                    }
                }
                let parent_link =
                    get_attribute_opt(e, "body").unwrap_or_else(|| WORLD_LINK.to_string());

                state.schema.sensors.push(Sensor {
                    name,
                    sensor_type,
                    parent_link,
                    pose: Pose::default(),
                    parameters,
                });
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"sensor" => break,
            Ok(Event::Eof) => {
                return Err(ConvertError::XmlParse("unexpected EOF in sensor".into()));
            }
            Ok(_) => {}
            Err(e) => return Err(ConvertError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(())
}

/// Parse the contact section. Pair definitions reference geoms, not links,
/// so they are preserved verbatim in the extensions map.
fn parse_contact_pairs<R: BufRead>(reader: &mut Reader<R>, state: &mut MjcfState) -> Result<()> {
    let mut buf = Vec::new();
    let mut pairs: Vec<serde_json::Value> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if e.name().as_ref() == b"pair" || e.name().as_ref() == b"exclude" =>
            {
                let kind = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let mut entry = serde_json::Map::new();
                entry.insert("kind".to_string(), serde_json::json!(kind));
                for key in ["geom1", "geom2", "body1", "body2", "friction", "condim"] {
                    if let Some(value) = get_attribute_opt(e, key) {
                        entry.insert(key.to_string(), serde_json::json!(value));
                    }
                }
                pairs.push(serde_json::Value::Object(entry));
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"contact" => break,
            Ok(Event::Eof) => {
                return Err(ConvertError::XmlParse("unexpected EOF in contact".into()));
            }
            Ok(_) => {}
            Err(e) => return Err(ConvertError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    if !pairs.is_empty() {
        state
            .schema
            .extensions
            .insert("contact_pairs".to_string(), serde_json::json!(pairs));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_simple_model() {
        let xml = r#"
            <mujoco model="simple">
                <worldbody>
                    <body name="base" pos="0 0 0.1">
                        <inertial pos="0 0 0" mass="5.0" diaginertia="0.5 0.5 0.5"/>
                        <geom type="box" size="0.1 0.1 0.05"/>
                    </body>
                </worldbody>
            </mujoco>
        "#;

        let schema = parse_mjcf_str(xml).expect("should parse");
        assert_eq!(schema.metadata.name, "simple");
        assert_eq!(schema.metadata.source_format.as_deref(), Some("mjcf"));
        assert_eq!(schema.links.len(), 1);
        // Top-level body without a joint stays a root.
        assert!(schema.joints.is_empty());

        let base = schema.link("base").expect("base");
        assert_relative_eq!(base.mass, 5.0);
        assert_relative_eq!(base.inertia.ixx, 0.5);
        assert_relative_eq!(base.inertia.ixy, 0.0);
    }

    #[test]
    fn test_box_half_extents_are_doubled() {
        let xml = r#"
            <mujoco model="m">
                <worldbody>
                    <body name="b">
                        <geom type="box" size="0.2 0.15 0.1"/>
                    </body>
                </worldbody>
            </mujoco>
        "#;

        let schema = parse_mjcf_str(xml).expect("should parse");
        let link = schema.link("b").expect("b");
        match link.collisions[0].geometry.as_ref().expect("box") {
            Geometry::Box { size } => {
                assert_relative_eq!(size.x, 0.4, epsilon = 1e-10);
                assert_relative_eq!(size.y, 0.3, epsilon = 1e-10);
                assert_relative_eq!(size.z, 0.2, epsilon = 1e-10);
            }
            other => panic!("expected box, got {other:?}"),
        }
    }

    #[test]
    fn test_capsule_half_length_doubled() {
        let xml = r#"
            <mujoco model="m">
                <worldbody>
                    <body name="b">
                        <geom type="capsule" size="0.05 0.25"/>
                    </body>
                </worldbody>
            </mujoco>
        "#;

        let schema = parse_mjcf_str(xml).expect("should parse");
        let link = schema.link("b").expect("b");
        match link.collisions[0].geometry.as_ref().expect("capsule") {
            Geometry::Capsule { radius, length } => {
                assert_relative_eq!(*radius, 0.05);
                assert_relative_eq!(*length, 0.5);
            }
            other => panic!("expected capsule, got {other:?}"),
        }
    }

    #[test]
    fn test_nested_bodies_become_joints() {
        let xml = r#"
            <mujoco model="arm">
                <compiler angle="radian"/>
                <worldbody>
                    <body name="base">
                        <geom type="box" size="0.1 0.1 0.05"/>
                        <body name="link1" pos="0 0 0.05">
                            <joint name="joint1" type="hinge" axis="0 1 0" range="-3.14 3.14" damping="0.5"/>
                            <geom type="capsule" size="0.05 0.25"/>
                            <body name="link2" pos="0 0 0.5">
                                <geom type="sphere" size="0.08"/>
                            </body>
                        </body>
                    </body>
                </worldbody>
            </mujoco>
        "#;

        let schema = parse_mjcf_str(xml).expect("should parse");
        assert_eq!(schema.links.len(), 3);
        assert_eq!(schema.joints.len(), 2);

        let joint1 = schema.joint("joint1").expect("joint1");
        assert_eq!(joint1.joint_type, JointType::Revolute);
        assert_eq!(joint1.parent_link, "base");
        assert_eq!(joint1.child_link, "link1");
        assert_relative_eq!(joint1.axis.y, 1.0);
        assert_relative_eq!(joint1.pose.position.z, 0.05);
        let limits = joint1.limits.expect("limits");
        assert_relative_eq!(limits.lower.unwrap(), -3.14);
        assert_relative_eq!(joint1.dynamics.expect("dynamics").damping, 0.5);

        // Jointless nested body gets a synthesized weld.
        let weld = schema.joint("link2_fixed").expect("weld joint");
        assert_eq!(weld.joint_type, JointType::Fixed);
        assert_eq!(weld.parent_link, "link1");
        assert_relative_eq!(weld.pose.position.z, 0.5);
    }

    #[test]
    fn test_quat_is_scalar_first() {
        // 90 degrees about Z, scalar-first: w x y z.
        let xml = r#"
            <mujoco model="m">
                <worldbody>
                    <body name="base">
                        <body name="child" quat="0.7071068 0 0 0.7071068">
                            <joint name="j" type="hinge"/>
                        </body>
                    </body>
                </worldbody>
            </mujoco>
        "#;

        let schema = parse_mjcf_str(xml).expect("should parse");
        let joint = schema.joint("j").expect("j");
        assert_relative_eq!(joint.pose.orientation.w, 0.7071068, epsilon = 1e-6);
        assert_relative_eq!(joint.pose.orientation.z, 0.7071068, epsilon = 1e-6);
        assert_relative_eq!(joint.pose.orientation.x, 0.0);
        let (_, _, yaw) = joint.pose.orientation.to_rpy();
        assert_relative_eq!(yaw, std::f64::consts::FRAC_PI_2, epsilon = 1e-6);
    }

    #[test]
    fn test_joint_axis_is_normalized() {
        let xml = r#"
            <mujoco model="m">
                <worldbody>
                    <body name="base">
                        <body name="arm">
                            <joint name="j" type="hinge" axis="0 3 4"/>
                        </body>
                    </body>
                </worldbody>
            </mujoco>
        "#;

        let schema = parse_mjcf_str(xml).expect("should parse");
        let joint = schema.joint("j").expect("j");
        assert_relative_eq!(joint.axis.norm(), 1.0, epsilon = 1e-10);
        assert_relative_eq!(joint.axis.y, 0.6, epsilon = 1e-10);
        assert_relative_eq!(joint.axis.z, 0.8, epsilon = 1e-10);
    }

    #[test]
    fn test_zero_axis_defaults_with_warning() {
        let xml = r#"
            <mujoco model="m">
                <worldbody>
                    <body name="base">
                        <body name="arm">
                            <joint name="j" type="hinge" axis="0 0 0"/>
                        </body>
                    </body>
                </worldbody>
            </mujoco>
        "#;

        let schema = parse_mjcf_str(xml).expect("should parse");
        let joint = schema.joint("j").expect("j");
        assert_relative_eq!(joint.axis.z, 1.0);
        assert!(schema.warnings().iter().any(|w| w.contains("zero-length")));
    }

    #[test]
    fn test_hinge_range_converted_from_degrees() {
        let xml = r#"
            <mujoco model="m">
                <worldbody>
                    <body name="base">
                        <body name="arm">
                            <joint name="j" type="hinge" range="-90 90"/>
                        </body>
                        <body name="rail">
                            <joint name="s" type="slide" range="-0.5 0.5"/>
                        </body>
                    </body>
                </worldbody>
            </mujoco>
        "#;

        let schema = parse_mjcf_str(xml).expect("should parse");
        let hinge = schema.joint("j").expect("j").limits.expect("limits");
        assert_relative_eq!(
            hinge.lower.unwrap(),
            -std::f64::consts::FRAC_PI_2,
            epsilon = 1e-10
        );
        // Slide ranges are meters; the angle mode does not touch them.
        let slide = schema.joint("s").expect("s").limits.expect("limits");
        assert_relative_eq!(slide.upper.unwrap(), 0.5, epsilon = 1e-10);
    }

    #[test]
    fn test_geom_euler_honors_radian_mode() {
        let xml = r#"
            <mujoco model="m">
                <compiler angle="radian"/>
                <worldbody>
                    <body name="b">
                        <geom type="box" size="0.1 0.1 0.1" euler="0 0 1.5707963267948966"/>
                    </body>
                </worldbody>
            </mujoco>
        "#;

        let schema = parse_mjcf_str(xml).expect("should parse");
        let link = schema.link("b").expect("b");
        let (_, _, yaw) = link.visuals[0].pose.orientation.to_rpy();
        assert_relative_eq!(yaw, std::f64::consts::FRAC_PI_2, epsilon = 1e-10);
    }

    #[test]
    fn test_freejoint_is_floating() {
        let xml = r#"
            <mujoco model="m">
                <worldbody>
                    <body name="ball" pos="0 0 1">
                        <freejoint/>
                        <geom type="sphere" size="0.1"/>
                    </body>
                </worldbody>
            </mujoco>
        "#;

        let schema = parse_mjcf_str(xml).expect("should parse");
        assert_eq!(schema.joints.len(), 1);
        let joint = &schema.joints[0];
        assert_eq!(joint.joint_type, JointType::Floating);
        assert_eq!(joint.parent_link, WORLD_LINK);
        assert_eq!(joint.child_link, "ball");
    }

    #[test]
    fn test_actuators() {
        let xml = r#"
            <mujoco model="m">
                <worldbody>
                    <body name="base">
                        <body name="arm">
                            <joint name="shoulder" type="hinge"/>
                        </body>
                    </body>
                </worldbody>
                <actuator>
                    <motor name="m1" joint="shoulder" gear="50" ctrlrange="-1 1"/>
                    <position joint="shoulder"/>
                </actuator>
            </mujoco>
        "#;

        let schema = parse_mjcf_str(xml).expect("should parse");
        assert_eq!(schema.actuators.len(), 2);

        let motor = schema.actuator("m1").expect("m1");
        assert_eq!(motor.actuator_type, ActuatorType::Motor);
        assert_eq!(motor.joint, "shoulder");
        assert_relative_eq!(motor.gear_ratio.unwrap(), 50.0);
        assert_eq!(motor.control_range, Some((-1.0, 1.0)));

        // Unnamed actuators get a generated name.
        assert_eq!(schema.actuators[1].name, "shoulder_position");
        assert_eq!(schema.actuators[1].actuator_type, ActuatorType::Position);
    }

    #[test]
    fn test_asset_material_resolution() {
        let xml = r#"
            <mujoco model="m">
                <asset>
                    <material name="steel" rgba="0.6 0.6 0.7 1"/>
                </asset>
                <worldbody>
                    <body name="b">
                        <geom type="sphere" size="0.1" material="steel"/>
                    </body>
                </worldbody>
            </mujoco>
        "#;

        let schema = parse_mjcf_str(xml).expect("should parse");
        let link = schema.link("b").expect("b");
        let material = link.visuals[0].material.as_ref().expect("material");
        assert_eq!(material.name.as_deref(), Some("steel"));
        assert_eq!(material.color, Some([0.6, 0.6, 0.7, 1.0]));
    }

    #[test]
    fn test_sensors_and_contacts() {
        let xml = r#"
            <mujoco model="m">
                <worldbody>
                    <body name="b">
                        <joint name="j" type="hinge"/>
                    </body>
                </worldbody>
                <sensor>
                    <jointpos name="jp" joint="j"/>
                    <accelerometer site="imu"/>
                </sensor>
                <contact>
                    <pair geom1="g1" geom2="g2" friction="1 1 0.005 0.0001 0.0001"/>
                </contact>
            </mujoco>
        "#;

        let schema = parse_mjcf_str(xml).expect("should parse");
        assert_eq!(schema.sensors.len(), 2);
        assert_eq!(schema.sensors[0].sensor_type, "jointpos");
        assert_eq!(schema.sensors[0].parameters["joint"], "j");
        assert_eq!(schema.sensors[1].name, "accelerometer_1");

        let pairs = schema.extensions["contact_pairs"]
            .as_array()
            .expect("pairs");
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0]["geom1"], "g1");
    }

    #[test]
    fn test_euler_degrees_by_default() {
        let xml = r#"
            <mujoco model="m">
                <worldbody>
                    <body name="base">
                        <body name="child" euler="0 0 90">
                            <joint name="j" type="hinge"/>
                        </body>
                    </body>
                </worldbody>
            </mujoco>
        "#;

        let schema = parse_mjcf_str(xml).expect("should parse");
        let joint = schema.joint("j").expect("j");
        let (_, _, yaw) = joint.pose.orientation.to_rpy();
        assert_relative_eq!(yaw, std::f64::consts::FRAC_PI_2, epsilon = 1e-10);
    }

    #[test]
    fn test_compiler_radian_setting() {
        let xml = r#"
            <mujoco model="m">
                <compiler angle="radian"/>
                <worldbody>
                    <body name="base">
                        <body name="child" euler="0 0 1.5707963267948966">
                            <joint name="j" type="hinge"/>
                        </body>
                    </body>
                </worldbody>
            </mujoco>
        "#;

        let schema = parse_mjcf_str(xml).expect("should parse");
        let joint = schema.joint("j").expect("j");
        let (_, _, yaw) = joint.pose.orientation.to_rpy();
        assert_relative_eq!(yaw, std::f64::consts::FRAC_PI_2, epsilon = 1e-10);
    }

    #[test]
    fn test_missing_mujoco_element() {
        let result = parse_mjcf_str("<robot name='nope'/>");
        assert!(matches!(result, Err(ConvertError::MissingElement { .. })));
    }

    #[test]
    fn test_multiple_joints_keeps_first_with_warning() {
        let xml = r#"
            <mujoco model="m">
                <worldbody>
                    <body name="base">
                        <body name="wrist">
                            <joint name="j1" type="hinge" axis="1 0 0"/>
                            <joint name="j2" type="hinge" axis="0 1 0"/>
                        </body>
                    </body>
                </worldbody>
            </mujoco>
        "#;

        let schema = parse_mjcf_str(xml).expect("should parse");
        assert_eq!(schema.joints.len(), 1);
        assert_eq!(schema.joints[0].name, "j1");
        assert!(schema.warnings().iter().any(|w| w.contains("2 joints")));
    }
}
