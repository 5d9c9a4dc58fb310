//! Common schema: the intermediate representation for robot descriptions.
//!
//! Every conversion routes through [`CommonSchema`]. The types here are plain
//! value aggregates; cross-references between entities are by name string,
//! never by pointer, so the schema stays serializable even when it encodes a
//! kinematic graph. Format-specific data with no slot in the schema survives
//! round trips through the open `extensions` map.

use std::collections::BTreeMap;

use nalgebra::{Matrix3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

// ============================================================================
// Metadata
// ============================================================================

/// Robot-level metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Model name (sanitized, never empty).
    pub name: String,
    /// Schema version.
    #[serde(default = "default_version")]
    pub version: String,
    /// Original author, if known.
    #[serde(default)]
    pub author: Option<String>,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Format the model was parsed from.
    #[serde(default)]
    pub source_format: Option<String>,
    /// Unit system. Always SI: meters, kilograms, seconds, radians.
    #[serde(default = "default_units")]
    pub units: String,
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_units() -> String {
    "SI".to_string()
}

impl Metadata {
    /// Create metadata with a sanitized name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: sanitize_name(&name.into()),
            version: default_version(),
            author: None,
            description: None,
            source_format: None,
            units: default_units(),
        }
    }

    /// Set the source format.
    #[must_use]
    pub fn with_source_format(mut self, format: impl Into<String>) -> Self {
        self.source_format = Some(format.into());
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::new("unnamed")
    }
}

/// Sanitize a name for cross-format compatibility.
///
/// Characters outside `[A-Za-z0-9_-]` become underscores, a leading digit is
/// prefixed with an underscore, and an empty result becomes `"unnamed"`.
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    let mut sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.starts_with(|c: char| c.is_ascii_digit()) {
        sanitized.insert(0, '_');
    }
    if sanitized.is_empty() {
        sanitized = "unnamed".to_string();
    }
    sanitized
}

// ============================================================================
// Geometry value types
// ============================================================================

/// Rotation stored in scalar-last (x, y, z, w) canonical order.
///
/// Formats that declare quaternions scalar-first must go through
/// [`Quaternion::from_wxyz`] / [`Quaternion::to_wxyz`]; these two functions
/// are the only place component reordering happens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
    /// Z component.
    pub z: f64,
    /// Scalar component.
    pub w: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

impl Quaternion {
    /// Identity rotation.
    #[must_use]
    pub fn identity() -> Self {
        Self::default()
    }

    /// Build from scalar-first (w, x, y, z) component order.
    #[must_use]
    pub fn from_wxyz(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z, w }
    }

    /// Components in scalar-first (w, x, y, z) order.
    #[must_use]
    pub fn to_wxyz(&self) -> [f64; 4] {
        [self.w, self.x, self.y, self.z]
    }

    /// Build from roll-pitch-yaw angles (radians, XYZ convention).
    #[must_use]
    pub fn from_rpy(roll: f64, pitch: f64, yaw: f64) -> Self {
        let q = UnitQuaternion::from_euler_angles(roll, pitch, yaw);
        Self {
            x: q.i,
            y: q.j,
            z: q.k,
            w: q.w,
        }
    }

    /// Roll-pitch-yaw angles (radians, XYZ convention).
    #[must_use]
    pub fn to_rpy(&self) -> (f64, f64, f64) {
        let q = UnitQuaternion::from_quaternion(nalgebra::Quaternion::new(
            self.w, self.x, self.y, self.z,
        ));
        q.euler_angles()
    }

    /// Whether this is (numerically) the identity rotation.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.x.abs() < 1e-12 && self.y.abs() < 1e-12 && self.z.abs() < 1e-12
    }
}

/// 6-DOF pose: position plus orientation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    /// Translation in meters.
    #[serde(default)]
    pub position: Vector3<f64>,
    /// Rotation, scalar-last.
    #[serde(default)]
    pub orientation: Quaternion,
}

impl Pose {
    /// Build from xyz translation and rpy orientation.
    #[must_use]
    pub fn from_xyz_rpy(xyz: Vector3<f64>, rpy: Vector3<f64>) -> Self {
        Self {
            position: xyz,
            orientation: Quaternion::from_rpy(rpy.x, rpy.y, rpy.z),
        }
    }
}

/// Symmetric 3x3 inertia tensor stored as six scalars.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Inertia {
    /// Moment about X.
    #[serde(default)]
    pub ixx: f64,
    /// Moment about Y.
    #[serde(default)]
    pub iyy: f64,
    /// Moment about Z.
    #[serde(default)]
    pub izz: f64,
    /// XY product of inertia.
    #[serde(default)]
    pub ixy: f64,
    /// XZ product of inertia.
    #[serde(default)]
    pub ixz: f64,
    /// YZ product of inertia.
    #[serde(default)]
    pub iyz: f64,
}

impl Inertia {
    /// Build from the three principal moments; products of inertia are zero.
    #[must_use]
    pub fn from_diagonal(ixx: f64, iyy: f64, izz: f64) -> Self {
        Self {
            ixx,
            iyy,
            izz,
            ..Default::default()
        }
    }

    /// Full 3x3 matrix form.
    #[must_use]
    pub fn to_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.ixx, self.ixy, self.ixz, //
            self.ixy, self.iyy, self.iyz, //
            self.ixz, self.iyz, self.izz,
        )
    }

    /// Check physical validity: positive diagonal and the triangle
    /// inequalities. Necessary, not sufficient; never enforced at
    /// construction because many real-world files violate it slightly.
    #[must_use]
    pub fn is_physical(&self) -> bool {
        self.ixx > 0.0
            && self.iyy > 0.0
            && self.izz > 0.0
            && self.ixx + self.iyy > self.izz
            && self.iyy + self.izz > self.ixx
            && self.ixx + self.izz > self.iyy
    }
}

/// Geometric shape. Exactly one variant per geometry, matched exhaustively
/// by every exporter so a new variant is a compile-time obligation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Geometry {
    /// Axis-aligned box with full-extent size.
    Box {
        /// Full edge lengths (not half-extents).
        size: Vector3<f64>,
    },
    /// Z-aligned cylinder.
    Cylinder {
        /// Radius in meters.
        radius: f64,
        /// Full length (not half-length).
        length: f64,
    },
    /// Sphere.
    Sphere {
        /// Radius in meters.
        radius: f64,
    },
    /// Mesh referenced by path; file contents are never parsed.
    Mesh {
        /// Mesh file path as written in the source document.
        filename: String,
        /// Per-axis scale, if any.
        #[serde(default)]
        scale: Option<Vector3<f64>>,
    },
    /// Infinite plane.
    Plane,
    /// Capsule: cylinder with hemispherical caps.
    Capsule {
        /// Radius in meters.
        radius: f64,
        /// Full cylindrical length (not half-length).
        length: f64,
    },
    /// Ellipsoid with semi-axes.
    Ellipsoid {
        /// Semi-axis lengths.
        radii: Vector3<f64>,
    },
}

/// Material properties for visual elements.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Material {
    /// Material name, used for cross-element reuse.
    #[serde(default)]
    pub name: Option<String>,
    /// RGBA color, each channel conceptually in [0, 1].
    #[serde(default)]
    pub color: Option<[f64; 4]>,
    /// Texture file path.
    #[serde(default)]
    pub texture: Option<String>,
    /// Specular color.
    #[serde(default)]
    pub specular: Option<[f64; 4]>,
    /// Shininess exponent.
    #[serde(default)]
    pub shininess: Option<f64>,
}

// ============================================================================
// Link
// ============================================================================

/// Visual representation of a link.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Visual {
    /// Optional element name.
    #[serde(default)]
    pub name: Option<String>,
    /// Pose relative to the link frame.
    #[serde(default)]
    pub pose: Pose,
    /// Shape, if any.
    #[serde(default)]
    pub geometry: Option<Geometry>,
    /// Material, if any.
    #[serde(default)]
    pub material: Option<Material>,
}

/// Contact coefficients attached to a collision element.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SurfaceCoefficients {
    /// Static friction coefficient.
    #[serde(default)]
    pub mu_static: Option<f64>,
    /// Dynamic friction coefficient.
    #[serde(default)]
    pub mu_dynamic: Option<f64>,
    /// Restitution (bounciness).
    #[serde(default)]
    pub restitution: Option<f64>,
    /// Contact stiffness.
    #[serde(default)]
    pub stiffness: Option<f64>,
    /// Contact damping.
    #[serde(default)]
    pub damping: Option<f64>,
}

/// Collision representation of a link.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Collision {
    /// Optional element name.
    #[serde(default)]
    pub name: Option<String>,
    /// Pose relative to the link frame.
    #[serde(default)]
    pub pose: Pose,
    /// Shape, if any.
    #[serde(default)]
    pub geometry: Option<Geometry>,
    /// Contact coefficients, if any.
    #[serde(default)]
    pub surface: Option<SurfaceCoefficients>,
}

/// A rigid body in the kinematic tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// Link name, unique within a schema.
    pub name: String,
    /// Mass in kilograms. A negative value is a parse warning, not an error.
    #[serde(default)]
    pub mass: f64,
    /// Center of mass relative to the link frame.
    #[serde(default)]
    pub center_of_mass: Vector3<f64>,
    /// Inertia tensor about the center of mass.
    #[serde(default)]
    pub inertia: Inertia,
    /// Visual elements.
    #[serde(default)]
    pub visuals: Vec<Visual>,
    /// Collision elements.
    #[serde(default)]
    pub collisions: Vec<Collision>,
}

impl Link {
    /// Create a link with default inertial properties.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mass: 0.0,
            center_of_mass: Vector3::zeros(),
            inertia: Inertia::default(),
            visuals: Vec::new(),
            collisions: Vec::new(),
        }
    }

    /// Set the mass.
    #[must_use]
    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = mass;
        self
    }

    /// Set the inertia tensor.
    #[must_use]
    pub fn with_inertia(mut self, inertia: Inertia) -> Self {
        self.inertia = inertia;
        self
    }

    /// Add a visual element.
    #[must_use]
    pub fn with_visual(mut self, visual: Visual) -> Self {
        self.visuals.push(visual);
        self
    }

    /// Add a collision element.
    #[must_use]
    pub fn with_collision(mut self, collision: Collision) -> Self {
        self.collisions.push(collision);
        self
    }
}

// ============================================================================
// Joint
// ============================================================================

/// Joint type across all supported formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointType {
    /// Single-axis rotation with limits.
    Revolute,
    /// Unlimited single-axis rotation.
    Continuous,
    /// Single-axis translation.
    Prismatic,
    /// Rigid attachment, zero DOF.
    Fixed,
    /// Free 6-DOF joint.
    Floating,
    /// Planar motion, 2 translational + 1 rotational DOF.
    Planar,
    /// Ball-and-socket, 3 rotational DOF.
    Spherical,
    /// Two perpendicular rotation axes.
    Universal,
}

impl JointType {
    /// Parse from the common string vocabulary.
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "revolute" => Some(Self::Revolute),
            "continuous" => Some(Self::Continuous),
            "prismatic" => Some(Self::Prismatic),
            "fixed" => Some(Self::Fixed),
            "floating" => Some(Self::Floating),
            "planar" => Some(Self::Planar),
            "spherical" => Some(Self::Spherical),
            "universal" => Some(Self::Universal),
            _ => None,
        }
    }

    /// Canonical name of this joint type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Revolute => "revolute",
            Self::Continuous => "continuous",
            Self::Prismatic => "prismatic",
            Self::Fixed => "fixed",
            Self::Floating => "floating",
            Self::Planar => "planar",
            Self::Spherical => "spherical",
            Self::Universal => "universal",
        }
    }

    /// Degrees of freedom.
    #[must_use]
    pub fn dof(&self) -> usize {
        match self {
            Self::Fixed => 0,
            Self::Revolute | Self::Continuous | Self::Prismatic => 1,
            Self::Universal => 2,
            Self::Planar | Self::Spherical => 3,
            Self::Floating => 6,
        }
    }
}

/// Joint position/effort/velocity limits.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct JointLimits {
    /// Lower position limit (radians or meters).
    #[serde(default)]
    pub lower: Option<f64>,
    /// Upper position limit.
    #[serde(default)]
    pub upper: Option<f64>,
    /// Maximum effort (Nm or N).
    #[serde(default)]
    pub effort: Option<f64>,
    /// Maximum velocity.
    #[serde(default)]
    pub velocity: Option<f64>,
}

/// Joint dynamics properties.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct JointDynamics {
    /// Viscous damping coefficient.
    #[serde(default)]
    pub damping: f64,
    /// Coulomb friction.
    #[serde(default)]
    pub friction: f64,
}

/// A kinematic connection between two links.
///
/// `parent_link` and `child_link` are name references, resolved against the
/// schema's link set (or the literal root sentinel `"world"`) by validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Joint {
    /// Joint name, unique within a schema.
    pub name: String,
    /// Joint type.
    #[serde(rename = "type")]
    pub joint_type: JointType,
    /// Parent link name.
    pub parent_link: String,
    /// Child link name.
    pub child_link: String,
    /// Joint frame relative to the parent link.
    #[serde(default)]
    pub pose: Pose,
    /// Motion axis, unit length. Default (0, 0, 1).
    #[serde(default = "default_axis")]
    pub axis: Vector3<f64>,
    /// Limits, if any.
    #[serde(default)]
    pub limits: Option<JointLimits>,
    /// Dynamics, if any.
    #[serde(default)]
    pub dynamics: Option<JointDynamics>,
}

fn default_axis() -> Vector3<f64> {
    Vector3::z()
}

impl Joint {
    /// Create a joint connecting two links.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        joint_type: JointType,
        parent_link: impl Into<String>,
        child_link: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            joint_type,
            parent_link: parent_link.into(),
            child_link: child_link.into(),
            pose: Pose::default(),
            axis: default_axis(),
            limits: None,
            dynamics: None,
        }
    }

    /// Set the joint pose.
    #[must_use]
    pub fn with_pose(mut self, pose: Pose) -> Self {
        self.pose = pose;
        self
    }

    /// Set the joint axis.
    #[must_use]
    pub fn with_axis(mut self, axis: Vector3<f64>) -> Self {
        self.axis = axis;
        self
    }

    /// Set joint limits.
    #[must_use]
    pub fn with_limits(mut self, limits: JointLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Set joint dynamics.
    #[must_use]
    pub fn with_dynamics(mut self, dynamics: JointDynamics) -> Self {
        self.dynamics = Some(dynamics);
        self
    }
}

// ============================================================================
// Actuators, sensors, contacts
// ============================================================================

/// Actuator model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuatorType {
    /// Direct force/torque motor.
    Motor,
    /// Position servo.
    Position,
    /// Velocity servo.
    Velocity,
    /// Generic servo.
    Servo,
    /// Muscle actuator.
    Muscle,
    /// Torque source.
    Torque,
}

impl ActuatorType {
    /// Parse from the common string vocabulary.
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "motor" => Some(Self::Motor),
            "position" => Some(Self::Position),
            "velocity" => Some(Self::Velocity),
            "servo" => Some(Self::Servo),
            "muscle" => Some(Self::Muscle),
            "torque" => Some(Self::Torque),
            _ => None,
        }
    }

    /// Canonical name of this actuator type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Motor => "motor",
            Self::Position => "position",
            Self::Velocity => "velocity",
            Self::Servo => "servo",
            Self::Muscle => "muscle",
            Self::Torque => "torque",
        }
    }
}

/// An actuator driving a joint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actuator {
    /// Actuator name.
    pub name: String,
    /// Target joint name reference.
    pub joint: String,
    /// Actuator type.
    #[serde(rename = "type")]
    pub actuator_type: ActuatorType,
    /// Gear ratio (torque/force scaling).
    #[serde(default)]
    pub gear_ratio: Option<f64>,
    /// Control input range (min, max).
    #[serde(default)]
    pub control_range: Option<(f64, f64)>,
}

/// A sensor attached to a link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    /// Sensor name.
    pub name: String,
    /// Free-form sensor type (accelerometer, gyro, camera, ...).
    #[serde(rename = "type")]
    pub sensor_type: String,
    /// Parent link name reference.
    pub parent_link: String,
    /// Pose relative to the parent link.
    #[serde(default)]
    pub pose: Pose,
    /// Sensor-specific parameters.
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,
}

/// Contact surface coefficients with simulator-friendly defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactSurface {
    /// Static friction coefficient.
    pub mu_static: f64,
    /// Dynamic friction coefficient.
    pub mu_dynamic: f64,
    /// Restitution.
    pub restitution: f64,
    /// Contact stiffness.
    pub stiffness: f64,
    /// Contact damping.
    pub damping: f64,
}

impl Default for ContactSurface {
    fn default() -> Self {
        Self {
            mu_static: 0.8,
            mu_dynamic: 0.7,
            restitution: 0.1,
            stiffness: 10_000.0,
            damping: 20.0,
        }
    }
}

/// A contact definition for collision handling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    /// Contact name.
    pub name: String,
    /// Link name reference.
    pub link: String,
    /// Surface coefficients.
    #[serde(default)]
    pub surface: ContactSurface,
}

// ============================================================================
// CommonSchema
// ============================================================================

/// The name every root joint may use as its parent.
pub const WORLD_LINK: &str = "world";

/// Unified robot description.
///
/// Constructed once per conversion by a parser, consumed once by an exporter;
/// immutable in between except for diagnostic attachment into `extensions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommonSchema {
    /// Robot-level metadata.
    pub metadata: Metadata,
    /// Links, owned by value.
    #[serde(default)]
    pub links: Vec<Link>,
    /// Joints, a flat edge list over link names.
    #[serde(default)]
    pub joints: Vec<Joint>,
    /// Actuators.
    #[serde(default)]
    pub actuators: Vec<Actuator>,
    /// Sensors.
    #[serde(default)]
    pub sensors: Vec<Sensor>,
    /// Contacts.
    #[serde(default)]
    pub contacts: Vec<Contact>,
    /// Open map for format-specific data and parse diagnostics.
    #[serde(default)]
    pub extensions: BTreeMap<String, serde_json::Value>,
}

impl CommonSchema {
    /// Create an empty schema with the given metadata.
    #[must_use]
    pub fn new(metadata: Metadata) -> Self {
        Self {
            metadata,
            links: Vec::new(),
            joints: Vec::new(),
            actuators: Vec::new(),
            sensors: Vec::new(),
            contacts: Vec::new(),
            extensions: BTreeMap::new(),
        }
    }

    /// Add a link.
    #[must_use]
    pub fn with_link(mut self, link: Link) -> Self {
        self.links.push(link);
        self
    }

    /// Add a joint.
    #[must_use]
    pub fn with_joint(mut self, joint: Joint) -> Self {
        self.joints.push(joint);
        self
    }

    /// Get a link by name.
    #[must_use]
    pub fn link(&self, name: &str) -> Option<&Link> {
        self.links.iter().find(|l| l.name == name)
    }

    /// Get a joint by name.
    #[must_use]
    pub fn joint(&self, name: &str) -> Option<&Joint> {
        self.joints.iter().find(|j| j.name == name)
    }

    /// Get an actuator by name.
    #[must_use]
    pub fn actuator(&self, name: &str) -> Option<&Actuator> {
        self.actuators.iter().find(|a| a.name == name)
    }

    /// Links that are not the child of any joint. A joint anchored to the
    /// world sentinel does not de-root its child.
    #[must_use]
    pub fn root_links(&self) -> Vec<&Link> {
        let children: std::collections::HashSet<&str> = self
            .joints
            .iter()
            .filter(|j| j.parent_link != WORLD_LINK)
            .map(|j| j.child_link.as_str())
            .collect();
        self.links
            .iter()
            .filter(|l| !children.contains(l.name.as_str()))
            .collect()
    }

    /// Kinematic tree as a parent-name to child-names map.
    #[must_use]
    pub fn kinematic_tree(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut tree: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for joint in &self.joints {
            tree.entry(joint.parent_link.as_str())
                .or_default()
                .push(joint.child_link.as_str());
        }
        tree
    }

    /// Validate structural consistency and return the list of issues.
    ///
    /// Checks duplicate link/joint names, dangling joint/actuator/sensor/
    /// contact references, and missing roots. An empty list means the schema
    /// is structurally sound.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        let mut link_names = std::collections::HashSet::new();
        for link in &self.links {
            if !link_names.insert(link.name.as_str()) {
                issues.push(format!("duplicate link name: '{}'", link.name));
            }
        }

        let mut joint_names = std::collections::HashSet::new();
        for joint in &self.joints {
            if !joint_names.insert(joint.name.as_str()) {
                issues.push(format!("duplicate joint name: '{}'", joint.name));
            }
        }

        for joint in &self.joints {
            if joint.parent_link != WORLD_LINK && !link_names.contains(joint.parent_link.as_str()) {
                issues.push(format!(
                    "joint '{}' references unknown parent link: '{}'",
                    joint.name, joint.parent_link
                ));
            }
            if !link_names.contains(joint.child_link.as_str()) {
                issues.push(format!(
                    "joint '{}' references unknown child link: '{}'",
                    joint.name, joint.child_link
                ));
            }
        }

        for actuator in &self.actuators {
            if !joint_names.contains(actuator.joint.as_str()) {
                issues.push(format!(
                    "actuator '{}' references unknown joint: '{}'",
                    actuator.name, actuator.joint
                ));
            }
        }

        for sensor in &self.sensors {
            if sensor.parent_link != WORLD_LINK
                && !link_names.contains(sensor.parent_link.as_str())
            {
                issues.push(format!(
                    "sensor '{}' references unknown parent link: '{}'",
                    sensor.name, sensor.parent_link
                ));
            }
        }

        for contact in &self.contacts {
            if !link_names.contains(contact.link.as_str()) {
                issues.push(format!(
                    "contact '{}' references unknown link: '{}'",
                    contact.name, contact.link
                ));
            }
        }

        if !self.links.is_empty() && self.root_links().is_empty() {
            issues.push("no root links found (possible kinematic loop)".to_string());
        }

        issues
    }

    /// Parse warnings recorded in the extensions map.
    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        string_list(self.extensions.get("warnings"))
    }

    /// Parse errors recorded in the extensions map.
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        string_list(self.extensions.get("errors"))
    }
}

fn string_list(value: Option<&serde_json::Value>) -> Vec<String> {
    value
        .and_then(|v| v.as_array())
        .map(|a| {
            a.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
