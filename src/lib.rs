//! Robot description format converter.
//!
//! This crate converts robot models between heterogeneous description
//! formats through a single intermediate representation, [`CommonSchema`].
//! Every conversion is parse → validate → export; formats never talk to each
//! other directly, so adding a format means writing one parser and one
//! exporter against the schema.
//!
//! # Supported formats
//!
//! - **URDF** - kinematic XML with a flat joint edge list
//! - **MJCF** - physics XML with a nested body tree, scalar-first
//!   quaternions, and half-extent sizing
//! - **Schema** - the intermediate representation itself as YAML or JSON
//!   (lossless)
//! - **SDF** - detection and placeholder export only
//!
//! # Example
//!
//! ```
//! use robot_convert::{parse_urdf_str, export_mjcf_string};
//!
//! let urdf = r#"
//!     <robot name="pendulum">
//!         <link name="base">
//!             <inertial>
//!                 <mass value="1.0"/>
//!                 <inertia ixx="0.1" iyy="0.1" izz="0.1"/>
//!             </inertial>
//!         </link>
//!         <link name="bob"/>
//!         <joint name="swing" type="revolute">
//!             <parent link="base"/>
//!             <child link="bob"/>
//!             <axis xyz="0 1 0"/>
//!         </joint>
//!     </robot>
//! "#;
//!
//! let schema = parse_urdf_str(urdf).expect("should parse");
//! assert_eq!(schema.links.len(), 2);
//!
//! let mjcf = export_mjcf_string(&schema).expect("should export");
//! assert!(mjcf.contains(r#"<mujoco model="pendulum">"#));
//! ```
//!
//! # Conventions
//!
//! The schema is strictly SI (meters, kilograms, seconds, radians) with
//! scalar-last quaternions and full-extent sizes. Format-specific
//! conventions (MJCF's scalar-first quaternions, half-extent boxes, degree
//! angles) are normalized at the format boundary and never leak inward.
//!
//! # Diagnostics
//!
//! Parsers recover from element-level problems instead of failing: the
//! offending element is skipped or defaulted and a note lands in the parsed
//! schema's `extensions` map, readable via [`CommonSchema::warnings`] and
//! [`CommonSchema::errors`]. Only document-level failures (malformed XML,
//! undecodable YAML, I/O) surface as [`ConvertError`].

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::should_implement_trait,
    clippy::doc_markdown,
    clippy::too_many_lines
)]

mod context;
mod engine;
mod error;
mod mjcf;
mod scene;
mod schema;
mod schema_io;
mod urdf;
mod xml;

pub use context::ParseContext;
pub use engine::{ConversionEngine, ConvertOptions, Exporter, Parser};
pub use error::{ConvertError, Result};
pub use mjcf::{MjcfFormat, export_mjcf_file, export_mjcf_string, parse_mjcf_file, parse_mjcf_str};
pub use scene::SceneFormat;
pub use schema::{
    Actuator, ActuatorType, Collision, CommonSchema, Contact, ContactSurface, Geometry, Inertia,
    Joint, JointDynamics, JointLimits, JointType, Link, Material, Metadata, Pose, Quaternion,
    Sensor, SurfaceCoefficients, Visual, WORLD_LINK, sanitize_name,
};
pub use schema_io::{
    SchemaFormat, export_schema_json, export_schema_yaml, parse_schema_json, parse_schema_yaml,
};
pub use urdf::{UrdfFormat, export_urdf_file, export_urdf_string, parse_urdf_file, parse_urdf_str};
