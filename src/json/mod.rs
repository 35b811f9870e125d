//! # JSON Extraction Module
//!
//! Access to the per-sample JSON documents produced by the instrument
//! converter. Those documents are large (they embed every particle image as
//! base64) and heterogeneous (their `instrument` tree depends on the instrument
//! configuration), so this module provides two things:
//!
//! 1. [`read_section`] / [`read_section_as`]: stream one top-level section out
//!    of a document without materializing its siblings.
//! 2. Path resolution over the extracted values:
//!    - [`resolve_tagged`] for lists of records identified by a discriminator
//!      field (particle `parameters`, keyed by `description`),
//!    - [`resolve_nested`] for arbitrary object/list trees (`instrument`),
//!    - [`discover_paths`] / [`discover_tagged_paths`] to list what can be
//!      mapped.
//!
//! ## Path syntax
//!
//! ```text
//! measurementSettings.name            # object keys, dotted
//! channels[].name                     # fan out over a list, space-join results
//! FWS.total                           # tagged mode: <discriminator>.<field>
//! ```

mod document;
mod error;
mod path;
mod section;


pub use document::{Particle, ParticleImage, PulseShape};
pub use error::JsonError;
pub use path::{
    discover_paths, discover_tagged_paths, parse_path, resolve_nested, resolve_tagged, stringify,
    FieldTag, PathSegment, TagAccessor, DESCRIPTION_TAG, LIST_MARKER,
};
pub use section::{read_section, read_section_as, section_from_reader};

/// Top-level section holding the nested instrument metadata
pub const INSTRUMENT_SECTION: &str = "instrument";

/// Top-level section holding the particle list
pub const PARTICLES_SECTION: &str = "particles";

/// Top-level section holding the base64 particle images
pub const IMAGES_SECTION: &str = "images";
