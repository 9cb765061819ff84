//! Build a host scene graph with armatures and vertex weights from a flat
//! glTF/VRM node, mesh and skin description.
//!
//! The pipeline lives in [`convert`]; the host side is abstracted by
//! [`host::SceneHost`] with an in-memory implementation in
//! [`host::MemoryScene`].

pub mod convert;
pub mod error;
pub mod host;
pub mod logging;
pub mod settings;
