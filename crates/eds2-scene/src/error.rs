// SPDX-License-Identifier: CEPL-1.0
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SceneError {
    #[error("no scene node named `{0}`")]
    NodeNotFound(String),

    #[error("node id {0} does not exist")]
    UnknownNode(usize),

    #[error("mesh id {0} does not exist")]
    UnknownMesh(usize),

    #[error("object {index} has no dynamic state entry (table holds {len})")]
    ToggleOutOfRange { index: usize, len: usize },

    #[error("object index {index} out of range ({count} objects)")]
    ObjectOutOfRange { index: usize, count: usize },

    #[error("material `{0}` exposes no base colour factor")]
    MissingBaseColor(String),
}

pub type Result<T, E = SceneError> = std::result::Result<T, E>;
