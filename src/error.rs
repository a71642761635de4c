use parse_display::Display;

use crate::NodeId;

/// Error returned by component functions.
pub type BoxError = Box<dyn std::error::Error>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[non_exhaustive]
#[derive(Display, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A component failed while rendering. Only the failing subtree is abandoned.
    #[display("render error at {node}: {message}")]
    Render { node: NodeId, message: String },

    /// A node violates a structural rule of the tree.
    #[display("contract violation at {node}: {message}")]
    Contract { node: NodeId, message: String },

    /// A node kept requesting its own re-render while rendering.
    #[display("{node} re-rendered itself more than {limit} times in one pass")]
    RenderLoop { node: NodeId, limit: usize },

    /// Immediate effects kept dirtying the tree after every commit.
    #[display("more than {limit} consecutive dirty commits")]
    DirtyLoop { limit: usize },

    #[display("no root is mounted")]
    NotMounted,

    #[display("a root is already mounted")]
    AlreadyMounted,

    #[display("unknown node {0}")]
    UnknownNode(NodeId),
}

impl Error {
    /// Returns `true` for errors the scheduler refuses to recover from.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::RenderLoop { .. } | Error::DirtyLoop { .. })
    }

    /// The node the error is attributed to, if any.
    pub fn node(&self) -> Option<NodeId> {
        match self {
            Error::Render { node, .. }
            | Error::Contract { node, .. }
            | Error::RenderLoop { node, .. } => Some(*node),
            Error::UnknownNode(node) => Some(*node),
            _ => None,
        }
    }
}

impl std::error::Error for Error {}
