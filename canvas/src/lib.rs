//! Shape model and pure geometry for the `SyncSpace` whiteboard.
//!
//! This crate owns everything about drawable objects that needs no I/O and
//! no replication context: the `Shape` record and its per-kind validation,
//! axis-aligned bounds and marquee selection, and freehand path
//! simplification. Both the server (validation on merge is deliberately
//! absent, but snapshots carry these types) and the client reconciler build
//! on it.

pub mod consts;
pub mod geometry;
pub mod shape;
pub mod simplify;

pub use geometry::{Aabb, bounds, marquee_select};
pub use shape::{Shape, ShapeError, ShapeId, ShapeKind};
pub use simplify::simplify;
