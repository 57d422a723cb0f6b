//! Procedural plant generation: branch topology, growth animation and
//! branch geometry.

pub mod growth;
pub mod lsystem;
pub mod mesh;
pub mod segment;
pub mod session;
pub mod shape;
pub mod space_colonization;
pub mod spline;
pub mod taper;

pub use growth::*;
pub use lsystem::*;
pub use mesh::*;
pub use segment::*;
pub use session::*;
pub use shape::*;
pub use space_colonization::*;
pub use spline::*;
pub use taper::*;
