//! Run lookup core: identifier resolution, single-field projection and the
//! service that ties them to a [`RunStore`](crate::store::RunStore).

pub mod error;
pub mod identifier;
pub mod lookup;
pub mod projection;

pub use error::LookupError;
pub use identifier::{resolve, Identifier, IdentifierKind, ObjectId};
pub use lookup::{CancelHandle, Cancellation, LookupService};
pub use projection::{extract, project, ProjectionError};
