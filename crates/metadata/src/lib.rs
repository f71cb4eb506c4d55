//! Durable on-disk metadata store (C2) and internal/external schema bridge
//! (C3) for the Realm/Space/Stack/Cell hierarchy.

pub mod convert;
pub mod error;
pub mod external;
pub mod internal;
pub mod paths;
pub mod schema;
pub mod store;

pub use error::{SchemaError, StoreError};
pub use paths::Paths;
pub use store::Store;
