//! Crate-wide error aggregation, mirroring `eidetica::Error` in
//! `crates/lib/src/lib.rs`: one top-level enum with a transparent variant
//! per submodule's own structured error type.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Wire(#[from] crate::wire::WireError),

    #[error(transparent)]
    Deserialize(#[from] crate::deser::DeserializeError),

    #[error(transparent)]
    Store(#[from] crate::store::StoreError),
}
