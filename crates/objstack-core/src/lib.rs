//! Core types shared across ObjStack crates.
//!
//! The storage engine treats the identity subsystem as an external
//! collaborator: requests arrive already authenticated, carrying an
//! [`Identity`]. This crate defines that identity together with the account
//! and region newtypes used to describe it.

mod error;
mod identity;
mod types;

pub use error::{ObjStackError, ObjStackResult};
pub use identity::{Identity, UserIdentity};
pub use types::{AccountId, AwsRegion};
