//! Data models for the EMS roster.
//!
//! Field names serialize in camelCase to match the records the browser front
//! end and the remote `members.json` / `admin.json` documents use.

mod admin;
mod department;
mod member;
mod roster;
mod sync;

pub use admin::*;
pub use department::*;
pub use member::*;
pub use roster::*;
pub use sync::*;
