//! Remote skill registries.

pub mod client;
pub mod schema;
pub mod source;

pub use client::{FetchedSkill, RegistryClient};
pub use schema::{RemoteSkill, SkillFiles, SkillRegistry};
pub use source::Location;
