//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A `Deserialize` create DTO for inserts
//! - An update DTO (all `Option` fields) where the entity is patchable

pub mod generation;
pub mod influencer_image;
pub mod payment;
pub mod preset;
pub mod promo_code;
pub mod settings;
