//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&DbPool` as the first argument.

pub mod generation_repo;
pub mod influencer_image_repo;
pub mod payment_repo;
pub mod preset_repo;
pub mod promo_code_repo;
pub mod settings_repo;

pub use generation_repo::GenerationRepo;
pub use influencer_image_repo::InfluencerImageRepo;
pub use payment_repo::PaymentRepo;
pub use preset_repo::PresetRepo;
pub use promo_code_repo::{ConsumeOutcome, PromoCodeRepo};
pub use settings_repo::SettingsRepo;
