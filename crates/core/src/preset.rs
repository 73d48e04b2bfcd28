//! Preset validation helpers.

use crate::error::CoreError;

/// Maximum length for a preset name.
pub const MAX_PRESET_NAME_LEN: usize = 255;

/// Largest output dimension the backend accepts.
pub const MAX_DIMENSION: u32 = 4096;

/// Validate a preset name (non-empty, bounded length).
pub fn validate_name(name: &str) -> Result<(), CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("Preset name must not be empty".into()));
    }
    if trimmed.len() > MAX_PRESET_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "Preset name exceeds {MAX_PRESET_NAME_LEN} characters"
        )));
    }
    Ok(())
}

/// Validate output dimensions (positive, bounded).
pub fn validate_dimensions(width: u32, height: u32) -> Result<(), CoreError> {
    if width == 0 || height == 0 {
        return Err(CoreError::Validation(
            "Preset dimensions must be positive".into(),
        ));
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(CoreError::Validation(format!(
            "Preset dimensions must not exceed {MAX_DIMENSION}"
        )));
    }
    Ok(())
}
