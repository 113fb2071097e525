//! Validation helpers for engine configuration and raster preconditions
//!
//! Every check returns a descriptive `anyhow` error naming the offending
//! field, so configuration mistakes fail fast instead of surfacing as panics
//! deep inside image filters.

use anyhow::{anyhow, Result};

// ============================================================================
// CONSTANTS: Raster Limits
// ============================================================================

/// Largest accepted raster side in pixels (detector inputs are camera frames)
pub const MAX_RASTER_SIDE: u32 = 16_384;

/// Largest accepted adaptive threshold block size
pub const MAX_BLOCK_SIZE: u32 = 1_001;

// ============================================================================
// Numeric Validation
// ============================================================================

/// Validate value is within range
pub fn validate_range<T: PartialOrd + std::fmt::Display>(
    value: T,
    min: T,
    max: T,
    field_name: &str,
) -> Result<()> {
    if value < min || value > max {
        return Err(anyhow!(
            "{} must be between {} and {}, got {}",
            field_name,
            min,
            max,
            value
        ));
    }
    Ok(())
}

/// Validate a ratio lies in the closed unit interval
pub fn validate_unit_interval(value: f32, field_name: &str) -> Result<()> {
    if !value.is_finite() {
        return Err(anyhow!("{} must be a finite number, got {}", field_name, value));
    }
    validate_range(value, 0.0, 1.0, field_name)
}

/// Validate a strictly positive, finite factor
pub fn validate_positive(value: f32, field_name: &str) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(anyhow!("{} must be greater than 0, got {}", field_name, value));
    }
    Ok(())
}

/// Validate an odd, positive kernel or block size
pub fn validate_odd(value: u32, field_name: &str) -> Result<()> {
    if value == 0 || value % 2 == 0 {
        return Err(anyhow!("{} must be an odd positive number, got {}", field_name, value));
    }
    Ok(())
}

/// Validate a `min..=max` pair is ordered
pub fn validate_ordered<T: PartialOrd + std::fmt::Display>(
    min: T,
    max: T,
    field_name: &str,
) -> Result<()> {
    if min > max {
        return Err(anyhow!(
            "{} range is inverted (min {} > max {})",
            field_name,
            min,
            max
        ));
    }
    Ok(())
}

// ============================================================================
// Raster Validation
// ============================================================================

/// Validate raster dimensions: non-empty and within `MAX_RASTER_SIDE`
pub fn validate_dimensions(width: u32, height: u32, field_name: &str) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(anyhow!(
            "{} is empty ({}x{} pixels)",
            field_name,
            width,
            height
        ));
    }
    if width > MAX_RASTER_SIDE || height > MAX_RASTER_SIDE {
        return Err(anyhow!(
            "{} exceeds maximum side of {} pixels (got {}x{})",
            field_name,
            MAX_RASTER_SIDE,
            width,
            height
        ));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
