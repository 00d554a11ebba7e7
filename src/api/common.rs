//! Common API utilities and shared types

/// Default page number (1-indexed)
pub fn default_page() -> u32 {
    1
}
