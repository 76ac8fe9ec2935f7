//! Shared constants for end-to-end tests

pub const ARTIST_A: &str = "The Test Band";
pub const ARTIST_B: &str = "Jazz Ensemble";

pub const TAG_ROCK: &str = "rock";
pub const TAG_JAZZ: &str = "jazz";

pub const TEST_IP: &str = "127.0.0.1";
