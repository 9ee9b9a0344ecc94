//! Session identity helpers: generated display names and stable colors.

use canvas::consts::USER_COLORS;
use rand::Rng;
use uuid::Uuid;

const ADJECTIVES: [&str; 6] = ["Happy", "Clever", "Swift", "Bright", "Cool", "Kind"];
const NOUNS: [&str; 6] = ["Panda", "Fox", "Eagle", "Wolf", "Lion", "Bear"];

/// A readable anonymous name like `SwiftPanda`.
#[must_use]
pub fn generate_display_name() -> String {
    let mut rng = rand::rng();
    let adjective = ADJECTIVES[rng.random_range(0..ADJECTIVES.len())];
    let noun = NOUNS[rng.random_range(0..NOUNS.len())];
    format!("{adjective}{noun}")
}

/// Deterministic palette color for a session, so every client renders the
/// same peer in the same color.
#[must_use]
pub fn user_color(session_id: Uuid) -> &'static str {
    let index = (session_id.as_u128() % USER_COLORS.len() as u128) as usize;
    USER_COLORS[index]
}
