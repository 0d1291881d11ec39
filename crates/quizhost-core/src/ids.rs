use rand::Rng;
use serde::{Deserialize, Serialize};

/// Server-minted player identifier. Wire format is an opaque base36 string
/// so it can be embedded directly in JSON without quoting ambiguity.
pub type PlayerId = String;

/// A 6-digit decimal game PIN, always in `[100000, 999999]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GamePin(pub u32);

impl GamePin {
    /// Uniformly sample a fresh PIN. Collision handling is the caller's
    /// responsibility (see the PIN registry) — a coordinator is agnostic to
    /// whether its own PIN is globally unique.
    pub fn generate() -> Self {
        Self(rand::rng().random_range(100_000..=999_999))
    }
}

impl std::fmt::Display for GamePin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:06}", self.0)
    }
}

/// Mint a new player id: 12 characters of base36, randomly sampled.
pub fn generate_player_id() -> PlayerId {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::rng();
    (0..12)
        .map(|_| {
            let idx = rng.random_range(0..ALPHABET.len());
            ALPHABET[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_is_six_digits() {
        for _ in 0..200 {
            let pin = GamePin::generate();
            assert!((100_000..=999_999).contains(&pin.0));
            assert_eq!(pin.to_string().len(), 6);
        }
    }

    #[test]
    fn player_id_is_twelve_chars() {
        let id = generate_player_id();
        assert_eq!(id.len(), 12);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn player_ids_are_unlikely_to_collide() {
        let ids: std::collections::HashSet<_> = (0..1000).map(|_| generate_player_id()).collect();
        assert_eq!(ids.len(), 1000);
    }
}
