// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Generated child keys that sort in creation order.
//!
//! A key is 20 characters: 8 encode the millisecond timestamp, 12 are
//! random. Within one millisecond the random part is incremented instead
//! of redrawn, so keys from one generator are strictly increasing.

use crate::db::StoreError;
use ring::rand::{SecureRandom, SystemRandom};
use std::sync::Mutex;

/// Key alphabet, in ASCII order so that string order matches time order.
const PUSH_CHARS: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

const TIME_CHARS: usize = 8;
const RANDOM_CHARS: usize = 12;

pub const PUSH_ID_LEN: usize = TIME_CHARS + RANDOM_CHARS;

struct State {
    last_time_ms: i64,
    last_random: [u8; RANDOM_CHARS],
}

/// Generator for chronologically ordered unique keys.
pub struct PushIdGenerator {
    rng: SystemRandom,
    state: Mutex<State>,
}

impl Default for PushIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl PushIdGenerator {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
            state: Mutex::new(State {
                last_time_ms: i64::MIN,
                last_random: [0; RANDOM_CHARS],
            }),
        }
    }

    /// Generate a key for the current time.
    pub fn generate(&self) -> Result<String, StoreError> {
        self.generate_at(chrono::Utc::now().timestamp_millis())
    }

    /// Generate a key for `now_ms`. A clock that goes backwards is treated
    /// as still being at the last seen time.
    pub fn generate_at(&self, now_ms: i64) -> Result<String, StoreError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        let now_ms = now_ms.max(state.last_time_ms);
        if now_ms == state.last_time_ms {
            increment(&mut state.last_random);
        } else {
            let mut bytes = [0u8; RANDOM_CHARS];
            self.rng
                .fill(&mut bytes)
                .map_err(|_| StoreError::Unavailable("system randomness unavailable".into()))?;
            for (slot, byte) in state.last_random.iter_mut().zip(bytes) {
                *slot = byte & 0x3f;
            }
            state.last_time_ms = now_ms;
        }

        let mut key = Vec::with_capacity(PUSH_ID_LEN);
        let mut t = now_ms.max(0) as u64;
        let mut time = [0u8; TIME_CHARS];
        for slot in time.iter_mut().rev() {
            *slot = PUSH_CHARS[(t % 64) as usize];
            t /= 64;
        }
        key.extend_from_slice(&time);
        key.extend(state.last_random.iter().map(|&i| PUSH_CHARS[i as usize]));

        // Every byte comes from PUSH_CHARS, which is ASCII.
        Ok(String::from_utf8_lossy(&key).into_owned())
    }
}

/// Add one to a base-64 number stored most significant digit first.
fn increment(digits: &mut [u8; RANDOM_CHARS]) {
    for digit in digits.iter_mut().rev() {
        if *digit == 63 {
            *digit = 0;
        } else {
            *digit += 1;
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_key_shape() {
        let key = PushIdGenerator::new().generate().unwrap();
        assert_eq!(key.len(), PUSH_ID_LEN);
        assert!(key.bytes().all(|b| PUSH_CHARS.contains(&b)));
        assert!(crate::db::path::validate_key(&key).is_ok());
    }

    #[test]
    fn test_same_millisecond_keys_increase() {
        let gen = PushIdGenerator::new();
        let keys: Vec<String> = (0..1000)
            .map(|_| gen.generate_at(1_700_000_000_000).unwrap())
            .collect();

        for pair in keys.windows(2) {
            assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
        }
        let unique: HashSet<_> = keys.iter().collect();
        assert_eq!(unique.len(), keys.len());
    }

    #[test]
    fn test_timestamp_prefix_orders_keys() {
        let gen = PushIdGenerator::new();
        let early = gen.generate_at(1_000).unwrap();
        let late = gen.generate_at(2_000).unwrap();
        assert!(early[..TIME_CHARS] < late[..TIME_CHARS]);
        assert!(early < late);
    }

    #[test]
    fn test_clock_going_backwards_still_increases() {
        let gen = PushIdGenerator::new();
        let first = gen.generate_at(5_000).unwrap();
        let second = gen.generate_at(4_000).unwrap();
        assert!(first < second);
        assert_eq!(first[..TIME_CHARS], second[..TIME_CHARS]);
    }

    #[test]
    fn test_increment_carries() {
        let mut digits = [0u8; RANDOM_CHARS];
        digits[RANDOM_CHARS - 1] = 63;
        digits[RANDOM_CHARS - 2] = 63;
        increment(&mut digits);
        assert_eq!(digits[RANDOM_CHARS - 1], 0);
        assert_eq!(digits[RANDOM_CHARS - 2], 0);
        assert_eq!(digits[RANDOM_CHARS - 3], 1);
    }

    #[test]
    fn test_time_encoding() {
        let gen = PushIdGenerator::new();
        let key = gen.generate_at(0).unwrap();
        assert_eq!(&key[..TIME_CHARS], "--------");
        // 65 = 1 * 64 + 1, and '0' is digit 1
        let key = gen.generate_at(65).unwrap();
        assert_eq!(&key[..TIME_CHARS], "------00");
    }
}
