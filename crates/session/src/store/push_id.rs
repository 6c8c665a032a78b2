// Chronologically sortable, collision-resistant child keys.
//
// Layout (20 chars from a 64-char alphabet that sorts in ASCII order):
// - char 0: the store key prefix `-`
// - chars 1..8: creation time in milliseconds (7 base-64 digits)
// - chars 8..20: 72 random bits, incremented on same-millisecond reuse

use rand::Rng;
use std::sync::Mutex;

use livecode_common::handle::STORE_KEY_PREFIX;

pub const PUSH_ID_LEN: usize = 20;
const TIMESTAMP_CHARS: usize = 7;
const RANDOM_CHARS: usize = PUSH_ID_LEN - 1 - TIMESTAMP_CHARS;

const PUSH_CHARS: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Default)]
struct GeneratorState {
    last_millis: i64,
    last_random: [u8; RANDOM_CHARS],
}

#[derive(Debug, Default)]
pub struct PushIdGenerator {
    state: Mutex<GeneratorState>,
}

impl PushIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate the next key for a client clock reading of `now_millis`.
    pub fn next_id(&self, now_millis: i64) -> String {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if now_millis == state.last_millis {
            increment(&mut state.last_random);
        } else {
            let mut rng = rand::thread_rng();
            for digit in state.last_random.iter_mut() {
                *digit = rng.gen_range(0..64);
            }
            state.last_millis = now_millis;
        }

        let mut id = String::with_capacity(PUSH_ID_LEN);
        id.push(STORE_KEY_PREFIX);

        let mut millis = now_millis.max(0);
        let mut time_digits = [0u8; TIMESTAMP_CHARS];
        for slot in time_digits.iter_mut().rev() {
            *slot = PUSH_CHARS[(millis % 64) as usize];
            millis /= 64;
        }
        id.extend(time_digits.iter().map(|b| char::from(*b)));
        id.extend(state.last_random.iter().map(|d| char::from(PUSH_CHARS[*d as usize])));
        id
    }
}

/// Base-64 increment with carry, most significant digit first.
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
