//! Time-ordered 64-bit identifiers for file records.
//!
//! Layout (most significant first): 1 unused bit, 41-bit millisecond delta from
//! [`EPOCH_MS`], 5-bit datacenter id, 5-bit worker id, 12-bit sequence.

use crate::AppError;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// 2024-01-01T00:00:00Z
pub const EPOCH_MS: u64 = 1_704_067_200_000;

const SEQUENCE_BITS: u32 = 12;
const WORKER_BITS: u32 = 5;
const DATACENTER_BITS: u32 = 5;
const TIMESTAMP_BITS: u32 = 41;

const WORKER_SHIFT: u32 = SEQUENCE_BITS;
const DATACENTER_SHIFT: u32 = SEQUENCE_BITS + WORKER_BITS;
const TIMESTAMP_SHIFT: u32 = SEQUENCE_BITS + WORKER_BITS + DATACENTER_BITS;

const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;
const WORKER_MASK: u64 = (1 << WORKER_BITS) - 1;
const DATACENTER_MASK: u64 = (1 << DATACENTER_BITS) - 1;
const TIMESTAMP_MASK: u64 = (1 << TIMESTAMP_BITS) - 1;

pub const MAX_NODE_ID: u8 = 31;

/// Millisecond wall clock, injectable for tests.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        chrono::Utc::now().timestamp_millis().max(0) as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SnowflakeId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnowflakeParts {
    pub timestamp_ms: u64,
    pub datacenter_id: u8,
    pub worker_id: u8,
    pub sequence: u16,
}

impl SnowflakeId {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn compose(parts: SnowflakeParts) -> Self {
        let delta = parts.timestamp_ms.saturating_sub(EPOCH_MS) & TIMESTAMP_MASK;
        Self(
            (delta << TIMESTAMP_SHIFT)
                | ((parts.datacenter_id as u64 & DATACENTER_MASK) << DATACENTER_SHIFT)
                | ((parts.worker_id as u64 & WORKER_MASK) << WORKER_SHIFT)
                | (parts.sequence as u64 & SEQUENCE_MASK),
        )
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Ids never set the top bit, so this is lossless.
    pub const fn as_i64(self) -> i64 {
        self.0 as i64
    }

    pub fn parts(self) -> SnowflakeParts {
        SnowflakeParts {
            timestamp_ms: ((self.0 >> TIMESTAMP_SHIFT) & TIMESTAMP_MASK) + EPOCH_MS,
            datacenter_id: ((self.0 >> DATACENTER_SHIFT) & DATACENTER_MASK) as u8,
            worker_id: ((self.0 >> WORKER_SHIFT) & WORKER_MASK) as u8,
            sequence: (self.0 & SEQUENCE_MASK) as u16,
        }
    }
}

impl TryFrom<i64> for SnowflakeId {
    type Error = AppError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u64::try_from(value)
            .map(SnowflakeId)
            .map_err(|_| AppError::InvalidInput(format!("Invalid file id: {}", value)))
    }
}

impl fmt::Display for SnowflakeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SnowflakeId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(SnowflakeId)
            .map_err(|_| AppError::InvalidInput(format!("Invalid file id: {}", s)))
    }
}

// Serialized as a decimal string; JSON numbers above 2^53 lose precision in browsers.
impl Serialize for SnowflakeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SnowflakeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IdVisitor;

        impl de::Visitor<'_> for IdVisitor {
            type Value = SnowflakeId;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a file id as a decimal string or unsigned integer")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(SnowflakeId(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                u64::try_from(v)
                    .map(SnowflakeId)
                    .map_err(|_| E::custom("file id must not be negative"))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse::<u64>()
                    .map(SnowflakeId)
                    .map_err(|_| E::custom("file id must be a decimal integer"))
            }
        }

        deserializer.deserialize_any(IdVisitor)
    }
}

#[derive(Debug, Default)]
struct GeneratorState {
    last_ms: u64,
    sequence: u64,
}

/// Snowflake generator. Safe to share behind an `Arc`; calls are serialized by an
/// internal mutex so ordering holds across tasks.
pub struct IdGenerator {
    datacenter_id: u64,
    worker_id: u64,
    clock: Arc<dyn Clock>,
    state: Mutex<GeneratorState>,
}

impl fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdGenerator")
            .field("datacenter_id", &self.datacenter_id)
            .field("worker_id", &self.worker_id)
            .finish_non_exhaustive()
    }
}

impl IdGenerator {
    pub fn new(datacenter_id: u8, worker_id: u8) -> Result<Self, AppError> {
        Self::with_clock(datacenter_id, worker_id, Arc::new(SystemClock))
    }

    pub fn with_clock(
        datacenter_id: u8,
        worker_id: u8,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError> {
        if datacenter_id > MAX_NODE_ID {
            return Err(AppError::Configuration(format!(
                "Datacenter id must be between 0 and {}, got {}",
                MAX_NODE_ID, datacenter_id
            )));
        }
        if worker_id > MAX_NODE_ID {
            return Err(AppError::Configuration(format!(
                "Worker id must be between 0 and {}, got {}",
                MAX_NODE_ID, worker_id
            )));
        }

        Ok(Self {
            datacenter_id: datacenter_id as u64,
            worker_id: worker_id as u64,
            clock,
            state: Mutex::new(GeneratorState::default()),
        })
    }

    pub fn next_id(&self) -> Result<SnowflakeId, AppError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| AppError::Internal("Id generator lock poisoned".to_string()))?;

        let mut now = self.clock.now_ms();
        if now < state.last_ms {
            tracing::error!(
                last_ms = state.last_ms,
                now_ms = now,
                "Clock moved backwards, refusing to generate id"
            );
            return Err(AppError::ClockSkew {
                last_ms: state.last_ms,
                now_ms: now,
            });
        }

        // State is committed only once an id is actually produced.
        let mut sequence = 0;
        if now == state.last_ms {
            sequence = (state.sequence + 1) & SEQUENCE_MASK;
            if sequence == 0 {
                now = self.wait_for_next_ms(state.last_ms)?;
            }
        }

        let delta = now.checked_sub(EPOCH_MS).ok_or_else(|| {
            AppError::Configuration(format!("Clock reads {}ms, before the id epoch", now))
        })?;
        if delta > TIMESTAMP_MASK {
            return Err(AppError::Configuration(
                "Id timestamp space exhausted".to_string(),
            ));
        }

        state.last_ms = now;
        state.sequence = sequence;

        Ok(SnowflakeId(
            (delta << TIMESTAMP_SHIFT)
                | (self.datacenter_id << DATACENTER_SHIFT)
                | (self.worker_id << WORKER_SHIFT)
                | sequence,
        ))
    }

    fn wait_for_next_ms(&self, last_ms: u64) -> Result<u64, AppError> {
        loop {
            let now = self.clock.now_ms();
            if now > last_ms {
                return Ok(now);
            }
            if now < last_ms {
                return Err(AppError::ClockSkew {
                    last_ms,
                    now_ms: now,
                });
            }
            std::hint::spin_loop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::collections::{HashSet, VecDeque};
    use std::sync::atomic::{AtomicU64, Ordering};

    const T0: u64 = EPOCH_MS + 1_000_000;

    /// Reads `before` for the first `switch_after` calls, then `after`.
    struct SteppedClock {
        calls: AtomicU64,
        switch_after: u64,
        before: u64,
        after: u64,
    }

    impl Clock for SteppedClock {
        fn now_ms(&self) -> u64 {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.switch_after {
                self.before
            } else {
                self.after
            }
        }
    }

    /// Replays the given readings in order, then repeats the last one.
    struct ScriptedClock(Mutex<VecDeque<u64>>);

    impl ScriptedClock {
        fn new(readings: impl IntoIterator<Item = u64>) -> Self {
            Self(Mutex::new(readings.into_iter().collect()))
        }
    }

    impl Clock for ScriptedClock {
        fn now_ms(&self) -> u64 {
            let mut readings = self.0.lock().unwrap();
            if readings.len() > 1 {
                readings.pop_front().unwrap()
            } else {
                *readings.front().unwrap()
            }
        }
    }

    struct ManualClock(AtomicU64);

    impl Clock for ManualClock {
        fn now_ms(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn test_ids_strictly_increase() {
        let generator = IdGenerator::new(1, 2).unwrap();
        let mut previous = generator.next_id().unwrap();
        for _ in 0..20_000 {
            let id = generator.next_id().unwrap();
            assert!(id > previous, "{} should be greater than {}", id, previous);
            previous = id;
        }
    }

    #[test]
    fn test_sequence_wrap_waits_for_next_millisecond() {
        let clock = Arc::new(SteppedClock {
            calls: AtomicU64::new(0),
            switch_after: 4097,
            before: T0,
            after: T0 + 1,
        });
        let generator = IdGenerator::with_clock(0, 0, clock).unwrap();

        let ids: Vec<SnowflakeId> = (0..4096).map(|_| generator.next_id().unwrap()).collect();
        for (i, id) in ids.iter().enumerate() {
            let parts = id.parts();
            assert_eq!(parts.timestamp_ms, T0);
            assert_eq!(parts.sequence as usize, i);
        }

        let delayed = generator.next_id().unwrap().parts();
        assert_eq!(delayed.timestamp_ms, T0 + 1);
        assert_eq!(delayed.sequence, 0);
    }

    #[test]
    fn test_backward_clock_is_rejected() {
        let clock = Arc::new(ManualClock(AtomicU64::new(T0)));
        let generator = IdGenerator::with_clock(0, 0, clock.clone()).unwrap();
        let first = generator.next_id().unwrap();

        clock.0.store(T0 - 5, Ordering::SeqCst);
        assert!(matches!(
            generator.next_id(),
            Err(AppError::ClockSkew {
                last_ms,
                now_ms
            }) if last_ms == T0 && now_ms == T0 - 5
        ));

        clock.0.store(T0 + 1, Ordering::SeqCst);
        assert!(generator.next_id().unwrap() > first);
    }

    #[test]
    fn test_skew_during_wrap_wait_does_not_reissue_ids() {
        // 4096 ids at T0, then a wrap whose wait sees the clock step back, then T0 again.
        let readings = std::iter::repeat(T0).take(4097).chain([T0 - 1, T0, T0 + 1]);
        let clock = Arc::new(ScriptedClock::new(readings));
        let generator = IdGenerator::with_clock(0, 0, clock).unwrap();

        let mut seen: HashSet<SnowflakeId> =
            (0..4096).map(|_| generator.next_id().unwrap()).collect();
        assert_eq!(seen.len(), 4096);

        assert!(matches!(
            generator.next_id(),
            Err(AppError::ClockSkew { .. })
        ));

        let next = generator.next_id().unwrap();
        assert!(seen.insert(next), "id {} was issued twice", next);
        let parts = next.parts();
        assert_eq!(parts.timestamp_ms, T0 + 1);
        assert_eq!(parts.sequence, 0);
    }

    #[test]
    fn test_node_ids_out_of_range_are_rejected() {
        assert!(matches!(
            IdGenerator::new(32, 0),
            Err(AppError::Configuration(_))
        ));
        assert!(matches!(
            IdGenerator::new(0, 32),
            Err(AppError::Configuration(_))
        ));
        assert!(IdGenerator::new(31, 31).is_ok());
    }

    #[test]
    fn test_node_ids_are_embedded() {
        let generator = IdGenerator::new(17, 9).unwrap();
        let parts = generator.next_id().unwrap().parts();
        assert_eq!(parts.datacenter_id, 17);
        assert_eq!(parts.worker_id, 9);
    }

    #[test]
    fn test_parts_round_trip() {
        let mut rng = rand::rng();
        for _ in 0..10_000 {
            let parts = SnowflakeParts {
                timestamp_ms: EPOCH_MS + rng.random_range(0..=TIMESTAMP_MASK),
                datacenter_id: rng.random_range(0..=MAX_NODE_ID),
                worker_id: rng.random_range(0..=MAX_NODE_ID),
                sequence: rng.random_range(0..=SEQUENCE_MASK as u16),
            };
            let id = SnowflakeId::compose(parts);
            assert_eq!(id.parts(), parts);
            assert!(id.as_i64() >= 0);
        }
    }

    #[test]
    fn test_concurrent_generation_is_unique() {
        let generator = Arc::new(IdGenerator::new(3, 4).unwrap());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let generator = generator.clone();
                std::thread::spawn(move || {
                    let ids: Vec<SnowflakeId> =
                        (0..5_000).map(|_| generator.next_id().unwrap()).collect();
                    assert!(ids.windows(2).all(|w| w[0] < w[1]));
                    ids
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {}", id);
            }
        }
        assert_eq!(seen.len(), 40_000);
    }

    #[test]
    fn test_serde_uses_decimal_strings() {
        let id = SnowflakeId::from_raw(9_007_199_254_740_993);
        assert_eq!(
            serde_json::to_string(&id).unwrap(),
            "\"9007199254740993\""
        );
        let from_str: SnowflakeId = serde_json::from_str("\"9007199254740993\"").unwrap();
        let from_num: SnowflakeId = serde_json::from_str("42").unwrap();
        assert_eq!(from_str, id);
        assert_eq!(from_num.as_u64(), 42);
        assert!(serde_json::from_str::<SnowflakeId>("\"abc\"").is_err());
        assert!(serde_json::from_str::<SnowflakeId>("-1").is_err());
    }
}
