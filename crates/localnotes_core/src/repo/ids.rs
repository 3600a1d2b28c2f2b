//! Note id generation.
//!
//! # Invariants
//! - `Random` ids are UUID v4 and are treated as collision-free.
//! - `Timestamp` ids are epoch milliseconds and never decrease within one
//!   generator. Two creates in the same millisecond (or from two
//!   contexts) can collide; the repository then keeps only the newest
//!   note ("last create wins"). This is an accepted weak fallback.

use crate::model::note::NoteId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Id scheme used for new notes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdStrategy {
    #[default]
    Random,
    Timestamp,
}

#[derive(Debug, Clone)]
pub struct IdGenerator {
    strategy: IdStrategy,
    last_millis: i64,
}

impl IdGenerator {
    pub fn new(strategy: IdStrategy) -> Self {
        Self {
            strategy,
            last_millis: i64::MIN,
        }
    }

    pub fn strategy(&self) -> IdStrategy {
        self.strategy
    }

    pub fn next_id(&mut self, now: DateTime<Utc>) -> NoteId {
        match self.strategy {
            IdStrategy::Random => NoteId::from(Uuid::new_v4()),
            IdStrategy::Timestamp => {
                let millis = now.timestamp_millis().max(self.last_millis);
                self.last_millis = millis;
                NoteId::new(millis.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{IdGenerator, IdStrategy};
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::HashSet;

    #[test]
    fn random_ids_are_unique() {
        let mut ids = IdGenerator::new(IdStrategy::Random);
        let now = Utc::now();
        let generated = (0..256).map(|_| ids.next_id(now)).collect::<HashSet<_>>();
        assert_eq!(generated.len(), 256);
    }

    #[test]
    fn timestamp_ids_never_decrease() {
        let mut ids = IdGenerator::new(IdStrategy::Timestamp);
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let first = ids.next_id(now);
        let after_clock_step_back = ids.next_id(now - Duration::seconds(10));
        let later = ids.next_id(now + Duration::milliseconds(1));

        assert_eq!(first.as_str(), "1704067200000");
        assert_eq!(after_clock_step_back, first);
        assert_eq!(later.as_str(), "1704067200001");
    }
}
