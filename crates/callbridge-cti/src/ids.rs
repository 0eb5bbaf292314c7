//! Request correlation ids and the derived client GUID.

use chrono::Utc;
use rand::Rng;

/// Hands out strictly increasing request ids.
///
/// The base is pinned to the unix time of the first call and the counter
/// is seeded from a one-day window either side of zero, so a restarted
/// client does not reuse ids a previous run may still have in flight.
#[derive(Debug, Default)]
pub struct RequestIdGenerator {
    start: Option<i64>,
    offset: i64,
}

impl RequestIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn with_seed(start: i64, offset: i64) -> Self {
        Self {
            start: Some(start),
            offset,
        }
    }

    /// Next id; never repeats within one generator.
    pub fn next_id(&mut self) -> i64 {
        let start = match self.start {
            Some(start) => start,
            None => {
                let start = Utc::now().timestamp();
                self.offset = rand::rng().random_range(-86_400..=86_400);
                self.start = Some(start);
                start
            }
        };
        self.offset += 1;
        start + self.offset
    }
}

/// Derives the client GUID sent in every request envelope.
///
/// The md5 of the configured unique key concatenated with the salt,
/// grouped 8-4-4-4-12 so it reads like a UUID.
pub fn client_guid(unique_key: &str, salt: &str) -> String {
    let digest = md5::compute(format!("{unique_key}{salt}").as_bytes());
    let hex = format!("{:x}", digest);
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    mod request_ids {
        use super::*;

        #[test]
        fn ids_count_up_from_the_seed() {
            let mut ids = RequestIdGenerator::with_seed(1_700_000_000, 10);
            assert_eq!(ids.next_id(), 1_700_000_011);
            assert_eq!(ids.next_id(), 1_700_000_012);
            assert_eq!(ids.next_id(), 1_700_000_013);
        }

        #[test]
        fn negative_seed_still_counts_up() {
            let mut ids = RequestIdGenerator::with_seed(1_700_000_000, -86_400);
            assert_eq!(ids.next_id(), 1_700_000_000 - 86_399);
            assert_eq!(ids.next_id(), 1_700_000_000 - 86_398);
        }

        #[test]
        fn fresh_generator_stays_within_a_day_of_now() {
            let before = Utc::now().timestamp();
            let mut ids = RequestIdGenerator::new();
            let first = ids.next_id();
            let after = Utc::now().timestamp();
            assert!(first >= before - 86_400);
            assert!(first <= after + 86_400 + 1);
        }

        #[test]
        fn ids_are_strictly_increasing() {
            let mut ids = RequestIdGenerator::new();
            let mut previous = ids.next_id();
            for _ in 0..100 {
                let next = ids.next_id();
                assert!(next > previous);
                previous = next;
            }
        }
    }

    mod guid {
        use super::*;

        #[test]
        fn known_digests() {
            assert_eq!(
                client_guid("", ""),
                "d41d8cd9-8f00-b204-e980-0998ecf8427e"
            );
            assert_eq!(
                client_guid("ab", "c"),
                "90015098-3cd2-4fb0-d696-3f7d28e17f72"
            );
            assert_eq!(
                client_guid("office-7f3a", "1700000000.25"),
                "e16c859d-b59f-7969-43f5-a244271e4488"
            );
        }

        #[test]
        fn salt_changes_the_guid() {
            let a = client_guid("office-7f3a", "1700000000.25");
            let b = client_guid("office-7f3a", "1700000001.25");
            assert_ne!(a, b);
        }

        #[test]
        fn shape_is_uuid_like() {
            let guid = client_guid("key", "salt");
            let lengths: Vec<usize> = guid.split('-').map(str::len).collect();
            assert_eq!(lengths, vec![8, 4, 4, 4, 12]);
            assert!(guid
                .chars()
                .all(|c| c == '-' || c.is_ascii_hexdigit()));
        }
    }
}
