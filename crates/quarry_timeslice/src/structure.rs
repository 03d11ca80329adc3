//! The two-level week/slice structure.

use crate::slice::week_start;
use quarry_core::{
    register_structure, BytesCodec, CoreResult, RecordCodec, RecordType, Structure, TextCodec,
    TypedStructure,
};
use std::sync::{Arc, Once};

/// Identity prefix of time slice structures.
pub const TIME_SLICE_IDENTITY: &str = "time-slice";

/// Partition structure of a [`TimeSliceStore`](crate::TimeSliceStore).
///
/// Valid targets are exactly `[<week>, <slice>]` where both are integers
/// in canonical decimal form and `week == week_start(slice)`. Records carry no partition of
/// their own; the store chooses the slice when a session is opened.
///
/// The identity is `time-slice` for raw bytes and `time-slice/<codec>`
/// otherwise.
#[derive(Debug, Clone)]
pub struct TimeSliceStructure<C: RecordCodec> {
    identity: String,
    codec: C,
}

impl<C: RecordCodec> Default for TimeSliceStructure<C> {
    fn default() -> Self {
        Self::new(C::default())
    }
}

impl<C: RecordCodec> TimeSliceStructure<C> {
    /// Creates the structure for `codec`.
    #[must_use]
    pub fn new(codec: C) -> Self {
        let identity = if C::NAME == BytesCodec::NAME {
            TIME_SLICE_IDENTITY.to_string()
        } else {
            format!("{TIME_SLICE_IDENTITY}/{}", C::NAME)
        };
        Self { identity, codec }
    }

    /// Returns the codec.
    #[must_use]
    pub fn codec(&self) -> &C {
        &self.codec
    }
}

impl<C: RecordCodec> Structure for TimeSliceStructure<C> {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn record_type(&self) -> RecordType {
        self.codec.record_type()
    }

    fn is_valid_target(&self, dirs: &[&str]) -> bool {
        let [week, slice] = dirs else {
            return false;
        };
        match (parse_canonical(week), parse_canonical(slice)) {
            (Some(week), Some(slice)) => week == week_start(slice),
            _ => false,
        }
    }
}

impl<C: RecordCodec> TypedStructure for TimeSliceStructure<C> {
    type Record = C::Record;

    fn target(&self, _record: &C::Record) -> Vec<String> {
        Vec::new()
    }

    fn serialize(&self, record: &C::Record) -> CoreResult<Vec<u8>> {
        self.codec.encode(record)
    }

    fn deserialize(&self, bytes: &[u8]) -> CoreResult<C::Record> {
        self.codec.decode(bytes)
    }
}

/// Parses a directory name written the way `i64::to_string` writes it.
///
/// Forms such as `"0100"` or `"+5"` name a different directory than the
/// number they parse to and are rejected.
pub(crate) fn parse_canonical(name: &str) -> Option<i64> {
    name.parse::<i64>().ok().filter(|n| n.to_string() == name)
}

/// Registers the built-in time slice structures so untyped handles can open
/// time slice stores.
pub fn register_time_slice_structures() {
    static REGISTER: Once = Once::new();
    REGISTER.call_once(|| {
        register_structure(Arc::new(TimeSliceStructure::<BytesCodec>::default()));
        register_structure(Arc::new(TimeSliceStructure::<TextCodec>::default()));
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slice::SECONDS_PER_WEEK;
    use quarry_core::StructureRegistry;

    #[test]
    fn identities() {
        assert_eq!(TimeSliceStructure::<BytesCodec>::default().identity(), "time-slice");
        assert_eq!(TimeSliceStructure::<TextCodec>::default().identity(), "time-slice/text");
    }

    #[test]
    fn valid_targets() {
        let s = TimeSliceStructure::<TextCodec>::default();
        let week = (3 * SECONDS_PER_WEEK).to_string();
        let slice = (3 * SECONDS_PER_WEEK + 60).to_string();
        let early = (3 * SECONDS_PER_WEEK - 60).to_string();
        let (week, slice, early) = (week.as_str(), slice.as_str(), early.as_str());

        assert!(s.is_valid_target(&[week, slice]));
        assert!(!s.is_valid_target(&[week, early]));
        assert!(!s.is_valid_target(&[week]));
        assert!(!s.is_valid_target(&[]));
        assert!(!s.is_valid_target(&[week, slice, "x"]));
        assert!(!s.is_valid_target(&["abc", slice]));

        let padded = format!("0{week}");
        let signed = format!("+{slice}");
        assert!(!s.is_valid_target(&[padded.as_str(), slice]));
        assert!(!s.is_valid_target(&[week, signed.as_str()]));
    }

    #[test]
    fn canonical_names_only() {
        assert_eq!(parse_canonical("604800"), Some(604_800));
        assert_eq!(parse_canonical("-5"), Some(-5));
        assert_eq!(parse_canonical("0"), Some(0));
        assert_eq!(parse_canonical("0100"), None);
        assert_eq!(parse_canonical("+5"), None);
        assert_eq!(parse_canonical("-0"), None);
        assert_eq!(parse_canonical("x1"), None);
    }

    #[test]
    fn registration_makes_structures_resolvable() {
        register_time_slice_structures();
        let registry = StructureRegistry::global();
        assert!(registry.get("time-slice").is_some());
        assert_eq!(
            registry.resolve("time-slice/text").unwrap().record_type(),
            RecordType::TEXT
        );
    }
}
