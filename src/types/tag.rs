//! # Payload types and their numeric tags.
//!
//! Every payload type exchanged over the network maps to a small integer [`TypeTag`].
//! Tags come from a fixed namespace `0..MAX_TYPE_TAG` that is partitioned into
//! contiguous blocks of [`MAX_TYPES_PER_FAMILY`] tags, one block per plugin family.
//!
//! ```text
//!  0        1 ........ 16   17 ....... 32   33 ....... 48        ...   < 256
//!  unused   │  TEST       │  PIPELINE    │  DETECTION_EVENT │  ...
//!           └─ TagFamily::block(0)       └─ TagFamily::block(2)
//! ```
//!
//! ## Rules
//! - [`payload_types!`](crate::payload_types) is the single place a type receives its tag.
//! - Offsets are checked at compile time: out of block range or duplicated inside one
//!   invocation is a build error.
//! - Families never overlap, so two families cannot collide.
//! - Binding one tag to two Rust types anyway (two separate invocations with the same
//!   offset) is caught the first time both reach one network or registry, and panics.
//!
//! ## Example
//! ```
//! use pipevisor::{payload_types, Payload, TagFamily};
//!
//! const REPORTER: TagFamily = TagFamily::block("reporter", 14);
//!
//! #[derive(Clone)]
//! struct Line(String);
//! #[derive(Clone)]
//! struct Flush;
//!
//! payload_types!(REPORTER => {
//!     Line = 0,
//!     Flush = 1,
//! });
//!
//! assert_eq!(<Line as Payload>::TAG, REPORTER.start());
//! assert_eq!(<Flush as Payload>::TAG, REPORTER.start() + 1);
//! ```

/// Small integer identifying one payload type at runtime.
pub type TypeTag = u32;

/// Number of tags reserved for one plugin family.
pub const MAX_TYPES_PER_FAMILY: u32 = 16;

/// Size of the whole tag namespace (exclusive upper bound).
pub const MAX_TYPE_TAG: u32 = 256;

/// Data that can flow through a [`DataNetwork`](crate::DataNetwork) channel.
///
/// Implemented through [`payload_types!`](crate::payload_types); implementing it by hand
/// bypasses the collision checks.
pub trait Payload: Clone + Send + Sync + 'static {
    /// Tag routing values of this type.
    const TAG: TypeTag;

    /// Human readable name used in errors and logs.
    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Contiguous block of tags reserved for one plugin family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TagFamily {
    name: &'static str,
    start: TypeTag,
}

impl TagFamily {
    /// Reserves block number `index` of the namespace.
    ///
    /// Panics at compile time (when used in a `const`) if the block does not fit.
    pub const fn block(name: &'static str, index: u32) -> Self {
        let start = 1 + index * MAX_TYPES_PER_FAMILY;
        assert!(
            start + MAX_TYPES_PER_FAMILY <= MAX_TYPE_TAG,
            "tag family block lies outside of the tag namespace"
        );
        Self { name, start }
    }

    #[inline]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// First tag of the block.
    #[inline]
    pub const fn start(&self) -> TypeTag {
        self.start
    }

    /// One past the last tag of the block.
    #[inline]
    pub const fn end(&self) -> TypeTag {
        self.start + MAX_TYPES_PER_FAMILY
    }

    #[inline]
    pub const fn contains(&self, tag: TypeTag) -> bool {
        tag >= self.start && tag < self.end()
    }

    /// Tag at `offset` inside the block.
    pub const fn tag(&self, offset: u32) -> TypeTag {
        assert!(
            offset < MAX_TYPES_PER_FAMILY,
            "payload tag offset exceeds the family block"
        );
        self.start + offset
    }
}

/// Compile-time check used by [`payload_types!`](crate::payload_types).
#[doc(hidden)]
pub const fn assert_distinct_offsets(offsets: &[u32]) {
    let mut i = 0;
    while i < offsets.len() {
        assert!(
            offsets[i] < MAX_TYPES_PER_FAMILY,
            "payload tag offset exceeds the family block"
        );
        let mut j = i + 1;
        while j < offsets.len() {
            assert!(offsets[i] != offsets[j], "duplicate payload tag offset");
            j += 1;
        }
        i += 1;
    }
}

/// Predefined family blocks.
pub mod families {
    use super::TagFamily;

    pub const TEST: TagFamily = TagFamily::block("test", 0);
    pub const PIPELINE: TagFamily = TagFamily::block("pipeline", 1);
    pub const DETECTION_EVENT: TagFamily = TagFamily::block("detection_event", 2);
    pub const HEURISTIC: TagFamily = TagFamily::block("heuristic", 3);
    pub const CONSOLE_REPORTER: TagFamily = TagFamily::block("console_reporter", 4);
    pub const CSV_RECORDER: TagFamily = TagFamily::block("csv_recorder", 5);
    pub const FILE_REPORTER: TagFamily = TagFamily::block("file_reporter", 6);
    pub const HOTSPOT_DETECTOR: TagFamily = TagFamily::block("hotspot_detector", 7);
    pub const NORMALIZER: TagFamily = TagFamily::block("normalizer", 8);
    pub const PMU_PUBLISHER: TagFamily = TagFamily::block("pmu_publisher", 9);
    pub const PROCESS_MONITOR: TagFamily = TagFamily::block("process_monitor", 10);
    pub const CLASSIFIER: TagFamily = TagFamily::block("classifier", 11);
    pub const REPLAYER: TagFamily = TagFamily::block("replayer", 12);
    pub const CORE_TELEMETRY: TagFamily = TagFamily::block("core_telemetry", 13);
}

/// Assigns tags from one [`TagFamily`] to a list of types and implements
/// [`Payload`] for each of them.
///
/// ```compile_fail
/// use pipevisor::{payload_types, families};
/// #[derive(Clone)] struct A;
/// #[derive(Clone)] struct B;
/// payload_types!(families::TEST => { A = 3, B = 3 });
/// ```
#[macro_export]
macro_rules! payload_types {
    ($family:expr => { $($ty:ty = $offset:expr),+ $(,)? }) => {
        const _: () = $crate::__assert_distinct_offsets(&[$($offset),+]);
        $(
            impl $crate::Payload for $ty {
                const TAG: $crate::TypeTag = $family.tag($offset);
            }
        )+
    };
}

#[cfg(test)]
mod tests {
    use super::families::*;
    use super::*;

    #[test]
    fn test_family_blocks_are_disjoint() {
        let all = [
            TEST,
            PIPELINE,
            DETECTION_EVENT,
            HEURISTIC,
            CONSOLE_REPORTER,
            CSV_RECORDER,
            FILE_REPORTER,
            HOTSPOT_DETECTOR,
            NORMALIZER,
            PMU_PUBLISHER,
            PROCESS_MONITOR,
            CLASSIFIER,
            REPLAYER,
            CORE_TELEMETRY,
        ];
        for (i, a) in all.iter().enumerate() {
            assert!(a.end() <= MAX_TYPE_TAG);
            for b in &all[i + 1..] {
                assert!(a.end() <= b.start() || b.end() <= a.start(), "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn test_tag_offsets() {
        assert_eq!(TEST.tag(0), 1);
        assert_eq!(PIPELINE.tag(0), 1 + MAX_TYPES_PER_FAMILY);
        assert!(PIPELINE.contains(PIPELINE.tag(MAX_TYPES_PER_FAMILY - 1)));
        assert!(!PIPELINE.contains(PIPELINE.end()));
    }

    #[test]
    #[should_panic(expected = "exceeds the family block")]
    fn test_offset_out_of_block_panics() {
        let offset = MAX_TYPES_PER_FAMILY;
        let _ = TEST.tag(offset);
    }

    #[test]
    fn test_distinct_offsets_accepts_unique() {
        assert_distinct_offsets(&[0, 1, 2, 15]);
    }

    #[test]
    #[should_panic(expected = "duplicate payload tag offset")]
    fn test_distinct_offsets_rejects_duplicates() {
        let offsets = vec![4, 5, 4];
        assert_distinct_offsets(&offsets);
    }
}
