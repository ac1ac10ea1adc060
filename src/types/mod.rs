//! Payload typing: tags, families and the [`Payload`] trait.

mod tag;

pub use tag::{
    MAX_TYPE_TAG, MAX_TYPES_PER_FAMILY, Payload, TagFamily, TypeTag, assert_distinct_offsets,
    families,
};

#[cfg(test)]
pub(crate) mod testing {
    //! Payload types shared by unit tests.
    use super::families::TEST;

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct Sample(pub u64);

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct Label(pub String);

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct Setting(pub u32);

    crate::payload_types!(TEST => {
        Sample = 0,
        Label = 1,
        Setting = 2,
    });
}
