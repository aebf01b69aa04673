use ark_ec::CurveGroup;
use ark_ff::PrimeField;
use sha2::{Digest, Sha512};
use std::marker::PhantomData;

use super::{encode_field_be, encode_point};
use crate::signing::TranscriptBuilder;

const TAG_POINT: u8 = 0x01;
const TAG_SCALAR: u8 = 0x02;
const TAG_STR: u8 = 0x03;
const TAG_BYTES: u8 = 0x04;
const TAG_INT: u8 = 0x05;
const TAG_LIST: u8 = 0x06;

/// One input to a Fiat–Shamir hash.
#[derive(Clone, Copy, Debug)]
pub enum HashItem<'a, C: CurveGroup> {
    Point(&'a C),
    Scalar(&'a C::ScalarField),
    Str(&'a str),
    Bytes(&'a [u8]),
    Int(u64),
}

/// Fiat–Shamir transcript with an injective encoding.
///
/// Each item is written as `tag ‖ u32 length ‖ payload`, points and scalars in
/// their fixed-width big-endian forms. The challenge is SHA-512 of the whole
/// transcript reduced mod q.
#[derive(Clone, Debug)]
pub struct ChallengeTranscript<C: CurveGroup> {
    builder: TranscriptBuilder,
    _curve: PhantomData<C>,
}

impl<C> ChallengeTranscript<C>
where
    C: CurveGroup,
    C::BaseField: PrimeField,
{
    pub fn new(label: &'static str) -> Self {
        Self {
            builder: TranscriptBuilder::new(label),
            _curve: PhantomData,
        }
    }

    pub fn append_point(&mut self, point: &C) -> &mut Self {
        self.builder.append_u8(TAG_POINT);
        self.builder.append_bytes(&encode_point(point));
        self
    }

    /// Appends the list length followed by every point.
    pub fn append_points(&mut self, points: &[C]) -> &mut Self {
        self.builder.append_u8(TAG_LIST);
        self.builder.append_u64(points.len() as u64);
        for point in points {
            self.append_point(point);
        }
        self
    }

    pub fn append_scalar(&mut self, scalar: &C::ScalarField) -> &mut Self {
        self.builder.append_u8(TAG_SCALAR);
        self.builder.append_bytes(&encode_field_be(scalar));
        self
    }

    pub fn append_str(&mut self, value: &str) -> &mut Self {
        self.builder.append_u8(TAG_STR);
        self.builder.append_str(value);
        self
    }

    pub fn append_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.builder.append_u8(TAG_BYTES);
        self.builder.append_bytes(bytes);
        self
    }

    pub fn append_u64(&mut self, value: u64) -> &mut Self {
        self.builder.append_u8(TAG_INT);
        self.builder.append_bytes(&value.to_be_bytes());
        self
    }

    pub fn append(&mut self, item: &HashItem<'_, C>) -> &mut Self {
        match item {
            HashItem::Point(point) => self.append_point(point),
            HashItem::Scalar(scalar) => self.append_scalar(scalar),
            HashItem::Str(value) => self.append_str(value),
            HashItem::Bytes(bytes) => self.append_bytes(bytes),
            HashItem::Int(value) => self.append_u64(*value),
        }
    }

    /// Derive the challenge for everything appended so far.
    pub fn challenge_scalar(&self) -> C::ScalarField {
        let digest = Sha512::digest(self.builder.as_bytes());
        C::ScalarField::from_be_bytes_mod_order(&digest)
    }

    /// Challenge for `index`, leaving this transcript untouched so it can be
    /// reused as a common prefix.
    pub fn indexed_challenge(&self, index: u64) -> C::ScalarField {
        let mut fork = self.clone();
        fork.append_u64(index);
        fork.challenge_scalar()
    }
}

/// Stand-alone hash of an ordered list of items under `label`.
pub fn hash_to_scalar<C>(label: &'static str, items: &[HashItem<'_, C>]) -> C::ScalarField
where
    C: CurveGroup,
    C::BaseField: PrimeField,
{
    let mut transcript = ChallengeTranscript::<C>::new(label);
    for item in items {
        transcript.append(item);
    }
    transcript.challenge_scalar()
}
