// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

use core::fmt;
use core::fmt::{Display, Formatter};

use bitcoin::hashes::Hash;
use bitcoin::secp256k1;

use crate::bech32::{self, u5, Base32Len, ToBase32, WriteBase32};
use crate::{
	constants, CreationError, Currency, Description, ExpiryTime, Invoice, InvoiceSignature, PayeePubKey,
	PositiveTimestamp, RouteHint, Sha256, SignedInvoice, TaggedField, UnknownField, MAX_FIELD_LENGTH,
	TIMESTAMP_LENGTH,
};

/// Number of symbols in a tagged field's length prefix.
const LENGTH_PREFIX_LEN: usize = 2;

/// Calculates the base32 encoded size of a byte slice
fn bytes_size_to_base32_size(byte_size: usize) -> usize {
	let bits = byte_size * 8;
	if bits % 5 == 0 {
		// without padding bits
		bits / 5
	} else {
		// with padding bits
		bits / 5 + 1
	}
}

impl Display for SignedInvoice {
	fn fmt(&self, f: &mut Formatter) -> Result<(), fmt::Error> {
		let mut data = self.data.clone();
		data.extend_from_slice(&self.signature.to_base32());

		// The hrp was validated when the request was built or parsed
		let text = bech32::encode(&self.hrp, &data).map_err(|_| fmt::Error)?;
		f.write_str(&text)
	}
}

impl Display for Currency {
	fn fmt(&self, f: &mut Formatter) -> Result<(), fmt::Error> {
		f.write_str(self.as_str())
	}
}

/// Writes `int` as the minimal number of big-endian base-32 digits. Zero yields no digits.
fn encode_int_be_base32(int: u64) -> Vec<u5> {
	let base = 32u64;

	let mut out_vec = Vec::<u5>::new();

	let mut rem_int = int;
	while rem_int != 0 {
		out_vec.push(u5::from_u8((rem_int % base) as u8));
		rem_int /= base;
	}

	out_vec.reverse();
	out_vec
}

fn encoded_int_be_base32_size(int: u64) -> usize {
	for pos in (0..13).rev() {
		if int & (0x1f << (5 * pos)) != 0 {
			return (pos + 1) as usize;
		}
	}
	0usize
}

/// Writes the low `5 * len` bits of `int` as exactly `len` big-endian base-32 digits.
fn encode_int_be_base32_fixed(int: u64, len: usize) -> Vec<u5> {
	(0..len).rev().map(|pos| u5::from_u8((int >> (5 * pos)) as u8)).collect()
}

fn push_field_header(out: &mut Vec<u5>, tag: u5, len: usize) -> Result<(), CreationError> {
	if len > MAX_FIELD_LENGTH {
		return Err(CreationError::FieldTooLong { tag: tag.to_char(), len });
	}
	out.push(tag);
	out.extend(encode_int_be_base32_fixed(len as u64, LENGTH_PREFIX_LEN));
	Ok(())
}

/// Wraps already converted symbols in a tagged field: the tag, a two symbol big-endian length
/// and the payload.
///
/// Fails with [`CreationError::FieldTooLong`] for payloads over 1023 symbols and with
/// [`CreationError::InvalidTag`] if `tag` is not in the alphabet.
pub fn tagged_raw(tag: char, data: &[u5]) -> Result<Vec<u5>, CreationError> {
	let tag = u5::try_from_char(tag).map_err(|_| CreationError::InvalidTag(tag))?;
	let mut out = Vec::with_capacity(data.len() + 1 + LENGTH_PREFIX_LEN);
	push_field_header(&mut out, tag, data.len())?;
	out.extend_from_slice(data);
	Ok(out)
}

/// Converts `bytes` to symbols (padding the last one with zero bits) and wraps them in a tagged
/// field, see [`tagged_raw`].
pub fn tagged(tag: char, bytes: &[u8]) -> Result<Vec<u5>, CreationError> {
	tagged_raw(tag, &bytes.to_base32())
}

/// Writes a tagged field: tag, length and data.
fn write_tagged_field<P>(out: &mut Vec<u5>, tag: u5, payload: &P) -> Result<(), CreationError>
where
	P: ToBase32 + Base32Len,
{
	push_field_header(out, tag, payload.base32_len())?;
	match payload.write_base32(out) {
		Ok(()) => Ok(()),
		Err(never) => match never {},
	}
}

impl Invoice {
	/// Serializes everything the signature covers except the human readable part: the timestamp,
	/// the payment hash field and then every tagged field in order.
	pub fn data_part(&self) -> Result<Vec<u5>, CreationError> {
		let mut data = self.timestamp.to_base32();
		write_tagged_field(&mut data, u5::from_u8(constants::TAG_PAYMENT_HASH), &Sha256(self.payment_hash))?;
		for field in self.tagged_fields.iter() {
			write_tagged_field(&mut data, field.tag(), field)?;
		}
		Ok(data)
	}
}

impl ToBase32 for PositiveTimestamp {
	fn write_base32<W: WriteBase32>(&self, writer: &mut W) -> Result<(), <W as WriteBase32>::Err> {
		// Bounded by MAX_TIMESTAMP, so 35 bits always fit
		writer.write(&encode_int_be_base32_fixed(self.as_unix_timestamp(), TIMESTAMP_LENGTH))
	}
}

/// Writes the field payload only; the header is added by [`Invoice::data_part`].
impl ToBase32 for TaggedField {
	fn write_base32<W: WriteBase32>(&self, writer: &mut W) -> Result<(), <W as WriteBase32>::Err> {
		match *self {
			TaggedField::RouteHint(ref hint) => hint.write_base32(writer),
			TaggedField::Fallback(ref fallback) => fallback.write_base32(writer),
			TaggedField::Description(ref description) => description.write_base32(writer),
			TaggedField::DescriptionHash(ref hash) => hash.write_base32(writer),
			TaggedField::ExpiryTime(ref expiry) => expiry.write_base32(writer),
			TaggedField::PayeePubKey(ref pub_key) => pub_key.write_base32(writer),
			TaggedField::Unknown(ref field) => field.write_base32(writer),
		}
	}
}

impl Base32Len for TaggedField {
	fn base32_len(&self) -> usize {
		match *self {
			TaggedField::RouteHint(ref hint) => hint.base32_len(),
			TaggedField::Fallback(ref fallback) => fallback.base32_len(),
			TaggedField::Description(ref description) => description.base32_len(),
			TaggedField::DescriptionHash(ref hash) => hash.base32_len(),
			TaggedField::ExpiryTime(ref expiry) => expiry.base32_len(),
			TaggedField::PayeePubKey(ref pub_key) => pub_key.base32_len(),
			TaggedField::Unknown(ref field) => field.base32_len(),
		}
	}
}

impl ToBase32 for Sha256 {
	fn write_base32<W: WriteBase32>(&self, writer: &mut W) -> Result<(), <W as WriteBase32>::Err> {
		(&self.0.as_byte_array()[..]).write_base32(writer)
	}
}

impl Base32Len for Sha256 {
	fn base32_len(&self) -> usize {
		(&self.0.as_byte_array()[..]).base32_len()
	}
}

impl ToBase32 for Description {
	fn write_base32<W: WriteBase32>(&self, writer: &mut W) -> Result<(), <W as WriteBase32>::Err> {
		self.as_bytes().write_base32(writer)
	}
}

impl Base32Len for Description {
	fn base32_len(&self) -> usize {
		self.0.as_bytes().base32_len()
	}
}

impl ToBase32 for PayeePubKey {
	fn write_base32<W: WriteBase32>(&self, writer: &mut W) -> Result<(), <W as WriteBase32>::Err> {
		(&self.serialize()[..]).write_base32(writer)
	}
}

impl Base32Len for PayeePubKey {
	fn base32_len(&self) -> usize {
		bytes_size_to_base32_size(secp256k1::constants::PUBLIC_KEY_SIZE)
	}
}

impl ToBase32 for ExpiryTime {
	fn write_base32<W: WriteBase32>(&self, writer: &mut W) -> Result<(), <W as WriteBase32>::Err> {
		writer.write(&encode_int_be_base32(self.as_seconds()))
	}
}

impl Base32Len for ExpiryTime {
	fn base32_len(&self) -> usize {
		encoded_int_be_base32_size(self.as_seconds())
	}
}

impl RouteHint {
	/// Size of one hint on the wire: key, channel id, fee and CLTV delta.
	pub const SERIALIZED_LEN: usize = 33 + 8 + 4 + 2;

	/// Serializes the hint as big-endian fields in wire order.
	pub fn to_bytes(&self) -> [u8; RouteHint::SERIALIZED_LEN] {
		let mut bytes = [0u8; RouteHint::SERIALIZED_LEN];
		bytes[0..33].copy_from_slice(&self.src_node_id.serialize());
		bytes[33..41].copy_from_slice(&self.short_channel_id.to_be_bytes());
		bytes[41..45].copy_from_slice(&self.fee.to_be_bytes());
		bytes[45..47].copy_from_slice(&self.cltv_expiry_delta.to_be_bytes());
		bytes
	}
}

impl ToBase32 for RouteHint {
	fn write_base32<W: WriteBase32>(&self, writer: &mut W) -> Result<(), <W as WriteBase32>::Err> {
		(&self.to_bytes()[..]).write_base32(writer)
	}
}

impl Base32Len for RouteHint {
	fn base32_len(&self) -> usize {
		bytes_size_to_base32_size(RouteHint::SERIALIZED_LEN)
	}
}

impl ToBase32 for UnknownField {
	fn write_base32<W: WriteBase32>(&self, writer: &mut W) -> Result<(), <W as WriteBase32>::Err> {
		writer.write(&self.data)
	}
}

impl Base32Len for UnknownField {
	fn base32_len(&self) -> usize {
		self.data.len()
	}
}

impl ToBase32 for InvoiceSignature {
	fn write_base32<W: WriteBase32>(&self, writer: &mut W) -> Result<(), <W as WriteBase32>::Err> {
		let (recovery_id, signature) = self.0.serialize_compact();
		let mut bytes = [0u8; 65];
		bytes[..64].copy_from_slice(&signature);
		// Recovery ids are in 0..4
		bytes[64] = recovery_id.to_i32() as u8;
		(&bytes[..]).write_base32(writer)
	}
}
