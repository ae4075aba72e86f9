// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Checksummed base-32 text encoding and the bit-width conversion underneath it.
//!
//! Payment requests are written as `hrp` + `1` + data symbols + a six symbol checksum, using the
//! 32 character alphabet below. Every symbol carries five bits of payload.

use core::convert::Infallible;
use core::fmt;

/// An unsigned 5-bit value, in the range 0 - 31, the basic data block in the base-32 encoding.
/// Internally a byte is stored, but the value is always in the 0--31 range.
#[derive(Copy, Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[allow(non_camel_case_types)]
pub struct u5(u8);

/// Errors raised while encoding or decoding base-32 text, or while repacking symbols.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Bech32Error {
	/// The text does not contain the `1` separator.
	MissingSeparator,
	/// The human readable part is empty.
	EmptyHrp,
	/// Fewer than six symbols follow the separator, so there is no room for a checksum.
	InvalidLength,
	/// A character outside the alphabet (or outside printable ASCII) was found.
	InvalidCharacter(char),
	/// Upper and lower case characters are mixed.
	MixedCase,
	/// The checksum did not verify.
	InvalidChecksum,
	/// A digit did not fit the source bit width of a conversion.
	ValueOutOfRange(u8),
	/// A conversion without padding was left with non-zero or excess bits.
	InvalidPadding,
}

impl u5 {
	/// Create from a u8 value, failing if it is larger than 31.
	pub fn try_from_u8(n: u8) -> Result<Self, Bech32Error> {
		if n > Self::INNER_MAX {
			Err(Bech32Error::ValueOutOfRange(n))
		} else {
			Ok(Self(n))
		}
	}

	/// Create from a u8 value, keeping only the low five bits.
	pub fn from_u8(n: u8) -> Self {
		Self(n % Self::INNER_COUNT)
	}

	/// Access as u8. The value is guaranteed to be in the 0 - 31 range.
	#[inline]
	pub fn as_u8(&self) -> u8 {
		self.0
	}

	const INNER_MAX: u8 = 31;
	const INNER_COUNT: u8 = 32;

	/// The zero value (character 'q')
	pub const ZERO: u5 = u5(0);

	/// The one value (character 'p')
	pub const ONE: u5 = u5(1);

	/// The maximum allowed numerical value, 31
	pub const MAX: u5 = u5(Self::INNER_MAX);

	/// Decode from an alphabet character of either case.
	pub fn try_from_char(c: char) -> Result<u5, Bech32Error> {
		CharConverter::from_char(c).ok_or(Bech32Error::InvalidCharacter(c))
	}

	/// Convert to an alphabet character, lowercase.
	pub fn to_char(&self) -> char {
		CharConverter::to_char(self)
	}
}

impl From<u5> for u8 {
	fn from(v: u5) -> u8 {
		v.0
	}
}

impl fmt::Display for Bech32Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match *self {
			Bech32Error::MissingSeparator => f.write_str("missing separator character '1'"),
			Bech32Error::EmptyHrp => f.write_str("empty human readable part"),
			Bech32Error::InvalidLength => f.write_str("too short to hold a checksum"),
			Bech32Error::InvalidCharacter(c) => write!(f, "invalid character ({:?})", c),
			Bech32Error::MixedCase => f.write_str("mixed-case string"),
			Bech32Error::InvalidChecksum => f.write_str("invalid checksum"),
			Bech32Error::ValueOutOfRange(v) => write!(f, "out-of-range value ({})", v),
			Bech32Error::InvalidPadding => f.write_str("invalid padding"),
		}
	}
}

impl std::error::Error for Bech32Error {}

/// Separator between the human readable part and the data part.
pub const SEPARATOR: char = '1';

/// Number of symbols taken by the checksum.
pub const CHECKSUM_LENGTH: usize = 6;

const GENERATOR: [u32; 5] = [0x3b6a57b2, 0x26508e6d, 0x1ea119fa, 0x3d4233dd, 0x2a1462b3];

fn polymod<I: IntoIterator<Item = u8>>(values: I) -> u32 {
	let mut chk: u32 = 1;
	for v in values {
		let top = chk >> 25;
		chk = (chk & 0x1ffffff) << 5 ^ u32::from(v);
		for (i, g) in GENERATOR.iter().enumerate() {
			if (top >> i) & 1 == 1 {
				chk ^= g;
			}
		}
	}
	chk
}

/// Expands the human readable part into the high bits, a zero, then the low bits of each
/// character, which is the form fed into the checksum.
fn hrp_expand(hrp: &str) -> Vec<u8> {
	let bytes = hrp.as_bytes();
	let mut v = Vec::with_capacity(bytes.len() * 2 + 1);
	v.extend(bytes.iter().map(|b| b >> 5));
	v.push(0);
	v.extend(bytes.iter().map(|b| b & 0x1f));
	v
}

/// Checks that `data` (checksum included) is valid under `hrp`.
pub fn verify_checksum(hrp: &str, data: &[u5]) -> bool {
	polymod(hrp_expand(hrp).into_iter().chain(data.iter().map(|d| d.0))) == 1
}

/// Computes the six checksum symbols for `data` under `hrp`.
pub fn create_checksum(hrp: &str, data: &[u5]) -> [u5; CHECKSUM_LENGTH] {
	let values = hrp_expand(hrp)
		.into_iter()
		.chain(data.iter().map(|d| d.0))
		.chain([0u8; CHECKSUM_LENGTH]);
	let pm = polymod(values) ^ 1;
	let mut checksum = [u5::ZERO; CHECKSUM_LENGTH];
	for (i, c) in checksum.iter_mut().enumerate() {
		*c = u5::from_u8((pm >> (5 * (5 - i))) as u8);
	}
	checksum
}

/// Checks every character is printable ASCII and that the string does not mix cases.
fn check_charset(s: &str) -> Result<(), Bech32Error> {
	let mut has_lower = false;
	let mut has_upper = false;
	for c in s.chars() {
		if !(33..=126).contains(&(c as u32)) {
			return Err(Bech32Error::InvalidCharacter(c));
		}
		has_lower |= c.is_ascii_lowercase();
		has_upper |= c.is_ascii_uppercase();
	}
	if has_lower && has_upper {
		return Err(Bech32Error::MixedCase);
	}
	Ok(())
}

/// Encodes `data` under `hrp`, appending the checksum. The output is always lowercase.
pub fn encode(hrp: &str, data: &[u5]) -> Result<String, Bech32Error> {
	if hrp.is_empty() {
		return Err(Bech32Error::EmptyHrp);
	}
	check_charset(hrp)?;
	let hrp = hrp.to_ascii_lowercase();

	let checksum = create_checksum(&hrp, data);
	let mut out = String::with_capacity(hrp.len() + 1 + data.len() + CHECKSUM_LENGTH);
	out.push_str(&hrp);
	out.push(SEPARATOR);
	out.extend(data.iter().chain(checksum.iter()).map(u5::to_char));
	Ok(out)
}

/// Decodes checksummed text into its lowercase human readable part and its data symbols, with
/// the checksum stripped.
pub fn decode(s: &str) -> Result<(String, Vec<u5>), Bech32Error> {
	check_charset(s)?;
	let s = s.to_ascii_lowercase();

	let pos = s.rfind(SEPARATOR).ok_or(Bech32Error::MissingSeparator)?;
	if pos < 1 {
		return Err(Bech32Error::EmptyHrp);
	}
	let (hrp, rest) = (&s[..pos], &s[pos + 1..]);
	if rest.len() < CHECKSUM_LENGTH {
		return Err(Bech32Error::InvalidLength);
	}

	let mut data = rest.chars().map(u5::try_from_char).collect::<Result<Vec<u5>, _>>()?;
	if !verify_checksum(hrp, &data) {
		return Err(Bech32Error::InvalidChecksum);
	}
	data.truncate(data.len() - CHECKSUM_LENGTH);
	Ok((hrp.to_owned(), data))
}

/// Repacks `data`, read as a big-endian stream of `from_bits` wide digits, into `to_bits` wide
/// digits.
///
/// With `pad` set, leftover bits are shifted into one final zero-padded digit. Without it the
/// leftover must be fewer than `from_bits` bits, all zero.
pub fn convert_bits(data: &[u8], from_bits: u32, to_bits: u32, pad: bool) -> Result<Vec<u8>, Bech32Error> {
	debug_assert!(from_bits <= 8 && to_bits <= 8);
	let mut acc: u32 = 0;
	let mut bits: u32 = 0;
	let maxv: u32 = (1 << to_bits) - 1;
	let max_acc: u32 = (1 << (from_bits + to_bits - 1)) - 1;
	let mut ret = Vec::with_capacity(data.len() * from_bits as usize / to_bits as usize + 1);

	for &value in data {
		if u32::from(value) >> from_bits != 0 {
			return Err(Bech32Error::ValueOutOfRange(value));
		}
		acc = ((acc << from_bits) | u32::from(value)) & max_acc;
		bits += from_bits;
		while bits >= to_bits {
			bits -= to_bits;
			ret.push(((acc >> bits) & maxv) as u8);
		}
	}

	if pad {
		if bits > 0 {
			ret.push(((acc << (to_bits - bits)) & maxv) as u8);
		}
	} else if bits >= from_bits || (acc << (to_bits - bits)) & maxv != 0 {
		return Err(Bech32Error::InvalidPadding);
	}
	Ok(ret)
}

/// Interface to write `u5`s into a sink.
pub trait WriteBase32 {
	/// Write error
	type Err: fmt::Debug;

	/// Write a `u5` slice.
	fn write(&mut self, data: &[u5]) -> Result<(), Self::Err> {
		for b in data {
			self.write_u5(*b)?;
		}
		Ok(())
	}

	/// Write a single `u5`.
	fn write_u5(&mut self, data: u5) -> Result<(), Self::Err>;
}

/// A trait for converting a value to a `u5` vector.
pub trait ToBase32 {
	/// Convert `Self` to base32 vector
	fn to_base32(&self) -> Vec<u5> {
		let mut vec = Vec::new();
		match self.write_base32(&mut vec) {
			Ok(()) => vec,
			Err(never) => match never {},
		}
	}

	/// Encode as base32 and write it to the supplied writer
	fn write_base32<W: WriteBase32>(&self, writer: &mut W) -> Result<(), <W as WriteBase32>::Err>;
}

/// Interface to calculate the length of the base32 representation before actually serializing
pub trait Base32Len: ToBase32 {
	/// Calculate the base32 serialized length
	fn base32_len(&self) -> usize;
}

/// Trait for parsing a base32 slice. It is the reciprocal of `ToBase32`.
pub trait FromBase32: Sized {
	/// The associated error which can be returned from parsing (e.g. because of bad padding).
	type Err;

	/// Convert a base32 slice to `Self`.
	fn from_base32(b32: &[u5]) -> Result<Self, Self::Err>;
}

impl WriteBase32 for Vec<u5> {
	type Err = Infallible;

	fn write(&mut self, data: &[u5]) -> Result<(), Self::Err> {
		self.extend_from_slice(data);
		Ok(())
	}

	fn write_u5(&mut self, data: u5) -> Result<(), Self::Err> {
		self.push(data);
		Ok(())
	}
}

impl ToBase32 for [u8] {
	fn write_base32<W: WriteBase32>(&self, writer: &mut W) -> Result<(), <W as WriteBase32>::Err> {
		// 8 -> 5, zero-padding the last symbol
		let mut acc: u16 = 0;
		let mut bits: u8 = 0;
		for b in self {
			acc = (acc << 8) | u16::from(*b);
			bits += 8;
			while bits >= 5 {
				bits -= 5;
				writer.write_u5(u5(((acc >> bits) & 0x1f) as u8))?;
			}
			acc &= (1 << bits) - 1;
		}
		if bits > 0 {
			writer.write_u5(u5(((acc << (5 - bits)) & 0x1f) as u8))?;
		}
		Ok(())
	}
}

impl ToBase32 for Vec<u8> {
	fn write_base32<W: WriteBase32>(&self, writer: &mut W) -> Result<(), <W as WriteBase32>::Err> {
		self.as_slice().write_base32(writer)
	}
}

impl Base32Len for [u8] {
	fn base32_len(&self) -> usize {
		// rounded up
		(self.len() * 8 + (5 - 1)) / 5
	}
}

impl Base32Len for Vec<u8> {
	fn base32_len(&self) -> usize {
		self.as_slice().base32_len()
	}
}

impl FromBase32 for Vec<u8> {
	type Err = Bech32Error;

	/// Packs the symbols into bytes, rejecting any non-zero or excess padding.
	fn from_base32(data: &[u5]) -> Result<Self, Self::Err> {
		let raw: Vec<u8> = data.iter().map(|d| d.0).collect();
		convert_bits(&raw, 5, 8, false)
	}
}

/// Alphabet lookup tables.
struct CharConverter {}

impl CharConverter {
	fn to_char(a: &u5) -> char {
		Self::CHARS_LOWER[(a.as_u8() % 32) as usize]
	}

	fn from_char(c: char) -> Option<u5> {
		let cascii = u32::from(c);
		if cascii <= 127 {
			let idx = Self::CHARS_INV[cascii as usize];
			if (0..32).contains(&idx) {
				return Some(u5(idx as u8));
			}
		}
		None
	}

	/// Mapping from numeric value to character.
	#[rustfmt::skip]
	const CHARS_LOWER: [char; 32] = [
		'q', 'p', 'z', 'r', 'y', '9', 'x', '8', //  +0
		'g', 'f', '2', 't', 'v', 'd', 'w', '0', //  +8
		's', '3', 'j', 'n', '5', '4', 'k', 'h', // +16
		'c', 'e', '6', 'm', 'u', 'a', '7', 'l', // +24
	];

	/// Mapping from character (either case) to numeric value.
	///
	/// E.g., 'z' is `CHARS_LOWER[2]` and is ASCII value `122` so `CHARS_INV[122] == 2`
	#[rustfmt::skip]
	const CHARS_INV: [i8; 128] = [
		-1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1,
		-1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1,
		-1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1,
		15, -1, 10, 17, 21, 20, 26, 30,  7,  5, -1, -1, -1, -1, -1, -1,
		-1, 29, -1, 24, 13, 25,  9,  8, 23, -1, 18, 22, 31, 27, 19, -1,
		 1,  0,  3, 16, 11, 28, 12, 14,  6,  4,  2, -1, -1, -1, -1, -1,
		-1, 29, -1, 24, 13, 25,  9,  8, 23, -1, 18, 22, 31, 27, 19, -1,
		 1,  0,  3, 16, 11, 28, 12, 14,  6,  4,  2, -1, -1, -1, -1, -1,
	];
}

#[cfg(test)]
mod test {
	use super::{convert_bits, decode, encode, u5, Base32Len, Bech32Error, FromBase32, ToBase32};

	#[test]
	fn u5_from_u8() {
		for i in 0..31 {
			assert_eq!(u5::from_u8(i).as_u8(), i);
		}
		assert_eq!(u5::from_u8(32).as_u8(), 0);
		assert_eq!(u5::from_u8(100).as_u8(), 4);
	}

	#[test]
	fn u5_try_from_u8() {
		for i in 0..31 {
			assert_eq!(u5::try_from_u8(i).unwrap().as_u8(), i);
		}
		assert_eq!(u5::try_from_u8(32), Err(Bech32Error::ValueOutOfRange(32)));
	}

	#[test]
	fn char_round_trip() {
		assert_eq!(u5::ZERO.to_char(), 'q');
		assert_eq!(u5::ONE.to_char(), 'p');
		assert_eq!(u5::MAX.to_char(), 'l');
		for i in 0..32 {
			let v = u5::from_u8(i);
			assert_eq!(u5::try_from_char(v.to_char()), Ok(v));
			assert_eq!(u5::try_from_char(v.to_char().to_ascii_uppercase()), Ok(v));
		}
		assert_eq!(u5::try_from_char('b'), Err(Bech32Error::InvalidCharacter('b')));
		assert_eq!(u5::try_from_char('1'), Err(Bech32Error::InvalidCharacter('1')));
		assert_eq!(u5::try_from_char('é'), Err(Bech32Error::InvalidCharacter('é')));
	}

	#[test]
	fn valid_checksums() {
		let valid = [
			"A12UEL5L",
			"a12uel5l",
			"an83characterlonghumanreadablepartthatcontainsthenumber1andtheexcludedcharactersbio1tt5tgs",
			"abcdef1qpzry9x8gf2tvdw0s3jn54khce6mua7lmqqqxw",
			"11qqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqc8247j",
			"split1checkupstagehandshakeupstreamerranterredcaperred2y9e3w",
			"?1ezyfcl",
		];
		for s in valid.iter() {
			let (hrp, data) = decode(s).unwrap();
			assert_eq!(encode(&hrp, &data).unwrap(), s.to_ascii_lowercase());
		}
	}

	#[test]
	fn invalid_checksums() {
		let cases = [
			(" 1nwldj5", Bech32Error::InvalidCharacter(' ')),
			("\u{7f}1axkwrx", Bech32Error::InvalidCharacter('\u{7f}')),
			("pzry9x0s0muk", Bech32Error::MissingSeparator),
			("1pzry9x0s0muk", Bech32Error::EmptyHrp),
			("x1b4n0q5v", Bech32Error::InvalidCharacter('b')),
			("li1dgmt3", Bech32Error::InvalidLength),
			("A1G7SGD8", Bech32Error::InvalidChecksum),
			("10a06t8", Bech32Error::EmptyHrp),
			("1qzzfhee", Bech32Error::EmptyHrp),
			("a12UEL5L", Bech32Error::MixedCase),
		];
		for (s, err) in cases.iter() {
			assert_eq!(decode(s), Err(*err), "{}", s);
		}
	}

	#[test]
	fn single_symbol_change_breaks_checksum() {
		let s = "split1checkupstagehandshakeupstreamerranterredcaperred2y9e3w";
		let data_start = s.rfind('1').unwrap() + 1;
		for i in data_start..s.len() {
			for bit in 0..5 {
				let mut chars: Vec<char> = s.chars().collect();
				let symbol = u5::try_from_char(chars[i]).unwrap();
				chars[i] = u5::from_u8(symbol.as_u8() ^ (1 << bit)).to_char();
				let tampered: String = chars.into_iter().collect();
				assert_eq!(decode(&tampered), Err(Bech32Error::InvalidChecksum));
			}
		}
	}

	#[test]
	fn encode_rejects_bad_hrp() {
		assert_eq!(encode("", &[]), Err(Bech32Error::EmptyHrp));
		assert_eq!(encode("lN", &[]), Err(Bech32Error::MixedCase));
		assert_eq!(encode("l n", &[]), Err(Bech32Error::InvalidCharacter(' ')));
		assert_eq!(encode("LN", &[u5::ONE]).unwrap(), encode("ln", &[u5::ONE]).unwrap());
	}

	#[test]
	fn no_length_limit() {
		let data = vec![u5::from_u8(7); 1200];
		let s = encode("ln", &data).unwrap();
		assert!(s.len() > 90);
		assert_eq!(decode(&s).unwrap(), ("ln".to_owned(), data));
	}

	#[test]
	fn convert_bits_exact_and_padded() {
		// 00001000 10000110 -> 00001 00010 00011 0
		assert_eq!(convert_bits(&[8, 134], 8, 5, true), Ok(vec![1, 2, 3, 0]));
		assert_eq!(convert_bits(&[1, 2, 3, 4, 5, 6, 7, 8], 5, 8, false), Ok(vec![8, 134, 66, 152, 232]));
		assert_eq!(convert_bits(&[], 8, 5, true), Ok(vec![]));
		assert_eq!(convert_bits(&[0xff], 8, 5, true), Ok(vec![31, 28]));
	}

	#[test]
	fn convert_bits_rejects() {
		// a digit wider than the source width
		assert_eq!(convert_bits(&[32], 5, 8, false), Err(Bech32Error::ValueOutOfRange(32)));
		assert_eq!(convert_bits(&[32], 5, 8, true), Err(Bech32Error::ValueOutOfRange(32)));
		// non-zero leftover bits
		assert_eq!(convert_bits(&[31, 29], 5, 8, false), Err(Bech32Error::InvalidPadding));
		// a whole leftover digit
		assert_eq!(convert_bits(&[0], 5, 8, false), Err(Bech32Error::InvalidPadding));
		// zero leftover bits are fine
		assert_eq!(convert_bits(&[31, 28], 5, 8, false), Ok(vec![0xff]));
	}

	#[test]
	fn base32_traits() {
		let bytes = vec![8u8, 134, 64];
		let symbols = bytes.to_base32();
		assert_eq!(symbols.iter().map(|s| s.as_u8()).collect::<Vec<_>>(), vec![1, 2, 3, 4, 0]);
		assert_eq!(bytes.base32_len(), symbols.len());
		assert_eq!(Vec::<u8>::from_base32(&symbols), Ok(bytes));

		assert_eq!([0u8; 0].base32_len(), 0);
		assert_eq!([0u8; 1].base32_len(), 2);
		assert_eq!([0u8; 20].base32_len(), 32);
		assert_eq!([0u8; 32].base32_len(), 52);
		assert_eq!([0u8; 65].base32_len(), 104);
	}

	#[test]
	fn to_base32_matches_convert_bits() {
		let bytes: Vec<u8> = (0..40u8).map(|i| i.wrapping_mul(97).wrapping_add(13)).collect();
		for len in 0..bytes.len() {
			let symbols = bytes[..len].to_base32();
			assert_eq!(symbols.len(), bytes[..len].base32_len());
			assert_eq!(
				symbols.iter().map(|s| s.as_u8()).collect::<Vec<_>>(),
				convert_bits(&bytes[..len], 8, 5, true).unwrap()
			);
		}
		assert_eq!([0xffu8].to_base32(), vec![u5::MAX, u5::from_u8(0b11100)]);
	}
}
