// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

use std::error;
use core::fmt;
use core::fmt::{Display, Formatter};
use core::str;
use core::str::FromStr;

use bitcoin::hashes::{sha256, Hash};
use bitcoin::secp256k1;
use bitcoin::secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use bitcoin::secp256k1::{Message, PublicKey, Secp256k1};
use rust_decimal::Decimal;
use tracing::{debug, trace};

use crate::bech32::{self, u5, Bech32Error, FromBase32};
use crate::{
	constants, hash_from_parts, AmountError, Currency, Description, ExpiryTime, Fallback, FallbackError, Invoice,
	InvoiceSignature, ParseError, PayeePubKey, PositiveTimestamp, RouteHint, Sha256, SignedInvoice, TaggedField,
	UnknownField, SIGNATURE_LENGTH, TIMESTAMP_LENGTH,
};

use self::hrp_sm::parse_hrp;

/// Longest currency code the human readable part may carry.
const MAX_CURRENCY_LENGTH: usize = 16;

/// State machine to parse the hrp
mod hrp_sm {
	use core::ops::Range;

	#[derive(PartialEq, Eq, Debug)]
	enum States {
		Start,
		ParseL,
		ParseN,
		ParseCurrencyPrefix,
		ParseAmountNumber,
		ParseAmountSiPrefix,
	}

	impl States {
		fn next_state(&self, read_symbol: char) -> Result<States, super::ParseError> {
			match *self {
				States::Start => {
					if read_symbol == 'l' {
						Ok(States::ParseL)
					} else {
						Err(super::ParseError::BadPrefix)
					}
				},
				States::ParseL => {
					if read_symbol == 'n' {
						Ok(States::ParseN)
					} else {
						Err(super::ParseError::BadPrefix)
					}
				},
				States::ParseN => {
					if !read_symbol.is_ascii_digit() {
						Ok(States::ParseCurrencyPrefix)
					} else {
						// An amount needs a currency in front of it
						Err(super::ParseError::InvalidCurrency)
					}
				},
				States::ParseCurrencyPrefix => {
					if !read_symbol.is_ascii_digit() {
						Ok(States::ParseCurrencyPrefix)
					} else {
						Ok(States::ParseAmountNumber)
					}
				},
				States::ParseAmountNumber => {
					if read_symbol.is_ascii_digit() {
						Ok(States::ParseAmountNumber)
					} else if ['m', 'u', 'n', 'p'].contains(&read_symbol) {
						Ok(States::ParseAmountSiPrefix)
					} else {
						Err(super::ParseError::UnknownSiPrefix)
					}
				},
				States::ParseAmountSiPrefix => Err(super::ParseError::MalformedHRP),
			}
		}

		fn is_final(&self) -> bool {
			!(*self == States::Start || *self == States::ParseL || *self == States::ParseN)
		}
	}

	struct StateMachine {
		state: States,
		position: usize,
		currency_prefix: Option<Range<usize>>,
		amount: Option<Range<usize>>,
	}

	impl StateMachine {
		fn new() -> StateMachine {
			StateMachine { state: States::Start, position: 0, currency_prefix: None, amount: None }
		}

		fn update_range(range: &mut Option<Range<usize>>, position: usize, len: usize) {
			let new_range = match *range {
				None => Range { start: position, end: position + len },
				Some(ref r) => Range { start: r.start, end: r.end + len },
			};
			*range = Some(new_range);
		}

		fn step(&mut self, c: char) -> Result<(), super::ParseError> {
			let next_state = self.state.next_state(c)?;
			match next_state {
				States::ParseCurrencyPrefix => {
					StateMachine::update_range(&mut self.currency_prefix, self.position, c.len_utf8())
				},
				// The SI prefix is kept with the digits, the amount codec splits them
				States::ParseAmountNumber | States::ParseAmountSiPrefix => {
					StateMachine::update_range(&mut self.amount, self.position, c.len_utf8())
				},
				_ => {},
			}

			self.position += c.len_utf8();
			self.state = next_state;
			Ok(())
		}
	}

	/// Splits a human readable part into its currency code and its (possibly empty) amount text.
	pub fn parse_hrp(input: &str) -> Result<(&str, &str), super::ParseError> {
		let mut sm = StateMachine::new();
		for c in input.chars() {
			sm.step(c)?;
		}

		match sm.state {
			States::Start | States::ParseL => return Err(super::ParseError::BadPrefix),
			States::ParseN => return Err(super::ParseError::InvalidCurrency),
			_ => debug_assert!(sm.state.is_final()),
		}

		let currency = sm.currency_prefix.map(|r| &input[r]).unwrap_or("");
		let amount = sm.amount.map(|r| &input[r]).unwrap_or("");

		Ok((currency, amount))
	}
}

impl FromStr for Currency {
	type Err = ParseError;

	fn from_str(code: &str) -> Result<Self, ParseError> {
		if code.is_empty() || code.len() > MAX_CURRENCY_LENGTH || !code.bytes().all(|b| b.is_ascii_lowercase()) {
			return Err(ParseError::InvalidCurrency);
		}
		Ok(Currency(code.to_owned()))
	}
}

/// Reads a run of symbols as one big-endian base-32 number.
pub(crate) fn parse_int_be(digits: &[u5]) -> Option<u64> {
	digits.iter().try_fold(0u64, |acc, d| acc.checked_mul(32)?.checked_add(u64::from(d.as_u8())))
}

/// Splits one tagged field off the front of `data`.
///
/// Returns the tag character, the field payload and whatever follows the field. Fails with
/// [`ParseError::TruncatedField`] if fewer than three symbols remain or the declared length
/// overruns the data.
pub fn pull_tagged(data: &[u5]) -> Result<(char, &[u5], &[u5]), ParseError> {
	let (tag, field_data, rest) = pull_field(data)?;
	Ok((tag.to_char(), field_data, rest))
}

fn pull_field(data: &[u5]) -> Result<(u5, &[u5], &[u5]), ParseError> {
	if data.len() < 3 {
		return Err(ParseError::TruncatedField);
	}

	// Ten bits can't overflow
	let len = (usize::from(data[1].as_u8()) << 5) | usize::from(data[2].as_u8());
	let rest = &data[3..];
	if rest.len() < len {
		return Err(ParseError::TruncatedField);
	}

	let (field_data, rest) = rest.split_at(len);
	Ok((data[0], field_data, rest))
}

/// ```
/// use lnaddr::SignedInvoice;
///
/// let text = "lnbc1pvjluezpp5qqqsyqcyq5rqwzqfqqqsyqcyq5rqwzqfqqqsyqcyq5rqwzqfqypqdpl2pkx2ctnv5sxxmmw\
/// wd5kgetjypeh2ursdae8g6twvus8g6rfwvs8qun0dfjkxaq8rkx3yf5tcsyz3d73gafnh3cax9rn449d9p5uxz9\
/// ezhhypd0elx87sjle52x86fux2ypatgddc6k63n7erqz25le42c4u4ecky03ylcqca784w";
///
/// let signed = text.parse::<SignedInvoice>().unwrap();
/// assert_eq!(signed.description().map(|d| &**d), Some("Please consider supporting this project"));
/// assert_eq!(signed.to_string(), text);
/// ```
impl FromStr for SignedInvoice {
	type Err = ParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		parse_signed_invoice(s).map_err(|e| {
			debug!(error = %e, "rejected payment request");
			e
		})
	}
}

fn parse_signed_invoice(s: &str) -> Result<SignedInvoice, ParseError> {
	let (hrp, data) = bech32::decode(s)?;
	trace!(hrp = %hrp, symbols = data.len(), "checksum verified");

	if !hrp.starts_with("ln") {
		return Err(ParseError::BadPrefix);
	}

	if data.len() < SIGNATURE_LENGTH {
		return Err(ParseError::TooShortDataPart);
	}
	let (body, signature_data) = data.split_at(data.len() - SIGNATURE_LENGTH);

	let signature = InvoiceSignature::from_base32(signature_data)?;
	let hash = hash_from_parts(hrp.as_bytes(), body);

	if body.len() < TIMESTAMP_LENGTH {
		return Err(ParseError::TooShortDataPart);
	}

	let (currency, amount) = parse_hrp(&hrp)?;
	let currency = currency.parse::<Currency>()?;
	let amount = if amount.is_empty() { None } else { Some(parse_amount(amount)?) };

	let timestamp = PositiveTimestamp::from_base32(&body[..TIMESTAMP_LENGTH])?;

	let mut payment_hash = None;
	let mut tagged_fields = Vec::new();
	let mut rest = &body[TIMESTAMP_LENGTH..];
	while !rest.is_empty() {
		let (tag, field_data, remainder) = pull_field(rest)?;
		rest = remainder;
		trace!(tag = %tag.to_char(), len = field_data.len(), "pulled tagged field");

		if tag.as_u8() == constants::TAG_PAYMENT_HASH {
			let hash = parse_fixed_len(tag, field_data, 52, Sha256::from_base32)?;
			if payment_hash.replace(hash.0).is_some() {
				return Err(ParseError::MultiplePaymentHashes);
			}
		} else {
			tagged_fields.push(parse_tagged_field(tag, field_data)?);
		}
	}
	let payment_hash = payment_hash.ok_or(ParseError::NoPaymentHash)?;
	let invoice = Invoice { currency, amount, timestamp, payment_hash, tagged_fields };

	// An explicit n field names the payee, so a key that cannot be recovered is only fatal
	// without one.
	let recovered = Secp256k1::verification_only().recover_ecdsa(&Message::from_digest(hash), &signature.0);
	let (recovered_pub_key, payee_pub_key) = match (recovered, invoice.payee_pub_key()) {
		(Ok(key), Some(payee)) => (Some(key), payee.0),
		(Ok(key), None) => (Some(key), key),
		(Err(e), Some(payee)) => {
			debug!(error = %e, "no key recoverable, using the n field");
			(None, payee.0)
		},
		(Err(e), None) => return Err(ParseError::MalformedSignature(e)),
	};
	trace!(recovered = recovered_pub_key.is_some(), "resolved payee key");

	Ok(SignedInvoice {
		invoice,
		hrp,
		data: body.to_vec(),
		hash,
		signature,
		recovered_pub_key,
		payee_pub_key,
	})
}

fn parse_amount(amount: &str) -> Result<Decimal, ParseError> {
	crate::amount::unshorten_amount(amount).map_err(|e| match e {
		AmountError::UnknownSiPrefix => ParseError::UnknownSiPrefix,
		e => ParseError::Amount(e),
	})
}

fn parse_fixed_len<T, F>(tag: u5, field_data: &[u5], len: usize, parse: F) -> Result<T, ParseError>
where
	F: FnOnce(&[u5]) -> Result<T, ParseError>,
{
	if field_data.len() != len {
		return Err(ParseError::InvalidFieldLength { tag: tag.to_char(), len: field_data.len() });
	}
	parse(field_data)
}

fn parse_tagged_field(tag: u5, field_data: &[u5]) -> Result<TaggedField, ParseError> {
	match tag.as_u8() {
		constants::TAG_ROUTE_HINT => Ok(TaggedField::RouteHint(RouteHint::from_base32(field_data)?)),
		constants::TAG_FALLBACK => Ok(TaggedField::Fallback(Fallback::from_base32(field_data)?)),
		constants::TAG_DESCRIPTION => Ok(TaggedField::Description(Description::from_base32(field_data)?)),
		constants::TAG_DESCRIPTION_HASH => {
			Ok(TaggedField::DescriptionHash(parse_fixed_len(tag, field_data, 52, Sha256::from_base32)?))
		},
		constants::TAG_EXPIRY_TIME => Ok(TaggedField::ExpiryTime(ExpiryTime::from_base32(field_data)?)),
		constants::TAG_PAYEE_PUB_KEY => {
			Ok(TaggedField::PayeePubKey(parse_fixed_len(tag, field_data, 53, PayeePubKey::from_base32)?))
		},
		_ => Ok(TaggedField::Unknown(UnknownField { tag, data: field_data.to_vec() })),
	}
}

impl FromBase32 for PositiveTimestamp {
	type Err = ParseError;

	fn from_base32(b32: &[u5]) -> Result<Self, Self::Err> {
		if b32.len() != TIMESTAMP_LENGTH {
			return Err(ParseError::TooShortDataPart);
		}
		let timestamp = parse_int_be(b32).ok_or(ParseError::IntegerOverflowError)?;
		PositiveTimestamp::from_unix_timestamp(timestamp).map_err(|_| ParseError::IntegerOverflowError)
	}
}

impl FromBase32 for InvoiceSignature {
	type Err = ParseError;

	fn from_base32(signature: &[u5]) -> Result<Self, Self::Err> {
		let bytes = Vec::<u8>::from_base32(signature)?;
		if signature.len() != SIGNATURE_LENGTH || bytes.len() != 65 {
			return Err(ParseError::MalformedSignature(secp256k1::Error::InvalidSignature));
		}
		let recovery_id = RecoveryId::from_i32(i32::from(bytes[64]))?;

		Ok(InvoiceSignature(RecoverableSignature::from_compact(&bytes[0..64], recovery_id)?))
	}
}

impl FromBase32 for Sha256 {
	type Err = ParseError;

	fn from_base32(field_data: &[u5]) -> Result<Sha256, ParseError> {
		let bytes = Vec::<u8>::from_base32(field_data)?;
		let mut hash = [0u8; 32];
		if bytes.len() != hash.len() {
			return Err(ParseError::PaddingError);
		}
		hash.copy_from_slice(&bytes);
		Ok(Sha256(sha256::Hash::from_byte_array(hash)))
	}
}

impl FromBase32 for Description {
	type Err = ParseError;

	fn from_base32(field_data: &[u5]) -> Result<Description, ParseError> {
		let bytes = Vec::<u8>::from_base32(field_data)?;
		let description = String::from(str::from_utf8(&bytes)?);
		// At most floor(1023 * 5 / 8) = 639 bytes fit in one field
		Description::new(description)
			.map_err(|_| ParseError::InvalidFieldLength { tag: 'd', len: field_data.len() })
	}
}

impl FromBase32 for PayeePubKey {
	type Err = ParseError;

	fn from_base32(field_data: &[u5]) -> Result<PayeePubKey, ParseError> {
		let data_bytes = Vec::<u8>::from_base32(field_data)?;
		let pub_key = PublicKey::from_slice(&data_bytes).map_err(ParseError::InvalidPubKey)?;
		Ok(pub_key.into())
	}
}

impl FromBase32 for ExpiryTime {
	type Err = ParseError;

	fn from_base32(field_data: &[u5]) -> Result<ExpiryTime, ParseError> {
		match parse_int_be(field_data).map(ExpiryTime::from_seconds) {
			Some(t) => Ok(t),
			None => Err(ParseError::IntegerOverflowError),
		}
	}
}

impl FromBase32 for RouteHint {
	type Err = ParseError;

	fn from_base32(field_data: &[u5]) -> Result<RouteHint, ParseError> {
		let bytes = Vec::<u8>::from_base32(field_data)?;

		// One hint per field, the legacy four byte CLTV delta is not accepted
		if bytes.len() != RouteHint::SERIALIZED_LEN {
			return Err(ParseError::InvalidFieldLength { tag: 'r', len: field_data.len() });
		}

		let mut channel_id = [0u8; 8];
		channel_id.copy_from_slice(&bytes[33..41]);
		let mut fee = [0u8; 4];
		fee.copy_from_slice(&bytes[41..45]);
		let mut cltv_expiry_delta = [0u8; 2];
		cltv_expiry_delta.copy_from_slice(&bytes[45..47]);

		Ok(RouteHint {
			src_node_id: PublicKey::from_slice(&bytes[0..33]).map_err(ParseError::InvalidPubKey)?,
			short_channel_id: u64::from_be_bytes(channel_id),
			fee: u32::from_be_bytes(fee),
			cltv_expiry_delta: u16::from_be_bytes(cltv_expiry_delta),
		})
	}
}

impl Display for ParseError {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		match *self {
			ParseError::Bech32Error(ref e) => {
				write!(f, "Invalid bech32: {}", e)
			},
			ParseError::Amount(ref e) => {
				write!(f, "Invalid amount in hrp ({})", e)
			},
			ParseError::MalformedSignature(ref e) => {
				write!(f, "Invalid secp256k1 signature: {}", e)
			},
			ParseError::InvalidPubKey(ref e) => {
				write!(f, "Invalid public key: {}", e)
			},
			ParseError::DescriptionDecodeError(ref e) => {
				write!(f, "Description is not a valid utf-8 string: {}", e)
			},
			ParseError::Fallback(ref e) => {
				write!(f, "Invalid fallback address: {}", e)
			},
			ParseError::InvalidFieldLength { tag, len } => {
				write!(f, "the {} field can't be {} symbols long", tag, len)
			},
			ParseError::BadPrefix => f.write_str("did not begin with 'ln'"),
			ParseError::InvalidCurrency => f.write_str("currency code is missing or malformed"),
			ParseError::UnknownSiPrefix => f.write_str("unknown SI prefix"),
			ParseError::MalformedHRP => f.write_str("malformed human readable part"),
			ParseError::TooShortDataPart => {
				f.write_str("data part too short (should be at least 111 bech32 chars long)")
			},
			ParseError::TruncatedField => f.write_str("tagged field is truncated"),
			ParseError::PaddingError => f.write_str("some data field had bad padding"),
			ParseError::IntegerOverflowError => {
				f.write_str("parsed integer doesn't fit into receiving type")
			},
			ParseError::NoPaymentHash => f.write_str("no payment hash field"),
			ParseError::MultiplePaymentHashes => f.write_str("more than one payment hash field"),
		}
	}
}

impl error::Error for ParseError {}

macro_rules! from_error {
	($my_error:expr, $extern_error:ty) => {
		impl From<$extern_error> for ParseError {
			fn from(e: $extern_error) -> Self {
				$my_error(e)
			}
		}
	};
}

from_error!(ParseError::MalformedSignature, secp256k1::Error);
from_error!(ParseError::DescriptionDecodeError, str::Utf8Error);
from_error!(ParseError::Fallback, FallbackError);

impl From<Bech32Error> for ParseError {
	fn from(e: Bech32Error) -> Self {
		match e {
			Bech32Error::InvalidPadding => ParseError::PaddingError,
			_ => ParseError::Bech32Error(e),
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::bech32::ToBase32;
	use bitcoin::hex::FromHex;

	fn from_bech32(s: &str) -> Vec<u5> {
		s.chars().map(|c| u5::try_from_char(c).unwrap()).collect()
	}

	#[test]
	fn test_parse_currency_prefix() {
		assert_eq!("bc".parse::<Currency>(), Ok(Currency::bitcoin()));
		assert_eq!("tb".parse::<Currency>(), Ok(Currency::testnet()));
		assert_eq!("bcrt".parse::<Currency>(), Ok(Currency::regtest()));
		assert_eq!("tbs".parse::<Currency>(), Ok(Currency::signet()));
		assert_eq!("sb".parse::<Currency>().unwrap().as_str(), "sb");
		assert_eq!("something_else".parse::<Currency>(), Err(ParseError::InvalidCurrency));
		assert_eq!("".parse::<Currency>(), Err(ParseError::InvalidCurrency));
		assert_eq!("Bc".parse::<Currency>(), Err(ParseError::InvalidCurrency));
		assert_eq!("abcdefghijklmnopq".parse::<Currency>(), Err(ParseError::InvalidCurrency));
	}

	#[test]
	fn test_parse_hrp() {
		assert_eq!(parse_hrp("lnbc"), Ok(("bc", "")));
		assert_eq!(parse_hrp("lnbc2500u"), Ok(("bc", "2500u")));
		assert_eq!(parse_hrp("lntb20m"), Ok(("tb", "20m")));
		assert_eq!(parse_hrp("lnbcrt1"), Ok(("bcrt", "1")));
		assert_eq!(parse_hrp("lnbc2500x"), Err(ParseError::UnknownSiPrefix));
		assert_eq!(parse_hrp("lnbc25mm"), Err(ParseError::MalformedHRP));
		assert_eq!(parse_hrp("lnbc25m1"), Err(ParseError::MalformedHRP));
		assert_eq!(parse_hrp("ln"), Err(ParseError::InvalidCurrency));
		assert_eq!(parse_hrp("ln25m"), Err(ParseError::InvalidCurrency));
		assert_eq!(parse_hrp("lx"), Err(ParseError::BadPrefix));
		assert_eq!(parse_hrp("l"), Err(ParseError::BadPrefix));
	}

	#[test]
	fn test_parse_int_from_bytes_be() {
		assert_eq!(parse_int_be(&from_bech32("pr")), Some(35));
		assert_eq!(parse_int_be(&from_bech32("pu")), Some(60));
		assert_eq!(parse_int_be(&[]), Some(0));
		assert_eq!(parse_int_be(&from_bech32("lllllllllllll")), None);
		assert_eq!(parse_int_be(&from_bech32("plllllllllll")), Some(u64::MAX >> 8));
	}

	#[test]
	fn test_pull_tagged() {
		let data = from_bech32("xqzpudqq");
		let (tag, field, rest) = pull_tagged(&data).unwrap();
		assert_eq!(tag, 'x');
		assert_eq!(field, &from_bech32("pu")[..]);
		let (tag, field, rest) = pull_tagged(rest).unwrap();
		assert_eq!(tag, 'd');
		assert!(field.is_empty());
		assert!(rest.is_empty());

		assert_eq!(pull_tagged(&from_bech32("xq")), Err(ParseError::TruncatedField));
		assert_eq!(pull_tagged(&from_bech32("xqrpu")), Err(ParseError::TruncatedField));
	}

	#[test]
	fn test_parse_sha256_hash() {
		let input = from_bech32("qqqsyqcyq5rqwzqfqqqsyqcyq5rqwzqfqqqsyqcyq5rqwzqfqypq");

		let hash = sha256::Hash::from_str("0001020304050607080900010203040506070809000102030405060708090102").unwrap();
		let expected = Ok(Sha256(hash));

		assert_eq!(Sha256::from_base32(&input), expected);

		// hashes of any other length are rejected
		let input_unexpected_length = from_bech32("qqqsyqcyq5rqwzqfqqqsyqcyq5rqwzqfqqqsyqcyq5rqwzqfqypyq");
		assert_eq!(
			parse_tagged_field(u5::from_u8(constants::TAG_DESCRIPTION_HASH), &input_unexpected_length),
			Err(ParseError::InvalidFieldLength { tag: 'h', len: 53 })
		);
	}

	#[test]
	fn test_parse_description() {
		let input = from_bech32("xysxxatsyp3k7enxv4js");
		let expected = Ok(Description::new("1 cup coffee".to_owned()).unwrap());
		assert_eq!(Description::from_base32(&input), expected);

		let not_utf8 = vec![0xffu8, 0xfe].to_base32();
		assert!(matches!(Description::from_base32(&not_utf8), Err(ParseError::DescriptionDecodeError(_))));
	}

	#[test]
	fn test_parse_payee_pub_key() {
		let input = from_bech32("q0n326hr8v9zprg8gsvezcch06gfaqqhde2aj730yg0durunfhv66");
		let pk_bytes = <[u8; 33]>::from_hex("03e7156ae33b0a208d0744199163177e909e80176e55d97a2f221ede0f934dd9ad").unwrap();
		let expected = Ok(PayeePubKey(PublicKey::from_slice(&pk_bytes[..]).unwrap()));

		assert_eq!(PayeePubKey::from_base32(&input), expected);

		// expects 33 bytes
		let input_unexpected_length = from_bech32("q0n326hr8v9zprg8gsvezcch06gfaqqhde2aj730yg0durunfhvq");
		assert_eq!(
			parse_tagged_field(u5::from_u8(constants::TAG_PAYEE_PUB_KEY), &input_unexpected_length),
			Err(ParseError::InvalidFieldLength { tag: 'n', len: 52 })
		);
	}

	#[test]
	fn test_parse_expiry_time() {
		let input = from_bech32("pu");
		let expected = Ok(ExpiryTime::from_seconds(60));
		assert_eq!(ExpiryTime::from_base32(&input), expected);
		assert_eq!(ExpiryTime::from_base32(&[]), Ok(ExpiryTime::from_seconds(0)));

		let input_too_large = from_bech32("sqqqqqqqqqqqq");
		assert_eq!(ExpiryTime::from_base32(&input_too_large), Err(ParseError::IntegerOverflowError));
	}

	#[test]
	fn test_parse_fallback() {
		let cases = vec![
			(
				from_bech32("3x9et2e20v6pu37c5d9vax37wxq72un98"),
				Ok(Fallback::PubKeyHash(<[u8; 20]>::from_hex("3172b5654f6683c8fb146959d347ce303cae4ca7").unwrap())),
			),
			(
				from_bech32("j3a24vwu6r8ejrss3axul8rxldph2q7z9"),
				Ok(Fallback::ScriptHash(<[u8; 20]>::from_hex("8f55563b9a19f321c211e9b9f38cdf686ea07845").unwrap())),
			),
			(
				from_bech32("qw508d6qejxtdg4y5r3zarvary0c5xw7k"),
				Ok(Fallback::SegWitProgram {
					version: u5::ZERO,
					program: Vec::<u8>::from_hex("751e76e8199196d454941c45d1b3a323f1433bd6").unwrap(),
				}),
			),
			(vec![u5::from_u8(21); 41], Err(ParseError::Fallback(FallbackError::InvalidWitnessVersion(21)))),
			(vec![], Err(ParseError::Fallback(FallbackError::Empty))),
		];

		for (input, expected) in cases.into_iter() {
			assert_eq!(parse_tagged_field(u5::from_u8(constants::TAG_FALLBACK), &input), expected.map(TaggedField::Fallback));
		}
	}

	#[test]
	fn test_parse_route() {
		let hint = RouteHint {
			src_node_id: PublicKey::from_str("029e03a901b85534ff1e92c43c74431f7ce72046060fcf7a95c37e148f78c77255").unwrap(),
			short_channel_id: 0x0102030405060708,
			fee: 20,
			cltv_expiry_delta: 3,
		};
		assert_eq!(RouteHint::from_base32(&hint.to_base32()), Ok(hint));

		// two legacy 51 byte hops in a single field
		let input = from_bech32(
			"q20q82gphp2nflc7jtzrcazrra7wwgzxqc8u7754cdlpfrmccae92qgzqvzq2ps8pqqqqqqpqqqqq9qqqvpeuqa\
			fqxu92d8lr6fvg0r5gv0heeeqgcrqlnm6jhphu9y00rrhy4grqszsvpcgpy9qqqqqqgqqqqq7qqzq",
		);
		assert_eq!(
			RouteHint::from_base32(&input),
			Err(ParseError::InvalidFieldLength { tag: 'r', len: input.len() })
		);

		// the 49 byte form with a four byte CLTV delta
		let mut legacy = hint.to_bytes().to_vec();
		legacy.splice(45..45, [0u8, 0]);
		let legacy = legacy.to_base32();
		assert_eq!(RouteHint::from_base32(&legacy), Err(ParseError::InvalidFieldLength { tag: 'r', len: 79 }));
	}

	#[test]
	fn test_parse_signature() {
		assert_eq!(
			InvoiceSignature::from_base32(&[u5::ZERO; 103]),
			Err(ParseError::MalformedSignature(secp256k1::Error::InvalidSignature))
		);
		let mut bytes = [1u8; 65];
		bytes[64] = 4;
		assert_eq!(
			InvoiceSignature::from_base32(&bytes.to_base32()),
			Err(ParseError::MalformedSignature(secp256k1::Error::InvalidRecoveryId))
		);
	}

	#[test]
	fn test_unknown_fields_are_kept() {
		let field = parse_tagged_field(u5::from_u8(16), &from_bech32("zyg3zyg3")).unwrap();
		match field {
			TaggedField::Unknown(ref f) => {
				assert_eq!(f.tag(), 's');
				assert_eq!(f.data(), &from_bech32("zyg3zyg3")[..]);
			},
			_ => panic!("expected an unknown field"),
		}
	}

	#[test]
	fn test_signed_invoice_deserialization() {
		let text = "lnbc1pvjluezpp5qqqsyqcyq5rqwzqfqqqsyqcyq5rqwzqfqqqsyqcyq5rqwzqfqypqdpl2pkx2ctnv5sxxmmw\
			wd5kgetjypeh2ursdae8g6twvus8g6rfwvs8qun0dfjkxaq8rkx3yf5tcsyz3d73gafnh3cax9rn449d9p5uxz9\
			ezhhypd0elx87sjle52x86fux2ypatgddc6k63n7erqz25le42c4u4ecky03ylcqca784w";
		let signed: SignedInvoice = text.parse().unwrap();

		assert_eq!(signed.hrp(), "lnbc");
		assert_eq!(signed.currency, Currency::bitcoin());
		assert_eq!(signed.amount, None);
		assert_eq!(signed.timestamp.as_unix_timestamp(), 1496314658);
		assert_eq!(
			signed.payment_hash,
			sha256::Hash::from_str("0001020304050607080900010203040506070809000102030405060708090102").unwrap()
		);
		assert_eq!(signed.description().map(|d| d.clone().into_inner()), Some("Please consider supporting this project".to_owned()));
		// the signature covers the hrp and the body symbols one byte each
		let mut preimage = b"lnbc".to_vec();
		let body = &from_bech32(&text[5..text.len() - 6]);
		preimage.extend(body[..body.len() - SIGNATURE_LENGTH].iter().map(|s| s.as_u8()));
		assert_eq!(signed.signable_hash(), &sha256::Hash::hash(&preimage).to_byte_array());
		let expected_sig = RecoverableSignature::from_compact(
			&<[u8; 64]>::from_hex(
				"38ec6891345e204145be8a3a99de38e98a39d6a569434e1845c8af7205afcfcc7f425fcd1463e93c32881ead0d6e356d467ec8c02553f9aab15e5738b11f127f",
			)
			.unwrap(),
			RecoveryId::from_i32(0).unwrap(),
		)
		.unwrap();
		assert_eq!(signed.signature(), &InvoiceSignature(expected_sig));
		assert!(signed.check_signature());
		assert_eq!(signed.to_string(), text);
	}

	#[test]
	fn test_decode_order() {
		// checksum failures come first
		assert!(matches!("lnbc1qqqqqqqq".parse::<SignedInvoice>(), Err(ParseError::Bech32Error(_))));

		let too_short = bech32::encode("lnbc", &[u5::ZERO; 103]).unwrap();
		assert_eq!(too_short.parse::<SignedInvoice>(), Err(ParseError::TooShortDataPart));

		let not_ln = bech32::encode("bc", &[u5::ZERO; 120]).unwrap();
		assert_eq!(not_ln.parse::<SignedInvoice>(), Err(ParseError::BadPrefix));

		// an out of range recovery id fails before the fields are looked at
		let mut bad_recovery_id = vec![u5::ZERO; TIMESTAMP_LENGTH];
		let mut sig_bytes = [1u8; 65];
		sig_bytes[64] = 4;
		bad_recovery_id.extend(sig_bytes.to_base32());
		let bad_recovery_id = bech32::encode("lnbc", &bad_recovery_id).unwrap();
		assert_eq!(
			bad_recovery_id.parse::<SignedInvoice>(),
			Err(ParseError::MalformedSignature(secp256k1::Error::InvalidRecoveryId))
		);
	}

	#[test]
	fn test_unrecoverable_signature_needs_payee_field() {
		let payee =
			PublicKey::from_str("03e7156ae33b0a208d0744199163177e909e80176e55d97a2f221ede0f934dd9ad").unwrap();
		let mut body = vec![u5::ZERO; TIMESTAMP_LENGTH];
		body.extend(crate::ser::tagged('p', &[0u8; 32]).unwrap());

		// r = 0 parses but recovers no key
		let mut without_payee = body.clone();
		without_payee.extend([0u8; 65].to_base32());
		let without_payee = bech32::encode("lnbc", &without_payee).unwrap();
		assert_eq!(
			without_payee.parse::<SignedInvoice>(),
			Err(ParseError::MalformedSignature(secp256k1::Error::InvalidSignature))
		);

		let mut with_payee = body;
		with_payee.extend(crate::ser::tagged('n', &payee.serialize()).unwrap());
		with_payee.extend([0u8; 65].to_base32());
		let with_payee = bech32::encode("lnbc", &with_payee).unwrap();
		let signed = with_payee.parse::<SignedInvoice>().unwrap();
		assert_eq!(signed.recovered_pub_key(), None);
		assert_eq!(signed.payee_pub_key(), payee);
		assert!(!signed.check_signature());
		assert_eq!(signed.to_string(), with_payee);
	}
}
