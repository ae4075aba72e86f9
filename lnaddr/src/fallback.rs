// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! On-chain fallback addresses carried in the `f` field.
//!
//! The field holds a witness version symbol followed by the program bytes. Versions 0 through 16
//! are genuine segwit programs; 17 and 18 are markers for legacy pay-to-pubkey-hash and
//! pay-to-script-hash addresses whose 20 byte hash is carried instead.

use core::fmt;

use bitcoin::base58;
use tracing::trace;

use crate::bech32::{self, u5, Base32Len, FromBase32, ToBase32, WriteBase32};
use crate::{ser, Currency};

/// Witness version marker standing in for a pay-to-pubkey-hash address.
pub const VERSION_P2PKH: u8 = 17;

/// Witness version marker standing in for a pay-to-script-hash address.
pub const VERSION_P2SH: u8 = 18;

/// Highest genuine segwit version.
pub const MAX_WITNESS_VERSION: u8 = 16;

/// Fallback address in case no LN payment is possible
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum Fallback {
	/// A segwit output program.
	SegWitProgram {
		/// Witness version, 0 through 16.
		version: u5,
		/// Witness program, 2 to 40 bytes.
		program: Vec<u8>,
	},
	/// A legacy pay-to-pubkey-hash output.
	PubKeyHash([u8; 20]),
	/// A legacy pay-to-script-hash output.
	ScriptHash([u8; 20]),
}

/// Address encoding rules for one currency.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AddressParams {
	/// Currency code as it appears in the human readable part.
	pub currency: &'static str,
	/// Base58 version byte of pay-to-pubkey-hash addresses.
	pub p2pkh_prefix: u8,
	/// Base58 version byte of pay-to-script-hash addresses.
	pub p2sh_prefix: u8,
	/// Human readable part of segwit addresses.
	pub segwit_hrp: &'static str,
}

static ADDRESS_PARAMS: [AddressParams; 4] = [
	AddressParams { currency: "bc", p2pkh_prefix: 0, p2sh_prefix: 5, segwit_hrp: "bc" },
	AddressParams { currency: "tb", p2pkh_prefix: 111, p2sh_prefix: 196, segwit_hrp: "tb" },
	AddressParams { currency: "bcrt", p2pkh_prefix: 111, p2sh_prefix: 196, segwit_hrp: "bcrt" },
	AddressParams { currency: "tbs", p2pkh_prefix: 111, p2sh_prefix: 196, segwit_hrp: "tb" },
];

impl AddressParams {
	/// Looks up the address rules for `currency`.
	pub fn for_currency(currency: &Currency) -> Result<&'static AddressParams, FallbackError> {
		ADDRESS_PARAMS
			.iter()
			.find(|p| p.currency == currency.as_str())
			.ok_or_else(|| FallbackError::UnsupportedCurrency(currency.as_str().to_owned()))
	}
}

/// Errors translating between address text and the fallback field.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FallbackError {
	/// No address rules are registered for this currency.
	UnsupportedCurrency(String),
	/// The witness version is above 16 and is not one of the legacy markers.
	InvalidWitnessVersion(u8),
	/// A segwit address for a different network.
	WrongNetwork,
	/// The text is neither a valid segwit address nor a valid base58check address.
	InvalidAddress,
	/// The base58 version byte belongs to neither address family of the currency.
	UnknownAddressVersion(u8),
	/// The program or hash has a length its address family does not allow.
	InvalidProgramLength(usize),
	/// The field carries no witness version.
	Empty,
}

impl fmt::Display for FallbackError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match *self {
			FallbackError::UnsupportedCurrency(ref c) => write!(f, "fallback addresses are not supported for currency {}", c),
			FallbackError::InvalidWitnessVersion(v) => write!(f, "invalid witness version {}", v),
			FallbackError::WrongNetwork => f.write_str("segwit address belongs to another network"),
			FallbackError::InvalidAddress => f.write_str("not a valid segwit or base58check address"),
			FallbackError::UnknownAddressVersion(v) => write!(f, "unknown address version byte {}", v),
			FallbackError::InvalidProgramLength(l) => write!(f, "invalid program length {}", l),
			FallbackError::Empty => f.write_str("empty fallback field"),
		}
	}
}

impl std::error::Error for FallbackError {}

impl Fallback {
	/// Parses address text for `currency`, trying the segwit form first and base58check second.
	pub fn from_address(address: &str, currency: &Currency) -> Result<Fallback, FallbackError> {
		let params = AddressParams::for_currency(currency)?;

		if let Ok((hrp, data)) = bech32::decode(address) {
			trace!(hrp = %hrp, "fallback parsed as segwit address");
			if hrp != params.segwit_hrp {
				return Err(FallbackError::WrongNetwork);
			}
			let (version, program) = data.split_first().ok_or(FallbackError::Empty)?;
			if version.as_u8() > MAX_WITNESS_VERSION {
				return Err(FallbackError::InvalidWitnessVersion(version.as_u8()));
			}
			let program = Vec::<u8>::from_base32(program).map_err(|_| FallbackError::InvalidAddress)?;
			return Fallback::segwit(*version, program);
		}

		let payload = base58::decode_check(address).map_err(|_| FallbackError::InvalidAddress)?;
		if payload.len() != 21 {
			return Err(FallbackError::InvalidProgramLength(payload.len().saturating_sub(1)));
		}
		let mut hash = [0u8; 20];
		hash.copy_from_slice(&payload[1..]);
		match payload[0] {
			v if v == params.p2pkh_prefix => Ok(Fallback::PubKeyHash(hash)),
			v if v == params.p2sh_prefix => Ok(Fallback::ScriptHash(hash)),
			v => Err(FallbackError::UnknownAddressVersion(v)),
		}
	}

	/// Builds a segwit fallback, checking the program length for the version.
	pub fn segwit(version: u5, program: Vec<u8>) -> Result<Fallback, FallbackError> {
		if version.as_u8() > MAX_WITNESS_VERSION {
			return Err(FallbackError::InvalidWitnessVersion(version.as_u8()));
		}
		let len = program.len();
		if !(2..=40).contains(&len) || (version == u5::ZERO && len != 20 && len != 32) {
			return Err(FallbackError::InvalidProgramLength(len));
		}
		Ok(Fallback::SegWitProgram { version, program })
	}

	/// Renders the address text for `currency`.
	pub fn to_address(&self, currency: &Currency) -> Result<String, FallbackError> {
		let params = AddressParams::for_currency(currency)?;
		match *self {
			Fallback::SegWitProgram { version, ref program } => {
				let mut data = vec![version];
				data.extend(program.to_base32());
				bech32::encode(params.segwit_hrp, &data).map_err(|_| FallbackError::InvalidAddress)
			},
			Fallback::PubKeyHash(ref hash) => Ok(base58_with_prefix(params.p2pkh_prefix, hash)),
			Fallback::ScriptHash(ref hash) => Ok(base58_with_prefix(params.p2sh_prefix, hash)),
		}
	}

	/// The witness version symbol written at the start of the field.
	pub fn version(&self) -> u5 {
		match *self {
			Fallback::SegWitProgram { version, .. } => version,
			Fallback::PubKeyHash(_) => u5::from_u8(VERSION_P2PKH),
			Fallback::ScriptHash(_) => u5::from_u8(VERSION_P2SH),
		}
	}
}

fn base58_with_prefix(prefix: u8, hash: &[u8; 20]) -> String {
	let mut payload = Vec::with_capacity(21);
	payload.push(prefix);
	payload.extend_from_slice(hash);
	base58::encode_check(&payload)
}

impl ToBase32 for Fallback {
	fn write_base32<W: WriteBase32>(&self, writer: &mut W) -> Result<(), <W as WriteBase32>::Err> {
		writer.write_u5(self.version())?;
		match *self {
			Fallback::SegWitProgram { ref program, .. } => program.write_base32(writer),
			Fallback::PubKeyHash(ref hash) | Fallback::ScriptHash(ref hash) => (&hash[..]).write_base32(writer),
		}
	}
}

impl Base32Len for Fallback {
	fn base32_len(&self) -> usize {
		match *self {
			Fallback::SegWitProgram { ref program, .. } => program.base32_len() + 1,
			Fallback::PubKeyHash(_) | Fallback::ScriptHash(_) => 33,
		}
	}
}

impl FromBase32 for Fallback {
	type Err = FallbackError;

	fn from_base32(field_data: &[u5]) -> Result<Fallback, FallbackError> {
		let (version, program) = field_data.split_first().ok_or(FallbackError::Empty)?;
		let to_bytes = || Vec::<u8>::from_base32(program).map_err(|_| FallbackError::InvalidAddress);

		match version.as_u8() {
			0..=MAX_WITNESS_VERSION => Fallback::segwit(*version, to_bytes()?),
			VERSION_P2PKH | VERSION_P2SH => {
				let bytes = to_bytes()?;
				let hash: [u8; 20] = bytes
					.as_slice()
					.try_into()
					.map_err(|_| FallbackError::InvalidProgramLength(bytes.len()))?;
				if version.as_u8() == VERSION_P2PKH {
					Ok(Fallback::PubKeyHash(hash))
				} else {
					Ok(Fallback::ScriptHash(hash))
				}
			},
			v => Err(FallbackError::InvalidWitnessVersion(v)),
		}
	}
}

/// Encodes `address` as a complete `f` tagged field for `currency`.
pub fn encode_fallback(address: &str, currency: &Currency) -> Result<Vec<u5>, crate::CreationError> {
	let fallback = Fallback::from_address(address, currency)?;
	ser::tagged_raw('f', &fallback.to_base32())
}

/// Decodes the payload of an `f` field (tag and length already stripped) into address text for
/// `currency`.
pub fn decode_fallback(field_data: &[u5], currency: &Currency) -> Result<String, FallbackError> {
	Fallback::from_base32(field_data)?.to_address(currency)
}
