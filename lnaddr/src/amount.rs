// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Amounts in the human readable part.
//!
//! An amount is an exact [`Decimal`] in whole currency units. On the wire it is a run of digits
//! followed by an optional [`SiPrefix`] character, always resolving to a whole number of
//! pico-units (10^-12 of the currency unit).

use core::fmt;
use core::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Number of pico-units in one whole currency unit.
pub const PICO_PER_UNIT: u64 = 1_000_000_000_000;

/// SI prefixes for the human readable part
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum SiPrefix {
	/// 10^-3
	Milli,
	/// 10^-6
	Micro,
	/// 10^-9
	Nano,
	/// 10^-12
	Pico,
}

impl SiPrefix {
	/// Returns the number of pico-units one unit carrying this prefix stands for.
	pub fn multiplier(&self) -> u64 {
		match *self {
			SiPrefix::Milli => 1_000_000_000,
			SiPrefix::Micro => 1_000_000,
			SiPrefix::Nano => 1_000,
			SiPrefix::Pico => 1,
		}
	}

	/// Returns all variants, finest first. This is the order in which [`shorten_amount`] tries
	/// them.
	pub fn values_asc() -> &'static [SiPrefix] {
		use crate::amount::SiPrefix::*;
		static VALUES: [SiPrefix; 4] = [Pico, Nano, Micro, Milli];
		&VALUES
	}

	/// The suffix character.
	pub fn as_char(&self) -> char {
		match *self {
			SiPrefix::Milli => 'm',
			SiPrefix::Micro => 'u',
			SiPrefix::Nano => 'n',
			SiPrefix::Pico => 'p',
		}
	}

	/// Maps a suffix character back to its prefix.
	pub fn from_char(c: char) -> Option<SiPrefix> {
		match c {
			'm' => Some(SiPrefix::Milli),
			'u' => Some(SiPrefix::Micro),
			'n' => Some(SiPrefix::Nano),
			'p' => Some(SiPrefix::Pico),
			_ => None,
		}
	}
}

impl fmt::Display for SiPrefix {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", self.as_char())
	}
}

impl FromStr for SiPrefix {
	type Err = AmountError;

	fn from_str(s: &str) -> Result<Self, AmountError> {
		let mut chars = s.chars();
		match (chars.next(), chars.next()) {
			(Some(c), None) => SiPrefix::from_char(c).ok_or(AmountError::UnknownSiPrefix),
			_ => Err(AmountError::UnknownSiPrefix),
		}
	}
}

/// Errors converting between amounts and their shortened text.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum AmountError {
	/// The amount needs more precision than the encoding can carry.
	PrecisionLoss,
	/// The amount is below zero.
	Negative,
	/// The amount does not fit the numeric range of the codec.
	Overflow,
	/// The numeric part is empty or holds something other than ASCII digits.
	InvalidNumber,
	/// The trailing character is neither a digit nor a known SI prefix.
	UnknownSiPrefix,
}

impl fmt::Display for AmountError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match *self {
			AmountError::PrecisionLoss => f.write_str("amount cannot be represented without losing precision"),
			AmountError::Negative => f.write_str("amount is negative"),
			AmountError::Overflow => f.write_str("amount is too large"),
			AmountError::InvalidNumber => f.write_str("amount is not a decimal number"),
			AmountError::UnknownSiPrefix => f.write_str("unknown SI prefix"),
		}
	}
}

impl std::error::Error for AmountError {}

/// Converts an amount in whole units into an exact count of pico-units.
pub fn amount_to_pico(amount: Decimal) -> Result<u128, AmountError> {
	if amount.is_sign_negative() && !amount.is_zero() {
		return Err(AmountError::Negative);
	}
	let pico = amount.checked_mul(Decimal::from(PICO_PER_UNIT)).ok_or(AmountError::Overflow)?;
	if !pico.fract().is_zero() {
		return Err(AmountError::PrecisionLoss);
	}
	pico.trunc().to_u128().ok_or(AmountError::Overflow)
}

/// Converts a pico-unit count back into whole units.
pub fn pico_to_amount(pico: u128) -> Result<Decimal, AmountError> {
	let pico = i128::try_from(pico).map_err(|_| AmountError::Overflow)?;
	Decimal::try_from_i128_with_scale(pico, 12)
		.map(|d| d.normalize())
		.map_err(|_| AmountError::Overflow)
}

/// Writes `amount` with the coarsest suffix that still divides it exactly, trying pico, nano,
/// micro, milli and finally no suffix (whole units).
///
/// ```
/// use lnaddr::amount::shorten_amount;
/// use rust_decimal::Decimal;
/// use std::str::FromStr;
///
/// assert_eq!(shorten_amount(Decimal::from_str("0.00000000001").unwrap()).unwrap(), "10p");
/// assert_eq!(shorten_amount(Decimal::from_str("0.123").unwrap()).unwrap(), "123m");
/// assert_eq!(shorten_amount(Decimal::from(3000)).unwrap(), "3000");
/// ```
pub fn shorten_amount(amount: Decimal) -> Result<String, AmountError> {
	let mut value = amount_to_pico(amount)?;
	for prefix in SiPrefix::values_asc() {
		if value % 1000 != 0 {
			return Ok(format!("{}{}", value, prefix));
		}
		value /= 1000;
	}
	Ok(value.to_string())
}

/// Reads a digit run with an optional trailing SI prefix back into whole units.
pub fn unshorten_amount(amount: &str) -> Result<Decimal, AmountError> {
	let (digits, multiplier) = match amount.chars().last() {
		Some(c) if c.is_ascii_digit() => (amount, PICO_PER_UNIT),
		Some(c) => {
			let prefix = SiPrefix::from_char(c).ok_or(AmountError::UnknownSiPrefix)?;
			(&amount[..amount.len() - c.len_utf8()], prefix.multiplier())
		},
		None => return Err(AmountError::InvalidNumber),
	};

	if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
		return Err(AmountError::InvalidNumber);
	}
	let value: u128 = digits.parse().map_err(|_| AmountError::Overflow)?;
	let pico = value.checked_mul(u128::from(multiplier)).ok_or(AmountError::Overflow)?;
	pico_to_amount(pico)
}
