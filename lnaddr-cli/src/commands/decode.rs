// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! `decode`: print what a request contains.

use anyhow::{anyhow, bail, Context, Result};
use bitcoin::hex::DisplayHex;
use bitcoin::secp256k1::PublicKey;
use lnaddr::{lndecode, Currency, SignedInvoice, TaggedField};
use rust_decimal::Decimal;
use std::fmt::Write;
use std::str::FromStr;
use tracing::info;

/// Renders one tag the way the summary prints it.
fn describe_field(field: &TaggedField, currency: &Currency) -> String {
	match field {
		TaggedField::RouteHint(hint) => format!(
			"{}/{:016x}/{}/{}",
			hint.src_node_id, hint.short_channel_id, hint.fee, hint.cltv_expiry_delta
		),
		TaggedField::Fallback(fallback) => match fallback.to_address(currency) {
			Ok(address) => address,
			Err(e) => format!("{:?} ({})", fallback, e),
		},
		TaggedField::Description(description) => String::from(&**description),
		TaggedField::DescriptionHash(hash) => hash.0.to_string(),
		TaggedField::ExpiryTime(expiry) => expiry.as_seconds().to_string(),
		TaggedField::PayeePubKey(key) => key.0.to_string(),
		TaggedField::Unknown(field) => match field.to_bytes() {
			Ok(bytes) => bytes.as_slice().to_lower_hex_string(),
			Err(_) => field.data().iter().map(|s| s.to_char()).collect(),
		},
	}
}

/// Formats the summary printed for a decoded request.
///
/// Fails if `amount * rate` does not fit a [`Decimal`].
pub fn summary(signed: &SignedInvoice, rate: Option<Decimal>) -> Result<String> {
	let mut out = String::new();
	writeln!(out, "Currency: {}", signed.currency)?;
	match signed.amount {
		Some(amount) => {
			writeln!(out, "Amount: {}", amount.normalize())?;
			if let Some(rate) = rate {
				let converted = amount
					.checked_mul(rate)
					.ok_or_else(|| anyhow!("{} at rate {} is out of range", amount.normalize(), rate))?;
				writeln!(out, "Converted: {}", converted.normalize())?;
			}
		},
		None => writeln!(out, "Amount: any")?,
	}
	writeln!(out, "Timestamp: {}", signed.timestamp.as_unix_timestamp())?;
	writeln!(out, "Payment hash: {}", signed.payment_hash)?;

	let source = if signed.invoice().payee_pub_key().is_some() { "n tag" } else { "recovered" };
	writeln!(out, "Payee: {} ({})", signed.payee_pub_key(), source)?;

	for field in signed.tagged_fields() {
		writeln!(out, "{}: {}", field.tag_char(), describe_field(field, &signed.currency))?;
	}
	Ok(out)
}

/// Decodes `lnaddress` and prints its summary, checking it against `pubkey` when given.
pub fn run(lnaddress: &str, rate: Option<Decimal>, pubkey: Option<&str>) -> Result<()> {
	let signed = lndecode(lnaddress).map_err(|e| anyhow!("cannot decode {:?}: {}", lnaddress, e))?;

	if let Some(pubkey) = pubkey {
		let expected = PublicKey::from_str(pubkey).context("invalid public key")?;
		if !signed.check_signature_against(&expected) {
			bail!("request is not signed by {}", expected);
		}
		info!(%expected, "signature verified");
	}

	print!("{}", summary(&signed, rate)?);
	Ok(())
}
