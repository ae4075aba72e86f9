// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! `encode`: build a request from command-line options and sign it.

use anyhow::{anyhow, bail, Context, Result};
use bitcoin::hashes::sha256;
use bitcoin::secp256k1::{PublicKey, SecretKey};
use lnaddr::{lnencode, Currency, InvoiceBuilder, RouteHint};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Everything the `encode` subcommand takes.
pub struct EncodeOptions {
	pub currency: String,
	pub routes: Vec<String>,
	pub fallback: Option<String>,
	pub description: Option<String>,
	pub description_hashed: Option<String>,
	pub expires: Option<u64>,
	pub amount: Option<Decimal>,
	pub timestamp: Option<u64>,
	pub payment_hash: String,
	pub privkey: String,
}

/// Parses a `PUBKEY/CHANNEL/FEE/CLTV` route step. The channel is 8 bytes of hex.
pub fn parse_route(route: &str) -> Result<RouteHint> {
	let parts: Vec<&str> = route.split('/').collect();
	if parts.len() != 4 {
		bail!("route {:?} is not of the form PUBKEY/CHANNEL/FEE/CLTV", route);
	}
	let src_node_id = PublicKey::from_str(parts[0]).context("invalid route public key")?;
	if parts[1].len() != 16 {
		bail!("route channel {:?} must be 16 hex characters", parts[1]);
	}
	let short_channel_id = u64::from_str_radix(parts[1], 16).context("invalid route channel")?;
	let fee = parts[2].parse::<u32>().context("invalid route fee")?;
	let cltv_expiry_delta = parts[3].parse::<u16>().context("invalid route cltv")?;
	Ok(RouteHint { src_node_id, short_channel_id, fee, cltv_expiry_delta })
}

/// Builds and signs the request, returning its text.
pub fn run(options: &EncodeOptions) -> Result<String> {
	let currency = Currency::from_str(&options.currency).map_err(|e| anyhow!("{}", e))?;
	let payment_hash = sha256::Hash::from_str(&options.payment_hash).context("invalid payment hash")?;
	let private_key = SecretKey::from_str(&options.privkey).context("invalid private key")?;

	let mut builder = InvoiceBuilder::new(currency).payment_hash(payment_hash);
	builder = match options.timestamp {
		Some(secs) => builder.duration_since_epoch(Duration::from_secs(secs)),
		None => builder.current_timestamp(),
	};
	if let Some(amount) = options.amount {
		builder = builder.amount(amount);
	}

	// r..., f, d, x, h
	for route in options.routes.iter() {
		builder = builder.route_hint(parse_route(route)?);
	}
	if let Some(ref fallback) = options.fallback {
		builder = builder.fallback_address(fallback);
	}
	if let Some(ref description) = options.description {
		builder = builder.description(description.clone());
	}
	if let Some(expires) = options.expires {
		builder = builder.expiry_time(Duration::from_secs(expires));
	}
	if let Some(ref text) = options.description_hashed {
		builder = builder.hashed_description(text);
	}

	let invoice = builder.build()?;
	debug!(fields = invoice.tagged_fields().len(), "encoding payment request");
	Ok(lnencode(&invoice, &private_key)?)
}
