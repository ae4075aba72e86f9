// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Encode and decode lightning payment requests from the command line.

use anyhow::Result;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "lightning-address")]
#[command(about = "Encode and decode lightning payment requests", long_about = None)]
#[command(version)]
struct Cli {
	#[command(subcommand)]
	command: Commands,

	/// Enable verbose output
	#[arg(short, long, global = true)]
	verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
	/// Build, sign and print a payment request
	Encode {
		/// Currency code placed after `ln`
		#[arg(long, default_value = "bc")]
		currency: String,

		/// Extra route steps of form PUBKEY/CHANNEL/FEE/CLTV
		#[arg(long = "route")]
		routes: Vec<String>,

		/// Fallback address for onchain payment
		#[arg(long)]
		fallback: Option<String>,

		/// What is being purchased
		#[arg(long)]
		description: Option<String>,

		/// What is being purchased (only its hash is included)
		#[arg(long)]
		description_hashed: Option<String>,

		/// Seconds before the request expires
		#[arg(long)]
		expires: Option<u64>,

		/// Don't encode the amount
		#[arg(long)]
		no_amount: bool,

		/// Creation time in seconds since the Unix epoch, defaults to now
		#[arg(long)]
		timestamp: Option<u64>,

		/// Amount in whole currency units
		amount: Decimal,

		/// Payment hash (hex)
		payment_hash: String,

		/// Private key to sign with (hex)
		privkey: String,
	},

	/// Print the contents of a payment request
	Decode {
		/// Payment request to decode
		lnaddress: String,

		/// Conversion rate for one currency unit
		#[arg(long)]
		rate: Option<Decimal>,

		/// Public key the request must be signed by (hex)
		#[arg(long)]
		pubkey: Option<String>,
	},
}

fn main() -> Result<()> {
	let cli = Cli::parse();

	let default_filter = if cli.verbose { "lnaddr=debug,lnaddr_cli=debug" } else { "lnaddr=warn,lnaddr_cli=info" };
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
		.with_writer(std::io::stderr)
		.init();

	match cli.command {
		Commands::Encode {
			currency,
			routes,
			fallback,
			description,
			description_hashed,
			expires,
			no_amount,
			timestamp,
			amount,
			payment_hash,
			privkey,
		} => {
			let options = commands::encode::EncodeOptions {
				currency,
				routes,
				fallback,
				description,
				description_hashed,
				expires,
				amount: if no_amount { None } else { Some(amount) },
				timestamp,
				payment_hash,
				privkey,
			};
			println!("{}", commands::encode::run(&options)?);
		},
		Commands::Decode { lnaddress, rate, pubkey } => {
			commands::decode::run(&lnaddress, rate, pubkey.as_deref())?;
		},
	}

	Ok(())
}
