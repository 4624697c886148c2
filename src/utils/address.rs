use thiserror::Error;

/// Length of a script hash in bytes.
const SCRIPT_HASH_LENGTH: usize = 20;

#[derive(Error, Debug)]
pub enum AddressError {
	#[error("invalid base58check encoding: {0}")]
	InvalidEncoding(#[from] bs58::decode::Error),
	#[error("address payload has {0} bytes, expected 21")]
	InvalidLength(usize),
}

/// A decoded Neo address: a version byte followed by a little-endian script hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeoAddress {
	pub version: u8,
	pub script_hash: [u8; SCRIPT_HASH_LENGTH],
}

impl NeoAddress {
	pub fn decode(encoded: &str) -> Result<Self, AddressError> {
		let payload = bs58::decode(encoded).with_check(None).into_vec()?;
		let (&version, hash) = payload
			.split_first()
			.ok_or(AddressError::InvalidLength(0))?;
		let script_hash: [u8; SCRIPT_HASH_LENGTH] = hash
			.try_into()
			.map_err(|_| AddressError::InvalidLength(payload.len()))?;

		Ok(Self {
			version,
			script_hash,
		})
	}

	/// Script hash as big-endian hex without a `0x` prefix, the form `Hash160`
	/// contract parameters take.
	pub fn script_hash_hex(&self) -> String {
		let mut reversed = self.script_hash;
		reversed.reverse();
		hex::encode(reversed)
	}
}
