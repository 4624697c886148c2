/// Decimals of the GAS token; NEO is indivisible.
pub const GAS_DECIMALS: u32 = 8;

/// Render an integer token amount with `decimals` fractional digits.
pub fn format_token_amount(amount: u128, decimals: u32) -> String {
	if decimals == 0 {
		return amount.to_string();
	}
	let width = decimals as usize;
	// Past 10^38 every u128 amount is purely fractional.
	let Some(scale) = 10u128.checked_pow(decimals) else {
		return format!("0.{:0width$}", amount, width = width);
	};
	format!(
		"{}.{:0width$}",
		amount / scale,
		amount % scale,
		width = width
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_format_token_amount() {
		assert_eq!(format_token_amount(150_000_000, GAS_DECIMALS), "1.50000000");
		assert_eq!(format_token_amount(1, GAS_DECIMALS), "0.00000001");
		assert_eq!(format_token_amount(42, 0), "42");
	}

	#[test]
	fn test_format_token_amount_large_decimals() {
		assert_eq!(
			format_token_amount(u128::MAX, 38),
			"3.40282366920938463463374607431768211455"
		);
		assert_eq!(format_token_amount(5, 39), format!("0.{}5", "0".repeat(38)));
		assert_eq!(
			format_token_amount(u128::MAX, 40),
			"0.0340282366920938463463374607431768211455"
		);
	}
}
