use colored::Colorize;
use crate::mint::Wei;

/// Wei per ether
pub const WEI_PER_ETH: u128 = 1_000_000_000_000_000_000;

const ETH_DECIMALS: usize = 18;

/// Parse a decimal ether amount ("0.001", "2", "1.5") into wei without rounding.
pub fn eth_to_wei(amount: &str) -> Result<Wei, String> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err("empty amount".to_string());
    }

    let (whole, frac) = match amount.split_once('.') {
        Some((w, f)) => (w, f),
        None => (amount, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(format!("not a decimal number: {}", amount));
    }
    if frac.len() > ETH_DECIMALS {
        return Err(format!("more than {} decimal places", ETH_DECIMALS));
    }
    if !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
        return Err(format!("not a decimal number: {}", amount));
    }

    let whole: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|e| format!("{}", e))?
    };
    let frac: u128 = if frac.is_empty() {
        0
    } else {
        format!("{:0<width$}", frac, width = ETH_DECIMALS)
            .parse()
            .map_err(|e| format!("{}", e))?
    };

    whole
        .checked_mul(WEI_PER_ETH)
        .and_then(|w| w.checked_add(frac))
        .ok_or_else(|| "amount too large".to_string())
}

/// Render wei as ether with trailing zeros trimmed.
pub fn wei_to_eth_string(wei: Wei) -> String {
    let whole = wei / WEI_PER_ETH;
    let frac = wei % WEI_PER_ETH;
    if frac == 0 {
        return format!("{} ETH", whole);
    }
    let frac = format!("{:0>width$}", frac, width = ETH_DECIMALS);
    format!("{}.{} ETH", whole, frac.trim_end_matches('0'))
}

/// Format wei as ETH string with color
pub fn format_eth(wei: Wei) -> String {
    wei_to_eth_string(wei).yellow().to_string()
}

/// Format address truncated for display
pub fn format_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 12 {
        address.to_string()
    } else {
        let head: String = chars[..6].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

/// Format timestamp in human-readable format
pub fn format_timestamp(timestamp: &chrono::DateTime<chrono::Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Prompt user for yes/no confirmation
pub fn confirm_action(prompt: &str) -> bool {
    use std::io::{self, Write};

    print!("{} (y/N): ", prompt);
    if io::stdout().flush().is_err() {
        return false;
    }

    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return false;
    }

    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Print a formatted table border
pub fn print_table_border(width: usize) {
    println!("{}", "=".repeat(width));
}

/// Print a table row with columns
pub fn print_table_row(columns: &[&str], widths: &[usize]) {
    let mut row = String::new();
    for (i, col) in columns.iter().enumerate() {
        if i < widths.len() {
            row.push_str(&format!("{:<width$}  ", col, width = widths[i]));
        }
    }
    println!("{}", row.trim_end());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eth_to_wei() {
        assert_eq!(eth_to_wei("1").unwrap(), WEI_PER_ETH);
        assert_eq!(eth_to_wei("0.001").unwrap(), 1_000_000_000_000_000);
        assert_eq!(eth_to_wei(".5").unwrap(), WEI_PER_ETH / 2);
        assert_eq!(eth_to_wei("0.000000000000000001").unwrap(), 1);
        assert!(eth_to_wei("0.0000000000000000001").is_err());
        assert!(eth_to_wei("-1").is_err());
        assert!(eth_to_wei("1e3").is_err());
        assert!(eth_to_wei("").is_err());
        assert!(eth_to_wei(".").is_err());
    }

    #[test]
    fn test_wei_to_eth_string() {
        assert_eq!(wei_to_eth_string(0), "0 ETH");
        assert_eq!(wei_to_eth_string(WEI_PER_ETH * 3), "3 ETH");
        assert_eq!(wei_to_eth_string(1_500_000_000_000_000), "0.0015 ETH");
    }

    #[test]
    fn test_format_address() {
        assert_eq!(format_address("0xabc"), "0xabc");
        assert_eq!(
            format_address("0x1234567890abcdef1234567890abcdef12345678"),
            "0x1234...5678"
        );
        assert_eq!(format_address("aöööööö-multisig"), "aööööö...isig");
        assert_eq!(format_address("ööööööööööö"), "ööööööööööö");
    }
}
