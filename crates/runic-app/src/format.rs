//! Display formatting for balances, counts and addresses.

/// Lamports per SOL.
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Length of a decoded public key.
const PUBKEY_LEN: usize = 32;

fn to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

/// Balance with four decimals, as used in activity lines.
///
/// `1_500_000_000` renders as `"1.5000"`.
pub fn sol_fixed(lamports: u64) -> String {
    format!("{:.4}", to_sol(lamports))
}

/// Compact balance for cards: `1.23M`, `4.56K`, otherwise four decimals.
pub fn format_sol(lamports: u64) -> String {
    let sol = to_sol(lamports);
    if sol >= 1_000_000.0 {
        format!("{:.2}M", sol / 1_000_000.0)
    } else if sol >= 1_000.0 {
        format!("{:.2}K", sol / 1_000.0)
    } else {
        format!("{sol:.4}")
    }
}

/// Total balance with two decimals and unit, for the summary card.
pub fn format_sol_total(lamports: u64) -> String {
    format!("{:.2} SOL", to_sol(lamports))
}

/// Compact count: `1.20M`, `3.40K`, or the plain number with separators.
pub fn format_count(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.2}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.2}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

/// Count with thousands separators: `12345` → `"12,345"`.
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// First and last `chars` characters joined by an ellipsis.
pub fn shorten_address(address: &str, chars: usize) -> String {
    let total = address.chars().count();
    if total <= chars * 2 {
        return address.to_string();
    }
    let head: String = address.chars().take(chars).collect();
    let tail: String = address.chars().skip(total - chars).collect();
    format!("{head}...{tail}")
}

/// Leading eight characters of an address, used in activity lines.
pub fn address_prefix(address: &str) -> String {
    address.chars().take(8).collect()
}

/// Whether `address` is a base58-encoded 32-byte public key.
pub fn validate_address(address: &str) -> bool {
    bs58::decode(address)
        .into_vec()
        .is_ok_and(|bytes| bytes.len() == PUBKEY_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sol_fixed() {
        assert_eq!(sol_fixed(1_500_000_000), "1.5000");
        assert_eq!(sol_fixed(0), "0.0000");
        assert_eq!(sol_fixed(12_345), "0.0000");
    }

    #[test]
    fn test_format_sol_scales() {
        assert_eq!(format_sol(2_000_000_000), "2.0000");
        assert_eq!(format_sol(1_500 * LAMPORTS_PER_SOL), "1.50K");
        assert_eq!(format_sol(2_500_000 * LAMPORTS_PER_SOL), "2.50M");
        assert_eq!(format_sol_total(3 * LAMPORTS_PER_SOL), "3.00 SOL");
    }

    #[test]
    fn test_counts() {
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1_200), "1.20K");
        assert_eq!(format_count(3_400_000), "3.40M");
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(12_345), "12,345");
        assert_eq!(group_thousands(1_234_567), "1,234,567");
    }

    #[test]
    fn test_address_helpers() {
        let addr = "JUP4Fb2cqiRUcaTHdrPC8h2gNsA2ETXiPDD33WcGuJB";
        assert_eq!(shorten_address(addr, 4), "JUP4...GuJB");
        assert_eq!(shorten_address("abc", 4), "abc");
        assert_eq!(address_prefix(addr), "JUP4Fb2c");
        assert_eq!(address_prefix("short"), "short");
    }

    #[test]
    fn test_validate_address() {
        assert!(validate_address("JUP4Fb2cqiRUcaTHdrPC8h2gNsA2ETXiPDD33WcGuJB"));
        assert!(validate_address("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"));
        assert!(!validate_address("not-a-key"));
        assert!(!validate_address("0OIl"));
        assert!(!validate_address(""));
    }
}
