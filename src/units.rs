use crate::errors::ParseError;

// Binary suffixes are 1024-based, decimal ones 1000-based. warp names its
// matrix files with the binary spellings (4MiB, 256KiB) but older runners
// used KB/MB, so both are recognized and kept distinct.
const BINARY_UNITS: [(u64, &str); 3] = [(1 << 30, "GiB"), (1 << 20, "MiB"), (1 << 10, "KiB")];

/// Convert a size token like `4MiB`, `256KiB` or `100B` into an exact byte
/// count. All arithmetic is integral; fractional magnitudes are accepted only
/// when they scale to a whole number of bytes (`0.5MiB` is 524288, `1.3KiB`
/// is rejected).
pub fn parse_size(token: &str) -> Result<u64, ParseError> {
    let bad = || ParseError::SizeToken(token.to_string());
    let t = token.trim();
    if t.is_empty() {
        return Err(bad());
    }
    let split = t
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(t.len());
    let (magnitude, suffix) = t.split_at(split);
    if magnitude.is_empty() {
        return Err(bad());
    }
    let mult: u128 = match suffix {
        "" | "B" => 1,
        "KiB" => 1 << 10,
        "MiB" => 1 << 20,
        "GiB" => 1 << 30,
        "KB" => 1_000,
        "MB" => 1_000_000,
        "GB" => 1_000_000_000,
        _ => return Err(bad()),
    };
    let (whole, frac) = match magnitude.split_once('.') {
        None => (magnitude, ""),
        Some((w, f)) => {
            if w.is_empty() || f.is_empty() || f.contains('.') {
                return Err(bad());
            }
            (w, f)
        }
    };
    if frac.len() > 12 {
        return Err(bad());
    }
    let mantissa: u128 = format!("{whole}{frac}").parse().map_err(|_| bad())?;
    let scale = 10u128.pow(frac.len() as u32);
    let scaled = mantissa
        .checked_mul(mult)
        .ok_or_else(|| ParseError::SizeOverflow(token.to_string()))?;
    if scaled % scale != 0 {
        return Err(ParseError::InexactSize(token.to_string()));
    }
    u64::try_from(scaled / scale).map_err(|_| ParseError::SizeOverflow(token.to_string()))
}

/// Render a byte count back into the shortest exact binary token, falling
/// back to one decimal place for byte counts that are not a whole multiple
/// of any unit.
pub fn format_size(bytes: u64) -> String {
    for (mult, unit) in BINARY_UNITS {
        if bytes >= mult && bytes % mult == 0 {
            return format!("{}{}", bytes / mult, unit);
        }
    }
    for (mult, unit) in BINARY_UNITS {
        if bytes >= mult {
            return format!("{:.1}{}", bytes as f64 / mult as f64, unit);
        }
    }
    format!("{}B", bytes)
}

pub fn format_throughput(mb_s: f64) -> String {
    if mb_s >= 1000.0 {
        format!("{:.2} GB/s", mb_s / 1000.0)
    } else {
        format!("{:.2} MB/s", mb_s)
    }
}
