/// Format an amount with thousands separators. Whole amounts drop the
/// decimals: 600,000 but 12,500.50.
pub fn amount(val: f64) -> String {
    let negative = val < 0.0;
    let fixed = format!("{:.2}", val.abs());
    let (int_part, dec_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut with_commas = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    let with_commas: String = with_commas.chars().rev().collect();

    let body = if dec_part == "00" {
        with_commas
    } else {
        format!("{with_commas}.{dec_part}")
    };
    if negative {
        format!("-{body}")
    } else {
        body
    }
}

/// Cut `s` to at most `max` characters, marking the cut with an ellipsis.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(1)).collect();
    format!("{kept}\u{2026}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_formatting() {
        assert_eq!(amount(600000.0), "600,000");
        assert_eq!(amount(12500.5), "12,500.50");
        assert_eq!(amount(-500.0), "-500");
        assert_eq!(amount(0.0), "0");
        assert_eq!(amount(45000000.0), "45,000,000");
        assert_eq!(amount(999.99), "999.99");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Tractor", 10), "Tractor");
        assert_eq!(truncate("Massey Ferguson 240", 8), "Massey \u{2026}");
    }
}
