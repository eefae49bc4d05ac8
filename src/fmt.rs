/// Format a float as a dollar amount with thousands separators: $1,234.56
pub fn money(val: f64) -> String {
    if !val.is_finite() {
        return "-".to_string();
    }
    let negative = val < -0.005;
    let cents = format!("{:.2}", val.abs());
    let (int_part, dec_part) = cents.split_once('.').unwrap_or((&cents, "00"));

    let mut with_commas = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    let with_commas: String = with_commas.chars().rev().collect();

    if negative {
        format!("-${with_commas}.{dec_part}")
    } else {
        format!("${with_commas}.{dec_part}")
    }
}

/// Signed percentage with one decimal, or `-` when there is nothing to compare.
pub fn percent(val: Option<f64>) -> String {
    match val {
        Some(v) if v.is_finite() => format!("{v:+.1}%"),
        _ => "-".to_string(),
    }
}
