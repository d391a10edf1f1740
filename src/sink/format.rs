use crate::model::alert::Alert;

/// `$1.23B`, `$4.56M`, `$12,345.67`, or `$0.012345` below one dollar.
pub fn format_currency(value: f64) -> String {
    if value >= 1_000_000_000.0 {
        return format!("${:.2}B", value / 1_000_000_000.0);
    }
    if value >= 1_000_000.0 {
        return format!("${:.2}M", value / 1_000_000.0);
    }
    let decimals = if value < 1.0 { 6 } else { 2 };
    let fixed = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}${}.{}", sign, group_thousands(int_part), frac_part)
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Notification text for an alert.
pub fn alert_message(alert: &Alert) -> String {
    format!(
        "🚨 {} for {}\n💰 Price: {}\n📈 Change: {:.2}%\n📊 Relative Volume: {:.2}x",
        alert.kind.title(),
        alert.symbol,
        format_currency(alert.price),
        alert.change_percent,
        alert.relative_volume,
    )
}
