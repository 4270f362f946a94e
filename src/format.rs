//! Text formatting shared by the Mermaid and network generators.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::Entity;

static PERCENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*%").unwrap());
static BARE_NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*$").unwrap());
static AMOUNT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([-+]?[0-9]*\.?[0-9]+)").unwrap());
static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{4})(?:[-/.年 ](\d{1,2}))?(?:[-/.月 ](\d{1,2}))?").unwrap()
});

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// How an ownership edge with a zero percentage is labelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroPercentage {
    #[default]
    Omit,
    Show,
}

/// Rounds to at most two decimals, trims trailing zeros, appends `%`.
pub fn format_percentage(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    let mut text = format!("{rounded:.2}");
    while text.ends_with('0') {
        text.pop();
    }
    if text.ends_with('.') {
        text.pop();
    }
    if text == "-0" {
        text = "0".to_string();
    }
    format!("{text}%")
}

/// Label for an ownership edge, or `None` when the policy omits it.
pub fn ownership_label(value: f64, zero: ZeroPercentage) -> Option<String> {
    if value > 0.0 || zero == ZeroPercentage::Show {
        Some(format_percentage(value))
    } else {
        None
    }
}

/// Accepts `"12.34%"`, `"12.34 %"`, `"持股12.34%"` or a bare `"12.34"`.
pub fn parse_percentage(raw: &str) -> Option<f64> {
    if let Some(caps) = PERCENT_RE.captures(raw) {
        return caps[1].parse().ok();
    }
    BARE_NUMBER_RE
        .captures(raw)
        .and_then(|caps| caps[1].parse().ok())
}

/// Shortens `text` to `max_chars` characters, marking the cut with `…`.
pub fn truncate_label(text: &str, max_chars: usize) -> String {
    if max_chars == 0 || text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(1);
    let mut out: String = text.chars().take(keep).collect();
    out.push('…');
    out
}

/// Normalizes a capital amount to units of 万 (ten thousand).
///
/// `"1000万元"` -> 1000, `"1亿元"` -> 10000, `"500000元"` -> 50, a bare number
/// is taken as 万 already.
pub fn normalize_amount_to_wan(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let has_yi = raw.contains('亿');
    let has_wan = raw.contains('万');
    let has_yuan = raw.contains('元') && !(has_yi || has_wan);
    let cleaned = raw.replace(',', "");
    let num: f64 = AMOUNT_RE.captures(&cleaned)?[1].parse().ok()?;
    Some(if has_yi {
        num * 10000.0
    } else if has_yuan {
        num / 10000.0
    } else {
        num
    })
}

/// `Cap: RMB{X}M` where X is in millions.
pub fn format_registered_capital(raw: &str) -> Option<String> {
    let millions = normalize_amount_to_wan(raw)? / 100.0;
    let number = if (millions - millions.trunc()).abs() < 1e-9 {
        format!("{}", millions as i64)
    } else {
        let mut text = format!("{millions:.2}");
        while text.ends_with('0') {
            text.pop();
        }
        text.trim_end_matches('.').to_string()
    };
    Some(format!("Cap: RMB{number}M"))
}

/// `Established: June.2010`, or `Established: 2010` when only a year is known.
pub fn format_established(raw: &str) -> Option<String> {
    let caps = DATE_RE.captures(raw.trim())?;
    let year = &caps[1];
    match caps.get(2).and_then(|m| m.as_str().parse::<usize>().ok()) {
        Some(month @ 1..=12) => Some(format!(
            "Established: {}.{year}",
            MONTH_NAMES[month - 1]
        )),
        _ => Some(format!("Established: {year}")),
    }
}

/// Lines shown inside an entity box, shared by both generators.
pub fn display_lines(entity: &Entity, show_metadata: bool, max_line_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let meta = &entity.metadata;
    if show_metadata {
        if let Some(english) = meta.english_name.as_deref().filter(|s| !s.trim().is_empty()) {
            lines.push(english.trim().to_string());
        }
    }
    lines.push(entity.name.clone());
    if show_metadata {
        if let Some(cap) = meta.registered_capital.as_deref() {
            if let Some(text) = format_registered_capital(cap) {
                lines.push(text);
            }
        }
        if let Some(date) = meta.establishment_date.as_deref() {
            if let Some(text) = format_established(date) {
                lines.push(text);
            }
        }
    }
    lines
        .iter()
        .map(|line| truncate_label(line, max_line_chars))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityMetadata, EntityType};

    #[test]
    fn percentage_rounding() {
        assert_eq!(format_percentage(33.333333), "33.33%");
        assert_eq!(format_percentage(60.0), "60%");
        assert_eq!(format_percentage(35.5), "35.5%");
        assert_eq!(format_percentage(100.0), "100%");
        assert_eq!(format_percentage(0.004), "0%");
        assert_eq!(format_percentage(12.346), "12.35%");
    }

    #[test]
    fn zero_percentage_policy() {
        assert_eq!(ownership_label(0.0, ZeroPercentage::Omit), None);
        assert_eq!(
            ownership_label(0.0, ZeroPercentage::Show).as_deref(),
            Some("0%")
        );
        assert_eq!(
            ownership_label(51.0, ZeroPercentage::Omit).as_deref(),
            Some("51%")
        );
    }

    #[test]
    fn parses_percentage_strings() {
        assert_eq!(parse_percentage("12.34%"), Some(12.34));
        assert_eq!(parse_percentage("持股 8 %"), Some(8.0));
        assert_eq!(parse_percentage(" 45.5 "), Some(45.5));
        assert_eq!(parse_percentage("majority"), None);
    }

    #[test]
    fn truncation_counts_chars() {
        assert_eq!(truncate_label("深圳市美鹏健康管理有限公司", 5), "深圳市美…");
        assert_eq!(truncate_label("short", 10), "short");
        assert_eq!(truncate_label("unbounded", 0), "unbounded");
    }

    #[test]
    fn capital_units() {
        assert_eq!(normalize_amount_to_wan("1000万元"), Some(1000.0));
        assert_eq!(normalize_amount_to_wan("1亿元"), Some(10000.0));
        assert_eq!(normalize_amount_to_wan("500,000元"), Some(50.0));
        assert_eq!(format_registered_capital("1000万元").as_deref(), Some("Cap: RMB10M"));
        assert_eq!(format_registered_capital("1250").as_deref(), Some("Cap: RMB12.5M"));
        assert_eq!(format_registered_capital("n/a"), None);
    }

    #[test]
    fn established_dates() {
        assert_eq!(
            format_established("2010-06-15").as_deref(),
            Some("Established: June.2010")
        );
        assert_eq!(
            format_established("2010年6月").as_deref(),
            Some("Established: June.2010")
        );
        assert_eq!(format_established("1998").as_deref(), Some("Established: 1998"));
        assert_eq!(format_established("unknown"), None);
    }

    #[test]
    fn display_lines_include_metadata() {
        let entity = Entity::new("云南维视医疗", EntityType::Subsidiary).with_metadata(EntityMetadata {
            english_name: Some("Yunnan Vastec".to_string()),
            registered_capital: Some("5000万元".to_string()),
            establishment_date: Some("2015-03-01".to_string()),
            ..EntityMetadata::default()
        });
        assert_eq!(
            display_lines(&entity, true, 40),
            vec![
                "Yunnan Vastec".to_string(),
                "云南维视医疗".to_string(),
                "Cap: RMB50M".to_string(),
                "Established: March.2015".to_string(),
            ]
        );
        assert_eq!(display_lines(&entity, false, 40), vec!["云南维视医疗".to_string()]);
    }
}
