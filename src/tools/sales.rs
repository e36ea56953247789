//! sum_selected_items：对 Series 形式的文本（`标签  数值` 每行一条）按标签求和

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::tools::schema::args_schema;
use crate::tools::Tool;

/// 未指定 include_only 时计入的标签（食品类）
pub const DEFAULT_ITEMS: &[&str] = &["Burgers", "Hot Dogs", "Salads", "Fries", "Ice Cream"];

#[derive(Deserialize, JsonSchema)]
struct SumArgs {
    /// 每行 `Label    12,345` 形式的文本
    series_str: String,
    /// 只累加这些标签；缺省为食品类默认列表
    #[serde(default)]
    include_only: Option<Vec<String>>,
}

fn line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.+?)\s+([\d,]+)$").unwrap())
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

pub fn sum_selected_items(series: &str, include_only: Option<&[String]>) -> String {
    let defaults: Vec<String> = DEFAULT_ITEMS.iter().map(|s| s.to_string()).collect();
    let include = include_only.unwrap_or(defaults.as_slice());

    let total: u64 = series
        .lines()
        .filter_map(|line| line_re().captures(line.trim()))
        .filter_map(|caps| {
            let label = caps[1].trim();
            if !include.iter().any(|item| item == label) {
                return None;
            }
            caps[2].replace(',', "").parse::<u64>().ok()
        })
        .fold(0u64, u64::saturating_add);
    format!("The total for selected items is ${}", group_thousands(total))
}

pub struct SumSelectedItemsTool;

#[async_trait]
impl Tool for SumSelectedItemsTool {
    fn name(&self) -> &str {
        "sum_selected_items"
    }

    fn description(&self) -> &str {
        "Sum the values of a pandas Series-like text (one `Label  value` per line), including only the given labels. Defaults to food items: Burgers, Hot Dogs, Salads, Fries, Ice Cream."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<SumArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let args: SumArgs = serde_json::from_value(args).map_err(|e| e.to_string())?;
        Ok(Value::String(sum_selected_items(
            &args.series_str,
            args.include_only.as_deref(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERIES: &str = "Burgers    17,571\nHot Dogs   18003\nSalads 1,000\nSoda 19048\nLocation  Downtown";

    #[test]
    fn test_default_items() {
        assert_eq!(
            sum_selected_items(SERIES, None),
            "The total for selected items is $36,574"
        );
    }

    #[test]
    fn test_include_only() {
        let only = vec!["Soda".to_string()];
        assert_eq!(
            sum_selected_items(SERIES, Some(&only)),
            "The total for selected items is $19,048"
        );
    }

    #[test]
    fn test_huge_values_saturate() {
        let series = "Burgers 18446744073709551615\nFries 10\nSalads 99999999999999999999";
        assert_eq!(
            sum_selected_items(series, None),
            "The total for selected items is $18,446,744,073,709,551,615"
        );
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1234567), "1,234,567");
    }
}
