//! 答案格式化：把最终的原始文本整理为精确匹配评分要求的形式
//!
//! 纯函数，不调用任何外部能力。规则（按顺序）：
//! 1. 去框架：取最后一个 `FINAL ANSWER:` 标签之后的首个非空行，没有标签时取最后一个非空行；
//!    去掉包裹的引号、反引号、星号、括号与末尾句点。为空时返回兜底文本。
//! 2. 题目要求列表（comma separated / list）→ 列表。
//! 3. 整体是数字（可带符号、货币符号、千分位、小数、单位或 %）→ 数字。
//! 4. 含逗号 → 列表；否则 → 文本。
//!
//! 数字：去千分位、货币与单位，去前导零；题目未提及 decimal place 时去掉小数末尾的 0；
//! 题目要求用单词作答时，百万以内的非负整数写成英文单词。
//! 文本：合并空白；仅在评分大小写不敏感时转小写。
//! 列表：逐项按数字或文本格式化，丢弃空项，以 ", " 连接。
//!
//! 对自身输出幂等：format(format(x)) == format(x)。

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::Task;

/// 无法得到任何答案时提交的文本
pub const FALLBACK_ANSWER: &str = "unable to determine answer";

/// 答案类别（也作为抽取步给出的提示）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerKind {
    Number,
    Text,
    List,
}

/// 最终答案：只有 formatted_text 会离开系统
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalAnswer {
    pub raw_text: String,
    pub formatted_text: String,
}

fn label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)final\s+answer\s*[:：]").unwrap())
}

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?ix)^
            (?P<sign>[+-])?\s*
            (?P<cur>[$€£¥])?\s*
            (?P<num>\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?|\.\d+)
            \s*(?:%|percent|usd|eur|dollars?|euros?|km|kg|mg|cm|mm|m|g|lbs?|miles?|mi|ft|feet|inches|seconds?|secs?|minutes?|mins?|hours?|hrs?|days?|years?|°c|°f)?
            $",
        )
        .unwrap()
    })
}

fn number_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[+-]?[$€£¥]?\d[\d,]*(?:\.\d+)?").unwrap())
}

fn comma_list_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)comma[\s-]*(?:separated|delimited)").unwrap())
}

/// 要求列出多项的措辞；仅提到某个“list”（如 "the list on the page"）不算
fn list_request_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*list\b|\blist\s+(?:of|them|all|the|each|every|only)\b|\bas\s+a\s+list\b|\bin\s+a\s+list\b")
            .unwrap()
    })
}

const WORD_CUES: &[&str] = &[
    "as a word",
    "in words",
    "in word form",
    "spelled out",
    "spell out",
    "written out",
    "in plain text",
];

/// 从题目中读出的格式要求
#[derive(Debug, Clone, Copy, Default)]
struct QuestionCues {
    /// 明确要求逗号分隔
    wants_list: bool,
    /// 要求列出多项，但整体是一个数字时按数字处理
    asks_for_items: bool,
    wants_words: bool,
    keep_decimals: bool,
}

impl QuestionCues {
    fn from_question(question: &str) -> Self {
        let q = question.to_lowercase();
        Self {
            wants_list: comma_list_re().is_match(&q),
            asks_for_items: list_request_re().is_match(&q),
            wants_words: WORD_CUES.iter().any(|cue| q.contains(cue)),
            keep_decimals: q.contains("decimal place"),
        }
    }
}

/// 去掉首尾包裹符号与末尾句点，直到不再变化
fn strip_wrapping(s: &str) -> &str {
    const PAIRS: &[(char, char)] = &[
        ('"', '"'),
        ('\'', '\''),
        ('`', '`'),
        ('*', '*'),
        ('[', ']'),
        ('(', ')'),
        ('“', '”'),
    ];
    let mut s = s.trim();
    loop {
        let before = s;
        s = s.trim_end_matches('.').trim_end();
        for &(open, close) in PAIRS {
            if s.chars().count() >= 2 && s.starts_with(open) && s.ends_with(close) {
                s = s[open.len_utf8()..s.len() - close.len_utf8()].trim();
            }
        }
        if s == before {
            return s;
        }
    }
}

/// 去框架后的答案主体
fn answer_body(raw: &str) -> &str {
    let body = match label_re().find_iter(raw).last() {
        Some(m) => raw[m.end()..]
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or(""),
        None => raw
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .last()
            .unwrap_or(""),
    };
    strip_wrapping(body)
}

const ONES: [&str; 20] = [
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
    "eleven", "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen",
    "nineteen",
];
const TENS: [&str; 10] = [
    "", "", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
];

fn below_thousand(n: u64) -> String {
    let mut parts = Vec::new();
    if n >= 100 {
        parts.push(format!("{} hundred", ONES[(n / 100) as usize]));
    }
    let rest = n % 100;
    if rest > 0 || n == 0 {
        let words = if rest < 20 {
            ONES[rest as usize].to_string()
        } else if rest % 10 == 0 {
            TENS[(rest / 10) as usize].to_string()
        } else {
            format!("{}-{}", TENS[(rest / 10) as usize], ONES[(rest % 10) as usize])
        };
        parts.push(words);
    }
    parts.join(" ")
}

/// 0..1_000_000 的英文单词形式
pub fn number_to_words(n: u64) -> Option<String> {
    match n {
        0..=999 => Some(below_thousand(n)),
        1_000..=999_999 => {
            let mut out = format!("{} thousand", below_thousand(n / 1000));
            if n % 1000 > 0 {
                out.push(' ');
                out.push_str(&below_thousand(n % 1000));
            }
            Some(out)
        }
        _ => None,
    }
}

/// 数字规范化；body 不是数字时返回 None
fn format_number(body: &str, cues: QuestionCues) -> Option<String> {
    let caps = number_re().captures(body.trim())?;
    let negative = caps.name("sign").map(|m| m.as_str()) == Some("-");
    let digits = caps.name("num")?.as_str().replace(',', "");
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits.as_str(), ""));

    let int_part = match int_part.trim_start_matches('0') {
        "" => "0",
        trimmed => trimmed,
    };
    let frac_part = if cues.keep_decimals {
        frac_part
    } else {
        frac_part.trim_end_matches('0')
    };

    if cues.wants_words && !negative && frac_part.is_empty() {
        if let Some(words) = int_part.parse::<u64>().ok().and_then(number_to_words) {
            return Some(words);
        }
    }

    let magnitude = if frac_part.is_empty() {
        int_part.to_string()
    } else {
        format!("{int_part}.{frac_part}")
    };
    let is_zero = magnitude.chars().all(|c| c == '0' || c == '.');
    if negative && !is_zero {
        Some(format!("-{magnitude}"))
    } else {
        Some(magnitude)
    }
}

/// 纯格式化步
#[derive(Debug, Clone)]
pub struct AnswerFormatter {
    case_insensitive: bool,
    fallback_text: String,
}

impl Default for AnswerFormatter {
    fn default() -> Self {
        Self::new(false, FALLBACK_ANSWER)
    }
}

impl AnswerFormatter {
    pub fn new(case_insensitive: bool, fallback_text: impl Into<String>) -> Self {
        let fallback_text = fallback_text.into();
        let fallback_text = if fallback_text.trim().is_empty() {
            FALLBACK_ANSWER.to_string()
        } else {
            fallback_text
        };
        Self {
            case_insensitive,
            fallback_text,
        }
    }

    pub fn fallback_text(&self) -> &str {
        &self.fallback_text
    }

    pub fn format(&self, raw_text: &str, task: &Task) -> FinalAnswer {
        self.format_with_hint(raw_text, task, None)
    }

    /// hint 来自答案抽取步：Text 提示让数字保持原样（除非题目要求单词），
    /// Number 提示在主体不是纯数字时取其中第一个数字
    pub fn format_with_hint(
        &self,
        raw_text: &str,
        task: &Task,
        hint: Option<AnswerKind>,
    ) -> FinalAnswer {
        let formatted = self.format_text(raw_text, &task.question, hint);
        FinalAnswer {
            raw_text: raw_text.to_string(),
            formatted_text: if formatted.is_empty() {
                self.fallback_text.clone()
            } else {
                formatted
            },
        }
    }

    /// 回退答案（强制终止且无任何可用文本时）
    pub fn fallback(&self) -> FinalAnswer {
        FinalAnswer {
            raw_text: String::new(),
            formatted_text: self.fallback_text.clone(),
        }
    }

    fn format_text(&self, raw: &str, question: &str, hint: Option<AnswerKind>) -> String {
        let body = answer_body(raw);
        if body.is_empty() {
            return String::new();
        }
        let cues = QuestionCues::from_question(question);

        if cues.wants_list || hint == Some(AnswerKind::List) {
            return self.format_list(body, cues);
        }
        if cues.asks_for_items && format_number(body, cues).is_none() {
            return self.format_list(body, cues);
        }
        if let Some(number) = format_number(body, cues) {
            if hint == Some(AnswerKind::Text) && !cues.wants_words {
                return self.format_plain(body);
            }
            return number;
        }
        if hint == Some(AnswerKind::Number) {
            if let Some(number) = number_token_re()
                .find(body)
                .and_then(|m| format_number(m.as_str(), cues))
            {
                return number;
            }
        }
        if body.contains(',') {
            return self.format_list(body, cues);
        }
        self.format_plain(body)
    }

    fn format_plain(&self, body: &str) -> String {
        let collapsed = body.split_whitespace().collect::<Vec<_>>().join(" ");
        if self.case_insensitive {
            collapsed.to_lowercase()
        } else {
            collapsed
        }
    }

    fn format_list(&self, body: &str, cues: QuestionCues) -> String {
        body.split(',')
            .map(|item| {
                let item = strip_wrapping(item);
                item.strip_prefix("and ").map(str::trim).unwrap_or(item)
            })
            .filter(|item| !item.is_empty())
            .map(|item| format_number(item, cues).unwrap_or_else(|| self.format_plain(item)))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(question: &str) -> Task {
        Task::new("t", question, None)
    }

    fn fmt(raw: &str, question: &str) -> String {
        AnswerFormatter::default().format(raw, &task(question)).formatted_text
    }

    #[test]
    fn test_strips_framing() {
        assert_eq!(fmt("Reasoning...\nFINAL ANSWER: Paris", "Capital?"), "Paris");
        assert_eq!(fmt("final answer: **Paris**.", "Capital?"), "Paris");
        assert_eq!(fmt("Step 1\nStep 2\n\"Right\"", "Which?"), "Right");
        assert_eq!(
            fmt("Evaluator final answer: Saint Petersburg", "City?"),
            "Saint Petersburg"
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(fmt("FINAL ANSWER: $1,234.50", "How much?"), "1234.5");
        assert_eq!(fmt("FINAL ANSWER: 89706.00", "Total sales?"), "89706");
        assert_eq!(fmt("FINAL ANSWER: 89706.00", "Express with two decimal places"), "89706.00");
        assert_eq!(fmt("007", "Number?"), "7");
        assert_eq!(fmt("-0.0", "Number?"), "0");
        assert_eq!(fmt("45%", "Share?"), "45");
        assert_eq!(fmt("12 km", "Distance?"), "12");
        assert_eq!(fmt("-3", "Delta?"), "-3");
    }

    #[test]
    fn test_four_versus_4() {
        assert_eq!(fmt("FINAL ANSWER: 4", "How many albums?"), "4");
        assert_eq!(fmt("FINAL ANSWER: four", "How many albums?"), "four");
        assert_eq!(fmt("FINAL ANSWER: 4", "How many albums? Give the number as a word."), "four");
        assert_eq!(
            fmt("FINAL ANSWER: 1,021", "Write the count in words."),
            "one thousand twenty-one"
        );
    }

    #[test]
    fn test_lists() {
        assert_eq!(
            fmt("FINAL ANSWER: broccoli,celery ,  lettuce", "Give a comma separated list"),
            "broccoli, celery, lettuce"
        );
        assert_eq!(fmt("FINAL ANSWER: b, e", "Which elements?"), "b, e");
        assert_eq!(fmt("FINAL ANSWER: [3, 1.50, 2]", "comma-separated"), "3, 1.5, 2");
        assert_eq!(fmt("FINAL ANSWER: a, b, and c", "List them"), "a, b, c");
        assert_eq!(
            fmt("FINAL ANSWER: Oslo; Bergen", "Give me the list of cities"),
            "Oslo; Bergen"
        );
    }

    #[test]
    fn test_grouped_number_not_split_by_list_mention() {
        assert_eq!(
            fmt(
                "FINAL ANSWER: 12,345",
                "According to the list on the page, how many residents are there?"
            ),
            "12345"
        );
        assert_eq!(fmt("FINAL ANSWER: 12,345", "Provide a list of the counts"), "12345");
        assert_eq!(fmt("FINAL ANSWER: 12, 345", "Provide a list of the counts"), "12, 345");
    }

    #[test]
    fn test_text_case_policy() {
        assert_eq!(fmt("FINAL ANSWER:   Right   Bank", "Where?"), "Right Bank");
        let lower = AnswerFormatter::new(true, FALLBACK_ANSWER);
        assert_eq!(lower.format("Right Bank", &task("Where?")).formatted_text, "right bank");
    }

    #[test]
    fn test_empty_becomes_fallback() {
        assert_eq!(fmt("", "q"), FALLBACK_ANSWER);
        assert_eq!(fmt("FINAL ANSWER: \"\"", "q"), FALLBACK_ANSWER);
        assert_eq!(fmt("FINAL ANSWER: , ,", "q"), FALLBACK_ANSWER);
    }

    #[test]
    fn test_idempotent() {
        let cases = [
            ("FINAL ANSWER: $1,234.50", "How much?"),
            ("FINAL ANSWER: 4", "Answer as a word"),
            ("FINAL ANSWER: [3, 1.50, 2]", "comma-separated"),
            ("FINAL ANSWER: **Paris**.", "Capital?"),
            ("", "q"),
            ("x\nFINAL ANSWER: 2.50", "to two decimal places"),
            ("FINAL ANSWER: a, b, and c", "List them"),
        ];
        for (raw, question) in cases {
            let once = fmt(raw, question);
            assert_eq!(fmt(&once, question), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn test_hints() {
        let f = AnswerFormatter::default();
        let t = task("What is the zip code?");
        assert_eq!(
            f.format_with_hint("FINAL ANSWER: 00501", &t, Some(AnswerKind::Text)).formatted_text,
            "00501"
        );
        assert_eq!(
            f.format_with_hint("FINAL ANSWER: about 42 units", &t, Some(AnswerKind::Number)).formatted_text,
            "42"
        );
        assert_eq!(
            f.format_with_hint("FINAL ANSWER: 3", &task("Spell out the number"), Some(AnswerKind::Text))
                .formatted_text,
            "three"
        );
    }

    #[test]
    fn test_number_to_words() {
        assert_eq!(number_to_words(0).as_deref(), Some("zero"));
        assert_eq!(number_to_words(40).as_deref(), Some("forty"));
        assert_eq!(number_to_words(115).as_deref(), Some("one hundred fifteen"));
        assert_eq!(number_to_words(200_000).as_deref(), Some("two hundred thousand"));
        assert_eq!(number_to_words(1_000_000), None);
    }
}
