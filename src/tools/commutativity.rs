//! find_non_commutative_elements：检查 Markdown 运算表的交换律反例

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::tools::schema::args_schema;
use crate::tools::Tool;

#[derive(Deserialize, JsonSchema)]
struct TableArgs {
    /// Markdown 表格：首行为表头（左上角为 `*`），第二行为分隔线，其后每行以元素名开头
    table_str: String,
}

fn cells(line: &str) -> Vec<String> {
    let line = line.trim().trim_start_matches('|').trim_end_matches('|');
    line.split('|').map(|c| c.trim().to_string()).collect()
}

/// 返回参与任一交换律反例的元素，按字母序以 ", " 连接；表格可交换时返回空串
pub fn find_non_commutative_elements(table: &str) -> Result<String, String> {
    let rows: Vec<&str> = table
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with('|'))
        .collect();
    if rows.len() < 3 {
        return Err("Table needs a header, a separator and at least one row".to_string());
    }

    let header: Vec<String> = cells(rows[0]).into_iter().skip(1).collect();
    let mut op: HashMap<(String, String), String> = HashMap::new();
    for row in &rows[2..] {
        let parts = cells(row);
        let Some((label, values)) = parts.split_first() else {
            continue;
        };
        for (col, value) in header.iter().zip(values) {
            op.insert((label.clone(), col.clone()), value.clone());
        }
    }

    let mut involved = BTreeSet::new();
    for x in &header {
        for y in &header {
            let xy = op.get(&(x.clone(), y.clone()));
            let yx = op.get(&(y.clone(), x.clone()));
            if xy.is_none() || yx.is_none() {
                return Err(format!("Missing entry for {x} * {y}"));
            }
            if xy != yx {
                involved.insert(x.clone());
                involved.insert(y.clone());
            }
        }
    }
    Ok(involved.into_iter().collect::<Vec<_>>().join(", "))
}

pub struct CommutativityTool;

#[async_trait]
impl Tool for CommutativityTool {
    fn name(&self) -> &str {
        "find_non_commutative_elements"
    }

    fn description(&self) -> &str {
        "Given a binary operation table in Markdown format, return the elements involved in any counterexample to commutativity as a comma-separated list in alphabetical order."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<TableArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let args: TableArgs = serde_json::from_value(args).map_err(|e| e.to_string())?;
        find_non_commutative_elements(&args.table_str).map(Value::String)
    }
}
