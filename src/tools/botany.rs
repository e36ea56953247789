//! classify_plant_parts：按植物学定义对食材分类（fruit / vegetable / nut / grain ...）

use std::collections::BTreeMap;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::tools::schema::args_schema;
use crate::tools::Tool;

const BOTANICAL: &[(&str, &str)] = &[
    ("milk", "unknown"),
    ("eggs", "unknown"),
    ("flour", "grain"),
    ("whole bean coffee", "seed"),
    ("oreos", "unknown"),
    ("sweet potatoes", "vegetable"),
    ("fresh basil", "vegetable"),
    ("plums", "fruit"),
    ("green beans", "fruit"),
    ("rice", "grain"),
    ("corn", "fruit"),
    ("bell pepper", "fruit"),
    ("whole allspice", "spice"),
    ("acorns", "nut"),
    ("broccoli", "vegetable"),
    ("celery", "vegetable"),
    ("zucchini", "fruit"),
    ("lettuce", "vegetable"),
    ("peanuts", "nut"),
];

#[derive(Deserialize, JsonSchema)]
struct ClassifyArgs {
    /// 待分类的食材名
    items: Vec<String>,
}

pub fn classify(item: &str) -> &'static str {
    let key = item.trim().to_lowercase();
    BOTANICAL
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, category)| *category)
        .unwrap_or("unknown")
}

pub struct ClassifyPlantPartsTool;

#[async_trait]
impl Tool for ClassifyPlantPartsTool {
    fn name(&self) -> &str {
        "classify_plant_parts"
    }

    fn description(&self) -> &str {
        "Classify grocery items by strict botanical definitions (vegetable, fruit, herb, nut, grain, seed, spice or unknown). Returns a mapping from item to category."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<ClassifyArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let args: ClassifyArgs = serde_json::from_value(args).map_err(|e| e.to_string())?;
        let map: BTreeMap<String, &str> = args
            .items
            .into_iter()
            .map(|item| {
                let category = classify(&item);
                (item, category)
            })
            .collect();
        serde_json::to_value(map).map_err(|e| e.to_string())
    }
}
