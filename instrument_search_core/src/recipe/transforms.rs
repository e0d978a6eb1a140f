//! Post-processing of detail documents.

use crate::config::DetailTransform;
use serde_json::{json, Map, Value};

const COMMONS_FILE_PATH: &str = "https://commons.wikimedia.org/wiki/Special:FilePath/";
const COMMONS_THUMB_WIDTH: u32 = 800;

/// Apply transforms in declaration order.
pub fn apply_all(document: Value, transforms: &[DetailTransform]) -> Value {
    transforms
        .iter()
        .fold(document, |doc, transform| apply(doc, transform))
}

pub fn apply(document: Value, transform: &DetailTransform) -> Value {
    match transform {
        DetailTransform::WikidataFlatten { prefer_langs } => wikidata_flatten(&document, prefer_langs),
        DetailTransform::TrimStrings => trim_strings(document),
    }
}

/// Flatten a `wbgetentities` response to its first entity.
///
/// Produces `qid`, `label`, `description`, `aliases` and the raw `claims`.
/// An image claim (P18) adds `image_filename` and a Commons `image_url`.
pub fn wikidata_flatten(document: &Value, prefer_langs: &[String]) -> Value {
    let Some(entity) = document
        .get("entities")
        .and_then(Value::as_object)
        .and_then(|entities| entities.values().next())
    else {
        return Value::Object(Map::new());
    };

    let aliases: Vec<Value> = prefer_langs
        .iter()
        .filter_map(|lang| entity.get("aliases")?.get(lang)?.as_array())
        .flatten()
        .filter_map(|alias| alias.get("value").cloned())
        .collect();

    let mut out = json!({
        "qid": entity.get("id").cloned().unwrap_or(Value::Null),
        "label": pick_lang(entity.get("labels"), prefer_langs),
        "description": pick_lang(entity.get("descriptions"), prefer_langs),
        "aliases": aliases,
        "claims": entity.get("claims").cloned().unwrap_or_else(|| json!({})),
    });

    let image = entity
        .pointer("/claims/P18/0/mainsnak/datavalue/value")
        .and_then(Value::as_str);
    if let (Some(filename), Some(map)) = (image, out.as_object_mut()) {
        let url = format!(
            "{}{}?width={}",
            COMMONS_FILE_PATH,
            urlencoding::encode(&filename.replace(' ', "_")),
            COMMONS_THUMB_WIDTH
        );
        map.insert("image_filename".to_string(), json!(filename));
        map.insert("image_url".to_string(), json!(url));
    }

    out
}

/// First preferred language with a value, else any language.
fn pick_lang(bag: Option<&Value>, prefer_langs: &[String]) -> Value {
    let Some(bag) = bag.and_then(Value::as_object) else {
        return Value::Null;
    };
    let text_of = |entry: &Value| {
        entry
            .get("value")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(|s| Value::String(s.to_string()))
    };
    prefer_langs
        .iter()
        .filter_map(|lang| bag.get(lang))
        .find_map(text_of)
        .or_else(|| bag.values().find_map(text_of))
        .unwrap_or(Value::Null)
}

/// Trim every string leaf.
pub fn trim_strings(document: Value) -> Value {
    match document {
        Value::String(s) => Value::String(s.trim().to_string()),
        Value::Array(items) => Value::Array(items.into_iter().map(trim_strings).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, trim_strings(v)))
                .collect(),
        ),
        other => other,
    }
}
