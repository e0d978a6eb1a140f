use super::transforms;
use crate::client::{FetchRequest, Fetcher};
use crate::config::ProviderSpec;
use crate::error::ProviderError;
use crate::template::{self, TemplateVars};
use serde_json::{Map, Value};
use tracing::debug;

/// Key holding a non-object final response when earlier steps assign into it.
pub(crate) const RESPONSE_KEY: &str = "response";

pub(super) async fn run(
    fetcher: &dyn Fetcher,
    provider: &ProviderSpec,
    native_id: &str,
) -> Result<Value, ProviderError> {
    let pipeline = &provider.detail;
    if pipeline.is_empty() {
        return Err(ProviderError::NoDetailSteps(provider.id_prefix.clone()));
    }

    let last = pipeline.steps.len() - 1;
    let mut current_id = native_id.to_string();
    let mut assigned: Vec<(String, Value)> = Vec::new();
    let mut document = Value::Null;

    for (index, step) in pipeline.steps.iter().enumerate() {
        let mut vars = TemplateVars::new();
        vars.insert(template::BASE_URL, provider.base_url.clone());
        vars.insert(template::ID, current_id.clone());
        vars.insert(template::ID_ENCODED, urlencoding::encode(&current_id).into_owned());
        vars.insert(template::NATIVE_ID, native_id.to_string());

        let url = step
            .url
            .render(&vars)
            .map_err(|e| ProviderError::Template(e.to_string()))?;
        debug!(provider = %provider.id_prefix, step = index, url = %url, "detail step");

        let response = fetcher
            .fetch(
                FetchRequest::get(url)
                    .with_timeout(provider.timeout)
                    .with_transport(step.transport),
            )
            .await?;

        if index == last {
            document = response;
            break;
        }

        if let Some(extract) = &step.extract {
            current_id =
                extract
                    .evaluate_text(&response)
                    .ok_or_else(|| ProviderError::MissingChainValue {
                        step: index,
                        path: extract.as_str().to_string(),
                    })?;
        }
        if let Some(key) = &step.assign {
            assigned.push((key.clone(), response));
        }
    }

    if !assigned.is_empty() {
        let mut root = match document {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert(RESPONSE_KEY.to_string(), other);
                map
            }
        };
        for (key, value) in assigned {
            root.insert(key, value);
        }
        document = Value::Object(root);
    }

    Ok(transforms::apply_all(document, &pipeline.transforms))
}
