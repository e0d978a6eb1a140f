use instrument_search_core::identity;
use instrument_search_core::{
    Aggregator, IdentifierError, InstrumentSearch, MappingOutcome, MemoryFetcher, RecipeEngine,
    Settings,
};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

const TWO_PROVIDERS: &str = r#"
    [generic_search]
    min_search_len = 1

    [[generic_search.providers]]
    id_prefix = "ex"
    text_prefix = "Example:"
    base_url = "https://ex.example.org"
    max_hits = 2
    timeout_ms = 200
    [generic_search.providers.search]
    mode = "server"
    url = "{base_url}/search?q={query}"
    id_path = "id"
    label_path = "name"
    [[generic_search.providers.detail.steps]]
    url = "{base_url}/items/{id}"

    [[generic_search.providers]]
    id_prefix = "slow"
    text_prefix = "Slow:"
    base_url = "https://slow.example.org"
    timeout_ms = 200
    [generic_search.providers.search]
    url = "{base_url}/q/{query}"
    items_path = "hits"
    id_path = "key"
    label_path = "title"

    [[generic_search.handlers]]
    id_prefix = "ex"
    catalog_uri = "https://rdmo.example.org/catalog"
    auto_complete_field_uri = "https://rdmo.example.org/question/instrument"
    [generic_search.handlers.attribute_mapping]
    "longName" = "U1"
    "serialNumber" = "U2"
"#;

fn aggregator(config: &str, fetcher: MemoryFetcher) -> Aggregator {
    let settings = Arc::new(Settings::from_toml_str(config).unwrap());
    Aggregator::new(settings, RecipeEngine::new(Arc::new(fetcher)))
}

fn ex_items() -> serde_json::Value {
    json!([
        {"id": "1", "name": "Alpha"},
        {"id": "2", "name": "Beta"},
        {"id": "3", "name": "Gamma"}
    ])
}

#[tokio::test]
async fn test_per_provider_limit_and_identifiers() {
    let fetcher = MemoryFetcher::new()
        .with_json("https://ex.example.org/search?q=a", ex_items())
        .with_json("https://slow.example.org/q/a", json!({"hits": []}));
    let aggregator = aggregator(TWO_PROVIDERS, fetcher);

    let response = aggregator.search("a", 1).await;
    let labels: Vec<_> = response.results.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(labels, vec!["Example: Alpha", "Example: Beta"]);

    let decoded: Vec<_> = response
        .results
        .iter()
        .map(|r| identity::decode(aggregator.settings(), &r.external_id.to_string()).unwrap())
        .map(|id| (id.id_prefix().to_string(), id.native_id().to_string()))
        .collect();
    assert_eq!(
        decoded,
        vec![
            ("ex".to_string(), "1".to_string()),
            ("ex".to_string(), "2".to_string())
        ]
    );
}

#[tokio::test]
async fn test_timeout_does_not_hide_other_providers() {
    let fetcher = MemoryFetcher::new()
        .with_json("https://ex.example.org/search?q=alpha", ex_items())
        .with_json(
            "https://slow.example.org/q/alpha",
            json!({"hits": [{"key": "s1", "title": "Never"}]}),
        )
        .with_delay("https://slow.example.org/q/alpha", Duration::from_secs(5));
    let aggregator = aggregator(TWO_PROVIDERS, fetcher);

    let started = Instant::now();
    let response = aggregator.search_default("alpha").await;
    assert!(started.elapsed() < Duration::from_secs(2));

    assert_eq!(response.len(), 2);
    assert!(response.partial);
    assert_eq!(response.completed, vec!["ex"]);
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].provider, "slow");
    assert!(response.errors[0].is_timeout);
}

#[tokio::test]
async fn test_merge_order_ignores_completion_order() {
    let slow_hits = json!({"hits": [{"key": "s1", "title": "Seismo"}]});
    let mut orders = Vec::new();

    for (ex_delay, slow_delay) in [(60, 0), (0, 60)] {
        let fetcher = MemoryFetcher::new()
            .with_json("https://ex.example.org/search?q=seis", ex_items())
            .with_json("https://slow.example.org/q/seis", slow_hits.clone())
            .with_delay(
                "https://ex.example.org/search?q=seis",
                Duration::from_millis(ex_delay),
            )
            .with_delay(
                "https://slow.example.org/q/seis",
                Duration::from_millis(slow_delay),
            );
        let response = aggregator(TWO_PROVIDERS, fetcher).search("seis", 1).await;
        orders.push(
            response
                .results
                .iter()
                .map(|r| r.external_id.to_string())
                .collect::<Vec<_>>(),
        );
    }

    assert_eq!(orders[0], vec!["ex:1", "ex:2", "slow:s1"]);
    assert_eq!(orders[0], orders[1]);
}

#[tokio::test]
async fn test_global_cap_applies_after_merge() {
    let config = TWO_PROVIDERS.replace("min_search_len = 1", "min_search_len = 1\nmax_total_hits = 3");
    let fetcher = MemoryFetcher::new()
        .with_json("https://ex.example.org/search?q=x", ex_items())
        .with_json(
            "https://slow.example.org/q/x",
            json!({"hits": [{"key": "s1"}, {"key": "s2"}, {"key": "s3"}]}),
        );

    let response = aggregator(&config, fetcher).search("x", 1).await;
    let ids: Vec<_> = response
        .results
        .iter()
        .map(|r| r.external_id.to_string())
        .collect();
    assert_eq!(ids, vec!["ex:1", "ex:2", "slow:s1"]);
    assert_eq!(response.results[2].label, "Slow: s1");
}

#[tokio::test]
async fn test_dropping_search_cancels_branches() {
    let fetcher = MemoryFetcher::new()
        .with_json("https://ex.example.org/search?q=abc", ex_items())
        .with_delay("https://ex.example.org/search?q=abc", Duration::from_secs(10))
        .with_json("https://slow.example.org/q/abc", json!({"hits": []}))
        .with_delay("https://slow.example.org/q/abc", Duration::from_secs(10));
    let config = TWO_PROVIDERS.replace("timeout_ms = 200", "timeout_ms = 60000");
    let aggregator = aggregator(&config, fetcher);

    let started = Instant::now();
    let abandoned =
        tokio::time::timeout(Duration::from_millis(50), aggregator.search("abc", 1)).await;
    assert!(abandoned.is_err());
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_selection_maps_present_attributes_only() {
    let fetcher = MemoryFetcher::new().with_json(
        "https://ex.example.org/items/1",
        json!({"longName": "Widget"}),
    );
    let settings = Arc::new(Settings::from_toml_str(TWO_PROVIDERS).unwrap());
    let search = InstrumentSearch::new(settings, Arc::new(fetcher));

    let outcome = search
        .map_detail("ex:1", "https://rdmo.example.org/catalog")
        .await
        .unwrap();
    let MappingOutcome::Mapped { values } = outcome else {
        panic!("expected a mapping");
    };
    assert_eq!(values.len(), 1);
    assert_eq!(values["U1"], json!("Widget"));
    assert!(!values.contains_key("U2"));
}

#[tokio::test]
async fn test_stale_identifier_reported() {
    let settings = Arc::new(Settings::from_toml_str(TWO_PROVIDERS).unwrap());
    let search = InstrumentSearch::new(settings, Arc::new(MemoryFetcher::new()));

    let err = search
        .map_detail("removed:1", "https://rdmo.example.org/catalog")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        instrument_search_core::MappingError::Identifier(IdentifierError::UnknownPrefix { .. })
    ));
}
