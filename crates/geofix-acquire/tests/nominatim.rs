//! Reverse-geocoding behavior against a mocked Nominatim endpoint.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use geofix_acquire::{AddressResolver, NominatimResolver};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mock_reverse(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/reverse"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_prefers_city_and_appends_state() {
    let server = MockServer::start().await;
    mock_reverse(
        &server,
        json!({
            "address": {
                "city": "Warszawa",
                "municipality": "gmina Warszawa",
                "state": "Mazowieckie",
                "country": "Polska"
            }
        }),
    )
    .await;

    let resolver = NominatimResolver::with_base_url(&server.uri()).unwrap();
    let name = resolver.resolve(52.2297, 21.0122, "pl").await;
    assert_eq!(name.as_deref(), Some("Warszawa, Mazowieckie"));
}

#[tokio::test]
async fn test_falls_back_to_village_with_country() {
    let server = MockServer::start().await;
    mock_reverse(
        &server,
        json!({
            "address": {
                "village": "Chocholow",
                "country": "Poland"
            }
        }),
    )
    .await;

    let resolver = NominatimResolver::with_base_url(&server.uri()).unwrap();
    let name = resolver.resolve(49.26, 19.82, "en").await;
    assert_eq!(name.as_deref(), Some("Chocholow, Poland"));
}

#[tokio::test]
async fn test_duplicate_place_and_country_is_not_repeated() {
    let server = MockServer::start().await;
    mock_reverse(&server, json!({ "address": { "country": "Monaco" } })).await;

    let resolver = NominatimResolver::with_base_url(&server.uri()).unwrap();
    let name = resolver.resolve(43.73, 7.42, "en").await;
    assert_eq!(name.as_deref(), Some("Monaco"));
}

#[tokio::test]
async fn test_forwards_language_preference() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/reverse"))
        .and(query_param("accept-language", "de"))
        .and(query_param("format", "json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "address": { "city": "Wien", "country": "Osterreich" } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let resolver = NominatimResolver::with_base_url(&server.uri()).unwrap();
    let name = resolver.resolve(48.2082, 16.3738, "de").await;
    assert_eq!(name.as_deref(), Some("Wien, Osterreich"));
}

#[tokio::test]
async fn test_server_error_yields_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/reverse"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let resolver = NominatimResolver::with_base_url(&server.uri()).unwrap();
    assert!(resolver.resolve(52.0, 21.0, "en").await.is_none());
}

#[tokio::test]
async fn test_missing_address_yields_none() {
    let server = MockServer::start().await;
    mock_reverse(&server, json!({ "error": "Unable to geocode" })).await;

    let resolver = NominatimResolver::with_base_url(&server.uri()).unwrap();
    assert!(resolver.resolve(0.0, 0.0, "en").await.is_none());
}
