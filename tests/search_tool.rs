//! End-to-end search: free-text query in, WordPress request out, snippets back.

use caschy::search::{SearchClient, SearchResult};
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api_base(server: &MockServer) -> Url {
    Url::parse(&format!("{}/wp-json/wp/v2", server.uri())).unwrap()
}

#[tokio::test]
async fn test_query_filters_reach_the_api() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/posts"))
        .and(query_param("search", "Kindle"))
        .and(query_param("after", "2024-01-01T00:00:00"))
        .and(query_param("per_page", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {
                "id": 7,
                "date": "2024-02-09T07:45:00",
                "title": {"rendered": "Kindle &#8211; neue Firmware"},
                "link": "https://blog.example.com/kindle-firmware/",
                "excerpt": {"rendered": "<p>Amazon verteilt ein Update.</p>\n"},
                "author": 3
            }
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/users/3"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"name": "Sascha Ostermaier"})),
        )
        .mount(&server)
        .await;

    let client = SearchClient::new(api_base(&server)).unwrap().with_per_page(5);
    let results = client.search("Kindle after 2024-01-01").await;

    assert_eq!(
        results,
        vec![SearchResult {
            title: "Kindle &#8211; neue Firmware".to_string(),
            url: "https://blog.example.com/kindle-firmware/".to_string(),
            snippet: "9.2.2024 | Sascha Ostermaier | Amazon verteilt ein Update.\n...".to_string(),
        }]
    );

    let json = serde_json::to_value(&results).unwrap();
    assert_eq!(json[0]["url"], "https://blog.example.com/kindle-firmware/");
}

#[tokio::test]
async fn test_unreachable_api_returns_no_results() {
    // Nothing listens on the discard port.
    let client = SearchClient::new(Url::parse("http://127.0.0.1:9/wp-json/wp/v2").unwrap()).unwrap();
    assert!(client.search("anything").await.is_empty());
}
