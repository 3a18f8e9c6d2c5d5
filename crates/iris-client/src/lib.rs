//! Iris gateway sidecar client.
//!
//! Covers the two sidecar endpoints the dispatch layer depends on:
//! `GET /aot` for the short-lived access token and device id, and
//! `POST /query` for single-statement lookups against the room/member store.

mod client;
mod error;
mod rooms;
mod types;

pub use client::IrisClient;
pub use error::IrisError;
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_client(mock_server: &MockServer) -> IrisClient {
        IrisClient::new(mock_server.uri()).unwrap()
    }

    async fn mount_query(mock_server: &MockServer, needle: &str, bind: &str, rows: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/query"))
            .and(body_string_contains(needle))
            .and(body_partial_json(json!({ "bind": [bind] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": rows })))
            .mount(mock_server)
            .await;
    }

    #[tokio::test]
    async fn test_aot_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/aot"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "aot": { "access_token": "AT1", "d_id": "DEV1" }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        let aot = client.aot().await.unwrap();

        assert_eq!(aot.access_token.expose_secret(), "AT1");
        assert_eq!(aot.device_id, "DEV1");
    }

    #[tokio::test]
    async fn test_aot_not_successful() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/aot"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": false })))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        let result = client.aot().await;
        assert!(matches!(result, Err(IrisError::AotRejected)));
    }

    #[tokio::test]
    async fn test_aot_missing_device_id() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/aot"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "aot": { "access_token": "AT1", "d_id": "" }
            })))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        let result = client.aot().await;
        assert!(matches!(result, Err(IrisError::MissingField("d_id"))));
    }

    #[tokio::test]
    async fn test_aot_http_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/aot"))
            .respond_with(ResponseTemplate::new(503).set_body_string("starting"))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        let result = client.aot().await;
        assert!(matches!(result, Err(IrisError::Api { status: 503, .. })));
        assert!(!client.health_check().await);
    }

    #[tokio::test]
    async fn test_aot_requires_ok_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/aot"))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({
                "success": true,
                "aot": { "access_token": "AT1", "d_id": "DEV1" }
            })))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        let result = client.aot().await;
        assert!(matches!(result, Err(IrisError::Api { status: 202, .. })));
    }

    #[tokio::test]
    async fn test_query_rows() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/query"))
            .and(body_partial_json(json!({
                "query": "SELECT 1 AS one",
                "bind": []
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "data": [{ "one": 1 }] })),
            )
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        let rows = client.query("SELECT 1 AS one", &[]).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text("one"), Some("1".into()));
    }

    #[tokio::test]
    async fn test_query_null_data() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": null })))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        let rows = client.query("SELECT 1", &[]).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_link_id_numeric() {
        let mock_server = MockServer::start().await;
        mount_query(
            &mock_server,
            "chat_rooms",
            "555",
            json!([{ "id": 555, "link_id": 987654321, "type": "OM" }]),
        )
        .await;

        let client = create_test_client(&mock_server);
        let link_id = client.link_id("555").await.unwrap();
        assert_eq!(link_id, Some("987654321".into()));
    }

    #[tokio::test]
    async fn test_link_id_not_open_chat() {
        let mock_server = MockServer::start().await;
        mount_query(
            &mock_server,
            "chat_rooms",
            "556",
            json!([{ "id": 556, "link_id": null, "type": "MultiChat" }]),
        )
        .await;

        let client = create_test_client(&mock_server);
        assert_eq!(client.link_id("556").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_link_id_room_missing() {
        let mock_server = MockServer::start().await;
        mount_query(&mock_server, "chat_rooms", "557", json!([])).await;

        let client = create_test_client(&mock_server);
        let result = client.link_id("557").await;
        assert!(matches!(result, Err(IrisError::RoomNotFound(id)) if id == "557"));
    }

    #[tokio::test]
    async fn test_room_host() {
        let mock_server = MockServer::start().await;
        mount_query(
            &mock_server,
            "active_member_ids",
            "555",
            json!([{ "active_member_ids": "[1001, 1002]" }]),
        )
        .await;
        mount_query(
            &mock_server,
            "open_chat_member",
            "1001",
            json!([{ "user_id": 1001, "nickname": "guest", "link_member_type": 2 }]),
        )
        .await;
        mount_query(
            &mock_server,
            "open_chat_member",
            "1002",
            json!([{ "user_id": 1002, "nickname": "host", "link_member_type": 1 }]),
        )
        .await;

        let client = create_test_client(&mock_server);
        let host = client.room_host("555").await.unwrap();

        assert_eq!(
            host,
            Some(RoomMember {
                id: 1002,
                name: "host".into()
            })
        );
    }

    #[tokio::test]
    async fn test_room_host_none() {
        let mock_server = MockServer::start().await;
        mount_query(
            &mock_server,
            "active_member_ids",
            "555",
            json!([{ "active_member_ids": null }]),
        )
        .await;

        let client = create_test_client(&mock_server);
        assert_eq!(client.room_host("555").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_member_nicknames() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    { "user_id": 1, "nickname": "alice" },
                    { "user_id": "2", "nickname": "bob" },
                    { "user_id": 3, "nickname": null }
                ]
            })))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        let names = client.member_nicknames().await.unwrap();

        assert_eq!(names.len(), 2);
        assert_eq!(names.get("1"), Some(&"alice".to_string()));
        assert_eq!(names.get("2"), Some(&"bob".to_string()));
    }

    #[tokio::test]
    async fn test_current_post_id() {
        let mock_server = MockServer::start().await;
        let ct = json!({ "id": "post-77" }).to_string();
        let meta = json!([{ "ct": ct }]).to_string();
        mount_query(
            &mock_server,
            "moim_meta",
            "555",
            json!([{ "moim_meta": meta }]),
        )
        .await;

        let client = create_test_client(&mock_server);
        let post_id = client.current_post_id("555").await.unwrap();
        assert_eq!(post_id, Some("post-77".into()));
    }

    #[tokio::test]
    async fn test_current_post_id_without_meta() {
        let mock_server = MockServer::start().await;
        mount_query(&mock_server, "moim_meta", "555", json!([{ "moim_meta": "" }])).await;

        let client = create_test_client(&mock_server);
        assert_eq!(client.current_post_id("555").await.unwrap(), None);
    }
}
