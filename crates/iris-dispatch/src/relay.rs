//! Line-oriented relay from stdin to the background send pool.

use talk_client::{Completion, DispatchClient, DispatchResult, OutboundMessage};
use tracing::{error, info, warn};

/// Split `<room_id> <text>`. Blank text or a missing room id yields `None`.
pub fn parse_line(line: &str) -> Option<(&str, &str)> {
    let (room_id, text) = line.trim().split_once(char::is_whitespace)?;
    let text = text.trim_start();
    if room_id.is_empty() || text.is_empty() {
        return None;
    }
    Some((room_id, text))
}

/// Queue one input line for sending. Delivery is logged when it completes.
pub async fn relay_line(client: &DispatchClient, endpoint: &str, line: &str) {
    let Some((room_id, text)) = parse_line(line) else {
        if !line.trim().is_empty() {
            warn!("Ignoring malformed line (expected '<room_id> <text>')");
        }
        return;
    };

    let room = room_id.to_string();
    let on_complete: Completion = Box::new(move |result: DispatchResult| {
        if result.is_success() {
            info!(room_id = %room, "Message delivered");
        } else {
            warn!(room_id = %room, failure = ?result.failure, "Message failed: {}", result.to_json());
        }
    });

    let message = OutboundMessage::new(room_id, text);
    if let Err(e) = client
        .send_message_async(endpoint, message, Some(on_complete))
        .await
    {
        error!("Could not queue message for room {}: {}", room_id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use talk_client::{DispatchOptions, InlineExecutor};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("555 hello world"), Some(("555", "hello world")));
        assert_eq!(parse_line("  555\t  hi "), Some(("555", "hi")));
        assert_eq!(parse_line("555"), None);
        assert_eq!(parse_line("555   "), None);
        assert_eq!(parse_line(""), None);
    }

    #[tokio::test]
    async fn test_relay_line_sends_message() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/aot"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "aot": { "access_token": "AT1", "d_id": "DEV1" }
            })))
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/talk/write"))
            .and(body_partial_json(json!({ "chatId": "555", "message": "hello there" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": 0 })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let options = DispatchOptions {
            write_url: format!("{}/talk/write", mock_server.uri()),
            ..DispatchOptions::default()
        };
        let client = DispatchClient::with_executor(options, Arc::new(InlineExecutor)).unwrap();

        relay_line(&client, &mock_server.uri(), "555 hello there").await;
        relay_line(&client, &mock_server.uri(), "malformed").await;
    }
}
