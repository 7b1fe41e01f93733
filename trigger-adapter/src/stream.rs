//! Turn a `StreamBroker` SSE response into a sequence of typed
//! [`StreamEvent`]s for a [`crate::adapter::TriggerAdapter`]'s `respond` to
//! render.
//!
//! Unlike the StreamBroker's own passthrough (which must forward bytes
//! unparsed to preserve P8 end-to-end), an adapter consuming the stream is
//! exactly the place typed interpretation belongs — it needs to branch on
//! `question` vs `result` vs `error` to decide how to render a reply.

use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt};
use sandbox_runtime::events::StreamEvent;

use crate::error::{AdapterError, Result};

/// Consume an `/investigate` or `/interrupt` SSE response, yielding each
/// `StreamEvent` in the order it was received. A line that fails to parse is
/// surfaced as `Err` rather than silently dropped — the adapter can decide
/// whether to end the conversation or keep reading later events.
pub fn consume(response: reqwest::Response) -> impl Stream<Item = Result<StreamEvent>> {
    response.bytes_stream().eventsource().map(|event| {
        let event = event.map_err(|err| AdapterError::MalformedEvent(err.to_string()))?;
        serde_json::from_str::<StreamEvent>(&event.data)
            .map_err(|err| AdapterError::MalformedEvent(format!("{err}: {}", event.data)))
    })
}

/// Drive a stream to completion, calling `on_event` for each one in order.
/// Stops at the first terminal event (`result`/`error`) or the first
/// malformed event, matching the StreamBroker's own end-of-stream policy.
pub async fn drive<F>(response: reqwest::Response, mut on_event: F) -> Result<()>
where
    F: FnMut(StreamEvent) -> Result<()>,
{
    let mut stream = Box::pin(consume(response));
    while let Some(event) = stream.next().await {
        let event = event?;
        let terminal = event.is_terminal();
        on_event(event)?;
        if terminal {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_sse_response(body: &'static str) -> reqwest::Response {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;
        let url = format!("{}/stream", server.uri());
        std::mem::forget(server);
        reqwest::get(url).await.unwrap()
    }

    #[tokio::test]
    async fn drives_events_in_order_and_stops_at_terminal() {
        let body = "data: {\"type\":\"thought\",\"data\":{\"text\":\"thinking\"},\"thread_id\":\"t1\"}\n\ndata: {\"type\":\"result\",\"data\":{\"text\":\"done\",\"success\":true,\"subtype\":\"final\"},\"thread_id\":\"t1\"}\n\ndata: {\"type\":\"thought\",\"data\":{\"text\":\"unreachable\"},\"thread_id\":\"t1\"}\n\n";
        let response = mock_sse_response(body).await;
        let mut seen = Vec::new();
        drive(response, |event| {
            seen.push(event.tag().to_string());
            Ok(())
        })
        .await
        .unwrap();
        assert_eq!(seen, vec!["thought", "result"]);
    }
}
