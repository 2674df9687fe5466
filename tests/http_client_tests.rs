use gallery_chat::providers::gallery::{GalleryChatChunk, GalleryChatReq};
use gallery_chat::{
  ChatClient, Error, GalleryApi, GalleryChatClient, GalleryConfig,
  HttpGalleryClient, Message, Prompt, RetryConfig, StreamCallback,
};
use std::sync::Mutex;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> GalleryConfig
{   GalleryConfig::new(server.uri())
      .with_api_key("test-key")
      .with_retry(RetryConfig
      {   max_attempts: 2
        , backoff_multiplier: 1.0
        , initial_backoff_ms: 1
      })
}

fn completion() -> serde_json::Value
{   serde_json::json!({
      "id": "chatcmpl-1",
      "created": 1700000000,
      "choices": [
        {"index": 0, "message": {"role": "assistant", "content": "Paris"}, "finish_reason": "stop"}
      ],
      "usage": {"prompt_tokens": 9, "completion_tokens": 1, "total_tokens": 10}
    })
}

#[derive(Default)]
struct Recorder
{   chunks: Mutex<Vec<GalleryChatChunk>>
  , completed: Mutex<bool>
  , failed: Mutex<Option<Error>>
}

impl StreamCallback for Recorder
{   fn on_message(&self, chunk: &GalleryChatChunk)
    {   self.chunks.lock().unwrap().push(chunk.clone());
    }

    fn on_complete(&self)
    {   *self.completed.lock().unwrap() = true;
    }

    fn on_error(&self, error: &Error)
    {   *self.failed.lock().unwrap() = Some(error.clone());
    }
}

#[tokio::test]
async fn text_call_posts_single_user_message()
{   let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .and(header("authorization", "Bearer test-key"))
      .and(body_partial_json(serde_json::json!({
        "messages": [{"role": "user", "content": "Capital of France?"}],
        "stream": false
      })))
      .respond_with(ResponseTemplate::new(200).set_body_json(completion()))
      .expect(1)
      .mount(&server)
      .await;

    let client = HttpGalleryClient::new(&config_for(&server)).unwrap();
    let resp = client.create_chat_text("Capital of France?")
      .await
      .unwrap()
      .unwrap();

    assert_eq!(resp.id, "chatcmpl-1");
    assert_eq!(resp.choices[0].message.content, "Paris");
    assert_eq!(resp.usage.unwrap().total_tokens, 10);
}

#[tokio::test]
async fn no_content_maps_to_none()
{   let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .respond_with(ResponseTemplate::new(204))
      .mount(&server)
      .await;

    let client = HttpGalleryClient::new(&config_for(&server)).unwrap();
    let resp = client.create_chat(&GalleryChatReq::from_text("x", false))
      .await
      .unwrap();
    assert!(resp.is_none());
}

#[tokio::test]
async fn status_codes_map_to_errors()
{   let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(body_partial_json(serde_json::json!({
        "messages": [{"content": "limited"}]
      })))
      .respond_with(ResponseTemplate::new(429))
      .mount(&server)
      .await;
    Mock::given(method("POST"))
      .and(body_partial_json(serde_json::json!({
        "messages": [{"content": "broken"}]
      })))
      .respond_with(ResponseTemplate::new(400).set_body_string("bad input"))
      .mount(&server)
      .await;
    Mock::given(method("POST"))
      .and(body_partial_json(serde_json::json!({
        "messages": [{"content": "garbled"}]
      })))
      .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
      .mount(&server)
      .await;

    let client = HttpGalleryClient::new(&config_for(&server)).unwrap();

    assert_eq!(
      client.create_chat_text("limited").await.unwrap_err(),
      Error::RateLimitExceeded
    );
    assert_eq!(
      client.create_chat_text("broken").await.unwrap_err(),
      Error::ApiError { status: 400, message: "bad input".to_string() }
    );
    assert!(matches!(
      client.create_chat_text("garbled").await.unwrap_err(),
      Error::ParseError(_)
    ));
}

#[tokio::test]
async fn stream_accumulates_sse_chunks()
{   let server = MockServer::start().await;
    let body = concat!(
      "data: {\"id\":\"s-1\",\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"Par\"}}]}\n\n",
      ": keep-alive\n\n",
      "data: {\"id\":\"s-1\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"is\"},\"finish_reason\":\"stop\"}],",
      "\"usage\":{\"prompt_tokens\":9,\"completion_tokens\":2,\"total_tokens\":11}}\n\n",
      "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
      .and(body_partial_json(serde_json::json!({"stream": true})))
      .respond_with(
        ResponseTemplate::new(200)
          .insert_header("content-type", "text/event-stream")
          .set_body_string(body)
      )
      .mount(&server)
      .await;

    let client = HttpGalleryClient::new(&config_for(&server)).unwrap();
    let recorder = Recorder::default();
    let resp = client.create_stream_chat_text("Capital?", &recorder)
      .await
      .unwrap()
      .unwrap();

    assert_eq!(resp.id, "s-1");
    assert_eq!(resp.choices.len(), 1);
    assert_eq!(resp.choices[0].message.content, "Paris");
    assert_eq!(resp.choices[0].finish_reason.as_deref(), Some("stop"));
    assert_eq!(resp.usage.unwrap().completion_tokens, 2);
    assert_eq!(recorder.chunks.lock().unwrap().len(), 2);
    assert!(*recorder.completed.lock().unwrap());
    assert!(recorder.failed.lock().unwrap().is_none());
}

#[tokio::test]
async fn stream_joins_multi_line_event_data()
{   let server = MockServer::start().await;
    let body = concat!(
      "data: {\"id\":\"s-2\",\n",
      "data: \"choices\":[{\"index\":0,\"delta\":{\"content\":\"Paris\"}}]}\n\n",
      "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
      .respond_with(
        ResponseTemplate::new(200)
          .insert_header("content-type", "text/event-stream")
          .set_body_string(body)
      )
      .mount(&server)
      .await;

    let client = HttpGalleryClient::new(&config_for(&server)).unwrap();
    let recorder = Recorder::default();
    let resp = client.create_stream_chat_text("Capital?", &recorder)
      .await
      .unwrap()
      .unwrap();

    assert_eq!(resp.id, "s-2");
    assert_eq!(resp.choices[0].message.content, "Paris");
    assert_eq!(recorder.chunks.lock().unwrap().len(), 1);
    assert!(recorder.failed.lock().unwrap().is_none());
}

#[tokio::test]
async fn stream_ignores_events_after_done()
{   let server = MockServer::start().await;
    let body = concat!(
      "data: {\"id\":\"s-3\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"ok\"}}]}\n\n",
      "data: [DONE]\n\n",
      "data: {trailing garbage",
    );
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(200).set_body_string(body))
      .mount(&server)
      .await;

    let client = HttpGalleryClient::new(&config_for(&server)).unwrap();
    let recorder = Recorder::default();
    let resp = client.create_stream_chat_text("x", &recorder)
      .await
      .unwrap()
      .unwrap();

    assert_eq!(resp.choices[0].message.content, "ok");
    assert_eq!(recorder.chunks.lock().unwrap().len(), 1);
    assert!(*recorder.completed.lock().unwrap());
}

#[tokio::test]
async fn stream_errors_reach_callback()
{   let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(200).set_body_string("data: {oops\n\n"))
      .mount(&server)
      .await;

    let client = HttpGalleryClient::new(&config_for(&server)).unwrap();
    let recorder = Recorder::default();
    let err = client
      .create_stream_chat(&GalleryChatReq::from_text("x", true), &recorder)
      .await
      .unwrap_err();

    assert!(matches!(err, Error::ParseError(_)));
    assert_eq!(*recorder.failed.lock().unwrap(), Some(err));
    assert!(!*recorder.completed.lock().unwrap());
}

#[tokio::test]
async fn adapter_retries_server_errors_over_http()
{   let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
      .expect(2)
      .mount(&server)
      .await;

    let client = GalleryChatClient::from_config(&config_for(&server)).unwrap();
    let prompt = Prompt::new(vec![
      Message::system("Be brief.")
    , Message::user("Capital of France?")
    ]);
    let err = client.call(&prompt).await.unwrap_err();

    assert_eq!(err, Error::ApiError
    {   status: 503
      , message: "overloaded".to_string()
    });
}

#[tokio::test]
async fn adapter_sends_merged_options_over_http()
{   let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(body_partial_json(serde_json::json!({
        "messages": [
          {"role": "system", "content": "Be brief."},
          {"role": "user", "content": "Capital of France?"}
        ],
        "top_p": 1.0,
        "max_tokens": 64,
        "stream": false
      })))
      .respond_with(ResponseTemplate::new(200).set_body_json(completion()))
      .expect(1)
      .mount(&server)
      .await;

    let client = GalleryChatClient::from_config(&config_for(&server)).unwrap();
    let prompt = Prompt::new(vec![
      Message::system("Be brief.")
    , Message::user("Capital of France?")
    ])
    .with_options(gallery_chat::GalleryChatOptions::builder()
      .max_tokens(64)
      .build());

    let reply = client.call(&prompt).await.unwrap();
    assert_eq!(reply.result().unwrap().text, "Paris");
    assert_eq!(reply.generations[0].info["finishReason"], "stop");
}
