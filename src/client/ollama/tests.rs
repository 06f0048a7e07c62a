use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use mockito::Matcher;
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::assembler::EMPTY_RESPONSE_PLACEHOLDER;
use crate::client::{ChannelListener, NoopListener, StreamEvent};
use crate::image::fixtures::png_base64;
use crate::image::ImageMime;
use crate::request::ImageAttachment;
use crate::stream::decode_frames;

#[derive(Default, Clone)]
struct Recorder {
    partials: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    fn listener(&self) -> impl StreamListener + 'static {
        let partials = Arc::clone(&self.partials);
        move |text: &str| partials.lock().push(text.to_string())
    }

    fn partials(&self) -> Vec<String> {
        self.partials.lock().clone()
    }
}

fn client_for(url: String) -> OllamaStreamClient {
    OllamaStreamClient::new(Arc::new(ClientConfig::new(url)))
}

fn generate_request(prompt: &str) -> GenerationRequest {
    GenerationRequest::builder("llama3")
        .prompt(prompt)
        .build()
        .unwrap()
}

#[tokio::test]
async fn generate_stream_assembles_text_and_skips_unrecognized_line() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/generate")
        .match_body(Matcher::PartialJson(json!({
            "model": "llama3",
            "prompt": "Say hello",
            "stream": true
        })))
        .with_status(200)
        .with_header("content-type", "application/x-ndjson")
        .with_body("{\"response\":\"Hel\"}\n{\"response\":\"lo\"}\n{}\n")
        .create_async()
        .await;

    let recorder = Recorder::default();
    let handle = client_for(server.url()).send(generate_request("Say hello"), recorder.listener());
    let response = handle.result().await.unwrap();

    mock.assert_async().await;
    assert_eq!(response.text, "Hello");
    assert!(response.embedded_image.is_none());
    assert_eq!(recorder.partials(), vec!["Hel".to_string(), "Hello".to_string()]);
}

#[tokio::test]
async fn malformed_lines_do_not_truncate_the_answer() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/api/generate")
        .with_status(200)
        .with_body("{\"response\":\"one \"}\n<keep-alive>\n\n{\"response\":\"two\"}\n{\"response\":\"\",\"done\":true}\n")
        .create_async()
        .await;

    let response = client_for(server.url())
        .send(generate_request("count"), NoopListener)
        .result()
        .await
        .unwrap();

    assert_eq!(response.text, "one two");
}

#[tokio::test]
async fn image_requests_use_chat_endpoint_and_surface_inline_images() {
    let mut server = mockito::Server::new_async().await;
    let body = format!(
        "{}\n{}\n",
        json!({"message": {"role": "assistant", "content": "Here: "}}),
        json!({"delta": {"content": format!("![out](data:image/png;base64,{})", png_base64())}}),
    );
    let mock = server
        .mock("POST", "/api/chat")
        .match_body(Matcher::PartialJson(json!({
            "model": "llava",
            "stream": true
        })))
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;

    let request = GenerationRequest::builder("llava")
        .prompt("Draw")
        .image(ImageAttachment::from_bytes(ImageMime::PNG, b"\x89PNG\r\n\x1a\n"))
        .build()
        .unwrap();

    let (listener, mut events) = ChannelListener::channel();
    let response = client_for(server.url())
        .send(request, listener)
        .result()
        .await
        .unwrap();

    mock.assert_async().await;
    assert!(response.text.starts_with("Here: ![out]("));
    assert_eq!(response.embedded_image.as_ref().unwrap().mime, ImageMime::PNG);

    let mut saw_image = false;
    let mut last_len = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            StreamEvent::Partial(text) => {
                assert!(text.len() >= last_len);
                last_len = text.len();
            }
            StreamEvent::Image(image) => {
                saw_image = true;
                assert_eq!(image.mime, ImageMime::PNG);
            }
        }
    }
    assert!(saw_image);
    assert_eq!(last_len, response.text.len());
}

#[tokio::test]
async fn non_success_status_returns_server_error_with_body() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/api/generate")
        .with_status(404)
        .with_body("{\"error\":\"model 'llama3' not found\"}")
        .create_async()
        .await;

    let err = client_for(server.url())
        .send(generate_request("hi"), NoopListener)
        .result()
        .await
        .unwrap_err();

    match err {
        RequestError::ServerError { status, body } => {
            assert_eq!(status, 404);
            assert!(body.contains("not found"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn empty_stream_yields_placeholder() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/api/generate")
        .with_status(200)
        .with_body("{\"response\":\"\",\"done\":true}\n")
        .create_async()
        .await;

    let recorder = Recorder::default();
    let response = client_for(server.url())
        .send(generate_request("hi"), recorder.listener())
        .result()
        .await
        .unwrap();

    assert_eq!(response.text, EMPTY_RESPONSE_PLACEHOLDER);
    assert!(recorder.partials().is_empty());
}

#[tokio::test]
async fn connection_refused_is_a_transport_error_without_partial() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client_for(format!("http://{addr}"))
        .send(generate_request("hi"), NoopListener)
        .result()
        .await
        .unwrap_err();

    assert!(matches!(err, RequestError::Transport { partial: None, .. }));
}

#[tokio::test]
async fn cancelling_before_headers_resolves_as_cancelled() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        // Accept and hold the connection without ever answering.
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        drop(socket);
    });

    let handle = client_for(format!("http://{addr}")).send(generate_request("hi"), NoopListener);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    handle.cancel();

    let err = handle.result().await.unwrap_err();
    assert!(err.is_cancelled());
    server.abort();
}

#[tokio::test]
async fn transport_failure_mid_stream_keeps_partial_text() {
    let chunks: Vec<Result<Bytes, String>> = vec![
        Ok(Bytes::from_static(b"{\"response\":\"half an \"}\n{\"response\":\"answer\"}\n")),
        Err("connection reset by peer".to_string()),
    ];
    let assembler = ResponseAssembler::new();
    let recorder = Recorder::default();

    let err = pump_frames(
        decode_frames(futures::stream::iter(chunks)),
        &assembler,
        &recorder.listener(),
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.partial().map(|p| p.text.as_str()), Some("half an answer"));
    assert_eq!(recorder.partials().len(), 2);
}

#[tokio::test]
async fn cancellation_mid_stream_stops_callbacks() {
    let (tx, rx) = futures::channel::mpsc::unbounded::<Result<Bytes, Infallible>>();
    let (notify, mut notified) = mpsc::unbounded_channel::<()>();
    let partials = Arc::new(Mutex::new(Vec::<String>::new()));

    let listener = {
        let partials = Arc::clone(&partials);
        move |text: &str| {
            partials.lock().push(text.to_string());
            let _ = notify.send(());
        }
    };

    let token = CancellationToken::new();
    let task_token = token.clone();
    let task = tokio::spawn(async move {
        let assembler = ResponseAssembler::new();
        let result = pump_frames(decode_frames(rx), &assembler, &listener, &task_token).await;
        (result, assembler.current_text())
    });

    for part in ["a", "b"] {
        let line = format!("{}\n", json!({ "response": part }));
        tx.unbounded_send(Ok(Bytes::from(line))).unwrap();
        notified.recv().await.unwrap();
    }

    token.cancel();
    for part in ["c", "d", "e"] {
        let line = format!("{}\n", json!({ "response": part }));
        let _ = tx.unbounded_send(Ok(Bytes::from(line)));
    }
    drop(tx);

    let (result, text) = task.await.unwrap();
    assert!(matches!(result, Err(RequestError::Cancelled)));
    assert_eq!(text, "ab");
    assert_eq!(*partials.lock(), vec!["a".to_string(), "ab".to_string()]);
}

struct CancelOnFirstPartial {
    token: CancellationToken,
    images: Arc<Mutex<usize>>,
}

impl StreamListener for CancelOnFirstPartial {
    fn on_partial(&self, _text: &str) {
        self.token.cancel();
    }

    fn on_image(&self, _image: &crate::image::DecodedImage) {
        *self.images.lock() += 1;
    }
}

#[tokio::test]
async fn cancel_during_partial_callback_suppresses_image_callback() {
    let line = format!(
        "{}\n",
        json!({ "response": format!("![x](data:image/png;base64,{})", png_base64()) })
    );
    let chunks: Vec<Result<Bytes, Infallible>> = vec![Ok(Bytes::from(line))];

    let token = CancellationToken::new();
    let images = Arc::new(Mutex::new(0));
    let listener = CancelOnFirstPartial {
        token: token.clone(),
        images: Arc::clone(&images),
    };
    let assembler = ResponseAssembler::new();

    let result = pump_frames(
        decode_frames(futures::stream::iter(chunks)),
        &assembler,
        &listener,
        &token,
    )
    .await;

    assert!(matches!(result, Err(RequestError::Cancelled)));
    assert_eq!(*images.lock(), 0);
    assert!(assembler.current_image().is_some());
}

#[tokio::test]
async fn cancelling_while_reading_error_body_resolves_as_cancelled() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 4096];
        let _ = socket.read(&mut request).await;
        // Status and headers promise a body that never arrives.
        socket
            .write_all(b"HTTP/1.1 500 Internal Server Error\r\ncontent-length: 64\r\n\r\npartial")
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        drop(socket);
    });

    let handle = client_for(format!("http://{addr}")).send(generate_request("hi"), NoopListener);
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    handle.cancel();

    let err = tokio::time::timeout(std::time::Duration::from_secs(5), handle.result())
        .await
        .expect("cancel must not wait for the read timeout")
        .unwrap_err();
    assert!(err.is_cancelled());
    server.abort();
}

#[tokio::test]
async fn dropping_the_handle_cancels_the_request() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        drop(socket);
    });

    let handle = client_for(format!("http://{addr}")).send(generate_request("hi"), NoopListener);
    let token = handle.cancellation_token();
    assert!(!token.is_cancelled());

    drop(handle);
    assert!(token.is_cancelled());
    server.abort();
}
