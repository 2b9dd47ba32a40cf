use futures::StreamExt;
use llm_gateway_rust::api::disconnect::DisconnectStream;
use llm_gateway_rust::api::create_sse_stream;
use llm_gateway_rust::core::{cancel::StreamCancelHandle, get_metrics, init_metrics};
use llm_gateway_rust::services::{ProviderEvent, ProviderEventStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_stream_cancel_handle() {
    let handle = StreamCancelHandle::new();
    let mut rx = handle.subscribe();

    assert!(!handle.is_cancelled());
    assert!(!*rx.borrow());

    handle.cancel();

    assert!(handle.is_cancelled());
    // Wait for the change to propagate
    let _ = rx.changed().await;
    assert!(*rx.borrow());
}

#[tokio::test]
async fn test_completed_handle_ignores_cancel() {
    let handle = StreamCancelHandle::new();
    handle.mark_completed();
    handle.cancel();

    assert!(handle.is_completed());
    assert!(!handle.is_cancelled());
}

#[tokio::test]
async fn test_cancelled_future_resolves_on_cancel() {
    let handle = StreamCancelHandle::new();
    let waiter = handle.clone();
    let task = tokio::spawn(async move { waiter.cancelled().await });

    tokio::time::sleep(Duration::from_millis(10)).await;
    handle.cancel();

    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("cancelled() should resolve once cancel() fires")
        .unwrap();
}

#[tokio::test]
async fn test_disconnect_stream_triggers_cancel_on_drop() {
    init_metrics();
    let handle = StreamCancelHandle::new();
    let rx = handle.subscribe();

    // Create a dummy stream
    let stream = futures::stream::iter(vec![Ok::<_, std::io::Error>(bytes::Bytes::from("test"))]);

    {
        let _disconnect_stream = DisconnectStream {
            stream,
            cancel_handle: handle.clone(),
            provider: "cancel-suite-drop".to_string(),
        };

        // Verify not cancelled yet
        assert!(!handle.is_cancelled());
        assert!(!*rx.borrow());

        // _disconnect_stream goes out of scope here
    }

    // Verify cancelled after drop, and the disconnect was counted
    assert!(handle.is_cancelled());
    assert!(*rx.borrow());
    assert_eq!(
        get_metrics()
            .stream_disconnects
            .with_label_values(&["cancel-suite-drop"])
            .get(),
        1
    );
}

/// Upstream that yields deltas forever, counting how many it has produced.
fn counting_upstream(pulls: Arc<AtomicUsize>) -> ProviderEventStream {
    Box::pin(futures::stream::unfold(0usize, move |n| {
        let pulls = pulls.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            pulls.fetch_add(1, Ordering::SeqCst);
            Some((Ok(ProviderEvent::Delta(format!("w{} ", n))), n + 1))
        }
    }))
}

#[tokio::test]
async fn test_client_drop_stops_upstream_pull() {
    init_metrics();
    let pulls = Arc::new(AtomicUsize::new(0));
    let response = create_sse_stream(
        counting_upstream(pulls.clone()),
        "chatcmpl-disc".to_string(),
        1,
        "demo:echo".to_string(),
        "cancel-suite-pull".to_string(),
    );

    let mut body = response.into_body().into_data_stream();
    let first = body.next().await;
    assert!(first.is_some());

    // Simulate the client going away mid-stream.
    drop(body);

    // Any event already in flight finishes, then the pump must stop pulling.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let settled = pulls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(pulls.load(Ordering::SeqCst), settled);

    assert_eq!(
        get_metrics()
            .stream_disconnects
            .with_label_values(&["cancel-suite-pull"])
            .get(),
        1
    );
}

#[tokio::test]
async fn test_completed_stream_is_not_counted_as_disconnect() {
    init_metrics();
    let upstream: ProviderEventStream = Box::pin(futures::stream::iter(vec![
        Ok(ProviderEvent::Delta("hello ".to_string())),
        Ok(ProviderEvent::Delta("world".to_string())),
        Ok(ProviderEvent::Done {
            finish_reason: "stop".to_string(),
            usage: None,
        }),
    ]));

    let response = create_sse_stream(
        upstream,
        "chatcmpl-done".to_string(),
        1,
        "demo:echo".to_string(),
        "cancel-suite-complete".to_string(),
    );

    let mut body = response.into_body().into_data_stream();
    let mut frames = String::new();
    while let Some(chunk) = body.next().await {
        frames.push_str(std::str::from_utf8(&chunk.unwrap()).unwrap());
    }
    drop(body);

    assert!(frames.ends_with("data: [DONE]\n\n"));
    assert_eq!(
        get_metrics()
            .stream_disconnects
            .with_label_values(&["cancel-suite-complete"])
            .get(),
        0
    );
}
