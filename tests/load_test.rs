//! Many concurrent requests, each with its own deadline.

use std::time::{Duration, Instant};

use reqwest::StatusCode;

mod common;

#[tokio::test]
async fn test_deadlines_are_per_request() {
    let (addr, shutdown) =
        common::start_server(common::config_with_timeout("300ms"), None).await;

    let concurrency = 20;
    let client = common::client();
    let start = Instant::now();

    let mut handles = Vec::new();
    for i in 0..concurrency {
        let client = client.clone();
        // Even requests answer well inside the deadline, odd ones miss it.
        let delay = if i % 2 == 0 { 50 } else { 600 };
        let url = format!("http://{}/delay/{}", addr, delay);
        handles.push(tokio::spawn(async move {
            let res = client.get(&url).send().await.unwrap();
            (delay, res.status())
        }));
    }

    let mut ok = 0;
    let mut timed_out = 0;
    for handle in handles {
        let (delay, status) = handle.await.unwrap();
        match status {
            StatusCode::OK => {
                assert_eq!(delay, 50);
                ok += 1;
            }
            StatusCode::SERVICE_UNAVAILABLE => {
                assert_eq!(delay, 600);
                timed_out += 1;
            }
            other => panic!("unexpected status {}", other),
        }
    }

    let elapsed = start.elapsed();
    println!("{} ok, {} timed out in {:?}", ok, timed_out, elapsed);

    assert_eq!(ok, concurrency / 2);
    assert_eq!(timed_out, concurrency / 2);
    // Timed-out requests are answered at the deadline, not after the handler.
    assert!(elapsed < Duration::from_millis(600), "took {:?}", elapsed);

    shutdown.trigger();
}
