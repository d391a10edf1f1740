use chrono::Utc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use uuid::Uuid;

use volume_scanner::config::{SinkConfig, SupabaseCredentials, TelegramCredentials};
use volume_scanner::error::SinkError;
use volume_scanner::model::alert::{Alert, AlertKind};
use volume_scanner::sink::format::alert_message;
use volume_scanner::sink::{build_sink, AlertSink, SupabaseSink, TelegramNotifier};

/// One HTTP request as seen by [`respond_once`].
struct CapturedRequest {
    request_line: String,
    head: String,
    body: String,
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|pos| pos + 4)
}

/// Accepts one connection, reads one request, and answers with `status` and `body`.
async fn respond_once(listener: TcpListener, status: &str, body: &str) -> CapturedRequest {
    let (mut stream, _) = listener.accept().await.expect("client should connect");
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).await.expect("read should succeed");
        assert!(n > 0, "client closed before sending headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = find_header_end(&buf) {
            break end;
        }
    };
    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.expect("read should succeed");
        assert!(n > 0, "client closed before sending the body");
        buf.extend_from_slice(&chunk[..n]);
    }

    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    stream
        .write_all(response.as_bytes())
        .await
        .expect("write should succeed");
    let _ = stream.shutdown().await;

    CapturedRequest {
        request_line: head.lines().next().unwrap_or_default().to_string(),
        head: head.to_ascii_lowercase(),
        body: String::from_utf8_lossy(&buf[header_end..header_end + content_length]).to_string(),
    }
}

async fn local_responder(
    status: &'static str,
    body: &'static str,
) -> (String, tokio::task::JoinHandle<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    (base, tokio::spawn(respond_once(listener, status, body)))
}

fn sample_alert() -> Alert {
    Alert {
        id: Uuid::new_v4(),
        symbol: "BTC-USD".to_string(),
        price: 64_250.5,
        change_percent: 5.126,
        relative_volume: 2.5,
        kind: AlertKind::VolumeSpike,
        created_at: Utc::now(),
    }
}

fn temp_sqlite_path(test_name: &str) -> String {
    std::env::temp_dir()
        .join(format!("vs-{}-{}.sqlite", test_name, Uuid::new_v4()))
        .display()
        .to_string()
}

#[test]
/// Verifies the default wiring: local SQLite persistence followed by the log line.
fn default_sink_chain_is_sqlite_then_log() {
    let path = temp_sqlite_path("default-chain");
    let cfg = SinkConfig {
        sqlite_path: Some(path.clone()),
        ..SinkConfig::default()
    };
    let sink = build_sink(&cfg).unwrap();
    assert_eq!(sink.names(), vec!["sqlite", "log"]);
    let _ = std::fs::remove_file(path);
}

#[test]
/// Verifies Supabase replaces local persistence and Telegram notifies after it.
fn remote_backends_follow_persist_then_notify_order() {
    let cfg = SinkConfig {
        sqlite_path: None,
        supabase: Some(SupabaseCredentials {
            url: "https://abc.supabase.co".to_string(),
            service_role_key: "srk".to_string(),
        }),
        telegram: Some(TelegramCredentials {
            bot_token: "123:abc".to_string(),
            chat_id: "42".to_string(),
        }),
        ..SinkConfig::default()
    };
    let sink = build_sink(&cfg).unwrap();
    assert_eq!(sink.names(), vec!["supabase", "telegram", "log"]);
}

#[test]
fn supabase_endpoint_targets_table() {
    let creds = SupabaseCredentials {
        url: "https://abc.supabase.co/".to_string(),
        service_role_key: "srk".to_string(),
    };
    let sink = SupabaseSink::new(&creds, "crypto_alerts", 5).unwrap();
    assert_eq!(sink.endpoint(), "https://abc.supabase.co/rest/v1/crypto_alerts");
}

#[test]
fn notification_text_matches_alert() {
    let alert = Alert {
        id: Uuid::new_v4(),
        symbol: "BTC-USD".to_string(),
        price: 64_250.5,
        change_percent: 5.126,
        relative_volume: 2.5,
        kind: AlertKind::VolumeSpike,
        created_at: Utc::now(),
    };
    assert_eq!(
        alert_message(&alert),
        "🚨 Volume Alert for BTC-USD\n💰 Price: $64,250.50\n📈 Change: 5.13%\n📊 Relative Volume: 2.50x"
    );
}

#[tokio::test]
/// Verifies a Supabase insert is posted to the table endpoint with the service
/// key headers, and a non-2xx answer is reported as a rejected write.
async fn supabase_non_success_is_rejected() {
    let (base, server) = local_responder("409 Conflict", "dupe").await;
    let sink = SupabaseSink::new(
        &SupabaseCredentials {
            url: base,
            service_role_key: "srk".to_string(),
        },
        "crypto_alerts",
        5,
    )
    .unwrap();

    let result = sink.record(&sample_alert()).await;
    match result {
        Err(SinkError::Rejected {
            service,
            status,
            body,
        }) => {
            assert_eq!(service, "supabase");
            assert_eq!(status, 409);
            assert_eq!(body, "dupe");
        }
        other => panic!("expected a rejected write, got {:?}", other),
    }

    let request = server.await.unwrap();
    assert_eq!(request.request_line, "POST /rest/v1/crypto_alerts HTTP/1.1");
    assert!(request.head.contains("apikey: srk"));
    assert!(request.head.contains("authorization: bearer srk"));
    assert!(request.head.contains("prefer: return=minimal"));
    let row: serde_json::Value = serde_json::from_str(&request.body).unwrap();
    assert_eq!(row["ticker"], "BTC-USD");
    assert_eq!(row["alert_type"], "volume");
}

#[tokio::test]
/// Verifies a 2xx answer from Supabase counts as a successful write.
async fn supabase_created_is_success() {
    let (base, server) = local_responder("201 Created", "").await;
    let sink = SupabaseSink::new(
        &SupabaseCredentials {
            url: base,
            service_role_key: "srk".to_string(),
        },
        "crypto_alerts",
        5,
    )
    .unwrap();

    assert!(sink.record(&sample_alert()).await.is_ok());
    server.await.unwrap();
}

#[tokio::test]
/// Verifies the Telegram notifier posts the formatted text to the bot's
/// sendMessage path.
async fn telegram_posts_message_to_bot_path() {
    let (base, server) = local_responder("200 OK", r#"{"ok":true}"#).await;
    let creds = TelegramCredentials {
        bot_token: "123:abc".to_string(),
        chat_id: "42".to_string(),
    };
    let notifier = TelegramNotifier::with_api_base(&base, &creds, 5).unwrap();
    let alert = sample_alert();

    assert!(notifier.record(&alert).await.is_ok());

    let request = server.await.unwrap();
    assert_eq!(request.request_line, "POST /bot123:abc/sendMessage HTTP/1.1");
    let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
    assert_eq!(body["chat_id"], "42");
    assert_eq!(body["text"], alert_message(&alert));
}

#[tokio::test]
/// Verifies a Telegram server error is reported as a rejected write.
async fn telegram_server_error_is_rejected() {
    let (base, server) = local_responder("500 Internal Server Error", "boom").await;
    let creds = TelegramCredentials {
        bot_token: "123:abc".to_string(),
        chat_id: "42".to_string(),
    };
    let notifier = TelegramNotifier::with_api_base(&base, &creds, 5).unwrap();

    match notifier.record(&sample_alert()).await {
        Err(SinkError::Rejected { service, status, .. }) => {
            assert_eq!(service, "telegram");
            assert_eq!(status, 500);
        }
        other => panic!("expected a rejected write, got {:?}", other),
    }
    server.await.unwrap();
}
