//! Porkbun registrar tests
//!
//! Exercises the wire protocol against a wiremock server standing in for
//! the Porkbun API.

use porksync_core::config::Credentials;
use porksync_core::traits::{EditResult, Record, RecordEdit, Registrar};
use porksync_core::Error;
use porksync_provider_porkbun::PorkbunRegistrar;
use serde_json::json;
use std::io;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use tracing::instrument::WithSubscriber;
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn credentials() -> Credentials {
    Credentials::new("sk1_secret", "pk1_public").unwrap()
}

fn registrar(server: &MockServer, dry_run: bool) -> PorkbunRegistrar {
    PorkbunRegistrar::with_endpoints(server.uri(), server.uri(), dry_run).unwrap()
}

/// Collects formatted log output in memory
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn ping_returns_own_address() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/ping"))
        .and(body_json(json!({
            "secretapikey": "sk1_secret",
            "apikey": "pk1_public"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "SUCCESS",
            "yourIp": "203.0.113.7"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ip = registrar(&server, false)
        .discover_own_ip(&credentials())
        .await
        .unwrap();

    assert_eq!(ip, Ipv4Addr::new(203, 0, 113, 7));
}

#[tokio::test]
async fn ping_with_malformed_address_is_parse_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "SUCCESS",
            "yourIp": "2001:db8::1"
        })))
        .mount(&server)
        .await;

    let err = registrar(&server, false)
        .discover_own_ip(&credentials())
        .await
        .unwrap_err();

    assert!(err.is_parse(), "expected parse error, got {:?}", err);
}

#[tokio::test]
async fn invalid_keys_are_provider_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "status": "ERROR",
            "message": "Invalid API key. (002)"
        })))
        .mount(&server)
        .await;

    let err = registrar(&server, false)
        .discover_own_ip(&credentials())
        .await
        .unwrap_err();

    match err {
        Error::Provider { provider, message } => {
            assert_eq!(provider, "porkbun");
            assert!(message.contains("Invalid API key"), "{}", message);
        }
        other => panic!("expected provider error, got {:?}", other),
    }
}

#[tokio::test]
async fn non_json_response_is_provider_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/dns/retrieve/example.com"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
        .mount(&server)
        .await;

    let err = registrar(&server, false)
        .retrieve_records("example.com", &credentials())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Provider { ref message, .. } if message.contains("502")));
}

#[tokio::test]
async fn retrieve_returns_records_in_order() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/dns/retrieve/example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "SUCCESS",
            "records": [
                {"id": "1", "name": "example.com", "type": "A", "content": "1.1.1.1", "ttl": "600", "prio": "0", "notes": ""},
                {"id": "2", "name": "example.com", "type": "MX", "content": "mx.example.com", "ttl": "600", "prio": "10", "notes": null},
                {"id": "3", "name": "www.example.com", "type": "A", "content": "2.2.2.2", "ttl": "600", "prio": null, "notes": null}
            ]
        })))
        .mount(&server)
        .await;

    let remote = registrar(&server, false)
        .retrieve_records("example.com", &credentials())
        .await
        .unwrap();

    let ids: Vec<&str> = remote.records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
    assert_eq!(remote.records[1].record_type, "MX");
    assert_eq!(remote.records[1].priority.as_deref(), Some("10"));
    assert_eq!(remote.a_records_named("www.example.com").count(), 1);
}

#[tokio::test]
async fn retrieve_of_unknown_domain_is_provider_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/dns/retrieve/unknown.com"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "status": "ERROR",
            "message": "Invalid domain."
        })))
        .mount(&server)
        .await;

    let err = registrar(&server, false)
        .retrieve_records("unknown.com", &credentials())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Provider { .. }));
}

#[tokio::test]
async fn edit_posts_name_type_and_content() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/dns/edit/example.com/106926659"))
        .and(body_json(json!({
            "secretapikey": "sk1_secret",
            "apikey": "pk1_public",
            "name": "api.v2",
            "type": "A",
            "content": "9.9.9.9"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "SUCCESS"})))
        .expect(1)
        .mount(&server)
        .await;

    let record = Record::a("106926659", "api.v2.example.com", "1.1.1.1");
    let edit = RecordEdit::for_record(&record, Ipv4Addr::new(9, 9, 9, 9)).unwrap();

    let result = registrar(&server, false)
        .edit_record(&edit, &credentials())
        .await
        .unwrap();

    assert_eq!(result, EditResult::Applied);
}

#[tokio::test]
async fn edit_of_apex_sends_empty_name() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/dns/edit/example.com/42"))
        .and(body_partial_json(json!({"name": ""})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "SUCCESS"})))
        .expect(1)
        .mount(&server)
        .await;

    let record = Record::a("42", "example.com", "1.1.1.1");
    let edit = RecordEdit::for_record(&record, Ipv4Addr::new(9, 9, 9, 9)).unwrap();

    registrar(&server, false)
        .edit_record(&edit, &credentials())
        .await
        .unwrap();
}

#[tokio::test]
async fn rejected_edit_is_provider_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/dns/edit/example.com/42"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "status": "ERROR",
            "message": "Edit error: We were unable to edit the DNS record."
        })))
        .mount(&server)
        .await;

    let record = Record::a("42", "www.example.com", "1.1.1.1");
    let edit = RecordEdit::for_record(&record, Ipv4Addr::new(9, 9, 9, 9)).unwrap();

    let err = registrar(&server, false)
        .edit_record(&edit, &credentials())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Provider { ref message, .. } if message.contains("Edit error")));
}

#[tokio::test]
async fn dry_run_sends_no_edit() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/dns/edit/example.com/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "SUCCESS"})))
        .expect(0)
        .mount(&server)
        .await;

    let record = Record::a("42", "www.example.com", "1.1.1.1");
    let edit = RecordEdit::for_record(&record, Ipv4Addr::new(9, 9, 9, 9)).unwrap();

    let result = registrar(&server, true)
        .edit_record(&edit, &credentials())
        .await
        .unwrap();

    assert_eq!(result, EditResult::DryRun);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn dry_run_logs_intended_edit_without_keys() {
    let server = MockServer::start().await;
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();

    let record = Record::a("42", "www.example.com", "1.1.1.1");
    let edit = RecordEdit::for_record(&record, Ipv4Addr::new(9, 9, 9, 9)).unwrap();
    let registrar = registrar(&server, true);

    let result = registrar
        .edit_record(&edit, &credentials())
        .with_subscriber(subscriber)
        .await
        .unwrap();

    assert_eq!(result, EditResult::DryRun);

    let output = logs.contents();
    assert!(output.contains("[DRY-RUN] Would send POST request to"), "{}", output);
    assert!(output.contains("/dns/edit/example.com/42"), "{}", output);
    assert!(output.contains("9.9.9.9"), "{}", output);
    assert!(!output.contains("sk1_secret"), "{}", output);
    assert!(!output.contains("pk1_public"), "{}", output);
}

#[tokio::test]
async fn ssl_bundle_fields_are_mapped() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/ssl/retrieve/example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "SUCCESS",
            "certificatechain": "CHAIN",
            "intermediatecertificate": "INTERMEDIATE",
            "privatekey": "PRIVATE",
            "publickey": "PUBLIC"
        })))
        .mount(&server)
        .await;

    let bundle = registrar(&server, false)
        .retrieve_certificates("example.com", &credentials())
        .await
        .unwrap();

    assert_eq!(bundle.certificate_chain, "CHAIN");
    assert_eq!(bundle.intermediate_certificate, "INTERMEDIATE");
    assert_eq!(bundle.private_key, "PRIVATE");
    assert_eq!(bundle.public_key, "PUBLIC");
}

#[tokio::test]
async fn ssl_not_ready_is_provider_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/ssl/retrieve/example.com"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "status": "ERROR",
            "message": "The SSL certificate is not ready for this domain."
        })))
        .mount(&server)
        .await;

    let err = registrar(&server, false)
        .retrieve_certificates("example.com", &credentials())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Provider { .. }));
}
