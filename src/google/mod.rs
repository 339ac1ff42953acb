pub mod drive;
pub mod sheets;

use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};

use crate::config::ApiSettings;
use crate::error::ReportError;
use crate::throttle::{Backoff, Pacer};

pub use drive::{DriveClient, DriveFile, DriveHttpClient, FileList, Permission};
pub use sheets::{SheetProperties, SheetsClient, SheetsHttpClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Api {
    Sheets,
    Drive,
}

impl Api {
    fn transport(&self, message: String) -> ReportError {
        match self {
            Api::Sheets => ReportError::SheetsHttp(message),
            Api::Drive => ReportError::DriveHttp(message),
        }
    }

    fn status(&self, status: u16, message: String) -> ReportError {
        match self {
            Api::Sheets => ReportError::SheetsStatus { status, message },
            Api::Drive => ReportError::DriveStatus { status, message },
        }
    }
}

/// Authenticated, paced HTTP access shared by the Sheets and Drive clients.
pub(crate) struct GoogleHttp {
    client: Client,
    base_url: String,
    api: Api,
    pacer: Pacer,
    backoff: Backoff,
}

impl GoogleHttp {
    pub(crate) fn new(
        api: Api,
        base_url: &str,
        settings: &ApiSettings,
    ) -> Result<Self, ReportError> {
        let token = settings.access_token()?;
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("ds-report/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| api.transport(err.to_string()))?,
        );
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token.trim()))
            .map_err(|_| ReportError::MissingAccessToken)?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| api.transport(err.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api,
            pacer: Pacer::new(settings.pace),
            backoff: Backoff {
                max_retries: settings.max_retries,
                ..Backoff::default()
            },
        })
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Sends with pacing and returns a successful response or the final
    /// failure. Retries depend on `replay`: see [`Replay`].
    pub(crate) fn send<F>(&self, replay: Replay, mut make_req: F) -> Result<Response, ReportError>
    where
        F: FnMut() -> RequestBuilder,
    {
        let mut attempt = 0u32;
        loop {
            self.pacer.wait();
            match make_req().send() {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let message = resp
                        .text()
                        .unwrap_or_else(|_| "request failed".to_string());
                    if is_retryable_status(status, &message, replay) {
                        if let Some(delay) = self.backoff.delay(attempt) {
                            tracing::warn!(
                                api = ?self.api,
                                status,
                                attempt,
                                delay_ms = delay.as_millis() as u64,
                                "retrying after quota or server error"
                            );
                            thread::sleep(delay);
                            attempt += 1;
                            continue;
                        }
                    }
                    return Err(self.api.status(status, message));
                }
                Err(err) => {
                    if replay == Replay::Idempotent && is_retryable_error(&err) {
                        if let Some(delay) = self.backoff.delay(attempt) {
                            tracing::warn!(
                                api = ?self.api,
                                attempt,
                                error = %err,
                                "retrying request"
                            );
                            thread::sleep(delay);
                            attempt += 1;
                            continue;
                        }
                    }
                    return Err(self.api.transport(err.to_string()));
                }
            }
        }
    }

    pub(crate) fn json<T: serde::de::DeserializeOwned>(
        &self,
        response: Response,
    ) -> Result<T, ReportError> {
        response
            .json()
            .map_err(|err| self.api.transport(err.to_string()))
    }
}

/// When a failed call may be sent again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Replay {
    /// Reads and deletes: transport failures, 429, 5xx and quota 403 retry.
    Idempotent,
    /// Writes that must not run twice: only 429 and quota 403 retry, since
    /// Google rejects those before applying anything.
    Rejected,
}

/// Google reports per-user quota as 403 with a `rateLimitExceeded` reason.
pub(crate) fn is_retryable_status(status: u16, body: &str, replay: Replay) -> bool {
    let quota = status == 429
        || (status == 403
            && (body.contains("rateLimitExceeded") || body.contains("userRateLimitExceeded")));
    match replay {
        Replay::Idempotent => quota || matches!(status, 500 | 502 | 503 | 504),
        Replay::Rejected => quota,
    }
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    use assert_matches::assert_matches;

    use super::*;
    use crate::requests;

    const QUOTA_403: &str = r#"{"error":{"errors":[{"reason":"userRateLimitExceeded"}]}}"#;

    enum Reply {
        Status(u16, &'static str),
        /// Reads the request and closes the socket without answering.
        Hangup,
    }

    /// Answers connections from `script` in order, then with `200 {}`.
    /// Returns the base URL and every raw request received.
    fn serve(script: Vec<Reply>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        thread::spawn(move || {
            let mut script = script.into_iter();
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                let request = read_request(&mut stream);
                log.lock().unwrap().push(request);
                let reply = script.next().unwrap_or(Reply::Status(200, "{}"));
                if let Reply::Status(status, body) = reply {
                    let response = format!(
                        "HTTP/1.1 {status} Scripted\r\nContent-Type: application/json\r\n\
                         Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = stream.write_all(response.as_bytes());
                }
            }
        });
        (base, seen)
    }

    fn read_request(stream: &mut TcpStream) -> String {
        let mut data = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let read = stream.read(&mut buf).unwrap_or(0);
            if read == 0 {
                break;
            }
            data.extend_from_slice(&buf[..read]);
            let text = String::from_utf8_lossy(&data);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if data.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&data).into_owned()
    }

    fn settings(base: &str, pace: Duration) -> ApiSettings {
        ApiSettings {
            pace,
            max_retries: 2,
            access_token: Some("test-token".to_string()),
            sheets_base_url: base.to_string(),
            drive_base_url: base.to_string(),
        }
    }

    fn google_http(api: Api, base: &str) -> GoogleHttp {
        let mut http = GoogleHttp::new(api, base, &settings(base, Duration::ZERO)).unwrap();
        http.backoff.base = Duration::from_millis(5);
        http
    }

    fn calls(seen: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
        seen.lock().unwrap().clone()
    }

    #[test]
    fn quota_statuses_retry() {
        assert!(is_retryable_status(429, "", Replay::Idempotent));
        assert!(is_retryable_status(503, "", Replay::Idempotent));
        assert!(is_retryable_status(403, QUOTA_403, Replay::Idempotent));
        assert!(!is_retryable_status(
            403,
            r#"{"error":{"status":"PERMISSION_DENIED"}}"#,
            Replay::Idempotent
        ));
        assert!(!is_retryable_status(404, "", Replay::Idempotent));
    }

    #[test]
    fn writes_retry_only_rejected_calls() {
        assert!(is_retryable_status(429, "", Replay::Rejected));
        assert!(is_retryable_status(403, QUOTA_403, Replay::Rejected));
        assert!(!is_retryable_status(500, "", Replay::Rejected));
        assert!(!is_retryable_status(503, "", Replay::Rejected));
    }

    #[test]
    fn too_many_requests_then_success() {
        let (base, seen) = serve(vec![
            Reply::Status(429, "{}"),
            Reply::Status(429, "{}"),
            Reply::Status(200, "{}"),
        ]);
        let http = google_http(Api::Sheets, &base);
        let url = http.url("spreadsheets/abc:batchUpdate");
        let sent = http.send(Replay::Rejected, || http.client().post(&url).body("{}"));
        assert!(sent.is_ok());
        assert_eq!(calls(&seen).len(), 3);
    }

    #[test]
    fn quota_forbidden_retries_until_exhausted() {
        let (base, seen) = serve(vec![
            Reply::Status(403, QUOTA_403),
            Reply::Status(403, QUOTA_403),
            Reply::Status(403, QUOTA_403),
            Reply::Status(200, "{}"),
        ]);
        let http = google_http(Api::Drive, &base);
        let url = http.url("files");
        let result = http.send(Replay::Idempotent, || http.client().get(&url));
        assert_matches!(result, Err(ReportError::DriveStatus { status: 403, .. }));
        // first call plus max_retries
        assert_eq!(calls(&seen).len(), 3);
    }

    #[test]
    fn client_errors_are_not_retried() {
        let (base, seen) = serve(vec![Reply::Status(404, r#"{"error":"missing"}"#)]);
        let http = google_http(Api::Sheets, &base);
        let url = http.url("spreadsheets/nope");
        let result = http.send(Replay::Idempotent, || http.client().get(&url));
        assert_matches!(
            result,
            Err(ReportError::SheetsStatus { status: 404, message }) if message.contains("missing")
        );
        assert_eq!(calls(&seen).len(), 1);
    }

    #[test]
    fn server_errors_retry_reads_but_not_writes() {
        let (base, seen) = serve(vec![Reply::Status(503, "{}"), Reply::Status(200, "{}")]);
        let http = google_http(Api::Drive, &base);
        let url = http.url("files");
        assert!(http.send(Replay::Idempotent, || http.client().get(&url)).is_ok());
        assert_eq!(calls(&seen).len(), 2);

        let (base, seen) = serve(vec![Reply::Status(503, "{}"), Reply::Status(200, "{}")]);
        let http = google_http(Api::Drive, &base);
        let url = http.url("files/tmpl/copy");
        let result = http.send(Replay::Rejected, || http.client().post(&url).body("{}"));
        assert_matches!(result, Err(ReportError::DriveStatus { status: 503, .. }));
        assert_eq!(calls(&seen).len(), 1);
    }

    #[test]
    fn lost_reply_to_a_write_is_not_resent() {
        let (base, seen) = serve(vec![Reply::Hangup]);
        let sheets = SheetsHttpClient::new(&settings(&base, Duration::ZERO)).unwrap();
        let insert = requests::insert_rows(0, 11, 3).unwrap();

        let result = sheets.batch_update("abc", &[insert]);
        assert_matches!(result, Err(ReportError::SheetsHttp(_)));
        assert_eq!(calls(&seen).len(), 1);
    }

    #[test]
    fn lost_reply_to_a_read_is_resent() {
        let (base, seen) = serve(vec![Reply::Hangup, Reply::Status(200, "{}")]);
        let http = google_http(Api::Drive, &base);
        let url = http.url("files");
        assert!(http.send(Replay::Idempotent, || http.client().get(&url)).is_ok());
        assert_eq!(calls(&seen).len(), 2);
    }

    #[test]
    fn calls_are_paced() {
        let (base, seen) = serve(Vec::new());
        let pace = Duration::from_millis(80);
        let http = GoogleHttp::new(Api::Sheets, &base, &settings(&base, pace)).unwrap();
        let url = http.url("spreadsheets/abc");
        let start = Instant::now();
        for _ in 0..3 {
            assert!(http.send(Replay::Idempotent, || http.client().get(&url)).is_ok());
        }
        assert!(start.elapsed() >= pace * 2);
        assert_eq!(calls(&seen).len(), 3);
    }

    #[test]
    fn sheets_requests_reach_the_api_in_shape() {
        let (base, seen) = serve(vec![Reply::Status(
            200,
            r#"{"sheets":[{"properties":{"sheetId":5,"title":"Summary","index":0}}]}"#,
        )]);
        let sheets = SheetsHttpClient::new(&settings(&base, Duration::ZERO)).unwrap();

        let properties = sheets.sheet_properties("abc").unwrap();
        assert_eq!(properties[0].sheet_id, 5);
        let values = vec![requests::update_cells("'Data'!B2", vec![vec!["x".into()]]).unwrap()];
        sheets.values_batch_update("abc", &values).unwrap();

        let seen = calls(&seen);
        assert!(seen[0].starts_with("GET /spreadsheets/abc?fields="));
        assert!(seen[0].to_ascii_lowercase().contains("authorization: bearer "));
        assert!(seen[1].starts_with("POST /spreadsheets/abc/values:batchUpdate "));
        assert!(seen[1].contains(r#""valueInputOption":"USER_ENTERED""#));
        assert!(seen[1].contains(r#""range":"'Data'!B2""#));
    }

    #[test]
    fn drive_requests_reach_the_api_in_shape() {
        let (base, seen) = serve(vec![
            Reply::Status(200, r#"{"files":[{"id":"f1","name":"Report"}],"nextPageToken":"p2"}"#),
            Reply::Status(200, r#"{"id":"copy-1","name":"Report"}"#),
        ]);
        let drive = DriveHttpClient::new(&settings(&base, Duration::ZERO)).unwrap();

        let page = drive.list_files("name = 'Report'", Some("p1")).unwrap();
        assert_eq!(page.next_page_token.as_deref(), Some("p2"));
        let copied = drive.copy_file("tmpl", "Report", "folder-1").unwrap();
        assert_eq!(copied.id, "copy-1");

        let seen = calls(&seen);
        assert!(seen[0].starts_with("GET /files?"));
        assert!(seen[0].contains("pageToken=p1"));
        assert!(seen[1].starts_with("POST /files/tmpl/copy?"));
        assert!(seen[1].contains(r#"{"name":"Report","parents":["folder-1"]}"#));
    }
}
