//! Shared fixtures for integration tests: a minimal HTTP server, archive builders and
//! local git remotes.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use tiny_http::{Header, Response, Server, StatusCode};

/// One request received by [`MockServer`]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    /// Header value, matched case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("json body")
    }
}

/// Canned response for one route
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl MockResponse {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn status(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// tiny_http server on a background thread answering canned responses.
///
/// Unknown routes get 404. Every request is recorded.
pub struct MockServer {
    base_url: String,
    server: Arc<Server>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl MockServer {
    pub fn start(routes: Vec<(&str, &str, MockResponse)>) -> Self {
        let server = Arc::new(Server::http("127.0.0.1:0").expect("server"));
        let base_url = format!("http://{}", server.server_addr());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let routes: Vec<(String, String, MockResponse)> = routes
            .into_iter()
            .map(|(method, path, response)| (method.to_string(), path.to_string(), response))
            .collect();

        let handle = {
            let server = Arc::clone(&server);
            let recorded = Arc::clone(&requests);
            thread::spawn(move || {
                for mut req in server.incoming_requests() {
                    let method = req.method().to_string();
                    let path = req.url().to_string();
                    let headers = req
                        .headers()
                        .iter()
                        .map(|h| (h.field.as_str().as_str().to_string(), h.value.as_str().to_string()))
                        .collect();
                    let mut body = Vec::new();
                    let _ = req.as_reader().read_to_end(&mut body);

                    let response = routes
                        .iter()
                        .find(|(m, p, _)| *m == method && *p == path)
                        .map(|(_, _, r)| r.clone())
                        .unwrap_or_else(|| MockResponse::status(404, "Not Found"));

                    recorded.lock().expect("lock").push(RecordedRequest {
                        method,
                        path,
                        headers,
                        body,
                    });

                    let resp = Response::from_data(response.body)
                        .with_status_code(StatusCode(response.status))
                        .with_header(
                            Header::from_bytes("Content-Type", "application/octet-stream")
                                .expect("header"),
                        );
                    let _ = req.respond(resp);
                }
            })
        };

        Self {
            base_url,
            server,
            requests,
            handle: Some(handle),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn base_url(&self) -> String {
        self.base_url.clone()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("lock").clone()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Serve one response whose body is shorter than its `Content-Length`, then close.
///
/// tiny_http always frames bodies correctly, so this one writes the response by hand.
pub fn serve_truncated(announced: usize, body: &'static [u8]) -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let url = format!("http://{}/build.tar.gz", listener.local_addr().expect("addr"));
    thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            // Drain the request head so closing sends FIN rather than RST
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => head.extend_from_slice(&buf[..n]),
                }
            }
            let status = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n", announced);
            let _ = stream.write_all(status.as_bytes());
            let _ = stream.write_all(body);
        }
    });
    url
}

/// HTTP client that ignores proxy settings from the environment
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .user_agent(ghost_release::USER_AGENT)
        .build()
        .unwrap()
}

/// Build a gzip-compressed tarball from `(path, content)` pairs
pub fn tar_gz(files: &[(&str, &str)]) -> Vec<u8> {
    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, path, content.as_bytes()).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Build a zip archive from `(path, content)` pairs
pub fn zip_archive(files: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (path, content) in files {
        writer.start_file(*path, options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// SHA-256 of `data`, hex encoded
pub fn sha256_hex(data: &[u8]) -> String {
    use sha2::Digest;
    hex::encode(sha2::Sha256::digest(data))
}

/// Whether a git executable is available; git tests are skipped otherwise
pub fn git_available() -> bool {
    which::which("git").is_ok()
}

/// Run git with a fixed identity, panicking on failure
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = std::process::Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .env("GIT_AUTHOR_NAME", "Fixture")
        .env("GIT_AUTHOR_EMAIL", "fixture@example.test")
        .env("GIT_COMMITTER_NAME", "Fixture")
        .env("GIT_COMMITTER_EMAIL", "fixture@example.test")
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Create a bare repository whose `branch` holds one seed commit
pub fn bare_remote(root: &Path, branch: &str) -> PathBuf {
    let remote = root.join("remote.git");
    let seed = root.join("seed");
    std::fs::create_dir_all(&remote).unwrap();
    std::fs::create_dir_all(&seed).unwrap();

    git(&remote, &["init", "--bare", "--quiet"]);
    git(&seed, &["init", "--quiet"]);
    git(&seed, &["checkout", "--quiet", "-b", branch]);
    std::fs::write(seed.join("package.json"), "{\"name\":\"ghost\",\"version\":\"2.4.0\"}\n").unwrap();
    std::fs::write(seed.join("obsolete.txt"), "left over from 2.4.0\n").unwrap();
    git(&seed, &["add", "--all"]);
    git(&seed, &["-c", "commit.gpgsign=false", "commit", "--quiet", "-m", "Add v2.4.0"]);
    git(
        &seed,
        &["push", "--quiet", remote.to_str().unwrap(), &format!("HEAD:refs/heads/{}", branch)],
    );

    remote
}
