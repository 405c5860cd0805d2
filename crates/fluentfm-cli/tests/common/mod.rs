use std::path::Path;
use std::process::Output;

use serde_json::{Value, json};
use tokio::process::Command;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const DB: &str = "testdb";

pub fn data_path(route: &str) -> String {
    format!("/fmi/data/v1/databases/{}/{}", DB, route)
}

pub fn ok(response: Value) -> Value {
    json!({
        "response": response,
        "messages": [{"code": "0", "message": "OK"}]
    })
}

/// Mount a login endpoint handing out `token`, expected `times` times.
pub async fn mount_session(server: &MockServer, token: &str, times: u64) {
    Mock::given(method("POST"))
        .and(path(data_path("sessions")))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-FM-Data-Access-Token", token)
                .set_body_json(ok(json!({ "token": token }))),
        )
        .expect(times)
        .mount(server)
        .await;
}

/// Run the CLI against `server` with HOME and the data directory isolated
/// under `home`.
pub async fn run_cli(args: &[&str], home: &Path, server: &MockServer) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_fluentfm"));
    cmd.args(args)
        .env("HOME", home)
        .env("XDG_DATA_HOME", home.join("data"))
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("FLUENTFM_TOKEN_CACHE")
        .env_remove("FM_TIMEOUT_SECS")
        .env("FM_HOST", server.uri())
        .env("FM_FILE", DB)
        .env("FM_USER", "admin")
        .env("FM_PASS", "secret");
    cmd.output().await.expect("Failed to execute CLI")
}

/// Run the CLI and expect success, returning stdout.
pub async fn run_cli_success(args: &[&str], home: &Path, server: &MockServer) -> String {
    let output = run_cli(args, home, server).await;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!("CLI command failed: {:?}\nstderr: {}", args, stderr);
    }
    String::from_utf8_lossy(&output.stdout).to_string()
}
