#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::process::{Command, Output};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use annotool::config::{Profile, Settings};
use annotool::context::{AppContext, User};
use annotool::resource::{Annotation, Attributes, Persistable, Track};
use annotool::sync::{HttpRequest, HttpResponse, Transport};
use annotool::tracks::AnnotationSource;
use annotool::{AnnotoolError, Result};

pub fn run_annotool(args: &[&str]) -> Output {
    TestEnv::new().run(args)
}

pub struct TestEnv {
    home: TempDir,
    config: TempDir,
    data: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            home: tempfile::tempdir().expect("create temporary HOME dir"),
            config: tempfile::tempdir().expect("create temporary XDG config dir"),
            data: tempfile::tempdir().expect("create temporary XDG data dir"),
        }
    }

    pub fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_annotool"))
            .args(args)
            .env("HOME", self.home.path())
            .env("XDG_CONFIG_HOME", self.config.path())
            .env("XDG_DATA_HOME", self.data.path())
            .env_remove("ANNOTOOL_AUTH_TOKEN")
            .env_remove("ANNOTOOL_API_BASE")
            .env_remove("RUST_LOG")
            .output()
            .expect("failed to execute annotool binary")
    }

    pub fn config_path(&self) -> PathBuf {
        let output = self.run(&["config", "path"]);
        assert!(
            output.status.success(),
            "config path should succeed\nstdout:\n{}\nstderr:\n{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );

        let path = String::from_utf8_lossy(&output.stdout);
        PathBuf::from(path.trim())
    }

    pub fn write_config(&self, contents: &str) {
        let config_path = self.config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).expect("create config parent directory");
        }
        std::fs::write(&config_path, contents).expect("write config file");
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data.path().join("annotool")
    }
}

pub fn attrs(value: Value) -> Attributes {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// Context talking to the REST profile as user "7"
pub fn rest_context() -> Arc<AppContext> {
    let mut settings = Settings::default();
    settings.backend.profile = Profile::Rest;
    settings.backend.api_base = "http://annotations.test/".to_string();
    settings.backend.page_size = 2;
    AppContext::new(settings, Some(User::new("7", "alice").with_token("secret"))).shared()
}

pub fn anonymous_context(profile: Profile) -> Arc<AppContext> {
    let mut settings = Settings::default();
    settings.backend.profile = profile;
    settings.backend.api_base = "http://annotations.test".to_string();
    AppContext::new(settings, None).shared()
}

pub fn track(ctx: &AppContext, id: &str, owner: &str) -> Track {
    Track::from_attributes(
        &attrs(serde_json::json!({
            "id": id,
            "name": format!("Track {id}"),
            "created_by": owner,
        })),
        ctx,
    )
    .expect("valid track")
}

/// Transport replaying queued responses and recording every request
#[derive(Default)]
pub struct MockTransport {
    requests: Mutex<Vec<HttpRequest>>,
    responses: Mutex<VecDeque<HttpResponse>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, status: u16, body: Value) {
        self.respond_raw(status, &body.to_string());
    }

    pub fn respond_raw(&self, status: u16, body: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(HttpResponse::new(status, body));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last(&self) -> HttpRequest {
        self.requests().pop().expect("at least one request")
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request);
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| HttpResponse::new(200, "{}")))
    }
}

/// Annotation source counting loads per track
#[derive(Default)]
pub struct CountingSource {
    loads: Mutex<HashMap<String, usize>>,
    failing: Mutex<Vec<String>>,
}

impl CountingSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_for(&self, id: &str) {
        self.failing.lock().unwrap().push(id.to_string());
    }

    pub fn recover(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn loads(&self, id: &str) -> usize {
        self.loads.lock().unwrap().get(id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl AnnotationSource for CountingSource {
    async fn load_annotations(&self, track: &Track) -> Result<Vec<Annotation>> {
        let id = track.id().unwrap_or_default().to_string();
        *self.loads.lock().unwrap().entry(id.clone()).or_default() += 1;

        if self.failing.lock().unwrap().contains(&id) {
            return Err(AnnotoolError::transport(500, "annotations unavailable"));
        }

        let ctx = AppContext::default();
        let annotation = Annotation::from_attributes(
            &attrs(serde_json::json!({"id": format!("{id}-1"), "start": 1.0, "duration": 2.0})),
            &ctx,
        )?;
        Ok(vec![annotation])
    }
}
