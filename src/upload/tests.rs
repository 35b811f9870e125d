use super::*;
use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::io;
use tempfile::TempDir;

/// Scripted EcoTaxa server
#[derive(Default)]
struct MockApi {
    valid_tokens: Vec<String>,
    login_token: Option<String>,
    existing: HashSet<String>,
    /// Job states returned in order; the last one repeats
    job_states: RefCell<VecDeque<&'static str>>,
    failing_uploads: Vec<String>,
    uploads: RefCell<Vec<String>>,
    imports: RefCell<Vec<String>>,
    logins: RefCell<Vec<(String, String)>>,
}

impl MockApi {
    fn with_jobs(states: &[&'static str]) -> Self {
        Self {
            job_states: RefCell::new(states.iter().copied().collect()),
            ..Self::default()
        }
    }
}

impl EcotaxaApi for MockApi {
    fn login(&self, username: &str, password: &str) -> Result<String, UploadError> {
        self.logins
            .borrow_mut()
            .push((username.to_string(), password.to_string()));
        self.login_token.clone().ok_or_else(|| UploadError::Status {
            endpoint: "/login".to_string(),
            status: 401,
            body: "bad credentials".to_string(),
        })
    }

    fn user_info(&self, token: &str) -> Result<Option<UserInfo>, UploadError> {
        if self.valid_tokens.iter().any(|t| t == token) || self.login_token.as_deref() == Some(token) {
            Ok(Some(UserInfo {
                name: Some("Test User".to_string()),
                email: Some("test@example.org".to_string()),
            }))
        } else {
            Ok(None)
        }
    }

    fn project_info(&self, _token: &str, _project_id: i64) -> Result<ProjectInfo, UploadError> {
        Ok(ProjectInfo {
            title: Some("Plankton".to_string()),
        })
    }

    fn existing_samples(&self, _token: &str, _project_id: i64) -> Result<HashSet<String>, UploadError> {
        Ok(self.existing.clone())
    }

    fn upload_file(&self, _token: &str, path: &Path) -> Result<String, UploadError> {
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        if self.failing_uploads.contains(&name) {
            return Err(UploadError::Status {
                endpoint: "/user_files/".to_string(),
                status: 500,
                body: "disk full".to_string(),
            });
        }
        self.uploads.borrow_mut().push(name.clone());
        Ok(format!("/srv/user_files/42/{}", name))
    }

    fn start_import(&self, _token: &str, _project_id: i64, source_path: &str) -> Result<i64, UploadError> {
        self.imports.borrow_mut().push(source_path.to_string());
        Ok(7)
    }

    fn job_status(&self, _token: &str, _job_id: i64) -> Result<JobStatus, UploadError> {
        let mut states = self.job_states.borrow_mut();
        let state = if states.len() > 1 {
            states.pop_front().unwrap()
        } else {
            states.front().copied().unwrap_or("F")
        };
        Ok(JobStatus {
            state: state.to_string(),
            progress_pct: Some(if state == "F" { 100.0 } else { 50.0 }),
            progress_msg: None,
            errors: if state == "E" {
                vec![serde_json::json!("missing column object_id")]
            } else {
                Vec::new()
            },
        })
    }
}

#[derive(Default)]
struct MemoryStore {
    token: RefCell<Option<String>>,
}

impl TokenStore for MemoryStore {
    fn load(&self) -> Option<String> {
        self.token.borrow().clone()
    }

    fn store(&self, token: &str) -> Result<(), UploadError> {
        *self.token.borrow_mut() = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) {
        *self.token.borrow_mut() = None;
    }
}

struct FixedPrompt(&'static str, &'static str);

impl CredentialPrompt for FixedPrompt {
    fn username(&self) -> io::Result<String> {
        Ok(self.0.to_string())
    }

    fn password(&self) -> io::Result<String> {
        Ok(self.1.to_string())
    }
}

fn bundles(dir: &TempDir, samples: &[&str]) -> Vec<PathBuf> {
    samples
        .iter()
        .map(|s| {
            let path = dir.path().join(format!("ecotaxa_{}.zip", s));
            std::fs::write(&path, b"PK").unwrap();
            path
        })
        .collect()
}

#[test]
fn test_cached_token_is_reused() {
    let api = MockApi {
        valid_tokens: vec!["cached".to_string()],
        ..MockApi::default()
    };
    let store = MemoryStore::default();
    store.store("cached").unwrap();

    let token = authenticate(&api, &store, &Credentials::default(), &FixedPrompt("", "")).unwrap();
    assert_eq!(token, "cached");
    assert!(api.logins.borrow().is_empty());
}

#[test]
fn test_invalid_cached_token_is_replaced() {
    let api = MockApi {
        login_token: Some("fresh".to_string()),
        ..MockApi::default()
    };
    let store = MemoryStore::default();
    store.store("stale").unwrap();

    let token = authenticate(&api, &store, &Credentials::default(), &FixedPrompt("me@lab.org", "secret")).unwrap();

    assert_eq!(token, "fresh");
    assert_eq!(store.load().as_deref(), Some("fresh"));
    assert_eq!(
        api.logins.borrow()[0],
        ("me@lab.org".to_string(), "secret".to_string())
    );
}

#[test]
fn test_command_line_credentials_take_precedence() {
    let api = MockApi {
        login_token: Some("fresh".to_string()),
        ..MockApi::default()
    };
    let credentials = Credentials {
        username: Some("cli@lab.org".to_string()),
        password: Some("pw".to_string()),
    };

    authenticate(&api, &MemoryStore::default(), &credentials, &FixedPrompt("prompt", "prompt")).unwrap();
    assert_eq!(api.logins.borrow()[0].0, "cli@lab.org");
}

#[test]
fn test_failed_login_and_empty_credentials() {
    let api = MockApi::default();
    let store = MemoryStore::default();

    let err = authenticate(&api, &store, &Credentials::default(), &FixedPrompt("me", "pw")).unwrap_err();
    assert!(matches!(err, UploadError::AuthenticationFailed(_)));
    assert!(store.load().is_none());

    let err = authenticate(&api, &store, &Credentials::default(), &FixedPrompt("", "pw")).unwrap_err();
    assert!(err.to_string().contains("username is required"));
}

#[test]
fn test_job_states_map_to_outcomes() {
    let api = MockApi::with_jobs(&["P", "R", "R", "F"]);
    assert_eq!(monitor_job(&api, "t", 7, Duration::ZERO).unwrap(), ImportOutcome::Succeeded);

    let api = MockApi::with_jobs(&["R", "E"]);
    assert_eq!(
        monitor_job(&api, "t", 7, Duration::ZERO).unwrap(),
        ImportOutcome::Failed(vec!["missing column object_id".to_string()])
    );

    let api = MockApi::with_jobs(&["P", "A"]);
    assert_eq!(
        monitor_job(&api, "t", 7, Duration::ZERO).unwrap(),
        ImportOutcome::NeedsManualIntervention
    );
}

#[test]
fn test_import_uses_server_path_stem() {
    let dir = TempDir::new().unwrap();
    let api = MockApi::with_jobs(&["F"]);
    let bundle = &bundles(&dir, &["s1"])[0];

    let outcome = upload_bundle(&api, "t", 1, bundle, Duration::ZERO).unwrap();
    assert_eq!(outcome, ImportOutcome::Succeeded);
    assert_eq!(api.imports.borrow()[0], "ecotaxa_s1");
}

#[test]
fn test_existing_samples_are_skipped_and_failures_do_not_stop_batch() {
    let dir = TempDir::new().unwrap();
    let paths = bundles(&dir, &["a", "b", "c"]);
    let api = MockApi {
        existing: ["a".to_string()].into_iter().collect(),
        failing_uploads: vec!["ecotaxa_b.zip".to_string()],
        ..MockApi::with_jobs(&["F"])
    };

    let summary = upload_bundles(&api, "t", 1, &paths, Duration::ZERO).unwrap();

    assert_eq!(summary.skipped, vec!["a"]);
    assert_eq!(summary.imported, vec!["c"]);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, "b");
    assert!(summary.failed[0].1.contains("disk full"));
    assert_eq!(*api.uploads.borrow(), vec!["ecotaxa_c.zip"]);
}

#[test]
fn test_find_bundles_filters_and_sorts() {
    let dir = TempDir::new().unwrap();
    bundles(&dir, &["b", "a"]);
    std::fs::write(dir.path().join("ecotaxa_a.tsv"), b"").unwrap();
    std::fs::write(dir.path().join("other.zip"), b"").unwrap();

    let found = find_bundles(dir.path(), None).unwrap();
    let ids: Vec<String> = found.iter().filter_map(|p| bundle_sample_id(p)).collect();
    assert_eq!(ids, vec!["a", "b"]);

    let only_b = find_bundles(dir.path(), Some("b")).unwrap();
    assert_eq!(only_b.len(), 1);
}

#[test]
fn test_file_token_store_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = FileTokenStore::new(dir.path().join("nested").join("token"));

    assert!(store.load().is_none());
    store.store("abc").unwrap();
    assert_eq!(store.load().as_deref(), Some("abc"));
    store.clear();
    assert!(store.load().is_none());
}
