//! HTTP handlers driven through their inner functions with a `HeaderMap`.

use std::io::Write;
use std::sync::Arc;

use axum::http::{HeaderMap, HeaderValue, StatusCode};

use remote_user_auth::config::{ConfigLoader, PropertiesFileSource};
use remote_user_auth::directory::InMemoryDirectory;
use remote_user_auth::server::{logout_inner, parse_cookie, reload_inner, whoami_inner, AppState, SESSION_COOKIE};

const PROPERTIES: &str = "\
# confluence mapping
create.users = true
default.roles = confluence-users
header.fullname = SHIB-CN
header.dynamicroles.attributenames = SHIB-EP-ENTITLEMENT
header.dynamicroles.staff = confluence-staff, confluence-editors
header.dynamicroles.admin = rua-admins
";

struct Fixture {
    _dir: tempfile::TempDir,
    path: std::path::PathBuf,
    state: AppState,
    directory: Arc<InMemoryDirectory>,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("remote-user-auth.properties");
    std::fs::write(&path, PROPERTIES).unwrap();
    let config = Arc::new(ConfigLoader::load(Arc::new(PropertiesFileSource::new(&path))).unwrap());
    let directory = Arc::new(InMemoryDirectory::with_groups(config.current().rules.all_groups()));
    let state = AppState::new(config, directory.clone(), "remote-user", "rua-admins");
    Fixture { _dir: dir, path, state, directory }
}

fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
    let mut h = HeaderMap::new();
    for (k, v) in pairs {
        h.insert(*k, HeaderValue::from_str(v).unwrap());
    }
    h
}

fn session_cookie(out: &HeaderMap) -> String {
    let set = out.get("set-cookie").unwrap().to_str().unwrap();
    let pair = set.split(';').next().unwrap();
    let (name, value) = pair.split_once('=').unwrap();
    assert_eq!(name, SESSION_COOKIE);
    value.to_string()
}

#[tokio::test]
async fn whoami_creates_account_and_sets_cookie() {
    let f = fixture();
    let (status, out, body) =
        whoami_inner(&f.state, &headers(&[("remote-user", "Alice"), ("shib-ep-entitlement", "staff")]));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.0["user"], "alice");
    assert_eq!(body.0["full_name"], "alice");
    assert_eq!(body.0["login"], "created");
    assert_eq!(
        body.0["groups"],
        serde_json::json!(["confluence-editors", "confluence-staff", "confluence-users"])
    );
    assert!(!session_cookie(&out).is_empty());
    assert_eq!(f.directory.user_count(), 1);
}

#[tokio::test]
async fn whoami_reuses_the_session() {
    let f = fixture();
    let (_, out, _) = whoami_inner(&f.state, &headers(&[("remote-user", "alice")]));
    let sid = session_cookie(&out);
    let writes = f.directory.write_count();

    let cookie = format!("other=1; {}={}", SESSION_COOKIE, sid);
    let (status, out, body) = whoami_inner(&f.state, &headers(&[("cookie", &cookie)]));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.0["login"], "session_hit");
    // cookie already held, not re-issued
    assert!(out.get("set-cookie").is_none());
    assert_eq!(f.directory.write_count(), writes);
}

#[tokio::test]
async fn whoami_without_header_is_unauthorized() {
    let f = fixture();
    let (status, out, body) = whoami_inner(&f.state, &HeaderMap::new());
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body.0["status"], "unauthorized");
    assert_eq!(body.0["code"], "no_identity");
    assert!(out.is_empty());
}

#[tokio::test]
async fn logout_clears_principal_and_next_request_reconciles_again() {
    let f = fixture();
    let (_, out, _) = whoami_inner(&f.state, &headers(&[("remote-user", "alice")]));
    let sid = session_cookie(&out);
    let cookie = format!("{}={}", SESSION_COOKIE, sid);

    let (status, out, _) = logout_inner(&f.state, &headers(&[("cookie", &cookie)]));
    assert_eq!(status, StatusCode::OK);
    assert!(out.get("set-cookie").unwrap().to_str().unwrap().starts_with("rua_session=deleted"));
    assert!(f.state.sessions.is_logged_out(&sid));

    let (status, _, _) = whoami_inner(&f.state, &headers(&[("cookie", &cookie)]));
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, body) = whoami_inner(&f.state, &headers(&[("cookie", &cookie), ("remote-user", "alice")]));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.0["login"], "existing");
    assert!(!f.state.sessions.is_logged_out(&sid));
}

const ADMIN: [(&str, &str); 2] = [("remote-user", "root"), ("shib-ep-entitlement", "admin")];

#[tokio::test]
async fn admin_reload_applies_new_mappings_and_rejects_bad_files() {
    let f = fixture();
    {
        let mut file = std::fs::OpenOptions::new().append(true).open(&f.path).unwrap();
        writeln!(file, "header.dynamicroles.faculty = confluence-faculty").unwrap();
    }
    let (status, _, body) = reload_inner(&f.state, &headers(&ADMIN));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.0["mappings"], 3);

    std::fs::write(&f.path, "create.users = perhaps\n").unwrap();
    let (status, _, body) = reload_inner(&f.state, &headers(&ADMIN));
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.0["code"], "config_invalid");
    // previous configuration still active
    assert_eq!(f.state.reconciler.config().current().rules.mapping_count(), 3);
}

#[tokio::test]
async fn admin_reload_requires_the_admin_group() {
    let f = fixture();
    let (status, _, body) = reload_inner(&f.state, &HeaderMap::new());
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body.0["status"], "unauthorized");

    let (status, _, body) = reload_inner(&f.state, &headers(&[("remote-user", "mallory"), ("shib-ep-entitlement", "staff")]));
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body.0["status"], "forbidden");
}

#[tokio::test]
async fn whoami_keeps_non_ascii_header_values() {
    let f = fixture();
    let mut h = headers(&[("remote-user", "jose")]);
    h.insert("shib-cn", HeaderValue::from_bytes("José Núñez".as_bytes()).unwrap());
    let (status, _, body) = whoami_inner(&f.state, &h);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.0["full_name"], "José Núñez");

    // ISO-8859-1 bytes from older proxies
    let mut h = headers(&[("remote-user", "zoe")]);
    h.insert("shib-cn", HeaderValue::from_bytes(b"Zo\xeb").unwrap());
    let (_, _, body) = whoami_inner(&f.state, &h);
    assert_eq!(body.0["full_name"], "Zoë");
}

#[test]
fn cookie_parsing_picks_the_named_pair() {
    let h = headers(&[("cookie", "a=1; rua_session=abc=; b=2")]);
    assert_eq!(parse_cookie(&h, SESSION_COOKIE).as_deref(), Some("abc="));
    assert_eq!(parse_cookie(&h, "missing"), None);
    assert_eq!(parse_cookie(&HeaderMap::new(), SESSION_COOKIE), None);
}
