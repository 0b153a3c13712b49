use super::*;

#[test]
fn http_status_mapping() {
    let e = |code: &str| (code.to_string(), "msg".to_string());
    let (code, message) = e("bad_input");
    assert_eq!(AppError::UserInput { code, message }.http_status(), 400);
    let (code, message) = e("auth");
    assert_eq!(AppError::Auth { code, message }.http_status(), 401);
    let (code, message) = e("down");
    assert_eq!(AppError::Unavailable { code, message }.http_status(), 503);
    let (code, message) = e("internal");
    let err = AppError::Internal { code, message };
    assert_eq!(err.http_status(), 500);
    assert_eq!(err.to_string(), "internal: msg");
}

#[test]
fn auth_errors_map_to_unauthorized_except_directory_faults() {
    let e: AppError = AuthError::NoIdentityAsserted.into();
    assert_eq!(e.code_str(), "no_identity");
    assert_eq!(e.http_status(), 401);

    let e: AppError = AuthError::UnknownPrincipal("bob".into()).into();
    assert_eq!(e.code_str(), "unknown_principal");
    assert!(e.message().contains("bob"));
    assert_eq!(e.http_status(), 401);

    let e: AppError = AuthError::DirectoryUnavailable { user: "bob".into(), message: "timeout".into() }.into();
    assert_eq!(e.code_str(), "directory_unavailable");
    assert_eq!(e.http_status(), 503);
}

#[test]
fn config_errors_map_by_kind() {
    let e: AppError = ConfigError::MalformedRule { key: "header.dynamicroles.".into(), reason: "empty".into() }.into();
    assert_eq!(e.http_status(), 400);
    assert_eq!(e.code_str(), "config_invalid");

    let e: AppError = ConfigError::Unreadable { source_name: "/etc/x".into(), message: "gone".into() }.into();
    assert_eq!(e.http_status(), 503);
    assert_eq!(format!("{e}"), "config_unreadable: config source '/etc/x' unreadable: gone");
}
