use super::*;
use crate::config::{ActiveConfig, MappingRuleSet, RawSettings};
use std::time::Duration;

fn rules() -> MappingRuleSet {
    let raw: RawSettings = vec![
        ("default.roles", "confluence-users"),
        ("header.dynamicroles.attributenames", "SHIB-EP-ENTITLEMENT, shib-ep-affiliation"),
        ("header.dynamicroles.staff", "confluence-staff,confluence-editors"),
        ("header.dynamicroles.faculty", "confluence-faculty"),
        ("header.dynamicroles.member", "confluence-editors"),
    ]
    .into_iter()
    .collect();
    MappingRuleSet::parse(&raw).unwrap()
}

fn groups(r: &ResolvedRoles) -> Vec<&str> { r.iter().collect() }

#[test]
fn resolve_maps_values_case_insensitively() {
    let a = IdentityAssertion::new("alice").with_attribute("Shib-Ep-Entitlement", "STAFF");
    assert_eq!(groups(&resolve(&a, &rules())), vec!["confluence-editors", "confluence-staff"]);
}

#[test]
fn resolve_unions_and_collapses_duplicates_across_headers() {
    let a = IdentityAssertion::new("alice")
        .with_attribute("SHIB-EP-ENTITLEMENT", "staff;faculty")
        .with_attribute("shib-ep-affiliation", " member , staff ");
    assert_eq!(
        groups(&resolve(&a, &rules())),
        vec!["confluence-editors", "confluence-faculty", "confluence-staff"]
    );
}

#[test]
fn resolve_ignores_unmapped_values_and_unwatched_headers() {
    let a = IdentityAssertion::new("alice")
        .with_attribute("SHIB-EP-ENTITLEMENT", "unknown-value")
        .with_attribute("X-OTHER", "staff");
    assert!(resolve(&a, &rules()).is_empty());
}

#[test]
fn resolve_without_watch_list_is_empty_even_with_mappings() {
    let raw: RawSettings = vec![("header.dynamicroles.staff", "confluence-staff"), ("default.roles", "users")]
        .into_iter()
        .collect();
    let rules = MappingRuleSet::parse(&raw).unwrap();
    let a = IdentityAssertion::new("alice").with_attribute("staff", "staff");
    assert!(resolve(&a, &rules).is_empty());
    assert_eq!(groups(&effective_roles(&a, &rules)), vec!["users"]);
}

#[test]
fn effective_roles_include_defaults() {
    let a = IdentityAssertion::new("alice").with_attribute("SHIB-EP-ENTITLEMENT", "Staff");
    assert_eq!(
        groups(&effective_roles(&a, &rules())),
        vec!["confluence-editors", "confluence-staff", "confluence-users"]
    );
    let b = IdentityAssertion::new("bob").with_attribute("SHIB-EP-ENTITLEMENT", "unknown-value");
    assert_eq!(groups(&effective_roles(&b, &rules())), vec!["confluence-users"]);
}

#[test]
fn assertion_reads_profile_and_watched_headers() {
    let raw: RawSettings = vec![
        ("header.fullname", "SHIB-CN"),
        ("header.email", "SHIB-MAIL"),
        ("header.dynamicroles.attributenames", "SHIB-EP-ENTITLEMENT"),
    ]
    .into_iter()
    .collect();
    let config = ActiveConfig::parse(&raw).unwrap();
    let req = RequestHeaders::new()
        .with("shib-cn", "Alice Liddell")
        .with("SHIB-MAIL", "Alice@Example.ORG")
        .with("Shib-Ep-Entitlement", "staff faculty")
        .with("x-unrelated", "staff");
    let a = IdentityAssertion::from_request("alice", &req, &config);
    assert_eq!(a.full_name.as_deref(), Some("Alice Liddell"));
    assert_eq!(a.email.as_deref(), Some("alice@example.org"));
    assert_eq!(a.asserted_attribute_values.len(), 1);
    assert_eq!(a.asserted_attribute_values["shib-ep-entitlement"], vec!["staff", "faculty"]);
    assert!(a.has_attribute("SHIB-EP-ENTITLEMENT"));
    assert!(!a.has_attribute("x-unrelated"));
}

#[test]
fn assertion_full_name_defaults_to_user_id() {
    let raw: RawSettings = vec![("header.fullname", "SHIB-CN")].into_iter().collect();
    let config = ActiveConfig::parse(&raw).unwrap();
    let req = RequestHeaders::new().with("SHIB-CN", "   ");
    let a = IdentityAssertion::from_request("alice", &req, &config);
    assert_eq!(a.full_name.as_deref(), Some("alice"));
    assert_eq!(a.email, None);
    assert!(a.asserted_attribute_values.is_empty());
}

#[test]
fn remote_user_header_trims_and_rejects_blank() {
    let id = RemoteUserHeader::new("REMOTE_USER");
    assert_eq!(id.asserted_principal(&RequestHeaders::new().with("remote_user", " Alice ")), Some("Alice".into()));
    assert_eq!(id.asserted_principal(&RequestHeaders::new().with("REMOTE_USER", "")), None);
    assert_eq!(id.asserted_principal(&RequestHeaders::new()), None);
    assert_eq!(normalize_user_id(" Alice@EXAMPLE.org "), "alice@example.org");
}

#[test]
fn profile_update_diffs_fields_independently() {
    let mut p = Principal::new("alice");
    p.full_name = Some("Alice".into());
    p.email = Some("alice@example.org".into());
    let u = ProfileUpdate::diff(&p, Some("Alice"), Some("alice@example.org"));
    assert!(u.is_empty());
    let u = ProfileUpdate::diff(&p, Some("Alice Liddell"), Some("alice@example.org"));
    assert_eq!(u.full_name.as_deref(), Some("Alice Liddell"));
    assert_eq!(u.email, None);
    let u = ProfileUpdate::diff(&p, None, None);
    assert!(u.is_empty());
}

#[test]
fn session_round_trip_and_logout() {
    let sm = SessionManager::default();
    let h = sm.open(None).unwrap();
    assert!(h.is_fresh());
    assert!(h.principal().is_none());
    // nothing stored until the first write
    assert!(sm.is_empty());

    h.set_principal(Principal::new("alice"));
    h.clear_logged_out();
    let again = sm.open(Some(h.token())).unwrap();
    assert!(!again.is_fresh());
    assert_eq!(again.principal().unwrap().user_id, "alice");

    assert!(sm.logout(h.token()));
    assert!(sm.is_logged_out(h.token()));
    assert!(sm.open(Some(h.token())).unwrap().principal().is_none());

    // re-authentication clears the marker
    again.set_principal(Principal::new("alice"));
    again.clear_logged_out();
    assert!(!sm.is_logged_out(h.token()));
}

#[test]
fn session_unknown_or_expired_tokens_get_a_fresh_one() {
    let sm = SessionManager::new(Duration::from_millis(0));
    let h = sm.open(Some("not-a-session")).unwrap();
    assert!(h.is_fresh());
    assert_ne!(h.token(), "not-a-session");
    h.set_principal(Principal::new("alice"));
    // zero ttl: already expired
    assert!(h.principal().is_none());
    assert!(sm.open(Some(h.token())).unwrap().is_fresh());
    assert_eq!(sm.sweep_expired(), 0);
}

#[test]
fn header_values_decode_utf8_then_latin1() {
    assert_eq!(decode_header_value("José Núñez".as_bytes()), "José Núñez");
    assert_eq!(decode_header_value(b"Jos\xe9 N\xfa\xf1ez"), "José Núñez");
    assert_eq!(decode_header_value(b"plain"), "plain");
}
