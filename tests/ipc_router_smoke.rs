mod test_support;

use serde_json::json;
use std::io::Write;
use test_support::{read_response, request, request_ok, signed_in_admin, str_at};

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let (_workspace, mut child, mut stdin, mut reader) = signed_in_admin("pfmpd-router-smoke");

    let methods = [
        ("health", json!({})),
        ("auth.session", json!({})),
        ("users.list", json!({})),
        ("classes.list", json!({})),
        ("students.list", json!({})),
        ("periods.list", json!({})),
        ("rubric.describe", json!({})),
        ("evaluations.list", json!({})),
        ("reports.preview", json!({ "studentId": "x", "periodId": "y" })),
        ("stats.overview", json!({})),
    ];
    for (i, (method, params)) in methods.into_iter().enumerate() {
        let resp = request(&mut stdin, &mut reader, &format!("m{i}"), method, params);
        if resp.get("ok").and_then(|v| v.as_bool()) == Some(false) {
            let code = resp["error"]["code"].as_str().unwrap_or("unknown");
            assert_ne!(code, "not_implemented", "unexpected unknown method {method}");
        }
    }

    let unknown = request(&mut stdin, &mut reader, "u1", "nope.method", json!({}));
    assert_eq!(unknown["error"]["code"], "not_implemented");

    writeln!(stdin, "this is not json").expect("write garbage");
    stdin.flush().expect("flush");
    let bad = read_response(&mut reader);
    assert_eq!(bad["ok"], false);
    assert_eq!(bad["error"]["code"], "bad_json");

    let health = request_ok(&mut stdin, &mut reader, "h2", "health", json!({}));
    assert_eq!(health["signedIn"], true);
    assert_eq!(str_at(&health, "version"), env!("CARGO_PKG_VERSION"));

    drop(stdin);
    let _ = child.wait();
}
