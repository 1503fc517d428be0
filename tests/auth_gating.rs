mod test_support;

use serde_json::json;
use test_support::{request_err, request_ok, spawn_sidecar, str_at, temp_dir};

#[test]
fn routes_require_a_session_and_users_require_admin() {
    let workspace = temp_dir("pfmpd-auth-gating");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(
        request_err(&mut stdin, &mut reader, "2", "classes.list", json!({})),
        "unauthorized"
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    // Names are required; nothing is registered without them.
    assert_eq!(
        request_err(
            &mut stdin,
            &mut reader,
            "4a",
            "users.create",
            json!({ "email": "admin@lycee.fr", "password": "secret1", "nom": " ", "prenom": "Claire" }),
        ),
        "validation_failed"
    );
    assert_eq!(
        request_err(
            &mut stdin,
            &mut reader,
            "4b",
            "users.create",
            json!({ "email": "admin@lycee.fr", "password": "secret1" }),
        ),
        "bad_params"
    );

    // No account yet: the first users.create is let through and made admin.
    let admin = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "users.create",
        json!({ "email": "Admin@Lycee.fr", "password": "secret1", "nom": "Martin", "prenom": "Claire", "role": "professeur" }),
    );
    assert_eq!(admin["user"]["role"], "admin");
    assert_eq!(admin["user"]["email"], "admin@lycee.fr");

    // Bootstrap is closed once an account exists.
    assert_eq!(
        request_err(
            &mut stdin,
            &mut reader,
            "5",
            "users.create",
            json!({ "email": "x@lycee.fr", "password": "secret1", "nom": "X", "prenom": "Y" }),
        ),
        "unauthorized"
    );
    assert_eq!(
        request_err(
            &mut stdin,
            &mut reader,
            "6",
            "auth.signIn",
            json!({ "email": "admin@lycee.fr", "password": "wrong-password" }),
        ),
        "bad_credentials"
    );

    let signed = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "auth.signIn",
        json!({ "email": "admin@lycee.fr", "password": "secret1" }),
    );
    let admin_id = str_at(&signed["session"], "userId").to_string();

    request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "users.create",
        json!({ "email": "prof@lycee.fr", "password": "secret2", "nom": "Durand", "prenom": "Paul" }),
    );
    assert_eq!(
        request_err(
            &mut stdin,
            &mut reader,
            "9",
            "users.create",
            json!({ "email": "prof@lycee.fr", "password": "secret2", "nom": "Durand", "prenom": "Paul" }),
        ),
        "conflict"
    );
    let teachers = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "users.list",
        json!({ "role": "professeur" }),
    );
    assert_eq!(teachers["users"].as_array().map(|a| a.len()), Some(1));
    assert_eq!(
        request_err(&mut stdin, &mut reader, "11", "users.delete", json!({ "id": admin_id })),
        "validation_failed"
    );

    request_ok(&mut stdin, &mut reader, "12", "auth.signOut", json!({}));
    let session = request_ok(&mut stdin, &mut reader, "13", "auth.session", json!({}));
    assert!(session["session"].is_null());

    request_ok(
        &mut stdin,
        &mut reader,
        "14",
        "auth.signIn",
        json!({ "email": "prof@lycee.fr", "password": "secret2" }),
    );
    request_ok(&mut stdin, &mut reader, "15", "classes.list", json!({}));
    assert_eq!(
        request_err(&mut stdin, &mut reader, "16", "users.list", json!({})),
        "forbidden"
    );
    assert_eq!(
        request_err(&mut stdin, &mut reader, "16a", "classes.create", json!({ "nom": "2MTNE1" })),
        "forbidden"
    );
    assert_eq!(
        request_err(&mut stdin, &mut reader, "16b", "periods.delete", json!({ "id": "any" })),
        "forbidden"
    );
    assert_eq!(
        request_err(
            &mut stdin,
            &mut reader,
            "16c",
            "students.import",
            json!({ "content": "nom,prenom,classe\nDupont,Jean,2MTNE1\n" }),
        ),
        "forbidden"
    );
    let classes = request_ok(&mut stdin, &mut reader, "16d", "classes.list", json!({}));
    assert_eq!(classes["classes"].as_array().map(|a| a.len()), Some(0));

    // A workspace switch drops the session.
    request_ok(
        &mut stdin,
        &mut reader,
        "17",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert_eq!(
        request_err(&mut stdin, &mut reader, "18", "classes.list", json!({})),
        "unauthorized"
    );
}
