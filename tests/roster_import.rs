mod test_support;

use serde_json::json;
use test_support::{request, request_ok, signed_in_admin, str_at};

#[test]
fn roster_import_is_all_or_nothing() {
    let (workspace, _child, mut stdin, mut reader) = signed_in_admin("pfmpd-roster-import");
    request_ok(&mut stdin, &mut reader, "1", "classes.create", json!({ "nom": "2MTNE1" }));

    let missing = request(
        &mut stdin,
        &mut reader,
        "2",
        "students.import",
        json!({ "content": "nom;prenom\nDupont;Jean\n" }),
    );
    assert_eq!(missing["ok"], false);
    assert_eq!(missing["error"]["code"], "missing_column");
    assert_eq!(
        missing["error"]["message"],
        "Colonne manquante ou vide : classe. Colonnes détectées : nom, prenom"
    );

    let unknown = request(
        &mut stdin,
        &mut reader,
        "3",
        "students.import",
        json!({ "content": "nom,prenom,classe\nDupont,Jean,2MTNE1\nMartin,Léa,1MELEC\n" }),
    );
    assert_eq!(unknown["error"]["code"], "unknown_class");
    assert_eq!(unknown["error"]["details"]["classes"], json!(["1MELEC"]));

    let listed = request_ok(&mut stdin, &mut reader, "4", "students.list", json!({}));
    assert_eq!(listed["students"].as_array().map(|a| a.len()), Some(0));

    let file = workspace.join("roster.csv");
    std::fs::write(&file, "nom ; prenom ; classe\nDupont;Jean;2MTNE1\n\nMartin;Léa;2MTNE1\n")
        .expect("write roster");
    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "students.import",
        json!({ "path": file.to_string_lossy() }),
    );
    assert_eq!(imported["imported"], 2);

    let xlsx = request(
        &mut stdin,
        &mut reader,
        "6",
        "students.import",
        json!({ "path": workspace.join("roster.xlsx").to_string_lossy() }),
    );
    assert_eq!(xlsx["error"]["code"], "unsupported_format");

    let class = request_ok(&mut stdin, &mut reader, "7", "classes.create", json!({ "nom": "1MELEC" }));
    let class_id = str_at(&class, "classId").to_string();
    let into_class = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "classes.importStudents",
        json!({ "classId": class_id, "content": "nom,prenom,dateNaissance\nBernard,Luc,2008-03-02\n" }),
    );
    assert_eq!(into_class["imported"], 1);
    let members = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "students.list",
        json!({ "classId": class_id }),
    );
    assert_eq!(members["students"][0]["dateNaissance"], "2008-03-02");
}
