use pretty_assertions::assert_eq;
use rowtree::{Document, DocumentOptions, Order, RowTreeError};

fn ids_and_names(doc: &Document) -> Vec<(String, String)> {
    doc.records()
        .iter()
        .map(|r| (r.id.clone(), r.text("name").into_owned()))
        .collect()
}

#[test]
fn test_create_then_decode_delimited() {
    let mut doc = Document::new("contacts[title]/contact(name,age,dob)").unwrap();
    let bob = doc
        .create([("name", "Bob"), ("age", "52"), ("dob", "1970-01-01")])
        .unwrap();
    assert_eq!(bob.id, "1");
    assert_eq!(bob.last_modified, "");

    let line = doc.to_delimited().unwrap();
    let mut copy = Document::new("contacts[title]/contact(name,age,dob)").unwrap();
    copy.import(&line).unwrap();
    assert_eq!(copy.flat_records(), doc.flat_records());
}

#[test]
fn test_descending_batch_numbering() {
    let options = DocumentOptions {
        order: Order::Descending,
        ..DocumentOptions::default()
    };
    let mut doc = Document::with_options("contacts/contact(name,telno)", options).unwrap();
    doc.import("Bob 555\nAnn 556\nCat 557").unwrap();
    assert_eq!(
        ids_and_names(&doc),
        vec![
            ("3".to_string(), "Bob".to_string()),
            ("2".to_string(), "Ann".to_string()),
            ("1".to_string(), "Cat".to_string()),
        ]
    );

    doc.import("Dan 558\nBob 555\nCat 557").unwrap();
    assert_eq!(
        ids_and_names(&doc),
        vec![
            ("4".to_string(), "Dan".to_string()),
            ("3".to_string(), "Bob".to_string()),
            ("1".to_string(), "Cat".to_string()),
        ]
    );
}

#[test]
fn test_absent_keys_are_deleted() {
    let mut doc = Document::new("contacts/contact(name,telno)").unwrap();
    doc.import("--+\nname: Bob\ntelno: 555\n\nname: Ann\ntelno: 556").unwrap();
    let report = doc.import("--+\nname: Ann\ntelno: 557").unwrap();
    assert_eq!(report.removed, 1);
    assert_eq!(ids_and_names(&doc), vec![("2".to_string(), "Ann".to_string())]);
    assert_eq!(doc.get("Ann").unwrap().text("telno"), "557");
}

#[test]
fn test_decode_error_names_the_line() {
    let mut doc = Document::new("contacts/contact(name,telno)").unwrap();
    doc.set_delimiter(",");
    let err = doc.import("Bob,555\n\n# comment\nAnn 556").unwrap_err();
    match err {
        RowTreeError::Decode { line, text } => {
            assert_eq!(line, 4);
            assert_eq!(text, "Ann 556");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(doc.is_empty());
}

#[test]
fn test_markup_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("journal.xml");

    let mut doc = Document::new("journal[owner]/day(entry)").unwrap();
    doc.set_summary_value("owner", "kim").unwrap();
    doc.import("--#\n# Mon\nran 5k\n\n# Tue\nrest").unwrap();
    doc.save_as(&path).unwrap();

    let reopened = Document::open(path.to_str().unwrap()).unwrap();
    assert_eq!(reopened.summary().get("owner"), Some("kim"));
    assert_eq!(reopened.records(), doc.records());
    assert_eq!(reopened.to_section(), doc.to_section());
}
