use fhirpath_compare::fixtures::{FixtureCache, xml_to_json};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::fs;
use tempfile::TempDir;

#[test]
fn xml_converts_to_fhir_json_shape() {
    let value = xml_to_json(
        r#"<Patient xmlns="http://hl7.org/fhir">
             <id value="example"/>
             <active value="true"/>
             <name use="official">
               <family value="Chalmers"/>
               <given value="Peter"/>
               <given value="James"/>
             </name>
           </Patient>"#,
    )
    .unwrap();

    assert_eq!(value["resourceType"], json!("Patient"));
    // xmlns attributes are dropped, value attributes collapse to strings.
    assert_eq!(value["id"], json!("example"));
    assert_eq!(value["active"], json!("true"));
    assert_eq!(value["name"]["use"], json!("official"));
    assert_eq!(value["name"]["family"], json!("Chalmers"));
    // Repeated siblings accumulate into an array.
    assert_eq!(value["name"]["given"], json!(["Peter", "James"]));
}

#[test]
fn text_content_becomes_the_value() {
    let value = xml_to_json("<note><text>hello</text></note>").unwrap();
    assert_eq!(value["resourceType"], json!("note"));
    assert_eq!(value["text"], json!("hello"));
}

#[test]
fn malformed_xml_is_rejected() {
    assert!(xml_to_json("<Patient><name></Patient>").is_err());
    assert!(xml_to_json("").is_err());
}

#[test]
fn missing_fixture_returns_none() {
    let dir = TempDir::new().unwrap();
    let mut cache = FixtureCache::new(dir.path());
    assert!(cache.load("absent.xml").is_none());
}

#[test]
fn unreadable_fixture_treated_like_missing() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("broken.xml"), "<Patient><oops>").unwrap();
    let mut cache = FixtureCache::new(dir.path());
    assert!(cache.load("broken.xml").is_none());
}

#[test]
fn json_fixture_parses_directly() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("patient.json"),
        r#"{"resourceType": "Patient", "id": "example"}"#,
    )
    .unwrap();
    let mut cache = FixtureCache::new(dir.path());
    let value = cache.load("patient.json").unwrap();
    assert_eq!(value["id"], json!("example"));
}

#[test]
fn first_successful_load_is_cached_for_the_run() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("patient-example.xml");
    fs::write(&path, r#"<Patient><id value="one"/></Patient>"#).unwrap();

    let mut cache = FixtureCache::new(dir.path());
    assert_eq!(cache.load("patient-example.xml").unwrap()["id"], json!("one"));

    // Even with the file gone, the cached form keeps serving.
    fs::remove_file(&path).unwrap();
    assert_eq!(cache.load("patient-example.xml").unwrap()["id"], json!("one"));
}
