//! Binding validation tests
//!
//! - The "at least one valid coding" rule for CodeableConcept, in both the
//!   value-set and bare-code-system branches
//! - Coding/Quantity/Code element kinds
//! - Extension-redirected resolution
//! - One violation per record, first offending element only
//! - Violation message contents

use octofhir_conformance::{
    BindingDescriptor, BindingKind, BindingStrength, InMemoryTerminologyService, Node,
    invalid_bindings,
};
use serde_json::{json, Value};

// =============================================================================
// Helper Functions
// =============================================================================

const CATEGORY_VS: &str = "http://example.org/vs/observation-category";
const CATEGORY_SYSTEM: &str = "http://terminology.hl7.org/CodeSystem/observation-category";

fn terminology() -> InMemoryTerminologyService {
    let mut service = InMemoryTerminologyService::new();
    service.add_value_set_code(CATEGORY_VS, "vital-signs", Some(CATEGORY_SYSTEM), None);
    service.add_value_set_code(CATEGORY_VS, "laboratory", Some(CATEGORY_SYSTEM), None);
    service.add_system_code(CATEGORY_SYSTEM, "vital-signs");
    service.add_system_code(CATEGORY_SYSTEM, "laboratory");
    service
}

fn concept_descriptor(value_set_url: Option<&str>) -> BindingDescriptor {
    BindingDescriptor {
        element_path: "category".to_string(),
        kind: BindingKind::CodeableConcept,
        value_set_url: value_set_url.map(|s| s.to_string()),
        extension_urls: Vec::new(),
        strength: BindingStrength::Required,
        description: None,
    }
}

fn observation(id: &str, codes: &[&str]) -> Value {
    let codings: Vec<Value> = codes
        .iter()
        .map(|code| json!({"system": CATEGORY_SYSTEM, "code": code}))
        .collect();
    json!({
        "resourceType": "Observation",
        "id": id,
        "category": [{"coding": codings}]
    })
}

// =============================================================================
// CodeableConcept: at least one valid coding
// =============================================================================

#[tokio::test]
async fn test_one_valid_coding_suffices() {
    let record = observation("mixed", &["not-a-category", "vital-signs"]);
    let records = vec![Node::new(&record)];

    let violations = invalid_bindings(
        &concept_descriptor(Some(CATEGORY_VS)),
        &records,
        &terminology(),
    )
    .await
    .unwrap();
    assert!(
        violations.is_empty(),
        "[invalid, valid] codings must not be flagged"
    );
}

#[tokio::test]
async fn test_all_invalid_codings_are_flagged() {
    let record = observation("bad", &["not-a-category", "also-wrong"]);
    let records = vec![Node::new(&record)];

    let violations = invalid_bindings(
        &concept_descriptor(Some(CATEGORY_VS)),
        &records,
        &terminology(),
    )
    .await
    .unwrap();
    assert_eq!(violations.len(), 1);
    assert!(violations[0].message.contains("Observation/bad"));
    assert!(violations[0]
        .message
        .contains(&format!("{CATEGORY_SYSTEM}|not-a-category")));
    assert!(violations[0].message.contains(" or "));
    assert!(violations[0].message.contains(CATEGORY_VS));
}

#[tokio::test]
async fn test_bare_code_system_branch_uses_same_quantifier() {
    // No value set named: each coding is checked against its own declared
    // system, and one valid coding still suffices.
    let mixed = observation("mixed", &["bogus", "laboratory"]);
    let bad = observation("bad", &["bogus"]);
    let records = vec![Node::new(&mixed), Node::new(&bad)];

    let violations = invalid_bindings(&concept_descriptor(None), &records, &terminology())
        .await
        .unwrap();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].record.string_field("id"), Some("bad"));
    assert!(violations[0].message.contains("its declared code system"));
}

// =============================================================================
// Other bound kinds
// =============================================================================

#[tokio::test]
async fn test_coding_kind() {
    let mut service = InMemoryTerminologyService::new();
    service.add_value_set_code("http://example.org/vs/loinc", "8480-6", Some("http://loinc.org"), None);

    let descriptor = BindingDescriptor {
        element_path: "code.coding".to_string(),
        kind: BindingKind::Coding,
        value_set_url: Some("http://example.org/vs/loinc".to_string()),
        extension_urls: Vec::new(),
        strength: BindingStrength::Required,
        description: None,
    };

    let good = json!({
        "resourceType": "Observation",
        "id": "good",
        "code": {"coding": [{"system": "http://loinc.org", "code": "8480-6"}]}
    });
    let bad = json!({
        "resourceType": "Observation",
        "id": "bad",
        "code": {"coding": [{"system": "http://loinc.org", "code": "9999-9"}]}
    });
    let records = vec![Node::new(&good), Node::new(&bad)];

    let violations = invalid_bindings(&descriptor, &records, &service).await.unwrap();
    assert_eq!(violations.len(), 1);
    assert!(violations[0].message.contains("http://loinc.org|9999-9"));
}

#[tokio::test]
async fn test_quantity_kind() {
    let mut service = InMemoryTerminologyService::new();
    service.add_value_set_code(
        "http://example.org/vs/ucum",
        "mm[Hg]",
        Some("http://unitsofmeasure.org"),
        None,
    );

    let descriptor = BindingDescriptor {
        element_path: "valueQuantity".to_string(),
        kind: BindingKind::Quantity,
        value_set_url: Some("http://example.org/vs/ucum".to_string()),
        extension_urls: Vec::new(),
        strength: BindingStrength::Required,
        description: None,
    };

    let record = json!({
        "resourceType": "Observation",
        "id": "qty",
        "valueQuantity": {"value": 120, "system": "http://unitsofmeasure.org", "code": "furlongs"}
    });
    let records = vec![Node::new(&record)];

    let violations = invalid_bindings(&descriptor, &records, &service).await.unwrap();
    assert_eq!(violations.len(), 1);
}

#[tokio::test]
async fn test_bare_code_kind() {
    let mut service = InMemoryTerminologyService::new();
    service.add_value_set_code("http://example.org/vs/status", "final", None, None);

    let descriptor = BindingDescriptor {
        element_path: "status".to_string(),
        kind: BindingKind::Code,
        value_set_url: Some("http://example.org/vs/status".to_string()),
        extension_urls: Vec::new(),
        strength: BindingStrength::Required,
        description: None,
    };

    let good = json!({"resourceType": "Observation", "id": "a", "status": "final"});
    let bad = json!({"resourceType": "Observation", "id": "b", "status": "bogus"});
    let records = vec![Node::new(&good), Node::new(&bad)];

    let violations = invalid_bindings(&descriptor, &records, &service).await.unwrap();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].record.string_field("id"), Some("b"));
}

// =============================================================================
// Resolution details
// =============================================================================

#[tokio::test]
async fn test_first_offending_element_only() {
    // Both category elements are invalid; the record yields exactly one
    // violation carrying the first.
    let record = json!({
        "resourceType": "Observation",
        "id": "multi",
        "category": [
            {"coding": [{"system": CATEGORY_SYSTEM, "code": "first-bad"}]},
            {"coding": [{"system": CATEGORY_SYSTEM, "code": "second-bad"}]}
        ]
    });
    let records = vec![Node::new(&record)];

    let violations = invalid_bindings(
        &concept_descriptor(Some(CATEGORY_VS)),
        &records,
        &terminology(),
    )
    .await
    .unwrap();
    assert_eq!(violations.len(), 1);
    assert!(violations[0].message.contains("first-bad"));
    assert!(!violations[0].message.contains("second-bad"));
}

#[tokio::test]
async fn test_extension_chain_redirect() {
    let mut service = InMemoryTerminologyService::new();
    service.add_value_set_code(
        "http://example.org/vs/race",
        "2106-3",
        Some("urn:oid:2.16.840.1.113883.6.238"),
        None,
    );

    let descriptor = BindingDescriptor {
        element_path: "valueCoding".to_string(),
        kind: BindingKind::Coding,
        value_set_url: Some("http://example.org/vs/race".to_string()),
        extension_urls: vec![
            "http://example.org/StructureDefinition/race".to_string(),
            "ombCategory".to_string(),
        ],
        strength: BindingStrength::Required,
        description: None,
    };

    let good = json!({
        "resourceType": "Patient",
        "id": "good",
        "extension": [{
            "url": "http://example.org/StructureDefinition/race",
            "extension": [{
                "url": "ombCategory",
                "valueCoding": {"system": "urn:oid:2.16.840.1.113883.6.238", "code": "2106-3"}
            }]
        }]
    });
    let bad = json!({
        "resourceType": "Patient",
        "id": "bad",
        "extension": [{
            "url": "http://example.org/StructureDefinition/race",
            "extension": [{
                "url": "ombCategory",
                "valueCoding": {"system": "urn:oid:2.16.840.1.113883.6.238", "code": "9999-9"}
            }]
        }]
    });
    let records = vec![Node::new(&good), Node::new(&bad)];

    let violations = invalid_bindings(&descriptor, &records, &service).await.unwrap();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].record.string_field("id"), Some("bad"));
}

#[tokio::test]
async fn test_extensible_strength_is_carried_on_violation() {
    let mut descriptor = concept_descriptor(Some(CATEGORY_VS));
    descriptor.strength = BindingStrength::Extensible;

    let record = observation("bad", &["wrong"]);
    let records = vec![Node::new(&record)];

    let violations = invalid_bindings(&descriptor, &records, &terminology())
        .await
        .unwrap();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].strength, BindingStrength::Extensible);
    assert!(!violations[0].strength.is_error_on_failure());
}
