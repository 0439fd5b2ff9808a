//! Terminology binding validation.
//!
//! A binding descriptor names an element path, the datatype bound at that
//! path, and optionally the value set the element's code must come from.
//! [`invalid_bindings`] checks a set of records against one descriptor and
//! returns a violation per offending record. Violations are data for the
//! caller to turn into pass/fail semantics; only terminology service
//! failures are errors.

use serde::{Deserialize, Serialize};

use crate::node::Node;
use crate::path::{resolve, resolve_node};
use crate::terminology::{BindingStrength, TerminologyResult, TerminologyService};

/// Datatype of the element a binding applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BindingKind {
    CodeableConcept,
    Coding,
    Quantity,
    Code,
}

/// Description of one required terminology binding.
///
/// Binding descriptors are implementation-guide data, so the struct is
/// serde-deserializable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingDescriptor {
    /// Dotted path to the bound element within a record.
    pub element_path: String,
    /// Datatype bound at the path.
    pub kind: BindingKind,
    /// Canonical URL of the required value set. Absent means the binding
    /// only requires each coding to be valid in its own declared system.
    #[serde(default)]
    pub value_set_url: Option<String>,
    /// When present, resolution is redirected through the extensions with
    /// these URLs, in order, before `element_path` is applied.
    #[serde(default)]
    pub extension_urls: Vec<String>,
    /// Strength of the binding; affects severity, not which elements are
    /// flagged.
    #[serde(default)]
    pub strength: BindingStrength,
    /// Human-readable name of the binding target for messages.
    #[serde(default)]
    pub description: Option<String>,
}

/// One record whose bound element failed the binding.
#[derive(Debug, Clone)]
pub struct BindingViolation<'a> {
    /// The offending record.
    pub record: Node<'a>,
    /// The first offending element within the record.
    pub element: Node<'a>,
    /// Strength of the violated binding.
    pub strength: BindingStrength,
    /// Human-readable description of the violation.
    pub message: String,
}

/// Check `records` against a binding descriptor.
///
/// Returns one violation per record with at least one invalid binding
/// instance, in record order, carrying the first offending element only.
/// Terminology service failures abort the check.
pub async fn invalid_bindings<'a>(
    descriptor: &BindingDescriptor,
    records: &[Node<'a>],
    terminology: &dyn TerminologyService,
) -> TerminologyResult<Vec<BindingViolation<'a>>> {
    let mut violations = Vec::new();

    for record in records {
        let sources = redirect_through_extensions(*record, &descriptor.extension_urls);
        let elements = resolve(&sources, &descriptor.element_path);

        for element in elements {
            if binding_satisfied(element, descriptor, terminology).await? {
                continue;
            }
            violations.push(BindingViolation {
                record: *record,
                element,
                strength: descriptor.strength,
                message: render_message(*record, element, descriptor),
            });
            break;
        }
    }

    Ok(violations)
}

/// Narrow the resolution source to matching extensions, one URL at a time.
///
/// Each URL selects, from every current source, the extensions whose `url`
/// equals it; chained URLs walk nested extension structures.
fn redirect_through_extensions<'a>(record: Node<'a>, urls: &[String]) -> Vec<Node<'a>> {
    let mut sources = vec![record];
    for url in urls {
        sources = sources
            .iter()
            .flat_map(|source| resolve_node(*source, "extension"))
            .filter(|extension| extension.string_field("url") == Some(url))
            .collect();
    }
    sources
}

/// Evaluate one bound element. `true` means the binding is satisfied.
async fn binding_satisfied(
    element: Node<'_>,
    descriptor: &BindingDescriptor,
    terminology: &dyn TerminologyService,
) -> TerminologyResult<bool> {
    let value_set_url = descriptor.value_set_url.as_deref();

    match descriptor.kind {
        // At least one coding must validate. With a value set the lookup
        // is value-set membership; without one each coding is checked
        // against its own declared system. The quantifier is the same in
        // both branches.
        BindingKind::CodeableConcept => {
            for coding in resolve_node(element, "coding") {
                let Some(code) = coding.string_field("code") else {
                    continue;
                };
                let system = coding.string_field("system");
                let result = terminology.validate_code(value_set_url, code, system).await?;
                if result.valid {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        BindingKind::Coding | BindingKind::Quantity => {
            let Some(code) = element.string_field("code") else {
                return Ok(false);
            };
            let system = element.string_field("system");
            let result = terminology.validate_code(value_set_url, code, system).await?;
            Ok(result.valid)
        }
        BindingKind::Code => {
            let Some(code) = element.as_str() else {
                return Ok(false);
            };
            let result = terminology.validate_code(value_set_url, code, None).await?;
            Ok(result.valid)
        }
    }
}

/// Render a violation message naming the record, the element path, the
/// offending code(s) and the binding target.
fn render_message(record: Node<'_>, element: Node<'_>, descriptor: &BindingDescriptor) -> String {
    let resource_type = record.string_field("resourceType").unwrap_or("Resource");
    let id = record.string_field("id").unwrap_or("<no id>");

    let codes = match descriptor.kind {
        BindingKind::CodeableConcept => {
            let rendered: Vec<String> = resolve_node(element, "coding")
                .iter()
                .map(|coding| {
                    format!(
                        "{}|{}",
                        coding.string_field("system").unwrap_or_default(),
                        coding.string_field("code").unwrap_or_default()
                    )
                })
                .collect();
            if rendered.is_empty() {
                "(no coding)".to_string()
            } else {
                rendered.join(" or ")
            }
        }
        BindingKind::Coding | BindingKind::Quantity => format!(
            "{}|{}",
            element.string_field("system").unwrap_or_default(),
            element.string_field("code").unwrap_or_default()
        ),
        BindingKind::Code => element.as_str().unwrap_or_default().to_string(),
    };

    let target = match (&descriptor.value_set_url, &descriptor.description) {
        (Some(url), _) => format!("value set {url}"),
        (None, Some(description)) => description.clone(),
        (None, None) => "its declared code system".to_string(),
    };

    format!(
        "{resource_type}/{id}: code {codes} at {path} is not in {target}",
        path = descriptor.element_path
    )
}
