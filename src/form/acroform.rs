//! Interactive form dictionary helpers.

use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId};
use serde::Serialize;

use crate::document::{catalog_id, decode_pdf_string, resolve, resolve_dict};
use crate::error::Result;

const MAX_FIELD_DEPTH: usize = 32;

/// A terminal form field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormField {
    pub id: ObjectId,
    /// Fully qualified name, parts joined with `.`
    pub name: String,
    /// Field type (`Tx`, `Btn`, `Ch`, `Sig`), possibly inherited
    pub field_type: Option<String>,
    /// Whether the field carries a value
    pub has_value: bool,
}

impl FormField {
    pub fn is_signature(&self) -> bool {
        self.field_type.as_deref() == Some("Sig")
    }
}

/// The `/AcroForm` dictionary of the catalog.
pub fn acro_form(doc: &LopdfDocument) -> Option<&Dictionary> {
    let catalog = doc.get_dictionary(catalog_id(doc).ok()?).ok()?;
    resolve_dict(doc, catalog.get(b"AcroForm").ok()?)
}

/// Object id of the `/AcroForm` dictionary, creating or indirecting it as needed.
pub(crate) fn ensure_acro_form(doc: &mut LopdfDocument) -> Result<ObjectId> {
    let root = catalog_id(doc)?;
    let existing = doc.get_dictionary(root)?.get(b"AcroForm").ok().cloned();
    match existing {
        Some(Object::Reference(id)) if doc.get_dictionary(id).is_ok() => Ok(id),
        other => {
            let dict = match other {
                Some(Object::Dictionary(dict)) => dict,
                _ => Dictionary::new(),
            };
            let id = doc.add_object(dict);
            doc.get_dictionary_mut(root)?.set("AcroForm", id);
            Ok(id)
        }
    }
}

/// Value of `/NeedAppearances`.
pub fn need_appearances(doc: &LopdfDocument) -> bool {
    acro_form(doc)
        .and_then(|form| form.get(b"NeedAppearances").ok())
        .and_then(|v| v.as_bool().ok())
        .unwrap_or(false)
}

/// Remove `/NeedAppearances`; returns whether it was present.
pub fn clear_need_appearances(doc: &mut LopdfDocument) -> Result<bool> {
    let root = catalog_id(doc)?;
    let form_ref = doc.get_dictionary(root)?.get(b"AcroForm").ok().cloned();
    let form = match form_ref {
        Some(Object::Reference(id)) => doc.get_dictionary_mut(id).ok(),
        Some(Object::Dictionary(_)) => match doc.get_dictionary_mut(root)?.get_mut(b"AcroForm") {
            Ok(Object::Dictionary(dict)) => Some(dict),
            _ => None,
        },
        _ => None,
    };
    Ok(form.map_or(false, |form| form.remove(b"NeedAppearances").is_some()))
}

fn field_type<'a>(doc: &'a LopdfDocument, mut field: &'a Dictionary) -> Option<String> {
    for _ in 0..MAX_FIELD_DEPTH {
        if let Ok(ft) = field.get(b"FT").and_then(Object::as_name) {
            return Some(String::from_utf8_lossy(ft).into_owned());
        }
        field = resolve_dict(doc, field.get(b"Parent").ok()?)?;
    }
    None
}

fn partial_name(field: &Dictionary) -> Option<String> {
    field
        .get(b"T")
        .and_then(Object::as_str)
        .ok()
        .map(decode_pdf_string)
}

fn collect_fields(
    doc: &LopdfDocument,
    entries: &[Object],
    prefix: &str,
    depth: usize,
    out: &mut Vec<FormField>,
) {
    if depth > MAX_FIELD_DEPTH {
        return;
    }
    for entry in entries {
        let Ok(id) = entry.as_reference() else { continue };
        let Ok(field) = doc.get_dictionary(id) else { continue };

        let name = match partial_name(field) {
            Some(part) if prefix.is_empty() => part,
            Some(part) => format!("{}.{}", prefix, part),
            None => prefix.to_string(),
        };
        let kids = field
            .get(b"Kids")
            .ok()
            .and_then(|k| resolve(doc, k))
            .and_then(|k| k.as_array().ok());
        let named_kids = kids.map_or(false, |kids| {
            kids.iter()
                .filter_map(|k| resolve_dict(doc, k))
                .any(|k| k.has(b"T"))
        });

        match kids {
            Some(kids) if named_kids => collect_fields(doc, kids, &name, depth + 1, out),
            _ => out.push(FormField {
                id,
                name,
                field_type: field_type(doc, field),
                has_value: field.has(b"V"),
            }),
        }
    }
}

/// All terminal fields reachable from `/AcroForm /Fields`.
pub fn fields(doc: &LopdfDocument) -> Vec<FormField> {
    let mut out = Vec::new();
    let entries = acro_form(doc)
        .and_then(|form| form.get(b"Fields").ok())
        .and_then(|f| resolve(doc, f))
        .and_then(|f| f.as_array().ok());
    if let Some(entries) = entries {
        collect_fields(doc, entries, "", 0, &mut out);
    }
    out
}

/// Look up a terminal field by fully qualified name.
pub fn field_by_name(doc: &LopdfDocument, name: &str) -> Option<FormField> {
    fields(doc).into_iter().find(|f| f.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn form_document() -> LopdfDocument {
        let mut doc = LopdfDocument::with_version("1.7");
        let parent_id = doc.new_object_id();
        let name_id = doc.add_object(dictionary! {
            "T" => Object::string_literal("name"),
            "Parent" => parent_id,
            "V" => Object::string_literal("Jane"),
        });
        let sig_id = doc.add_object(dictionary! {
            "T" => Object::string_literal("Signature1"),
            "FT" => "Sig",
        });
        doc.objects.insert(
            parent_id,
            Object::Dictionary(dictionary! {
                "T" => Object::string_literal("person"),
                "FT" => "Tx",
                "Kids" => vec![name_id.into()],
            }),
        );
        let form_id = doc.add_object(dictionary! {
            "Fields" => vec![parent_id.into(), sig_id.into()],
            "NeedAppearances" => true,
        });
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "AcroForm" => form_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    #[test]
    fn test_fully_qualified_names() {
        let doc = form_document();
        let names: Vec<String> = fields(&doc).into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["person.name", "Signature1"]);
    }

    #[test]
    fn test_inherited_field_type() {
        let doc = form_document();
        let field = field_by_name(&doc, "person.name").unwrap();
        assert_eq!(field.field_type.as_deref(), Some("Tx"));
        assert!(field.has_value);
        assert!(field_by_name(&doc, "Signature1").unwrap().is_signature());
        assert!(field_by_name(&doc, "missing").is_none());
    }

    #[test]
    fn test_clear_need_appearances() {
        let mut doc = form_document();
        assert!(need_appearances(&doc));
        assert!(clear_need_appearances(&mut doc).unwrap());
        assert!(!need_appearances(&doc));
        assert!(!clear_need_appearances(&mut doc).unwrap());
    }

    #[test]
    fn test_ensure_acro_form_indirects_inline_dictionary() {
        let mut doc = LopdfDocument::with_version("1.7");
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "AcroForm" => dictionary! { "Fields" => Vec::<Object>::new() },
        });
        doc.trailer.set("Root", catalog_id);
        let form_id = ensure_acro_form(&mut doc).unwrap();
        assert!(doc.get_dictionary(form_id).unwrap().has(b"Fields"));
        assert_eq!(ensure_acro_form(&mut doc).unwrap(), form_id);
    }
}
