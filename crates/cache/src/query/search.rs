//! Free-text and per-field search injection.

use mongodb::bson::{Bson, Document, Regex, doc};

use crate::query::tenancy::push_conjunct;
use crate::types::filter::SearchDirective;

/// Folds a `_search` directive into the compiled filter.
///
/// The structured per-field form ORs a case-insensitive substring regex
/// across the named properties, folded into the filter's top-level `$and`
/// conjunction so a user-supplied `$or` group keeps constraining the result.
/// The bare form attaches a native full-text clause served by the collection
/// text index. When both appear in a request, the structured form has already
/// won during directive extraction.
pub fn inject_search(filter: &mut Document, directive: Option<&SearchDirective>) {
    match directive {
        Some(SearchDirective::Fielded(entries)) => {
            let mut alternatives: Vec<Bson> = Vec::new();
            for (fields, term) in entries {
                let pattern = regex::escape(term);
                for field in fields {
                    let matcher = Bson::RegularExpression(Regex {
                        pattern: pattern.clone(),
                        options: "i".to_string(),
                    });
                    alternatives.push(Bson::Document(doc! { field: matcher }));
                }
            }
            if !alternatives.is_empty() {
                push_conjunct(filter, doc! { "$or": alternatives });
            }
        }
        Some(SearchDirective::Text(term)) => {
            filter.insert("$text", doc! { "$search": term.clone() });
        }
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_term_becomes_text_clause() {
        let mut filter = Document::new();
        inject_search(&mut filter, Some(&SearchDirective::Text("anna".to_string())));
        assert_eq!(
            filter.get_document("$text").unwrap(),
            &doc! { "$search": "anna" }
        );
    }

    #[test]
    fn test_fielded_search_ors_across_properties() {
        let mut filter = Document::new();
        let directive = SearchDirective::Fielded(vec![(
            vec!["name".to_string(), "email".to_string()],
            "an.n".to_string(),
        )]);
        inject_search(&mut filter, Some(&directive));

        let conjuncts = filter.get_array("$and").unwrap();
        assert_eq!(conjuncts.len(), 1);
        let clause = conjuncts[0].as_document().unwrap();
        let alternatives = clause.get_array("$or").unwrap();
        assert_eq!(alternatives.len(), 2);
        let first = alternatives[0].as_document().unwrap();
        match first.get("name").unwrap() {
            Bson::RegularExpression(raw) => {
                // The term is escaped: the dot is literal.
                assert_eq!(raw.pattern, r"an\.n");
                assert_eq!(raw.options, "i");
            }
            other => panic!("expected a regex, got {:?}", other),
        }
    }

    #[test]
    fn test_fielded_search_keeps_user_or_group() {
        let mut filter = doc! { "$or": [ { "status": "open" }, { "status": "pending" } ] };
        let directive =
            SearchDirective::Fielded(vec![(vec!["name".to_string()], "ann".to_string())]);
        inject_search(&mut filter, Some(&directive));

        // The user's $or is untouched; the search clause lives in $and.
        assert_eq!(filter.get_array("$or").unwrap().len(), 2);
        let conjuncts = filter.get_array("$and").unwrap();
        assert_eq!(conjuncts.len(), 1);
        assert!(conjuncts[0].as_document().unwrap().contains_key("$or"));
    }

    #[test]
    fn test_no_directive_leaves_filter_untouched() {
        let mut filter = doc! { "age": { "$gte": 18 } };
        inject_search(&mut filter, None);
        assert_eq!(filter, doc! { "age": { "$gte": 18 } });
    }
}
