use super::*;

fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[test]
fn test_levenshtein_distance() {
    assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
    assert_eq!(levenshtein_distance("", "abc"), 3);
    assert_eq!(levenshtein_distance("abc", ""), 3);
    assert_eq!(levenshtein_distance("abc", "abc"), 0);
    assert_eq!(levenshtein_distance("ABC", "abc"), 0);
    assert_eq!(levenshtein_distance("flaw", "lawn"), 2);
}

#[test]
fn test_substring_bonus_dominates() {
    let columns = names(&["store_area", "region"]);
    assert_eq!(find_best_match("Area", &columns, 0.4), Some("store_area"));
}

#[test]
fn test_ties_keep_first_column() {
    let columns = names(&["abd", "abe"]);
    assert_eq!(find_best_match("abc", &columns, 0.4), Some("abd"));
}

#[test]
fn test_below_threshold_is_unmapped() {
    let columns = names(&["quantity", "price"]);
    assert_eq!(find_best_match("zz", &columns, 0.4), None);
}

#[test]
fn test_auto_map_rule_order() {
    let headers = names(&["EMAIL", "First Name", "Area", "zzz"]);
    let columns = names(&["id", "email", "first_name", "store_area"]);

    let mapping = auto_map(&headers, &columns);
    assert_eq!(mapping.get("EMAIL"), Some("email"));
    assert_eq!(mapping.get("First Name"), Some("first_name"));
    assert_eq!(mapping.get("Area"), Some("store_area"));
    assert_eq!(mapping.get("zzz"), Some(""));
    assert_eq!(mapping.len(), 4);
}

#[test]
fn test_auto_map_is_idempotent() {
    let headers = names(&["Customer Id", "Amount", "Notes"]);
    let columns = names(&["customer_id", "amount_usd", "created_at"]);

    let first = auto_map(&headers, &columns);
    let second = auto_map_onto(first.clone(), &columns);
    assert_eq!(first, second);
}

#[test]
fn test_auto_map_onto_keeps_manual_choices() {
    let mut mapping = ColumnMapping::new();
    mapping.set("legacy", "custom_col");
    mapping.set("email", "");

    let columns = names(&["email"]);
    let mapped = auto_map_onto(mapping, &columns);
    assert_eq!(mapped.get("legacy"), Some("custom_col"));
    assert_eq!(mapped.get("email"), Some("email"));
}

#[test]
fn test_finalized_drops_unmapped_entries() {
    let mut mapping = ColumnMapping::new();
    mapping.set("a", "col_a");
    mapping.set("b", "");
    mapping.set("c", "skip");
    mapping.set("d", "col_d");

    assert_eq!(
        mapping.finalized(),
        vec![
            ("a".to_string(), "col_a".to_string()),
            ("d".to_string(), "col_d".to_string())
        ]
    );
}

#[test]
fn test_mapping_serializes_in_header_order() {
    let mut mapping = ColumnMapping::new();
    mapping.set("zeta", "z");
    mapping.set("alpha", "");
    mapping.set("mid", "skip");

    let json = serde_json::to_string(&mapping).unwrap();
    assert_eq!(json, r#"{"zeta":"z","alpha":"","mid":"skip"}"#);

    let restored: ColumnMapping = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, mapping);
}

#[test]
fn test_null_targets_deserialize_as_unmapped() {
    let mapping: ColumnMapping = serde_json::from_str(r#"{"a":null,"b":"col_b"}"#).unwrap();
    assert_eq!(mapping.get("a"), Some(""));
    assert_eq!(mapping.finalized().len(), 1);
}
