use proptest::prelude::*;

fn column_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,15}"
}

proptest! {
    // Property: insert emits exactly one placeholder per column.
    #[test]
    fn insert_placeholder_count(cols in proptest::collection::vec(column_name(), 0..8)) {
        let refs: Vec<&str> = cols.iter().map(String::as_str).collect();
        let sql = txscope_sql_builder::insert("t", &refs);
        prop_assert_eq!(sql.matches('?').count(), cols.len());
    }

    // Property: update emits one SET placeholder per column and the SET list
    // follows caller order.
    #[test]
    fn update_placeholder_count_and_order(cols in proptest::collection::vec(column_name(), 1..8)) {
        let refs: Vec<&str> = cols.iter().map(String::as_str).collect();
        let sql = txscope_sql_builder::update("t", &refs, None);
        prop_assert_eq!(sql.matches('?').count(), cols.len());

        let mut at = 0usize;
        for col in &cols {
            let needle = format!("`{col}`=?");
            let pos = sql[at..].find(&needle);
            prop_assert!(pos.is_some(), "missing assignment for {}", col);
            at += pos.unwrap() + needle.len();
        }
    }

    // Property: a WHERE clause is appended verbatim and contributes no
    // builder-generated placeholders.
    #[test]
    fn where_clause_is_verbatim(clause in "[a-z0-9=<> ]{1,20}") {
        let expected_suffix = format!(" WHERE {clause}");

        let update_sql = txscope_sql_builder::update("t", &["a"], Some(&clause));
        prop_assert!(update_sql.ends_with(&expected_suffix));

        let delete_sql = txscope_sql_builder::delete("t", Some(&clause));
        prop_assert!(delete_sql.ends_with(&expected_suffix));
        prop_assert!(delete_sql.starts_with("DELETE FROM t"));
    }
}
