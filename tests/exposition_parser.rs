//! Checks for the exposition helpers shared by the integration tests.

mod common;

use common::{sample_value, unlabeled};

#[test]
fn parses_labeled_and_plain_samples() {
    let text = "# TYPE x counter\nx{a=\"1\",b=\"\"} 3\nx_count 2\n";
    assert_eq!(sample_value(text, "x", &[("b", ""), ("a", "1")]), Some(3.0));
    assert_eq!(sample_value(text, "x_count", &[]), Some(2.0));
    assert_eq!(sample_value(text, "x", &[("a", "1")]), None);
}

#[test]
fn unescapes_label_values_and_defaults_missing_samples() {
    let text = "y{path=\"/a\\\"b\",n=\"x\\ny\"} 7\n";
    assert_eq!(sample_value(text, "y", &[("path", "/a\"b"), ("n", "x\ny")]), Some(7.0));
    assert_eq!(unlabeled(text, "absent_total"), 0.0);
}
