use arbor_merge::format::escape_xml;
use proptest::prelude::*;

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

proptest! {
    #[test]
    fn prop_escaped_text_has_no_markup(text in ".*") {
        let escaped = escape_xml(&text);
        prop_assert!(!escaped.contains(['<', '>', '"', '\'']));
        for (idx, _) in escaped.match_indices('&') {
            let rest = &escaped[idx..];
            prop_assert!(
                ["&amp;", "&lt;", "&gt;", "&quot;", "&apos;"].iter().any(|e| rest.starts_with(e)),
                "bare ampersand in {:?}", escaped
            );
        }
    }

    #[test]
    fn prop_escape_is_reversible(text in ".*") {
        prop_assert_eq!(unescape(&escape_xml(&text)), text);
    }
}
