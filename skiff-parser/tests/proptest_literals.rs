// skiff-parser - Property tests for literal scanning
// Copyright (c) 2025 Tom Waddington. MIT licensed.

use proptest::prelude::*;

use skiff_parser::ast::Expr;
use skiff_parser::{lex, parse_source, TokenKind};

/// Insert `_` separators between digit groups of a rendered integer.
fn with_separators(digits: &str, every: usize) -> String {
    let chars: Vec<char> = digits.chars().collect();
    let mut out = String::new();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % every == 0 {
            out.push('_');
        }
        out.push(*c);
    }
    out
}

proptest! {
    /// Lexing an integer literal round-trips its digits exactly.
    #[test]
    fn int_literal_text_round_trips(value in 0i64..=i64::MAX) {
        let source = value.to_string();
        let tokens = lex("prop.skf", &source).unwrap();
        prop_assert_eq!(tokens.len(), 1);
        prop_assert_eq!(tokens[0].kind, TokenKind::Int);
        prop_assert_eq!(&tokens[0].text, &source);

        let exprs = parse_source("prop.skf", &source).unwrap();
        prop_assert!(
            matches!(exprs[0], Expr::Int { value: parsed, .. } if parsed == value),
            "parsed int literal did not match expected value"
        );
    }

    /// Underscore separators are stripped from the token text but counted
    /// in the consumed span.
    #[test]
    fn underscores_are_stripped(value in 0u32..=u32::MAX, every in 1usize..4) {
        let digits = value.to_string();
        let separated = with_separators(&digits, every);

        let tokens = lex("prop.skf", &separated).unwrap();
        prop_assert_eq!(tokens.len(), 1);
        prop_assert_eq!(&tokens[0].text, &digits);
        prop_assert_eq!(tokens[0].span.length as usize, separated.chars().count());
    }

    /// A double literal with one decimal point scans as Double; two or
    /// more scan as Version.
    #[test]
    fn decimal_count_classifies(whole in 0u32..10_000, frac in 0u32..10_000, patch in 0u32..100) {
        let double = format!("{}.{}", whole, frac);
        let tokens = lex("prop.skf", &double).unwrap();
        prop_assert_eq!(tokens[0].kind, TokenKind::Double);

        let version = format!("{}.{}.{}", whole, frac, patch);
        let tokens = lex("prop.skf", &version).unwrap();
        prop_assert_eq!(tokens.len(), 1);
        prop_assert_eq!(tokens[0].kind, TokenKind::Version);
    }
}
