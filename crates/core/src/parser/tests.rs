use super::*;
use crate::ast::{BinaryOp, Block, SectionTarget, Value};
use crate::error::ErrorCode;
use crate::lexer::tokenize;

fn strict(src: &str) -> Result<Parsed, ParseError> {
    parse(tokenize(src).expect("lex").tokens)
}

fn lenient(src: &str) -> Result<Parsed, ParseError> {
    parse_with_warnings(tokenize(src).expect("lex").tokens, None)
}

fn only_doc(p: &Parsed) -> &Document {
    assert_eq!(p.ast.documents.len(), 1);
    &p.ast.documents[0]
}

fn rules(p: &Parsed) -> Vec<&str> {
    p.repairs.iter().map(|r| r.rule_id.as_str()).collect()
}

fn target(name: &str) -> Value {
    Value::Target(SectionTarget::new(name))
}

#[test]
fn envelope_meta_and_sections() {
    let p = strict("===DOC===\nMETA:\n  TYPE::SESSION\n---\nKEY::1\n===END===\n").unwrap();
    let d = only_doc(&p);
    assert_eq!(d.name, "DOC");
    assert!(d.separator);
    assert_eq!(
        d.meta_value("TYPE"),
        Some(&Value::Identifier("SESSION".into()))
    );
    assert_eq!(d.value_at(&["KEY"]), Some(&Value::Number("1".into())));
    assert!(p.repairs.is_empty());
}

#[test]
fn section_marker_value_is_never_truncated() {
    let p = lenient(
        "===D===\nTARGET::#INDEXER\nTARGETS::[#INDEXER,#SELF]\nFLOW::A->#INDEXER->§SELF\n===END===\n",
    )
    .unwrap();
    let d = only_doc(&p);
    assert_eq!(d.value_at(&["TARGET"]), Some(&target("INDEXER")));
    match d.value_at(&["TARGETS"]) {
        Some(Value::List(l)) => {
            assert_eq!(l.items, vec![target("INDEXER"), target("SELF")])
        }
        other => panic!("expected list, got {:?}", other),
    }
    match d.value_at(&["FLOW"]) {
        Some(Value::Flow(f)) => assert_eq!(
            f.steps,
            vec![Value::Identifier("A".into()), target("INDEXER"), target("SELF")]
        ),
        other => panic!("expected flow, got {:?}", other),
    }
}

#[test]
fn bare_section_marker_is_an_error() {
    let err = strict("===D===\nK::§ X\n===END===\n").unwrap_err();
    assert_eq!(err.code(), ErrorCode::BareSectionMarker);
    let err = strict("===D===\nK::[§]\n===END===\n").unwrap_err();
    assert_eq!(err.code(), ErrorCode::BareSectionMarker);
}

#[test]
fn strict_mode_requires_an_envelope() {
    let err = strict("KEY::1\n").unwrap_err();
    assert_eq!(err.code(), ErrorCode::MalformedEnvelope);
    let err = strict("===D===\nKEY::1\n").unwrap_err();
    assert_eq!(err.code(), ErrorCode::MalformedEnvelope);
}

#[test]
fn lenient_mode_synthesizes_envelope_from_meta_type() {
    let p = lenient("META:\n  TYPE::SESSION_LOG\nKEY::1\n").unwrap();
    assert_eq!(only_doc(&p).name, "SESSION_LOG");
    assert_eq!(rules(&p), vec!["envelope_synthesized"]);
    assert_eq!(p.repairs[0].after, "===SESSION_LOG===");
}

#[test]
fn envelope_hint_wins_over_meta_and_default_is_inferred() {
    let tokens = tokenize("META:\n  TYPE::X\nK::1\n").unwrap().tokens;
    let p = parse_with_warnings(tokens, Some("HINTED")).unwrap();
    assert_eq!(only_doc(&p).name, "HINTED");
    let p = lenient("K::1\n").unwrap();
    assert_eq!(only_doc(&p).name, "INFERRED");
}

#[test]
fn lenient_mode_supplies_missing_end() {
    let p = lenient("===D===\nK::1\n").unwrap();
    assert_eq!(rules(&p), vec!["envelope_end_synthesized"]);
}

#[test]
fn meta_must_come_first() {
    let err = strict("===D===\nK::1\nMETA:\n  TYPE::X\n===END===\n").unwrap_err();
    assert_eq!(err.code(), ErrorCode::MalformedEnvelope);
}

#[test]
fn content_outside_envelope_is_rejected() {
    let err = strict("===D===\nK::1\n===END===\nSTRAY::2\n").unwrap_err();
    assert_eq!(err.code(), ErrorCode::MalformedEnvelope);
}

#[test]
fn multiple_documents() {
    let p = strict("===A===\nK::1\n===END===\n\n===B===\nK::2\n===END===\n").unwrap();
    let names: Vec<&str> = p.ast.documents.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["A", "B"]);
}

#[test]
fn blocks_nest_and_carry_targets() {
    let p = strict("===D===\nOUTER→§STORE:\n  INNER:\n    LEAF::x\n  NEXT::y\n===END===\n").unwrap();
    let d = only_doc(&p);
    match d.find(&["OUTER"]) {
        Some(Entry::Block(Block {
            target, children, ..
        })) => {
            assert_eq!(target.as_ref().map(|t| t.name.as_str()), Some("STORE"));
            assert_eq!(children.len(), 2);
        }
        other => panic!("expected block, got {:?}", other),
    }
    assert_eq!(
        d.value_at(&["OUTER", "INNER", "LEAF"]),
        Some(&Value::Identifier("x".into()))
    );
    assert!(p.repairs.is_empty());
}

#[test]
fn four_space_indentation_is_normalized() {
    let p = strict("===D===\nB:\n    K::1\n    L::2\n===END===\n").unwrap();
    assert_eq!(rules(&p), vec!["indent_normalized", "indent_normalized"]);
    assert_eq!(p.repairs[0].before, "    ");
    assert_eq!(p.repairs[0].after, "  ");
}

#[test]
fn dedent_to_unknown_level_is_an_error() {
    let err = strict("===D===\nB:\n    K::1\n  L::2\n===END===\n").unwrap_err();
    assert_eq!(err.code(), ErrorCode::InconsistentIndentation);
}

#[test]
fn unexpected_indentation_is_an_error() {
    let err = strict("===D===\nK::1\n  L::2\n===END===\n").unwrap_err();
    assert_eq!(err.code(), ErrorCode::InconsistentIndentation);
}

#[test]
fn inline_map_and_its_limits() {
    let p = strict("===D===\nM::[a::1,b::§X]\n===END===\n").unwrap();
    assert_eq!(
        only_doc(&p).value_at(&["M"]),
        Some(&Value::InlineMap(vec![
            ("a".into(), Value::Number("1".into())),
            ("b".into(), target("X")),
        ]))
    );
    let err = strict("===D===\nM::[a::[1]]\n===END===\n").unwrap_err();
    assert_eq!(err.code(), ErrorCode::InlineMapNesting);
    let err = strict("===D===\nM::[a::1,b]\n===END===\n").unwrap_err();
    assert_eq!(err.code(), ErrorCode::UnexpectedToken);
}

#[test]
fn repeated_key_is_rejected_at_its_line() {
    let err = strict("===D===\nSTATUS::ACTIVE\nSTATUS::bogus\n===END===\n").unwrap_err();
    assert_eq!(err.code(), ErrorCode::DuplicateKey);
    assert_eq!(err.0.line, 3);
    assert!(err.0.message.contains("STATUS"));

    let err = strict("===D===\nB:\n  K::1\nB:\n  L::2\n===END===\n").unwrap_err();
    assert_eq!(err.code(), ErrorCode::DuplicateKey);
    let err = strict("===D===\nK::1\nK:\n  L::2\n===END===\n").unwrap_err();
    assert_eq!(err.code(), ErrorCode::DuplicateKey);
    let err = strict("===D===\nM::[a::1,a::2]\n===END===\n").unwrap_err();
    assert_eq!(err.code(), ErrorCode::DuplicateKey);
}

#[test]
fn same_key_at_different_levels_or_documents_is_fine() {
    strict("===D===\nK::1\nB:\n  K::2\nC:\n  K::3\n===END===\n").unwrap();
    strict("===A===\nK::1\n===END===\n\n===B===\nK::2\n===END===\n").unwrap();
}

#[test]
fn comment_inside_list_has_its_own_message() {
    for src in [
        "===D===\nL::[\n  a, // first\n  b\n]\n===END===\n",
        "===D===\nL::[\n  a // first\n]\n===END===\n",
    ] {
        let err = strict(src).unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnexpectedToken);
        assert!(err.0.message.contains("comments cannot appear inside a list"), "{}", err.0.message);
    }
}

#[test]
fn unclosed_list() {
    let err = tokenize("===D===\nL::[a,b\n===END===\n").unwrap_err();
    assert_eq!(err.code(), ErrorCode::UnbalancedList);
    let err = strict("===D===\nL::[a,b\n").unwrap_err();
    assert_eq!(err.code(), ErrorCode::UnbalancedList);
    let err = strict("===D===\nL::a]\n===END===\n").unwrap_err();
    assert_eq!(err.code(), ErrorCode::UnexpectedToken);
}

#[test]
fn multiword_bare_value_is_quoted() {
    let p = strict("===D===\nK::hello big world\n===END===\n").unwrap();
    assert_eq!(
        only_doc(&p).value_at(&["K"]),
        Some(&Value::String("hello big world".into()))
    );
    assert_eq!(rules(&p), vec!["bare_multiword_quoted"]);
    assert_eq!(p.repairs[0].after, "\"hello big world\"");
}

#[test]
fn spacing_and_trailing_commas_are_collapsed() {
    let p = strict("===D===\nK :: [a, b,]\n===END===\n").unwrap();
    assert_eq!(
        rules(&p),
        vec![
            "assign_whitespace_collapsed",
            "trailing_comma_removed",
            "value_whitespace_collapsed"
        ]
    );
}

#[test]
fn comments_are_kept() {
    let p = strict("===D===\n//lead\nK::1   // trailing\n===END===\n").unwrap();
    let d = only_doc(&p);
    assert_eq!(d.sections[0], Entry::Comment("lead".into()));
    match &d.sections[1] {
        Entry::Assignment(a) => assert_eq!(a.comment.as_deref(), Some("trailing")),
        other => panic!("expected assignment, got {:?}", other),
    }
    assert_eq!(rules(&p), vec!["comment_normalized", "comment_normalized"]);
}

#[test]
fn tagged_values_and_operators() {
    let p = strict("===D===\nE::ENUM[a,b]\nX::A⊕B⇌C\n===END===\n").unwrap();
    let d = only_doc(&p);
    assert!(matches!(d.value_at(&["E"]), Some(Value::Tagged { tag, .. }) if tag == "ENUM"));
    match d.value_at(&["X"]) {
        Some(Value::Binary { op, right, .. }) => {
            assert_eq!(*op, BinaryOp::Synthesis);
            assert!(matches!(**right, Value::Binary { op: BinaryOp::Tension, .. }));
        }
        other => panic!("expected binary, got {:?}", other),
    }
}

#[test]
fn list_keeps_its_token_slice() {
    let p = strict("===D===\nF::[\"∧\"∧REQ→§SELF]\n===END===\n").unwrap();
    match only_doc(&p).value_at(&["F"]) {
        Some(Value::List(l)) => {
            let kinds: Vec<TokenKind> = l.span.tokens().iter().map(|t| t.kind).collect();
            assert_eq!(
                kinds,
                vec![
                    TokenKind::ListStart,
                    TokenKind::String,
                    TokenKind::Constraint,
                    TokenKind::Identifier,
                    TokenKind::Flow,
                    TokenKind::SectionMarker,
                    TokenKind::Identifier,
                    TokenKind::ListEnd
                ]
            );
        }
        other => panic!("expected list, got {:?}", other),
    }
}

#[test]
fn literal_zone_value() {
    let p = strict("===D===\nB:\n  CODE::```sh\n  echo  $X\n\n  ```\n===END===\n").unwrap();
    match only_doc(&p).value_at(&["B", "CODE"]) {
        Some(Value::Literal(z)) => {
            assert_eq!(z.info, "sh");
            assert_eq!(z.lines, vec!["  echo  $X".to_owned(), String::new()]);
        }
        other => panic!("expected literal, got {:?}", other),
    }
    assert!(p.repairs.is_empty());
}

#[test]
fn missing_value_is_an_error() {
    let err = strict("===D===\nK::\n===END===\n").unwrap_err();
    assert_eq!(err.code(), ErrorCode::UnexpectedToken);
}
