use lazuli_ast::loc::Location;
use lazuli_lexer::{lex, LexError, Tok};

fn toks(source: &str) -> Vec<Tok> {
    lex(source).expect("lex").into_iter().map(|t| t.tok).collect()
}

fn ident(name: &str) -> Tok {
    Tok::Ident(name.to_string())
}

#[test]
fn single_definition() {
    assert_eq!(
        toks("main xs = xs\n"),
        vec![ident("main"), ident("xs"), Tok::Equals, ident("xs"), Tok::Newline, Tok::End]
    );
}

#[test]
fn operators_lex_longest_first() {
    assert_eq!(
        toks("a ++ b == c <= d -> e\n"),
        vec![
            ident("a"),
            Tok::PlusPlus,
            ident("b"),
            Tok::EqEq,
            ident("c"),
            Tok::LessEq,
            ident("d"),
            Tok::Arrow,
            ident("e"),
            Tok::Newline,
            Tok::End
        ]
    );
}

#[test]
fn keywords_and_prime_identifiers() {
    assert_eq!(
        toks("case cases of xs' in\n"),
        vec![Tok::Case, ident("cases"), Tok::Of, ident("xs'"), Tok::In, Tok::Newline, Tok::End]
    );
}

#[test]
fn indentation_opens_and_closes_blocks() {
    let source = "f x = case x of\n  1 -> 2\ng = 3\n";
    assert_eq!(
        toks(source),
        vec![
            ident("f"),
            ident("x"),
            Tok::Equals,
            Tok::Case,
            ident("x"),
            Tok::Of,
            Tok::Indent,
            Tok::Int(1),
            Tok::Arrow,
            Tok::Int(2),
            Tok::Dedent,
            ident("g"),
            Tok::Equals,
            Tok::Int(3),
            Tok::Newline,
            Tok::End
        ]
    );
}

#[test]
fn nested_blocks_dedent_together() {
    let source = "f = case 1 of\n  2 -> case 3 of\n    4 -> 5\ng = 6\n";
    let stream = toks(source);
    let dedents = stream.iter().filter(|t| **t == Tok::Dedent).count();
    assert_eq!(dedents, 2);
    let g = stream.iter().position(|t| *t == ident("g")).expect("g");
    assert_eq!(&stream[g - 2..g], &[Tok::Dedent, Tok::Dedent]);
}

#[test]
fn same_level_lines_yield_newline() {
    let source = "a = 1\nb = 2\n";
    assert_eq!(
        toks(source),
        vec![
            ident("a"),
            Tok::Equals,
            Tok::Int(1),
            Tok::Newline,
            ident("b"),
            Tok::Equals,
            Tok::Int(2),
            Tok::Newline,
            Tok::End
        ]
    );
}

#[test]
fn blank_and_comment_lines_are_invisible_to_layout() {
    let source = "a = 1\n\n-- comment\nb = 2\n";
    assert_eq!(
        toks(source),
        vec![
            ident("a"),
            Tok::Equals,
            Tok::Int(1),
            Tok::Newline,
            ident("b"),
            Tok::Equals,
            Tok::Int(2),
            Tok::Newline,
            Tok::End
        ]
    );
}

#[test]
fn dedent_to_unknown_level_is_an_error() {
    let source = "f = 1\n   g = 2\n  h = 3\n";
    match lex(source) {
        Err(LexError::BadIndentation(loc)) => assert_eq!(loc, Location::new(3, 3)),
        other => panic!("expected bad indentation, got {other:?}"),
    }
}

#[test]
fn string_and_char_escapes() {
    assert_eq!(
        toks("s = \"a\\nb\\\"c\"\n"),
        vec![ident("s"), Tok::Equals, Tok::Str("a\nb\"c".to_string()), Tok::Newline, Tok::End]
    );
    assert_eq!(
        toks("c = '\\n'\n"),
        vec![ident("c"), Tok::Equals, Tok::Char(b'\n'), Tok::Newline, Tok::End]
    );
    assert_eq!(
        toks("c = 'x'\n"),
        vec![ident("c"), Tok::Equals, Tok::Char(b'x'), Tok::Newline, Tok::End]
    );
}

#[test]
fn unterminated_string_is_reported_as_such() {
    match lex("s = \"abc\n") {
        Err(LexError::UnterminatedString(loc)) => assert_eq!(loc, Location::new(1, 5)),
        other => panic!("expected unterminated string, got {other:?}"),
    }
}

#[test]
fn locations_are_one_based() {
    let lexed = lex("a = 1\n  b\n").expect("lex");
    assert_eq!(lexed[0].loc, Location::new(1, 1));
    assert_eq!(lexed[1].loc, Location::new(1, 3));
    assert_eq!(lexed[2].loc, Location::new(1, 5));
    // The indent token carries the location of the first token on the line.
    assert_eq!(lexed[3].tok, Tok::Indent);
    assert_eq!(lexed[3].loc, Location::new(2, 3));
}

#[test]
fn comments_run_to_end_of_line() {
    assert_eq!(
        toks("a = 1 -- the rest -- is ignored\n"),
        vec![ident("a"), Tok::Equals, Tok::Int(1), Tok::Newline, Tok::End]
    );
}

#[test]
fn integer_overflow_is_an_error() {
    assert!(matches!(lex("a = 99999999999999999999\n"), Err(LexError::IntOutOfRange(_))));
}
