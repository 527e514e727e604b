use lucene_filter::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::json;

const OBJECT_ID: &str = "507f1f77bcf86cd799439011";

fn log_init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn assert_compile(query: &str, config: &CompilerConfig, expected: serde_json::Value) {
    log_init();

    let result = compile(query, config).unwrap();

    assert_eq!(result.to_json(), expected, "query: {query}");
}

fn identifiers() -> CompilerConfig {
    CompilerConfig::default()
        .with_rename_identifiers(true)
        .with_convert_identifiers(true)
}

#[test]
fn test_single_default_field() {
    let config = CompilerConfig::default().with_default_fields(["title"]);

    assert_compile(
        "rust",
        &config,
        json!({"title": {"$regex": "rust", "$options": "i"}}),
    );
    assert_compile(
        "ru*",
        &config,
        json!({"title": {"$regex": "^ru.*", "$options": "i"}}),
    );
    assert_compile(
        "c++",
        &config,
        json!({"title": {"$regex": r"c\+\+", "$options": "i"}}),
    );
    assert_compile("/^ru/", &config, json!({"title": {"$regex": "^ru"}}));
    assert_compile(
        r#""hello world""#,
        &config,
        json!({"title": {"$regex": "hello world", "$options": "i"}}),
    );
}

#[test]
fn test_multiple_default_fields() {
    let config = CompilerConfig::default().with_default_fields(["title", "body"]);

    assert_compile(
        "rust",
        &config,
        json!({"$or": [
            {"title": {"$regex": "rust", "$options": "i"}},
            {"body": {"$regex": "rust", "$options": "i"}},
        ]}),
    );
}

#[test]
fn test_default_fields_merge_with_fields() {
    let config = CompilerConfig::default().with_default_fields(["title"]);

    assert_compile(
        "rust year:2023",
        &config,
        json!({"title": {"$regex": "rust", "$options": "i"}, "year": 2023}),
    );
}

#[test]
fn test_rename_identifiers() {
    let config = CompilerConfig::default().with_rename_identifiers(true);

    assert_compile("id:123", &config, json!({"_id": 123}));
    assert_compile("user.id:abc", &config, json!({"user._id": "abc"}));
    assert_compile("uid:abc", &config, json!({"uid": "abc"}));

    assert_compile("id:123", &CompilerConfig::default(), json!({"id": 123}));
}

#[test]
fn test_convert_identifiers() {
    let expected = json!({"_id": {"$oid": OBJECT_ID}});

    assert_compile(&format!("_id:{OBJECT_ID}"), &identifiers(), expected.clone());
    assert_compile(&format!("id:{OBJECT_ID}"), &identifiers(), expected);
    assert_compile(
        &format!("NOT id:{OBJECT_ID}"),
        &identifiers(),
        json!({"_id": {"$ne": {"$oid": OBJECT_ID}}}),
    );
    assert_compile(
        &format!("owner.id:{OBJECT_ID}"),
        &identifiers(),
        json!({"owner._id": {"$oid": OBJECT_ID}}),
    );
}

#[test]
fn test_invalid_identifier() {
    log_init();

    assert_eq!(
        compile("id:abc", &identifiers()),
        Err(Error::Compile(CompileError::InvalidIdentifier("abc".into())))
    );
    assert_eq!(
        compile("_id:123", &identifiers()),
        Err(Error::Compile(CompileError::InvalidIdentifier("123".into())))
    );
}

#[test]
fn test_unsupported_identifier_query() {
    log_init();

    assert_eq!(
        compile("_id:[1 TO 2]", &identifiers()),
        Err(Error::Compile(CompileError::UnsupportedIdentifierQuery {
            field: "_id".into(),
            value: "[1 TO 2]".into(),
        }))
    );
    assert_eq!(
        compile("id:>5", &identifiers()),
        Err(Error::Compile(CompileError::UnsupportedIdentifierQuery {
            field: "_id".into(),
            value: ">5".into(),
        }))
    );
    assert_eq!(
        compile("_id:50*", &identifiers()),
        Err(Error::Compile(CompileError::UnsupportedIdentifierQuery {
            field: "_id".into(),
            value: "50*".into(),
        }))
    );
    assert_eq!(
        compile("_id:/^50/", &identifiers()),
        Err(Error::Compile(CompileError::UnsupportedIdentifierQuery {
            field: "_id".into(),
            value: "/^50/".into(),
        }))
    );
}

#[test]
fn test_multi_word_as_phrase() {
    assert_compile(
        "name:John Smith",
        &CompilerConfig::default(),
        json!({"name": "John Smith"}),
    );
    assert_compile(
        "name:John Smith AND age:30",
        &CompilerConfig::default(),
        json!({"name": "John Smith", "age": 30}),
    );
}

#[test]
fn test_multi_word_as_free_text() {
    let config = CompilerConfig::default().with_multi_word_values(MultiWordValues::SplitFreeText);

    assert_compile(
        "name:John Smith",
        &config,
        json!({"$and": [{"name": "John"}, {"$text": {"$search": "Smith"}}]}),
    );
    assert_compile(
        "name:John",
        &config,
        json!({"name": "John"}),
    );
}

#[test]
fn test_multi_word_as_free_text_negated() {
    let config = CompilerConfig::default().with_multi_word_values(MultiWordValues::SplitFreeText);

    assert_compile(
        "NOT name:John Smith",
        &config,
        json!({"$and": [{"name": {"$ne": "John"}}, {"$text": {"$search": "Smith"}}]}),
    );
}

#[test]
fn test_multi_word_as_free_text_with_default_fields() {
    let config = CompilerConfig::default()
        .with_multi_word_values(MultiWordValues::SplitFreeText)
        .with_default_fields(["bio"]);

    assert_compile(
        "name:John Smith",
        &config,
        json!({"name": "John", "bio": {"$regex": "Smith", "$options": "i"}}),
    );
}

#[test]
fn test_explicit_conjunction_only() {
    log_init();

    let compiler = Compiler::default()
        .with_grammar(GrammarConfig::default().with_implicit_conjunction(false));

    assert!(matches!(
        compiler.compile_str("a:1 b:2"),
        Err(Error::Syntax(SyntaxError::UnexpectedToken(_)))
    ));
    assert_eq!(
        compiler.compile_str("a:1 AND b:2").unwrap().to_json(),
        json!({"a": 1, "b": 2})
    );
}

#[test]
fn test_max_depth() {
    log_init();

    let compiler =
        Compiler::default().with_grammar(GrammarConfig::default().with_max_depth(2));

    assert!(compiler.compile_str("((a:1))").is_ok());
    assert_eq!(
        compiler.compile_str("(((a:1)))"),
        Err(Error::Syntax(SyntaxError::TooDeep(2)))
    );
}

#[test]
fn test_deserialize_config() {
    let config: CompilerConfig = serde_json::from_value(json!({
        "default_fields": ["title"],
        "multi_word_values": "split_free_text",
    }))
    .unwrap();

    assert_eq!(
        config,
        CompilerConfig::default()
            .with_default_fields(["title"])
            .with_multi_word_values(MultiWordValues::SplitFreeText)
    );

    let grammar: GrammarConfig = serde_json::from_value(json!({"max_depth": 8})).unwrap();
    assert_eq!(grammar, GrammarConfig::default().with_max_depth(8));
}
