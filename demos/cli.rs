use lucene_filter::{filter, lexer, parser, prelude::*};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let query = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    println!("Input: '{query}'");

    let tokens = lexer::tokenize(&query)?;
    println!("\nTokens:\n{tokens:?}");

    let expression = parser::parse(&query, &GrammarConfig::default())?;
    println!("\nExpression:\n{expression}");
    println!("\n{expression:#?}");

    let config = CompilerConfig::default();
    let document = filter::compile(&expression, &config)?;
    println!("\nFilter:\n{}", serde_json::to_string_pretty(&document.to_json())?);

    Ok(())
}
