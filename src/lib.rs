//! Compile Lucene-style query text into MongoDB-style filter documents.
//!
//! ```
//! use lucene_filter::prelude::*;
//!
//! let filter = compile("age:[18 TO 65] AND name:jo*", &CompilerConfig::default()).unwrap();
//! assert_eq!(
//!     filter.to_json(),
//!     serde_json::json!({
//!         "age": {"$gte": 18, "$lte": 65},
//!         "name": {"$regex": "^jo.*", "$options": "i"},
//!     })
//! );
//! ```

pub mod filter;
pub mod hir;
pub mod lexer;
pub mod parser;
pub mod value;

pub mod prelude {
    pub use crate::filter::{Bson, CompileError, CompilerConfig, Document, MultiWordValues, ToJson};
    pub use crate::parser::{GrammarConfig, SyntaxError};
    pub use crate::{compile, Compiler, Error};
}

use crate::filter::{CompilerConfig, Document};
use crate::parser::GrammarConfig;

pub use ::bson;
pub use ::chumsky;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] parser::SyntaxError),
    #[error(transparent)]
    Compile(#[from] filter::CompileError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Parse and compile query text, using the default grammar.
pub fn compile(query: &str, config: &CompilerConfig) -> Result<Document> {
    Compiler::new(config.clone()).compile_str(query)
}

/// Grammar and compiler settings, reusable for many queries.
#[derive(Clone, Debug, Default)]
pub struct Compiler {
    grammar: GrammarConfig,
    config: CompilerConfig,
}

impl Compiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            grammar: Default::default(),
            config,
        }
    }

    pub fn with_grammar(mut self, grammar: GrammarConfig) -> Self {
        self.grammar = grammar;
        self
    }

    pub fn grammar(&self) -> &GrammarConfig {
        &self.grammar
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn compile_str(&self, query: &str) -> Result<Document> {
        let expression = parser::parse(query, &self.grammar)?;
        Ok(filter::compile(&expression, &self.config)?)
    }
}
