//! IMAP protocol parser.
//!
//! A sans-I/O parser for server responses. The [`Lexer`] turns raw bytes
//! into tokens and [`ResponseParser`] builds structured responses from
//! them. Input is always one complete response as framed by the
//! connection layer, literals included.
//!
//! # Example
//!
//! ```
//! use ezmail_imap::parser::{Response, ResponseParser, UntaggedResponse};
//!
//! let response = ResponseParser::parse(b"* 3 EXISTS\r\n").unwrap();
//! assert_eq!(response, Response::Untagged(UntaggedResponse::Exists(3)));
//! ```

pub mod lexer;
pub mod response;

pub use lexer::{Lexer, Token};
pub use response::{FetchItem, Response, ResponseParser, UntaggedResponse};
