#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`parser`]: 형식별 파서와 형식 선택 함수

pub mod parser;

// --- 주요 타입 re-export ---

pub use parser::{IosParser, IosXrParser, SrosParser, parse, parse_asn, parser_for};
