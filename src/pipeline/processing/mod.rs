// Pipeline processing: schema normalization, quality rules, and tokenization

pub mod normalize;
pub mod quality_gate;
pub mod tokenize;
