// Extraction service adapters for the agrid binary

pub mod gemini;
pub mod replay;
