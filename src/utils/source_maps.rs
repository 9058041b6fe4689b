// Source map v3 generation with VLQ-encoded mappings and inline sources support

use crate::utils::Result;
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const BASE64_DIGITS: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Source map format (v3)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    pub version: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub sources: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources_content: Option<Vec<String>>,
    pub names: Vec<String>,
    pub mappings: String,
}

impl Default for SourceMap {
    fn default() -> Self {
        Self {
            version: 3,
            file: None,
            sources: Vec::new(),
            sources_content: None,
            names: Vec::new(),
            mappings: String::new(),
        }
    }
}

impl SourceMap {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// `data:` URL carrying the base64 encoded JSON
    pub fn to_data_url(&self) -> Result<String> {
        let json = self.to_json()?;
        let encoded = general_purpose::STANDARD.encode(json.as_bytes());
        Ok(format!("data:application/json;charset=utf-8;base64,{}", encoded))
    }

    /// Trailing comment embedding the whole map
    pub fn inline_comment(&self) -> Result<String> {
        Ok(format!("//# sourceMappingURL={}", self.to_data_url()?))
    }
}

/// A single mapping entry; all positions 0-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Mapping {
    generated_line: u32,
    generated_column: u32,
    source_index: u32,
    original_line: u32,
    original_column: u32,
    name_index: Option<u32>,
}

#[derive(Debug, Default)]
pub struct SourceMapGenerator {
    sources: Vec<String>,
    sources_content: Vec<Option<String>>,
    names: Vec<String>,
    name_map: HashMap<String, u32>,
    mappings: Vec<Mapping>,
}

impl SourceMapGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source file, optionally with its content
    pub fn add_source(&mut self, source_path: impl Into<String>, content: Option<String>) -> u32 {
        let index = self.sources.len() as u32;
        self.sources.push(source_path.into());
        self.sources_content.push(content);
        index
    }

    /// Add a name to the names table
    pub fn add_name(&mut self, name: &str) -> u32 {
        if let Some(&index) = self.name_map.get(name) {
            return index;
        }

        let index = self.names.len() as u32;
        self.name_map.insert(name.to_string(), index);
        self.names.push(name.to_string());
        index
    }

    pub fn add_mapping(
        &mut self,
        generated: (u32, u32),
        source_index: u32,
        original: (u32, u32),
        name: Option<&str>,
    ) {
        let name_index = name.map(|n| self.add_name(n));

        self.mappings.push(Mapping {
            generated_line: generated.0,
            generated_column: generated.1,
            source_index,
            original_line: original.0,
            original_column: original.1,
            name_index,
        });
    }

    pub fn generate(&self, file_name: Option<String>) -> SourceMap {
        let sources_content = if self.sources_content.iter().any(Option::is_some) {
            Some(
                self.sources_content
                    .iter()
                    .map(|content| content.clone().unwrap_or_default())
                    .collect(),
            )
        } else {
            None
        };

        SourceMap {
            version: 3,
            file: file_name,
            sources: self.sources.clone(),
            sources_content,
            names: self.names.clone(),
            mappings: self.encode_mappings(),
        }
    }

    /// Semicolon-separated lines of comma-separated segments, every field
    /// relative to the previous segment (columns reset per line).
    fn encode_mappings(&self) -> String {
        let mut mappings = self.mappings.clone();
        mappings.sort();
        mappings.dedup_by_key(|m| (m.generated_line, m.generated_column));

        let mut out = String::new();
        let mut line = 0u32;
        let mut prev_column = 0i64;
        let mut prev_source = 0i64;
        let mut prev_original_line = 0i64;
        let mut prev_original_column = 0i64;
        let mut prev_name = 0i64;
        let mut first_in_line = true;

        for mapping in &mappings {
            while line < mapping.generated_line {
                out.push(';');
                line += 1;
                prev_column = 0;
                first_in_line = true;
            }
            if !first_in_line {
                out.push(',');
            }
            first_in_line = false;

            encode_vlq(&mut out, mapping.generated_column as i64 - prev_column);
            encode_vlq(&mut out, mapping.source_index as i64 - prev_source);
            encode_vlq(&mut out, mapping.original_line as i64 - prev_original_line);
            encode_vlq(&mut out, mapping.original_column as i64 - prev_original_column);
            if let Some(name) = mapping.name_index {
                encode_vlq(&mut out, name as i64 - prev_name);
                prev_name = name as i64;
            }

            prev_column = mapping.generated_column as i64;
            prev_source = mapping.source_index as i64;
            prev_original_line = mapping.original_line as i64;
            prev_original_column = mapping.original_column as i64;
        }

        out
    }
}

fn encode_vlq(out: &mut String, value: i64) {
    let mut vlq = if value < 0 {
        ((-value) << 1) | 1
    } else {
        value << 1
    };

    loop {
        let mut digit = vlq & 0b1_1111;
        vlq >>= 5;
        if vlq > 0 {
            digit |= 0b10_0000;
        }
        out.push(BASE64_DIGITS[digit as usize] as char);
        if vlq == 0 {
            break;
        }
    }
}
