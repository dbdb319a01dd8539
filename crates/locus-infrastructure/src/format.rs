//! Descriptor interchange format
//!
//! One descriptor per line, written as comma-separated `key=value` pairs:
//!
//! ```text
//! # services.locus
//! class=app::SqlStore,index=app::SqlStore:primary,index=app::Store:primary,name=primary,scope=Singleton,rank=10,pool=8
//! ```
//!
//! | Key | Meaning |
//! |-----|---------|
//! | `class` | Implementation name (mandatory, once) |
//! | `index` | Advertised contract, optionally followed by `:<name>`; the implementation alone when absent |
//! | `name` | Descriptor name |
//! | `scope` | Scope, `PerLookup` when absent |
//! | `qualifier` | One qualifier per pair |
//! | `rank` | Integer rank, `0` when absent |
//! | `proxy` | `true` or `false` |
//! | `type` | `class` (default) or `provide` |
//!
//! Any other key is a metadata entry; repeating a key appends a value. A
//! leading `@` forces a key into the metadata map, so `@name=x` stores a
//! metadata value under `name`. Inside keys and values `\` escapes `,`,
//! `=`, `:`, `\`, `n` (line feed) and `r` (carriage return). In an `index`
//! value the contract ends at the first lone unescaped `:`; the `::` of a
//! path does not end it, and any other colon in a contract is written
//! escaped.
//!
//! Blank lines and lines starting with `#` are skipped.

use crate::constants::COMMENT_PREFIX;
use crate::error_ext::ErrorContext;
use locus_domain::constants::{DEFAULT_RANK, DEFAULT_SCOPE};
use locus_domain::value_objects::{Descriptor, DescriptorType};
use locus_domain::{Error, MultiError, MultiResult, Result};
use std::fmt::Write as _;
use std::path::Path;

const KEY_CLASS: &str = "class";
const KEY_INDEX: &str = "index";
const KEY_NAME: &str = "name";
const KEY_SCOPE: &str = "scope";
const KEY_QUALIFIER: &str = "qualifier";
const KEY_RANK: &str = "rank";
const KEY_PROXY: &str = "proxy";
const KEY_TYPE: &str = "type";

const RESERVED_KEYS: [&str; 8] = [
    KEY_CLASS,
    KEY_INDEX,
    KEY_NAME,
    KEY_SCOPE,
    KEY_QUALIFIER,
    KEY_RANK,
    KEY_PROXY,
    KEY_TYPE,
];

const TYPE_CLASS: &str = "class";
const TYPE_PROVIDE: &str = "provide";
const METADATA_MARKER: char = '@';

// ============================================================================
// Writing
// ============================================================================

/// Serialize one descriptor as a single line, without a line break
pub fn to_line(descriptor: &Descriptor) -> String {
    let mut line = String::new();
    push_pair(&mut line, KEY_CLASS, &escape(descriptor.implementation()));

    for contract in descriptor.contracts() {
        let mut value = escape_contract(contract);
        if let Some(name) = descriptor.name() {
            value.push(':');
            value.push_str(&escape(name).replace(':', "\\:"));
        }
        push_pair(&mut line, KEY_INDEX, &value);
    }
    if let Some(name) = descriptor.name() {
        push_pair(&mut line, KEY_NAME, &escape(name));
    }
    if descriptor.scope() != DEFAULT_SCOPE {
        push_pair(&mut line, KEY_SCOPE, &escape(descriptor.scope()));
    }
    for qualifier in descriptor.qualifiers() {
        push_pair(&mut line, KEY_QUALIFIER, &escape(qualifier));
    }
    if descriptor.rank() != DEFAULT_RANK {
        push_pair(&mut line, KEY_RANK, &descriptor.rank().to_string());
    }
    if let Some(proxiable) = descriptor.proxiable() {
        push_pair(&mut line, KEY_PROXY, if proxiable { "true" } else { "false" });
    }
    if descriptor.descriptor_type() == DescriptorType::ProvideMethod {
        push_pair(&mut line, KEY_TYPE, TYPE_PROVIDE);
    }
    for (key, values) in descriptor.metadata() {
        let key = if RESERVED_KEYS.contains(&key.as_str()) || key.starts_with(METADATA_MARKER) {
            format!("{METADATA_MARKER}{}", escape(key))
        } else {
            escape(key)
        };
        for value in values {
            push_pair(&mut line, &key, &escape(value));
        }
    }
    line
}

/// Serialize descriptors, one line each
pub fn to_document<'a, I>(descriptors: I) -> String
where
    I: IntoIterator<Item = &'a Descriptor>,
{
    let mut document = String::new();
    for descriptor in descriptors {
        let _ = writeln!(document, "{}", to_line(descriptor));
    }
    document
}

/// Write descriptors to a file, replacing it
pub fn write_file<'a, P, I>(path: P, descriptors: I) -> Result<()>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = &'a Descriptor>,
{
    let path = path.as_ref();
    std::fs::write(path, to_document(descriptors))
        .io_context(format!("Failed to write descriptor file {}", path.display()))
}

fn push_pair(line: &mut String, key: &str, value: &str) {
    if !line.is_empty() {
        line.push(',');
    }
    line.push_str(key);
    line.push('=');
    line.push_str(value);
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            ',' | '=' | '\\' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Escape a contract, keeping interior `::` readable
fn escape_contract(contract: &str) -> String {
    let chars: Vec<char> = contract.chars().collect();
    let mut escaped = String::with_capacity(contract.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != ':' {
            escaped.push_str(&escape(chars[i].encode_utf8(&mut [0; 4])));
            i += 1;
            continue;
        }
        let run = chars[i..].iter().take_while(|&&c| c == ':').count();
        let at_end = i + run == chars.len();
        if run == 2 && !at_end {
            escaped.push_str("::");
        } else {
            escaped.push_str(&"\\:".repeat(run));
        }
        i += run;
    }
    escaped
}

// ============================================================================
// Parsing
// ============================================================================

/// A character of a raw value and whether it was escaped
type Token = (char, bool);

/// Parse one line
///
/// Returns `None` for blank and comment lines. `number` is the one-based
/// line number reported in errors.
pub fn parse_line(line: &str, number: usize) -> Result<Option<Descriptor>> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with(COMMENT_PREFIX) {
        return Ok(None);
    }
    let tokens = tokenize(line).map_err(|message| Error::parse(number, message))?;
    LineParser::default()
        .parse(&tokens)
        .map(Some)
        .map_err(|message| Error::parse(number, message))
}

/// Parse a whole document, reporting every bad line
pub fn parse_document(text: &str) -> MultiResult<Vec<Descriptor>> {
    let mut descriptors = Vec::new();
    let mut errors = MultiError::new();
    for (index, line) in text.lines().enumerate() {
        match parse_line(line, index + 1) {
            Ok(Some(descriptor)) => descriptors.push(descriptor),
            Ok(None) => {}
            Err(e) => errors.push(e),
        }
    }
    errors.into_result(descriptors)
}

/// Read and parse a descriptor file
///
/// Parse errors name the file next to the line number.
pub fn read_file<P: AsRef<Path>>(path: P) -> MultiResult<Vec<Descriptor>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .io_context(format!("Failed to read descriptor file {}", path.display()))?;
    parse_document(&text).map_err(|errors| {
        errors
            .into_errors()
            .into_iter()
            .map(|e| match e {
                Error::Parse { line, message } => {
                    Error::parse(line, format!("{}: {message}", path.display()))
                }
                other => other,
            })
            .collect()
    })
}

fn tokenize(line: &str) -> std::result::Result<Vec<Token>, String> {
    let mut tokens = Vec::with_capacity(line.len());
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            tokens.push((c, false));
            continue;
        }
        match chars.next() {
            Some('n') => tokens.push(('\n', true)),
            Some('r') => tokens.push(('\r', true)),
            Some(escaped @ (',' | '=' | '\\' | ':')) => tokens.push((escaped, true)),
            Some(other) => return Err(format!("unknown escape sequence \\{other}")),
            None => return Err("line ends with a dangling escape".to_string()),
        }
    }
    Ok(tokens)
}

fn text(tokens: &[Token]) -> String {
    tokens.iter().map(|&(c, _)| c).collect()
}

fn split_unescaped(tokens: &[Token], separator: char) -> Vec<&[Token]> {
    tokens.split(|&(c, escaped)| c == separator && !escaped).collect()
}

/// Split an `index` value into contract and optional name
fn split_index(tokens: &[Token]) -> (String, Option<String>) {
    let mut i = 0;
    while i < tokens.len() {
        if tokens[i] != (':', false) {
            i += 1;
            continue;
        }
        let run = tokens[i..].iter().take_while(|&&t| t == (':', false)).count();
        if run == 1 {
            return (text(&tokens[..i]), Some(text(&tokens[i + 1..])));
        }
        i += run;
    }
    (text(tokens), None)
}

#[derive(Default)]
struct LineParser {
    class: Option<String>,
    contracts: Vec<String>,
    name: Option<String>,
    index_name: Option<String>,
    scope: Option<String>,
    qualifiers: Vec<String>,
    rank: Option<i32>,
    proxy: Option<bool>,
    provide: bool,
    metadata: Vec<(String, String)>,
}

impl LineParser {
    fn parse(mut self, tokens: &[Token]) -> std::result::Result<Descriptor, String> {
        for field in split_unescaped(tokens, ',') {
            let Some(eq) = field.iter().position(|&t| t == ('=', false)) else {
                return Err(format!("expected key=value, found '{}'", text(field)));
            };
            let key = text(&field[..eq]);
            let value = &field[eq + 1..];
            self.field(&key, value)?;
        }
        self.finish()
    }

    fn field(&mut self, key: &str, value: &[Token]) -> std::result::Result<(), String> {
        match key {
            KEY_CLASS => {
                if self.class.is_some() {
                    return Err("class given more than once".to_string());
                }
                self.class = Some(text(value));
            }
            KEY_INDEX => {
                let (contract, name) = split_index(value);
                if contract.is_empty() {
                    return Err("index names an empty contract".to_string());
                }
                if let Some(name) = name {
                    if self.index_name.as_ref().is_some_and(|seen| *seen != name) {
                        return Err(format!("index entries disagree on the name ('{name}')"));
                    }
                    self.index_name = Some(name);
                }
                self.contracts.push(contract);
            }
            KEY_NAME => self.name = Some(text(value)),
            KEY_SCOPE => self.scope = Some(text(value)),
            KEY_QUALIFIER => self.qualifiers.push(text(value)),
            KEY_RANK => {
                let raw = text(value);
                let rank = raw
                    .trim()
                    .parse::<i32>()
                    .map_err(|_| format!("rank '{raw}' is not an integer"))?;
                self.rank = Some(rank);
            }
            KEY_PROXY => {
                let raw = text(value);
                let proxy = raw
                    .trim()
                    .parse::<bool>()
                    .map_err(|_| format!("proxy '{raw}' is not true or false"))?;
                self.proxy = Some(proxy);
            }
            KEY_TYPE => match text(value).as_str() {
                TYPE_CLASS => self.provide = false,
                TYPE_PROVIDE => self.provide = true,
                other => return Err(format!("unknown descriptor type '{other}'")),
            },
            _ => {
                let key = key.strip_prefix(METADATA_MARKER).unwrap_or(key);
                if key.is_empty() {
                    return Err("empty metadata key".to_string());
                }
                self.metadata.push((key.to_string(), text(value)));
            }
        }
        Ok(())
    }

    fn finish(self) -> std::result::Result<Descriptor, String> {
        let Some(class) = self.class.filter(|class| !class.is_empty()) else {
            return Err("missing class".to_string());
        };
        let name = match (self.name, self.index_name) {
            (Some(name), Some(index_name)) if name != index_name => {
                return Err(format!(
                    "name '{name}' does not match the index name '{index_name}'"
                ));
            }
            (name, index_name) => name.or(index_name),
        };

        let mut builder = Descriptor::builder(class.as_str());
        if !self.contracts.is_empty() && !self.contracts.iter().any(|contract| *contract == class) {
            builder = builder.without_implementation_contract();
        }
        for contract in self.contracts {
            builder = builder.to(contract);
        }
        if let Some(name) = name {
            builder = builder.named(name);
        }
        if let Some(scope) = self.scope {
            builder = builder.in_scope(scope);
        }
        for qualifier in self.qualifiers {
            builder = builder.qualified_by(qualifier);
        }
        if let Some(rank) = self.rank {
            builder = builder.ranked(rank);
        }
        if let Some(proxy) = self.proxy {
            builder = builder.proxy(proxy);
        }
        if self.provide {
            builder = builder.provide_method();
        }
        for (key, value) in self.metadata {
            builder = builder.has_metadata(key, value);
        }
        Ok(builder.build())
    }
}
