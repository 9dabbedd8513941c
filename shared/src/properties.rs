//! In-memory configuration set and the `.properties` text format that feeds it.

use std::collections::BTreeMap;
use std::io::Read;

use crate::error::PropertiesError;

/// Keys whose values carry credentials and must never show up in logs.
pub const SECRET_KEYS: &[&str] = &[
    "sasl.jaas.config",
    "sasl.password",
    "basic.auth.user.info",
    "ssl.key.password",
    "ssl.keystore.password",
];

const REDACTED: &str = "********";

/// Ordered key/value configuration handed to the Kafka and schema-registry
/// clients. Later writes to the same key replace earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: BTreeMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, returning the value it replaced.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parses a properties document from `reader` and merges every entry.
    /// Returns the number of entries read.
    pub fn load<R: Read>(&mut self, mut reader: R) -> Result<usize, PropertiesError> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        let pairs = parse(&text)?;
        let count = pairs.len();
        self.extend(pairs);
        Ok(count)
    }

    /// Copy of the set with credential-bearing values masked, for logging.
    pub fn redacted(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|(k, v)| {
                let shown = if SECRET_KEYS.contains(&k.as_str()) && !v.is_empty() {
                    REDACTED.to_string()
                } else {
                    v.clone()
                };
                (k.clone(), shown)
            })
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for Properties {
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut props = Properties::new();
        props.extend(iter);
        props
    }
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\u{0C}')
}

/// Parses `.properties` text into key/value pairs in document order.
///
/// Supports `#`/`!` comments, `=`/`:`/whitespace separators, backslash line
/// continuations and the usual escapes including `\uXXXX`.
pub fn parse(text: &str) -> Result<Vec<(String, String)>, PropertiesError> {
    let mut pairs = Vec::new();
    let mut logical = String::new();
    let mut start_line = 0;
    let mut continuing = false;

    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    for (idx, raw) in text.split('\n').enumerate() {
        let line = raw.trim_start_matches(is_blank);

        if !continuing {
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            start_line = idx + 1;
        }

        let trailing = line.chars().rev().take_while(|c| *c == '\\').count();
        if trailing % 2 == 1 {
            logical.push_str(&line[..line.len() - 1]);
            continuing = true;
            continue;
        }

        logical.push_str(line);
        continuing = false;
        pairs.push(split_entry(&logical, start_line)?);
        logical.clear();
    }

    // Continuation on the final line of the document.
    if continuing && !logical.is_empty() {
        pairs.push(split_entry(&logical, start_line)?);
    }

    Ok(pairs)
}

fn split_entry(line: &str, line_no: usize) -> Result<(String, String), PropertiesError> {
    let mut key_end = line.len();
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => {
                key_end = i;
                break;
            }
            c if is_blank(c) => {
                key_end = i;
                break;
            }
            _ => {}
        }
    }

    let key = &line[..key_end];
    let mut rest = line[key_end..].trim_start_matches(is_blank);
    if let Some(stripped) = rest.strip_prefix(['=', ':']) {
        rest = stripped.trim_start_matches(is_blank);
    }

    Ok((unescape(key, line_no)?, unescape(rest, line_no)?))
}

fn unescape(input: &str, line_no: usize) -> Result<String, PropertiesError> {
    let mut out = String::with_capacity(input.len());
    // \u escapes are UTF-16 code units; buffer them so surrogate pairs combine.
    let mut units: Vec<u16> = Vec::new();
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            flush_units(&mut units, &mut out);
            out.push(c);
            continue;
        }
        let Some(next) = chars.next() else {
            break;
        };
        if next == 'u' {
            let hex: String = chars.by_ref().take(4).collect();
            if hex.len() != 4 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(PropertiesError::MalformedEscape { line: line_no });
            }
            let unit = u16::from_str_radix(&hex, 16)
                .map_err(|_| PropertiesError::MalformedEscape { line: line_no })?;
            units.push(unit);
            continue;
        }
        flush_units(&mut units, &mut out);
        out.push(match next {
            't' => '\t',
            'n' => '\n',
            'r' => '\r',
            'f' => '\u{0C}',
            other => other,
        });
    }
    flush_units(&mut units, &mut out);
    Ok(out)
}

fn flush_units(units: &mut Vec<u16>, out: &mut String) {
    if units.is_empty() {
        return;
    }
    out.extend(
        char::decode_utf16(units.drain(..)).map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER)),
    );
}
