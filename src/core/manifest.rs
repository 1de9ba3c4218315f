//! Dependency manifest parsing (requirements format).
//!
//! One requirement per line, optionally followed by version specifiers,
//! extras and an environment marker. `#` starts a comment when it opens
//! the line or follows whitespace. Blank lines and comment-only lines
//! contribute nothing.

use crate::utils::error::{EtlError, Result};
use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    ArbitraryEqual,
    Compatible,
    Equal,
    NotEqual,
    LessEqual,
    GreaterEqual,
    Less,
    Greater,
}

impl ComparisonOp {
    // 較長的運算子必須先比對
    const ALL: [(&'static str, ComparisonOp); 8] = [
        ("===", ComparisonOp::ArbitraryEqual),
        ("~=", ComparisonOp::Compatible),
        ("==", ComparisonOp::Equal),
        ("!=", ComparisonOp::NotEqual),
        ("<=", ComparisonOp::LessEqual),
        (">=", ComparisonOp::GreaterEqual),
        ("<", ComparisonOp::Less),
        (">", ComparisonOp::Greater),
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOp::ArbitraryEqual => "===",
            ComparisonOp::Compatible => "~=",
            ComparisonOp::Equal => "==",
            ComparisonOp::NotEqual => "!=",
            ComparisonOp::LessEqual => "<=",
            ComparisonOp::GreaterEqual => ">=",
            ComparisonOp::Less => "<",
            ComparisonOp::Greater => ">",
        }
    }

    fn strip_from(input: &str) -> Option<(ComparisonOp, &str)> {
        Self::ALL
            .iter()
            .find_map(|(token, op)| input.strip_prefix(token).map(|rest| (*op, rest)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSpecifier {
    pub op: ComparisonOp,
    pub version: String,
}

impl fmt::Display for VersionSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op.as_str(), self.version)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub name: String,
    pub extras: Vec<String>,
    pub specifiers: Vec<VersionSpecifier>,
    pub marker: Option<String>,
    /// 1-based line number in the manifest.
    pub line: usize,
}

impl Requirement {
    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name)
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.extras.is_empty() {
            write!(f, "[{}]", self.extras.join(","))?;
        }
        let specifiers: Vec<String> = self.specifiers.iter().map(|s| s.to_string()).collect();
        write!(f, "{}", specifiers.join(","))?;
        if let Some(marker) = &self.marker {
            write!(f, "; {}", marker)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Manifest {
    requirements: Vec<Requirement>,
}

impl Manifest {
    pub fn parse(text: &str) -> Result<Self> {
        let mut requirements = Vec::new();
        let mut seen = HashSet::new();

        for (index, raw_line) in text.lines().enumerate() {
            let line_no = index + 1;
            let content = strip_comment(raw_line).trim();
            if content.is_empty() {
                continue;
            }

            let requirement = parse_requirement(content, line_no)?;
            if !seen.insert(requirement.normalized_name()) {
                return Err(manifest_error(
                    line_no,
                    format!("Duplicate requirement '{}'", requirement.name),
                ));
            }
            requirements.push(requirement);
        }

        tracing::debug!("Parsed {} requirement(s) from manifest", requirements.len());
        Ok(Self { requirements })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn names(&self) -> Vec<&str> {
        self.requirements.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Requirement> {
        let wanted = normalize_name(name);
        self.requirements
            .iter()
            .find(|r| r.normalized_name() == wanted)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.requirements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Requirement> {
        self.requirements.iter()
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a Requirement;
    type IntoIter = std::slice::Iter<'a, Requirement>;

    fn into_iter(self) -> Self::IntoIter {
        self.requirements.iter()
    }
}

/// 名稱比較時忽略大小寫，且 `-` `_` `.` 視為相同
pub fn normalize_name(name: &str) -> String {
    static SEPARATORS: OnceLock<Regex> = OnceLock::new();
    let re = SEPARATORS.get_or_init(|| Regex::new(r"[-_.]+").expect("valid regex"));
    re.replace_all(name, "-").to_ascii_lowercase()
}

fn head_regex() -> &'static Regex {
    static HEAD: OnceLock<Regex> = OnceLock::new();
    HEAD.get_or_init(|| {
        Regex::new(r"^(?P<name>[A-Za-z0-9][A-Za-z0-9._-]*)\s*(?:\[(?P<extras>[^\]]*)\])?\s*(?P<rest>.*)$")
            .expect("valid regex")
    })
}

fn identifier_regex() -> &'static Regex {
    static IDENT: OnceLock<Regex> = OnceLock::new();
    IDENT.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?$").expect("valid regex")
    })
}

fn version_regex() -> &'static Regex {
    static VERSION: OnceLock<Regex> = OnceLock::new();
    VERSION.get_or_init(|| Regex::new(r"^[A-Za-z0-9.*+!_-]+$").expect("valid regex"))
}

fn manifest_error(line: usize, message: impl Into<String>) -> EtlError {
    EtlError::ManifestError {
        line,
        message: message.into(),
    }
}

fn strip_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'#' && (i == 0 || bytes[i - 1].is_ascii_whitespace()) {
            return &line[..i];
        }
    }
    line
}

fn parse_requirement(content: &str, line: usize) -> Result<Requirement> {
    if content.starts_with('-') {
        return Err(manifest_error(
            line,
            format!("Option lines are not supported: '{}'", content),
        ));
    }

    let (body, marker) = match content.split_once(';') {
        Some((body, marker)) => {
            let marker = marker.trim();
            if marker.is_empty() {
                return Err(manifest_error(line, "Empty environment marker after ';'"));
            }
            (body.trim(), Some(marker.to_string()))
        }
        None => (content, None),
    };

    let caps = head_regex()
        .captures(body)
        .ok_or_else(|| manifest_error(line, format!("Invalid package name in '{}'", body)))?;

    let name = &caps["name"];
    if !identifier_regex().is_match(name) {
        return Err(manifest_error(
            line,
            format!("Invalid package name '{}'", name),
        ));
    }

    let extras = match caps.name("extras") {
        Some(extras) => parse_extras(extras.as_str(), line)?,
        None => Vec::new(),
    };

    let specifiers = parse_specifiers(caps.name("rest").map_or("", |m| m.as_str()), line)?;

    Ok(Requirement {
        name: name.to_string(),
        extras,
        specifiers,
        marker,
        line,
    })
}

fn parse_extras(raw: &str, line: usize) -> Result<Vec<String>> {
    let mut extras = Vec::new();
    for extra in raw.split(',').map(str::trim) {
        if extra.is_empty() {
            continue;
        }
        if !identifier_regex().is_match(extra) {
            return Err(manifest_error(line, format!("Invalid extra '{}'", extra)));
        }
        extras.push(extra.to_string());
    }
    Ok(extras)
}

fn parse_specifiers(raw: &str, line: usize) -> Result<Vec<VersionSpecifier>> {
    let mut raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }

    // PEP 508 允許 `name (>=1.0)` 的括號寫法
    if let Some(inner) = raw.strip_prefix('(') {
        raw = inner
            .strip_suffix(')')
            .ok_or_else(|| manifest_error(line, "Unclosed '(' in version specifier"))?
            .trim();
    }

    let mut specifiers = Vec::new();
    for clause in raw.split(',').map(str::trim) {
        let (op, version) = ComparisonOp::strip_from(clause).ok_or_else(|| {
            manifest_error(line, format!("Expected a version specifier, found '{}'", clause))
        })?;
        let version = version.trim();
        if !version_regex().is_match(version) {
            return Err(manifest_error(
                line,
                format!("Invalid version '{}'", version),
            ));
        }
        specifiers.push(VersionSpecifier {
            op,
            version: version.to_string(),
        });
    }
    Ok(specifiers)
}
