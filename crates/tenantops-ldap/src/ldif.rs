//! Minimal LDIF reader for `ldapsearch -LLL` output

use crate::error::{LdapError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::collections::BTreeMap;

/// One directory entry; attribute names are matched case-insensitively
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LdifEntry {
    pub dn: String,
    attributes: BTreeMap<String, Vec<String>>,
}

impl LdifEntry {
    /// All values of `name`, empty when the attribute is absent
    pub fn values(&self, name: &str) -> &[String] {
        self.attributes
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn first(&self, name: &str) -> Option<&str> {
        self.values(name).first().map(String::as_str)
    }

    fn push(&mut self, name: &str, value: String) {
        self.attributes
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value);
    }

    fn is_empty(&self) -> bool {
        self.dn.is_empty() && self.attributes.is_empty()
    }
}

/// Parse LDIF content records
///
/// Handles folded lines, comments and base64 (`attr:: ...`) values.
pub fn parse_ldif(text: &str) -> Result<Vec<LdifEntry>> {
    let mut entries = Vec::new();
    let mut current = LdifEntry::default();

    for line in unfold(text) {
        if line.is_empty() {
            if !current.is_empty() {
                entries.push(std::mem::take(&mut current));
            }
            continue;
        }
        if line.starts_with('#') {
            continue;
        }

        let (name, value) = parse_line(&line)?;
        if name.eq_ignore_ascii_case("dn") {
            current.dn = value;
        } else if name.eq_ignore_ascii_case("version") && current.is_empty() {
            continue;
        } else {
            current.push(name, value);
        }
    }

    if !current.is_empty() {
        entries.push(current);
    }
    Ok(entries)
}

/// Join continuation lines (leading single space) onto the previous line
fn unfold(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for raw in text.lines() {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        match (raw.strip_prefix(' '), lines.last_mut()) {
            (Some(rest), Some(previous)) if !previous.is_empty() => previous.push_str(rest),
            _ => lines.push(raw.to_string()),
        }
    }
    lines
}

fn parse_line(line: &str) -> Result<(&str, String)> {
    let (name, rest) = line
        .split_once(':')
        .ok_or_else(|| LdapError::InvalidLdif(format!("no attribute separator in {:?}", line)))?;

    let value = if let Some(encoded) = rest.strip_prefix(':') {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| LdapError::InvalidLdif(format!("{}: {}", name, e)))?;
        String::from_utf8(bytes)
            .map_err(|_| LdapError::InvalidLdif(format!("{}: value is not UTF-8", name)))?
    } else {
        rest.trim_start().to_string()
    };
    Ok((name, value))
}

/// The value of the leading RDN, e.g. `ana` for `uid=ana,ou=people,dc=example`
pub fn leading_rdn_value(dn: &str) -> Option<&str> {
    let rdn = dn.split(',').next()?;
    let (_, value) = rdn.split_once('=')?;
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

/// Escape a value for use inside a search filter
pub fn escape_filter_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '*' => escaped.push_str("\\2a"),
            '(' => escaped.push_str("\\28"),
            ')' => escaped.push_str("\\29"),
            '\\' => escaped.push_str("\\5c"),
            '\0' => escaped.push_str("\\00"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    const GROUP_LDIF: &str = "\
dn: cn=research,ou=groups,dc=example,dc=org
objectClass: posixGroup
cn: research
memberUid: ana
memberUid: bo

# second entry
dn: cn=ops,ou=groups,dc=example,dc=org
member: uid=carla,ou=people,dc=exam
 ple,dc=org
uniqueMember: uid=dan,ou=people,dc=example,dc=org
description:: w4lxdWlwZSBkJ29ww6lyYXRpb25z
";

    #[test]
    fn test_parse_entries() {
        let entries = parse_ldif(GROUP_LDIF).unwrap();
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].dn, "cn=research,ou=groups,dc=example,dc=org");
        assert_eq!(entries[0].values("memberuid"), ["ana", "bo"]);
        assert_eq!(entries[0].first("CN"), Some("research"));

        assert_eq!(
            entries[1].first("member"),
            Some("uid=carla,ou=people,dc=example,dc=org")
        );
        assert_eq!(entries[1].first("description"), Some("Équipe d'opérations"));
        assert!(entries[1].values("memberUid").is_empty());
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_ldif("").unwrap().is_empty());
        assert!(parse_ldif("\n\n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = parse_ldif("dn: cn=x\nnot an attribute\n").unwrap_err();
        assert!(matches!(err, LdapError::InvalidLdif(_)));

        let err = parse_ldif("dn: cn=x\ncn:: ***\n").unwrap_err();
        assert!(matches!(err, LdapError::InvalidLdif(_)));
    }

    #[test]
    fn test_leading_rdn_value() {
        assert_eq!(
            leading_rdn_value("uid=ana,ou=people,dc=example,dc=org"),
            Some("ana")
        );
        assert_eq!(leading_rdn_value("cn=Bo Li,ou=people"), Some("Bo Li"));
        assert_eq!(leading_rdn_value("garbage"), None);
        assert_eq!(leading_rdn_value("uid=,ou=people"), None);
    }

    #[test]
    fn test_escape_filter_value() {
        assert_eq!(escape_filter_value("research"), "research");
        assert_eq!(escape_filter_value("a*(b)\\"), "a\\2a\\28b\\29\\5c");
    }
}
