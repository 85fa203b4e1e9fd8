//! Filename grammars.
//!
//! A grammar is a printf-style template with named fields
//! (`%(key)[0][width]{d,x,s}`), a regex that matches the basename and
//! captures the same keys as named groups, and the type each captured group
//! is coerced to.

use std::path::Path;

use regex::Regex;

use crate::error::{Error, Result};
use crate::identity::{parse_unsigned, IdValue, Identity};

/// How a captured filename field is coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    /// Decimal integer.
    Int,
    /// Hexadecimal with a `0x` prefix, held unsigned.
    Hex,
    Str,
}

#[derive(Debug)]
pub struct Grammar {
    product: &'static str,
    format: &'static str,
    regex: Regex,
    keys: &'static [(&'static str, KeyType)],
}

/// One `%(key)[0][width]conv` directive.
struct Field<'a> {
    key: &'a str,
    zero_pad: bool,
    width: usize,
    conversion: char,
}

/// Split the directive at the start of `s` (just after the `%`), returning it
/// and the remaining template.
fn take_field(s: &str) -> Option<(Field<'_>, &str)> {
    let s = s.strip_prefix('(')?;
    let close = s.find(')')?;
    let key = &s[..close];
    let mut rest = &s[close + 1..];

    let zero_pad = rest.starts_with('0');
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    let width = if digits == 0 { 0 } else { rest[..digits].parse().ok()? };
    rest = &rest[digits..];

    let conversion = rest.chars().next().filter(|c| matches!(c, 'd' | 'x' | 's'))?;
    Some((
        Field {
            key,
            zero_pad,
            width,
            conversion,
        },
        &rest[1..],
    ))
}

impl Grammar {
    /// Compile a grammar. `pattern` must name its groups after `keys`.
    pub fn new(
        product: &'static str,
        format: &'static str,
        pattern: &str,
        keys: &'static [(&'static str, KeyType)],
    ) -> std::result::Result<Self, regex::Error> {
        Ok(Grammar {
            product,
            format,
            regex: Regex::new(pattern)?,
            keys,
        })
    }

    /// Name of the product this grammar belongs to.
    pub fn product(&self) -> &'static str {
        self.product
    }

    /// The printf-style filename template.
    pub fn format(&self) -> &'static str {
        self.format
    }

    /// The anchored regex matched against basenames.
    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Identity keys in template order, with how each is coerced.
    pub fn keys(&self) -> &'static [(&'static str, KeyType)] {
        self.keys
    }

    /// Does `basename` follow this grammar?
    pub fn matches(&self, basename: &str) -> bool {
        self.regex.is_match(basename)
    }

    /// Render the filename for `identity`.
    ///
    /// A rendering that the grammar's own regex would reject (for instance a
    /// field wider than its declared width) is an error, so that parsing a
    /// rendered name always gives back the identity.
    pub fn render(&self, identity: &Identity) -> Result<String> {
        let mut out = String::with_capacity(self.format.len() + 16);
        let mut rest = self.format;
        while let Some(pos) = rest.find('%') {
            out.push_str(&rest[..pos]);
            let (field, after) = take_field(&rest[pos + 1..]).ok_or_else(|| {
                Error::Identity(format!("bad directive in template {:?}", self.format))
            })?;
            let width = field.width;
            let text = match field.conversion {
                'd' if field.zero_pad => format!("{:0width$}", identity.int(field.key)?),
                'd' => format!("{:width$}", identity.int(field.key)?),
                'x' if field.zero_pad => format!("{:0width$x}", identity.uint(field.key)?),
                'x' => format!("{:width$x}", identity.uint(field.key)?),
                _ => format!("{:>width$}", identity.string(field.key)?),
            };
            out.push_str(&text);
            rest = after;
        }
        out.push_str(rest);

        if !self.matches(&out) {
            return Err(Error::Identity(format!(
                "{} filename {out:?} does not follow {:?}",
                self.product, self.format
            )));
        }
        Ok(out)
    }

    /// Extract the identity from a path; only the basename is examined.
    pub fn parse<P: AsRef<Path>>(&self, path: P) -> Result<Identity> {
        let path = path.as_ref();
        let parse_error = || Error::Parse {
            product: self.product,
            filename: path.display().to_string(),
        };
        let basename = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(parse_error)?;
        let captures = self.regex.captures(basename).ok_or_else(parse_error)?;

        let mut identity = Identity::new();
        for &(key, key_type) in self.keys {
            let text = captures.name(key).ok_or_else(parse_error)?.as_str();
            let value = match key_type {
                KeyType::Int => IdValue::Int(text.parse().map_err(|_| parse_error())?),
                KeyType::Hex => IdValue::UInt(parse_unsigned(text).ok_or_else(parse_error)?),
                KeyType::Str => IdValue::Str(text.to_string()),
            };
            identity.insert(key, value);
        }
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grammar() -> Grammar {
        Grammar::new(
            "pfsTest",
            "pfsTest-%(visit)06d-%(arm)1s-0x%(hash)08x-%(name)s.fits",
            r"^pfsTest-(?P<visit>\d{6})-(?P<arm>\S)-(?P<hash>0x[0-9a-f]{8})-(?P<name>.*)\.fits.*$",
            &[
                ("visit", KeyType::Int),
                ("arm", KeyType::Str),
                ("hash", KeyType::Hex),
                ("name", KeyType::Str),
            ],
        )
        .unwrap()
    }

    fn identity() -> Identity {
        Identity::new()
            .with("visit", 42_i64)
            .with("arm", "r")
            .with("hash", 0xbeef_u64)
            .with("name", "a,b")
    }

    #[test]
    fn render_applies_widths() {
        assert_eq!(
            grammar().render(&identity()).unwrap(),
            "pfsTest-000042-r-0x0000beef-a,b.fits"
        );
    }

    #[test]
    fn parse_inverts_render() {
        let g = grammar();
        let name = g.render(&identity()).unwrap();
        assert_eq!(g.parse(&name).unwrap(), identity());
        // Directories and compression suffixes are ignored.
        let path = format!("/data/calib/{name}.gz");
        assert_eq!(g.parse(path).unwrap(), identity());
    }

    #[test]
    fn render_needs_every_key() {
        let mut id = Identity::new().with("visit", 1_i64).with("arm", "b");
        assert!(matches!(
            grammar().render(&id),
            Err(Error::MissingKey(k)) if k == "hash"
        ));
        id.insert("hash", 1_u64);
        id.insert("name", "x");
        assert!(grammar().render(&id).is_ok());
    }

    #[test]
    fn render_rejects_overflowing_fields() {
        let id = identity().with("visit", 1_234_567_i64);
        assert!(matches!(grammar().render(&id), Err(Error::Identity(_))));
    }

    #[test]
    fn parse_rejects_foreign_names() {
        let g = grammar();
        assert!(matches!(
            g.parse("pfsTest-12-r-0x0000beef-a.fits"),
            Err(Error::Parse { product: "pfsTest", .. })
        ));
        // Only the basename is matched.
        assert!(g.parse("pfsTest-000042-r-0x0000beef-a.fits/other").is_err());
    }

    #[test]
    fn string_fields_are_right_justified() {
        let g = Grammar::new("t", "%(s)5s|", r"^.{5}\|$", &[]).unwrap();
        assert_eq!(g.render(&Identity::new().with("s", "ab")).unwrap(), "   ab|");
    }

    #[test]
    fn malformed_template_is_reported() {
        let g = Grammar::new("t", "x-%(a)q", ".*", &[]).unwrap();
        assert!(matches!(
            g.render(&Identity::new().with("a", 1_i64)),
            Err(Error::Identity(_))
        ));
    }
}
