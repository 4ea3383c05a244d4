//! Filename templating and remote path construction.
//!
//! A naming template is a string with `{placeholder}` substitutions,
//! expanded once per attachment against a [`NamingContext`]:
//!
//! | placeholder   | value                                           |
//! |---------------|-------------------------------------------------|
//! | `{orig_base}` | original filename without its extension         |
//! | `{orig_ext}`  | original extension with leading dot (may be "") |
//! | `{subject}`   | decoded message subject                         |
//! | `{uid}`       | message UID                                     |
//! | `{date}`      | message date, `%Y-%m-%d`                        |
//! | `{datetime}`  | message date, `%Y%m%d-%H%M%S`                   |
//!
//! `{{` and `}}` produce literal braces. Template errors are treated as a
//! configuration defect: they fail validation at load time and abort the
//! whole cycle if encountered mid-run.

use chrono::{DateTime, Utc};

use crate::error::{HarvestError, Result};
use crate::model::attachment::AttachmentRecord;
use crate::model::message::Envelope;

/// Suffix inserted before the extension when the upload target already
/// exists in the store. Applied at most once per attachment.
const DUP_SUFFIX: &str = "-dup";

/// Substitution values for one attachment.
#[derive(Debug, Clone)]
pub struct NamingContext {
    pub orig_base: String,
    /// Original extension with leading dot, or empty.
    pub orig_ext: String,
    pub subject: String,
    pub uid: u32,
    pub date: DateTime<Utc>,
}

impl NamingContext {
    /// Derive the substitution values from an attachment and its message.
    pub fn new(record: &AttachmentRecord, envelope: &Envelope, uid: u32) -> Self {
        let orig_ext = if record.extension.is_empty() {
            String::new()
        } else {
            format!(".{}", record.extension)
        };
        Self {
            orig_base: record.base_name().to_string(),
            orig_ext,
            subject: envelope.subject.clone(),
            uid,
            date: envelope.date,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    OrigBase,
    OrigExt,
    Subject,
    Uid,
    Date,
    DateTime,
}

#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Field(Field),
}

/// A parsed naming template. Parsing happens once per cycle; expansion is
/// deterministic in the context.
#[derive(Debug, Clone)]
pub struct NameTemplate {
    segments: Vec<Segment>,
}

impl NameTemplate {
    /// Parse a template string.
    pub fn parse(template: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' => {
                    if chars.peek() == Some(&'{') {
                        chars.next();
                        literal.push('{');
                        continue;
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(n) if n.is_ascii_alphanumeric() || n == '_' => name.push(n),
                            Some(n) => {
                                return Err(HarvestError::Template(format!(
                                    "unexpected '{n}' in placeholder"
                                )));
                            }
                            None => {
                                return Err(HarvestError::Template(
                                    "unterminated placeholder".to_string(),
                                ));
                            }
                        }
                    }
                    segments.push(Segment::Field(field_by_name(&name)?));
                }
                '}' => {
                    // Consume a doubled closing brace; a lone one is literal.
                    if chars.peek() == Some(&'}') {
                        chars.next();
                    }
                    literal.push('}');
                }
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self { segments })
    }

    /// Expand the template against `ctx` and post-process the result.
    ///
    /// The expanded name is trimmed, path separators are replaced with `-`
    /// so the template cannot escape the target directory, and the original
    /// extension is appended when the name carries none. An empty result is
    /// an error: it indicates a defective template, not a per-item fault.
    pub fn expand(&self, ctx: &NamingContext) -> Result<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(Field::OrigBase) => out.push_str(&ctx.orig_base),
                Segment::Field(Field::OrigExt) => out.push_str(&ctx.orig_ext),
                Segment::Field(Field::Subject) => out.push_str(&ctx.subject),
                Segment::Field(Field::Uid) => out.push_str(&ctx.uid.to_string()),
                Segment::Field(Field::Date) => {
                    out.push_str(&ctx.date.format("%Y-%m-%d").to_string());
                }
                Segment::Field(Field::DateTime) => {
                    out.push_str(&ctx.date.format("%Y%m%d-%H%M%S").to_string());
                }
            }
        }

        let mut name: String = out
            .trim()
            .chars()
            .map(|c| if c == '/' || c == '\\' { '-' } else { c })
            .collect();
        if name.is_empty() {
            return Err(HarvestError::Template(
                "template expanded to an empty name".to_string(),
            ));
        }
        if !name.contains('.') && !ctx.orig_ext.is_empty() {
            name.push_str(&ctx.orig_ext);
        }
        Ok(name)
    }
}

fn field_by_name(name: &str) -> Result<Field> {
    match name {
        "orig_base" => Ok(Field::OrigBase),
        "orig_ext" => Ok(Field::OrigExt),
        "subject" => Ok(Field::Subject),
        "uid" => Ok(Field::Uid),
        "date" => Ok(Field::Date),
        "datetime" => Ok(Field::DateTime),
        other => Err(HarvestError::Template(format!(
            "unknown placeholder '{{{other}}}'"
        ))),
    }
}

/// Join the task's base path and tag segments into one relative directory
/// prefix. Segments are trimmed of whitespace and separators; empty
/// segments are dropped. Returns "" when nothing remains.
pub fn remote_dir(path: &str, tags: &[String]) -> String {
    let mut parts: Vec<&str> = Vec::new();
    let base = path.trim().trim_matches('/');
    if !base.is_empty() {
        parts.push(base);
    }
    for tag in tags {
        let t = tag.trim().trim_matches('/');
        if !t.is_empty() {
            parts.push(t);
        }
    }
    parts.join("/")
}

/// Join a relative directory prefix and a filename into a remote path.
pub fn join_remote(dir: &str, file: &str) -> String {
    let dir = dir.trim_matches('/');
    let file = file.trim_matches('/');
    if dir.is_empty() {
        file.to_string()
    } else {
        format!("{dir}/{file}")
    }
}

/// Rewrite a colliding upload target by inserting the duplicate suffix
/// before the filename's extension. The directory part is untouched.
/// Applied once; a second collision is left to the store to overwrite.
pub fn disambiguate(target: &str) -> String {
    let (dir, file) = match target.rfind('/') {
        Some(idx) => (&target[..idx + 1], &target[idx + 1..]),
        None => ("", target),
    };
    match file.rfind('.') {
        Some(idx) => format!("{dir}{}{DUP_SUFFIX}{}", &file[..idx], &file[idx..]),
        None => format!("{dir}{file}{DUP_SUFFIX}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ctx() -> NamingContext {
        NamingContext {
            orig_base: "invoice".to_string(),
            orig_ext: ".pdf".to_string(),
            subject: "Invoice".to_string(),
            uid: 42,
            date: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_expand_datetime_base_ext() {
        let tmpl = NameTemplate::parse("{datetime}-{orig_base}{orig_ext}").unwrap();
        assert_eq!(tmpl.expand(&ctx()).unwrap(), "20240301-100000-invoice.pdf");
    }

    #[test]
    fn test_expand_is_deterministic() {
        let tmpl = NameTemplate::parse("{date}_{subject}_{uid}").unwrap();
        let first = tmpl.expand(&ctx()).unwrap();
        let second = tmpl.expand(&ctx()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, "2024-03-01_Invoice_42");
    }

    #[test]
    fn test_extension_appended_when_missing() {
        let tmpl = NameTemplate::parse("{uid}-{orig_base}").unwrap();
        assert_eq!(tmpl.expand(&ctx()).unwrap(), "42-invoice.pdf");
    }

    #[test]
    fn test_extension_not_appended_when_present() {
        let tmpl = NameTemplate::parse("{orig_base}.txt").unwrap();
        assert_eq!(tmpl.expand(&ctx()).unwrap(), "invoice.txt");
    }

    #[test]
    fn test_separators_replaced() {
        let mut c = ctx();
        c.subject = "a/b\\c".to_string();
        let tmpl = NameTemplate::parse("{subject}{orig_ext}").unwrap();
        assert_eq!(tmpl.expand(&c).unwrap(), "a-b-c.pdf");
    }

    #[test]
    fn test_surrounding_whitespace_trimmed() {
        let tmpl = NameTemplate::parse("  {orig_base}{orig_ext}  ").unwrap();
        assert_eq!(tmpl.expand(&ctx()).unwrap(), "invoice.pdf");
    }

    #[test]
    fn test_escaped_braces() {
        let tmpl = NameTemplate::parse("{{{uid}}}{orig_ext}").unwrap();
        assert_eq!(tmpl.expand(&ctx()).unwrap(), "{42}.pdf");
    }

    #[test]
    fn test_unknown_placeholder_is_parse_error() {
        let err = NameTemplate::parse("{nope}").unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_unterminated_placeholder_is_parse_error() {
        assert!(NameTemplate::parse("{orig_base").is_err());
    }

    #[test]
    fn test_empty_expansion_is_error() {
        let mut c = ctx();
        c.subject = "   ".to_string();
        let tmpl = NameTemplate::parse("{subject}").unwrap();
        assert!(tmpl.expand(&c).is_err());
    }

    #[test]
    fn test_remote_dir_joins_and_drops_empty() {
        assert_eq!(
            remote_dir("/archive/", &[" invoices ".into(), "".into(), "/2024".into()]),
            "archive/invoices/2024"
        );
        assert_eq!(remote_dir("", &[]), "");
    }

    #[test]
    fn test_join_remote() {
        assert_eq!(join_remote("a/b", "c.pdf"), "a/b/c.pdf");
        assert_eq!(join_remote("", "c.pdf"), "c.pdf");
    }

    #[test]
    fn test_disambiguate_inserts_suffix_before_extension() {
        assert_eq!(
            disambiguate("archive/20240301-100000-invoice.pdf"),
            "archive/20240301-100000-invoice-dup.pdf"
        );
        assert_eq!(disambiguate("report.tar.gz"), "report.tar-dup.gz");
        assert_eq!(disambiguate("noext"), "noext-dup");
    }
}
