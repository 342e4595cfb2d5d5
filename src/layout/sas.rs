//! Reader for SAS-style layout programs.
//!
//! Only the statements that describe a fixed-width record are interpreted:
//!
//! - `INPUT`: column input (`NAME $ 1-10`, `NAME 11`) and formatted input
//!   (`@21 NAME $CHAR10.`, `@31 SCORE 8.2`, or a bare informat continuing from the previous field)
//! - `LABEL NAME = 'text'`: variable descriptions
//! - `VALUE [$]fmt 'code' = 'label' ...` inside `PROC FORMAT`: code tables
//! - `FORMAT var ... fmt.`: which table decodes which variable
//!
//! Everything else (`DATA`, `INFILE`, `RUN`, `LENGTH`, ...) is skipped. Keywords are
//! case-insensitive; `/* */` block comments and `* ...;` statement comments are ignored.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{NcdbError, NcdbResult};
use crate::types::ValueLabels;

use super::RawField;

/// Everything a SAS layout program declares, before positions are validated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SasDocument {
    /// `INPUT` fields in declaration order.
    pub fields: Vec<RawField>,
    /// Upper-cased variable name → description.
    pub variable_labels: BTreeMap<String, String>,
    /// Upper-cased format name (without `$`) → code table.
    pub formats: BTreeMap<String, ValueLabels>,
    /// Variable name → upper-cased format name.
    pub associations: BTreeMap<String, String>,
}

/// Parse SAS layout text. `source` is only used to annotate errors.
pub fn parse_sas(text: &str, source: Option<&Path>) -> NcdbResult<SasDocument> {
    let ctx = ParseContext {
        source: source.map(Path::to_path_buf),
    };
    let mut doc = SasDocument::default();

    for statement in split_statements(text, &ctx)? {
        let statement = statement.trim();
        if statement.is_empty() {
            continue;
        }

        let tokens = lex(statement, &ctx)?;
        let Some(Token::Word(keyword)) = tokens.first() else {
            continue;
        };
        let body = &tokens[1..];

        match keyword.to_ascii_uppercase().as_str() {
            "INPUT" => parse_input(body, &mut doc.fields, &ctx)?,
            "LABEL" => parse_labels(body, &mut doc.variable_labels, &ctx)?,
            "VALUE" => {
                let (name, table) = parse_value(body, &ctx)?;
                doc.formats.insert(name, table);
            }
            "FORMAT" => parse_format_associations(body, &mut doc.associations),
            _ => {}
        }
    }

    Ok(doc)
}

struct ParseContext {
    source: Option<PathBuf>,
}

impl ParseContext {
    fn error(&self, message: impl Into<String>) -> NcdbError {
        NcdbError::format(self.source.clone(), message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Quoted(String),
    Eq,
    Comma,
}

/// Split on `;` outside of quoted strings, dropping `/* ... */` block comments and `* ...;`
/// comment statements. Quotes inside comments are not tracked. A trailing statement without `;`
/// is kept.
fn split_statements(text: &str, ctx: &ParseContext) -> NcdbResult<Vec<String>> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
                current.push(c);
            }
            None if c == '/' && chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
                current.push(' ');
            }
            None if c == '*' && current.trim().is_empty() => {
                for c in chars.by_ref() {
                    if c == ';' {
                        break;
                    }
                }
                current.clear();
            }
            None if c == ';' => statements.push(std::mem::take(&mut current)),
            None => {
                if c == '\'' || c == '"' {
                    quote = Some(c);
                }
                current.push(c);
            }
        }
    }

    if quote.is_some() {
        return Err(ctx.error("unterminated quoted string"));
    }
    if !current.trim().is_empty() {
        statements.push(current);
    }
    Ok(statements)
}

fn lex(statement: &str, ctx: &ParseContext) -> NcdbResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    let mut chars = statement.chars().peekable();

    fn flush(word: &mut String, tokens: &mut Vec<Token>) {
        if !word.is_empty() {
            tokens.push(Token::Word(std::mem::take(word)));
        }
    }

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => flush(&mut word, &mut tokens),
            '=' => {
                flush(&mut word, &mut tokens);
                tokens.push(Token::Eq);
            }
            ',' => {
                flush(&mut word, &mut tokens);
                tokens.push(Token::Comma);
            }
            '\'' | '"' => {
                flush(&mut word, &mut tokens);
                let quote = c;
                let mut value = String::new();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    if c == quote {
                        // Doubled quote is an escaped literal quote.
                        if chars.peek() == Some(&quote) {
                            chars.next();
                            value.push(quote);
                            continue;
                        }
                        closed = true;
                        break;
                    }
                    value.push(c);
                }
                if !closed {
                    return Err(ctx.error(format!("unterminated quoted string in: {statement}")));
                }
                tokens.push(Token::Quoted(value));
            }
            _ => word.push(c),
        }
    }
    flush(&mut word, &mut tokens);

    Ok(tokens)
}

fn last_column(first: usize, width: usize, name: &str, ctx: &ParseContext) -> NcdbResult<usize> {
    first
        .checked_add(width)
        .and_then(|end| end.checked_sub(1))
        .ok_or_else(|| ctx.error(format!("field {name} position overflows")))
}

fn following_column(last: usize, name: &str, ctx: &ParseContext) -> NcdbResult<usize> {
    last.checked_add(1)
        .ok_or_else(|| ctx.error(format!("field {name} position overflows")))
}

/// Field whose name has been read but whose position has not.
struct PendingField {
    name: String,
    pointer: Option<usize>,
}

fn parse_input(body: &[Token], out: &mut Vec<RawField>, ctx: &ParseContext) -> NcdbResult<()> {
    let mut words = Vec::with_capacity(body.len());
    for token in body {
        match token {
            Token::Word(w) => words.push(w.as_str()),
            other => return Err(ctx.error(format!("unexpected token {other:?} in INPUT statement"))),
        }
    }

    let mut pending: Option<PendingField> = None;
    let mut pointer: Option<usize> = None;
    // Column right after the last field read, for informats without an `@` pointer.
    let mut next_column = 1usize;

    let mut i = 0;
    while i < words.len() {
        let word = words[i];
        i += 1;

        if let Some(rest) = word.strip_prefix('@') {
            ensure_positioned(&pending, ctx)?;
            let digits = if rest.is_empty() {
                i += 1;
                words.get(i - 1).copied().unwrap_or("")
            } else {
                rest
            };
            pointer = Some(parse_number(digits, "column pointer", ctx)?);
            continue;
        }

        if let Some(rest) = word.strip_prefix('+') {
            ensure_positioned(&pending, ctx)?;
            let skip = parse_number(rest, "relative column pointer", ctx)?;
            let base = pointer.unwrap_or(next_column);
            let moved = base
                .checked_add(skip)
                .ok_or_else(|| ctx.error(format!("relative column pointer +{skip} overflows")))?;
            pointer = Some(moved);
            continue;
        }

        if word == "$" {
            continue;
        }
        if let Some(informat) = word.strip_prefix('$') {
            if informat.contains('.') {
                let field = take_pending(&mut pending, word, ctx)?;
                let width = informat_width(informat, &field.name, ctx)?;
                let first = field.pointer.unwrap_or(next_column);
                let last = last_column(first, width, &field.name, ctx)?;
                next_column = following_column(last, &field.name, ctx)?;
                out.push(RawField { name: field.name, first, last });
                continue;
            }
            return Err(ctx.error(format!("unexpected token '{word}' in INPUT statement")));
        }

        let starts_numeric = word.starts_with(|c: char| c.is_ascii_digit());

        if word.contains('.') && (starts_numeric || word.starts_with(|c: char| c.is_ascii_alphabetic())) {
            let field = take_pending(&mut pending, word, ctx)?;
            let width = informat_width(word, &field.name, ctx)?;
            let first = field.pointer.unwrap_or(next_column);
            let last = last_column(first, width, &field.name, ctx)?;
            next_column = following_column(last, &field.name, ctx)?;
            out.push(RawField { name: field.name, first, last });
            continue;
        }

        if starts_numeric || word.starts_with('-') {
            let field = take_pending(&mut pending, word, ctx)?;
            let (first, last) = if let Some((a, b)) = word.split_once('-') {
                let b = if b.is_empty() {
                    i += 1;
                    words.get(i - 1).copied().unwrap_or("")
                } else {
                    b
                };
                (
                    parse_position(a, &field.name, ctx)?,
                    parse_position(b, &field.name, ctx)?,
                )
            } else if words.get(i).is_some_and(|w| w.starts_with('-')) {
                // `1 - 10` or `1 -10`
                let dash = words[i];
                i += 1;
                let b = if dash == "-" {
                    i += 1;
                    words.get(i - 1).copied().unwrap_or("")
                } else {
                    &dash[1..]
                };
                (
                    parse_position(word, &field.name, ctx)?,
                    parse_position(b, &field.name, ctx)?,
                )
            } else {
                let col = parse_position(word, &field.name, ctx)?;
                (col, col)
            };
            next_column = following_column(last, &field.name, ctx)?;
            out.push(RawField { name: field.name, first, last });
            continue;
        }

        let name = word.strip_suffix('$').unwrap_or(word);
        if !is_identifier(name) {
            return Err(ctx.error(format!("invalid field name '{word}' in INPUT statement")));
        }
        ensure_positioned(&pending, ctx)?;
        pending = Some(PendingField {
            name: name.to_string(),
            pointer: pointer.take(),
        });
    }

    ensure_positioned(&pending, ctx)
}

fn ensure_positioned(pending: &Option<PendingField>, ctx: &ParseContext) -> NcdbResult<()> {
    match pending {
        Some(field) => Err(ctx.error(format!("field {} has no column position", field.name))),
        None => Ok(()),
    }
}

fn take_pending(
    pending: &mut Option<PendingField>,
    token: &str,
    ctx: &ParseContext,
) -> NcdbResult<PendingField> {
    pending
        .take()
        .ok_or_else(|| ctx.error(format!("position '{token}' is not preceded by a field name")))
}

fn parse_number(raw: &str, what: &str, ctx: &ParseContext) -> NcdbResult<usize> {
    raw.parse::<usize>()
        .map_err(|_| ctx.error(format!("non-numeric {what} '{raw}'")))
}

fn parse_position(raw: &str, field: &str, ctx: &ParseContext) -> NcdbResult<usize> {
    if raw.is_empty() {
        return Err(ctx.error(format!("field {field} has a missing position")));
    }
    raw.parse::<usize>()
        .map_err(|_| ctx.error(format!("field {field} has non-numeric position '{raw}'")))
}

/// Width of an informat: the integer before the `.`, after any informat name
/// (`10.` → 10, `CHAR10.` → 10, `8.2` → 8).
fn informat_width(informat: &str, field: &str, ctx: &ParseContext) -> NcdbResult<usize> {
    let head = informat.split('.').next().unwrap_or("");
    let digits: String = head
        .trim_start_matches(|c: char| c.is_ascii_alphabetic() || c == '_')
        .to_string();
    match digits.parse::<usize>() {
        Ok(w) if w > 0 => Ok(w),
        _ => Err(ctx.error(format!(
            "field {field} has informat '{informat}' without a numeric width"
        ))),
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_labels(
    body: &[Token],
    out: &mut BTreeMap<String, String>,
    ctx: &ParseContext,
) -> NcdbResult<()> {
    let mut i = 0;
    while i < body.len() {
        match (&body[i], body.get(i + 1), body.get(i + 2)) {
            (Token::Word(name), Some(Token::Eq), Some(Token::Quoted(text))) => {
                out.insert(name.to_ascii_uppercase(), text.trim().to_string());
                i += 3;
            }
            (token, _, _) => {
                return Err(ctx.error(format!("malformed LABEL assignment near {token:?}")));
            }
        }
    }
    Ok(())
}

/// Normalize a format reference: drop `$`, the trailing `.`, and case.
fn format_key(raw: &str) -> String {
    raw.trim_start_matches('$')
        .trim_end_matches('.')
        .to_ascii_uppercase()
}

/// `VALUE [$]name 'a' = 'A' 'b','c' = 'BC' 1-5 = 'range' OTHER = 'x'`.
///
/// Range and `OTHER` entries cannot be looked up by exact code and are dropped.
fn parse_value(body: &[Token], ctx: &ParseContext) -> NcdbResult<(String, ValueLabels)> {
    let Some(Token::Word(name)) = body.first() else {
        return Err(ctx.error("VALUE statement without a format name"));
    };
    let name = format_key(name);
    let mut table = ValueLabels::new();

    let mut codes: Vec<String> = Vec::new();
    let mut is_range = false;
    let mut i = 1;
    while i < body.len() {
        match &body[i] {
            Token::Quoted(code) => codes.push(code.trim().to_string()),
            Token::Word(w) => {
                if is_range_word(w) {
                    is_range = true;
                } else {
                    codes.push(w.clone());
                }
            }
            Token::Comma => {}
            Token::Eq => {
                let label = match body.get(i + 1) {
                    Some(Token::Quoted(l)) | Some(Token::Word(l)) => l.trim().to_string(),
                    _ => {
                        return Err(ctx.error(format!("VALUE {name}: '=' without a label")));
                    }
                };
                if !is_range {
                    for code in codes.drain(..) {
                        table.insert(code, label.clone());
                    }
                }
                codes.clear();
                is_range = false;
                i += 2;
                continue;
            }
        }
        i += 1;
    }

    Ok((name, table))
}

fn is_range_word(w: &str) -> bool {
    let upper = w.to_ascii_uppercase();
    matches!(upper.as_str(), "OTHER" | "LOW" | "HIGH" | "-")
        || w.contains('<')
        || w.get(1..).is_some_and(|rest| rest.contains('-'))
}

/// `FORMAT a b $fmt. c fmt2.`: every variable before a format reference gets that format.
fn parse_format_associations(body: &[Token], out: &mut BTreeMap<String, String>) {
    let mut vars: Vec<&str> = Vec::new();
    for token in body {
        let Token::Word(w) = token else { continue };
        if w.contains('.') {
            let key = format_key(w);
            for v in vars.drain(..) {
                out.insert(v.to_string(), key.clone());
            }
        } else {
            vars.push(w);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> SasDocument {
        parse_sas(text, None).unwrap()
    }

    fn field(name: &str, first: usize, last: usize) -> RawField {
        RawField {
            name: name.to_string(),
            first,
            last,
        }
    }

    #[test]
    fn column_input_with_and_without_dollar() {
        let doc = parse("data ncdb; infile 'x.dat' lrecl=1032;\ninput PUF_CASE_ID $ 1-10 AGE 11-13 SEX 14;\nrun;");
        assert_eq!(
            doc.fields,
            vec![field("PUF_CASE_ID", 1, 10), field("AGE", 11, 13), field("SEX", 14, 14)]
        );
    }

    #[test]
    fn formatted_input_uses_pointer_and_informat_width() {
        let doc = parse("INPUT @1 ID $CHAR10. @11 AGE 3. @14 SCORE 8.2 NEXT $2.;");
        assert_eq!(
            doc.fields,
            vec![
                field("ID", 1, 10),
                field("AGE", 11, 13),
                field("SCORE", 14, 21),
                field("NEXT", 22, 23),
            ]
        );
    }

    #[test]
    fn spaced_ranges_are_joined() {
        let doc = parse("INPUT A $ 1 - 4 B 5 -6;");
        assert_eq!(doc.fields, vec![field("A", 1, 4), field("B", 5, 6)]);
    }

    #[test]
    fn comments_are_ignored() {
        let doc = parse("/* INPUT X 1-2; */\n* INPUT Y 1-2;\nINPUT /* inline */ Z 1-2;");
        assert_eq!(doc.fields, vec![field("Z", 1, 2)]);
    }

    #[test]
    fn comment_statements_may_contain_apostrophes() {
        let doc = parse("* Patient's age at diagnosis;\nINPUT AGE $ 1-3 /* don't */ SEX 4;");
        assert_eq!(doc.fields, vec![field("AGE", 1, 3), field("SEX", 4, 4)]);
    }

    #[test]
    fn position_overflow_is_a_format_error() {
        let huge = usize::MAX;
        for text in [
            format!("INPUT @{huge} A $CHAR10.;"),
            format!("INPUT @10 +{huge} A 2.;"),
            format!("INPUT A {huge};"),
        ] {
            let err = parse_sas(&text, None).unwrap_err();
            assert!(matches!(err, NcdbError::Format { .. }), "{text}: {err}");
            assert!(err.to_string().contains("overflows"), "{text}: {err}");
        }
    }

    #[test]
    fn field_without_position_is_rejected() {
        let err = parse_sas("INPUT A $ B 1-2;", None).unwrap_err();
        assert!(err.to_string().contains("field A has no column position"), "{err}");

        let err = parse_sas("INPUT A 1-x;", None).unwrap_err();
        assert!(err.to_string().contains("non-numeric position 'x'"), "{err}");
    }

    #[test]
    fn labels_formats_and_associations() {
        let doc = parse(
            "LABEL SEX = 'Sex of patient' RACE=\"Race, coded\";\n\
             PROC FORMAT;\n\
               VALUE $SEXF '1'='Male' '2'='Female' '9'='Unknown';\n\
               value racef 1='White' 2,3='Other race' 4-8='range' other='Missing';\n\
             RUN;\n\
             FORMAT SEX $SEXF. RACE RACEF.;",
        );
        assert_eq!(doc.variable_labels["SEX"], "Sex of patient");
        assert_eq!(doc.variable_labels["RACE"], "Race, coded");

        let sexf = &doc.formats["SEXF"];
        assert_eq!(sexf.label_for("2"), Some("Female"));
        assert_eq!(sexf.len(), 3);

        let racef = &doc.formats["RACEF"];
        assert_eq!(racef.label_for("3"), Some("Other race"));
        assert_eq!(racef.label_for("5"), None);
        assert_eq!(racef.len(), 3);

        assert_eq!(doc.associations["SEX"], "SEXF");
        assert_eq!(doc.associations["RACE"], "RACEF");
    }

    #[test]
    fn quotes_protect_semicolons_and_doubled_quotes() {
        let doc = parse("LABEL A='it''s; fine'; INPUT A 1-2;");
        assert_eq!(doc.variable_labels["A"], "it's; fine");
        assert_eq!(doc.fields.len(), 1);
    }
}
