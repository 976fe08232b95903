//! JSON-subset fixture parser.
//!
//! Numbers, strings, `true`/`false`/`null`, arrays and objects, plus the
//! `<//>` gap sigil anywhere a value may appear. Whitespace and punctuation
//! are kept as literals on the enclosing node so printing a tree gives back
//! the exact source.

use cstml_editor_core::{OpenTag, ParseError, Parser, Tag};

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

impl Parser for JsonParser {
    fn parse(&self, source: &str) -> Result<Vec<Tag>, ParseError> {
        parse(source)
    }
}

pub fn parse(source: &str) -> Result<Vec<Tag>, ParseError> {
    let mut cursor = Cursor {
        src: source,
        pos: 0,
        tags: Vec::new(),
    };
    cursor.tags.push(Tag::open_fragment());
    let leading = cursor.whitespace();
    cursor.literal(leading);
    cursor.tags.push(Tag::reference("value"));
    cursor.value()?;
    let trailing = cursor.whitespace();
    cursor.literal(trailing);
    if cursor.pos < source.len() {
        return Err(cursor.error("trailing content after the value"));
    }
    cursor.tags.push(Tag::Close);
    Ok(cursor.tags)
}

struct Cursor<'s> {
    src: &'s str,
    pos: usize,
    tags: Vec<Tag>,
}

impl<'s> Cursor<'s> {
    fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn error(&self, message: &str) -> ParseError {
        let len = self.peek().map_or(0, char::len_utf8);
        ParseError::new(message, self.src, self.pos, len)
    }

    fn whitespace(&mut self) -> &'s str {
        let rest = self.rest();
        let len = rest.len() - rest.trim_start().len();
        self.pos += len;
        &rest[..len]
    }

    fn literal(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            self.tags.push(Tag::literal(text));
        }
    }

    fn expect(&mut self, c: char) -> Result<(), ParseError> {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            Ok(())
        } else {
            Err(self.error(&format!("expected `{c}`")))
        }
    }

    fn token(&mut self, node_type: &str, len: usize) {
        let text = &self.src[self.pos..self.pos + len];
        self.pos += len;
        self.tags.push(Tag::Open(OpenTag::token(node_type)));
        self.tags.push(Tag::literal(text));
        self.tags.push(Tag::Close);
    }

    fn value(&mut self) -> Result<(), ParseError> {
        let rest = self.rest();
        match self.peek() {
            Some('<') if rest.starts_with("<//>") => {
                self.pos += 4;
                self.tags.push(Tag::Gap);
                Ok(())
            }
            Some('[') => self.array(),
            Some('{') => self.object(),
            Some('"') => self.string(),
            Some(c) if c == '-' || c.is_ascii_digit() => {
                let len = rest
                    .char_indices()
                    .skip(1)
                    .find(|(_, c)| !(c.is_ascii_digit() || *c == '.'))
                    .map_or(rest.len(), |(i, _)| i);
                self.token("Number", len);
                Ok(())
            }
            Some(_) => {
                for keyword in ["true", "false", "null"] {
                    if rest.starts_with(keyword) {
                        self.token("Keyword", keyword.len());
                        return Ok(());
                    }
                }
                Err(self.error("expected a value"))
            }
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn string(&mut self) -> Result<(), ParseError> {
        let rest = self.rest();
        let mut escaped = false;
        for (i, c) in rest.char_indices().skip(1) {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => {
                    self.token("String", i + 1);
                    return Ok(());
                }
                _ => {}
            }
        }
        Err(self.error("unterminated string"))
    }

    fn array(&mut self) -> Result<(), ParseError> {
        self.tags.push(Tag::open("Array"));
        self.expect('[')?;
        let ws = self.whitespace();
        self.literal(format!("[{ws}"));

        if self.peek() == Some(']') {
            self.pos += 1;
            self.tags.push(Tag::array_reference("elements"));
            self.tags.push(Tag::ArrayInitializer);
            self.literal("]");
            self.tags.push(Tag::Close);
            return Ok(());
        }

        loop {
            self.tags.push(Tag::array_reference("elements"));
            self.value()?;
            let before = self.whitespace();
            match self.peek() {
                Some(',') => {
                    self.pos += 1;
                    let after = self.whitespace();
                    self.literal(format!("{before},{after}"));
                }
                Some(']') => {
                    self.pos += 1;
                    self.literal(format!("{before}]"));
                    break;
                }
                _ => return Err(self.error("expected `,` or `]`")),
            }
        }
        self.tags.push(Tag::Close);
        Ok(())
    }

    fn object(&mut self) -> Result<(), ParseError> {
        self.tags.push(Tag::open("Object"));
        self.expect('{')?;
        let ws = self.whitespace();
        self.literal(format!("{{{ws}"));

        if self.peek() == Some('}') {
            self.pos += 1;
            self.tags.push(Tag::array_reference("properties"));
            self.tags.push(Tag::ArrayInitializer);
            self.literal("}");
            self.tags.push(Tag::Close);
            return Ok(());
        }

        loop {
            self.tags.push(Tag::array_reference("properties"));
            self.tags.push(Tag::open("Property"));
            self.tags.push(Tag::reference("key"));
            if self.peek() != Some('"') {
                return Err(self.error("expected a string key"));
            }
            self.string()?;
            let before = self.whitespace();
            self.expect(':')?;
            let after = self.whitespace();
            self.literal(format!("{before}:{after}"));
            self.tags.push(Tag::reference("value"));
            self.value()?;
            self.tags.push(Tag::Close);

            let before = self.whitespace();
            match self.peek() {
                Some(',') => {
                    self.pos += 1;
                    let after = self.whitespace();
                    self.literal(format!("{before},{after}"));
                }
                Some('}') => {
                    self.pos += 1;
                    self.literal(format!("{before}}}"));
                    break;
                }
                _ => return Err(self.error("expected `,` or `}`")),
            }
        }
        self.tags.push(Tag::Close);
        Ok(())
    }
}
