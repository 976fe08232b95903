//! HtmlWriter - serializes a visual fragment to HTML markup.

use std::fmt::{self, Write as FmtWrite};
use std::slice;

use markdown_weaver_escape::escape_html;

use crate::visual::{Fragment, Visual, VisualElement};

/// String output buffer for HTML generation.
#[derive(Debug, Clone, Default)]
pub struct HtmlWriter {
    out: String,
}

impl HtmlWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_string(self) -> String {
        self.out
    }

    fn write(&mut self, s: &str) -> fmt::Result {
        self.out.push_str(s);
        Ok(())
    }

    fn open_element(&mut self, element: &VisualElement) -> fmt::Result {
        self.write("<span id=\"")?;
        escape_html(&mut *self, &element.id)?;
        self.write("\" class=\"")?;
        for (i, class) in element.classes.names().enumerate() {
            if i > 0 {
                self.write(" ")?;
            }
            self.write(class)?;
        }
        self.write("\"")?;

        if let Some(node_type) = &element.node_type {
            self.write(" data-type=\"")?;
            escape_html(&mut *self, node_type)?;
            self.write("\"")?;
        }
        self.write(" data-path=\"")?;
        escape_html(&mut *self, &element.path)?;
        self.write("\"")?;

        if element.contenteditable {
            self.write(" contenteditable=\"true\"")?;
        }
        if element.draggable {
            self.write(" draggable=\"true\"")?;
        }
        self.write(">")
    }

    /// Write every visual of the fragment in document order.
    pub fn write_fragment(&mut self, fragment: &Fragment) -> fmt::Result {
        let mut stack: Vec<slice::Iter<'_, Visual>> = vec![fragment.children.iter()];
        while let Some(iter) = stack.last_mut() {
            match iter.next() {
                Some(Visual::Text(text)) => escape_html(&mut *self, text)?,
                Some(Visual::LineBreak) => self.write("<br>")?,
                Some(Visual::Element(element)) => {
                    self.open_element(element)?;
                    stack.push(element.children.iter());
                }
                None => {
                    stack.pop();
                    // The outermost level has no element to close.
                    if !stack.is_empty() {
                        self.write("</span>")?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl FmtWrite for HtmlWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.out.push_str(s);
        Ok(())
    }
}

impl markdown_weaver_escape::StrWrite for HtmlWriter {
    type Error = fmt::Error;

    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.out.push_str(s);
        Ok(())
    }

    fn write_fmt(&mut self, args: fmt::Arguments<'_>) -> fmt::Result {
        FmtWrite::write_fmt(&mut self.out, args)
    }
}

impl Fragment {
    pub fn to_html(&self) -> String {
        let mut writer = HtmlWriter::new();
        // Writing into a String cannot fail.
        let _ = writer.write_fragment(self);
        writer.into_string()
    }
}
