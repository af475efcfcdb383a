//! Full-page HTML layout around a rendered part body.

use sedrila_common::Mode;

/// Everything a template needs to lay out one page.
#[derive(Debug, Clone, Copy)]
pub struct Page<'a> {
    /// Title of the whole course.
    pub sitetitle: &'a str,
    /// Links from the course down to this part, already HTML.
    pub breadcrumb: &'a str,
    /// Title of this part, plain text.
    pub title: &'a str,
    /// Table of contents, already HTML.
    pub toc: &'a str,
    /// The rendered body, already HTML.
    pub body: &'a str,
    /// The variant being written.
    pub mode: Mode,
}

/// Turns a [`Page`] into a complete HTML document.
pub trait PageTemplate {
    /// Produces the document text.
    fn render_page(&self, page: &Page<'_>) -> String;
}

/// A plain HTML5 layout: breadcrumb on top, table of contents on the left.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTemplate;

impl PageTemplate for DefaultTemplate {
    fn render_page(&self, page: &Page<'_>) -> String {
        let title = escape_html(page.title);
        let sitetitle = escape_html(page.sitetitle);
        format!(
            "<!DOCTYPE html>\n\
             <html lang='en'>\n\
             <head>\n\
             <meta charset='utf-8'>\n\
             <title>{title} | {sitetitle}</title>\n\
             <link rel='stylesheet' href='sedrila.css'>\n\
             </head>\n\
             <body class='{mode}'>\n\
             <nav class='breadcrumb'>{breadcrumb}</nav>\n\
             <aside class='toc'>\n{toc}</aside>\n\
             <main>\n<h1>{title}</h1>\n{body}</main>\n\
             </body>\n\
             </html>\n",
            mode = page.mode,
            breadcrumb = page.breadcrumb,
            toc = page.toc,
            body = page.body,
        )
    }
}

/// Escapes text for use in HTML element content and quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes() {
        assert_eq!(escape_html("a<b> & 'c'"), "a&lt;b&gt; &amp; &#39;c&#39;");
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn default_template_layout() {
        let html = DefaultTemplate.render_page(&Page {
            sitetitle: "Course",
            breadcrumb: "<a href='index.html'>Course</a>",
            title: "Tasks & more",
            toc: "<div class='toc0'>x</div>\n",
            body: "<p>Body</p>\n",
            mode: Mode::Instructor,
        });
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Tasks &amp; more | Course</title>"));
        assert!(html.contains("<body class='instructor'>"));
        assert!(html.contains("<p>Body</p>"));
        assert!(html.contains("<a href='index.html'>Course</a>"));
    }
}
