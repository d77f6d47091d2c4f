//! Streaming HTML events from the `html5ever` tokenizer.
//!
//! There is no tree construction here: a small set of rules turns the token
//! stream into balanced open/close events. The relaxed rules cover the usual
//! shortcuts of hand-written HTML (void elements, omitted end tags, raw text
//! elements); strict markup only closes what is explicitly closed.

use std::cell::RefCell;

use html5ever::tendril::StrTendril;
use html5ever::tokenizer::states::RawKind;
use html5ever::tokenizer::{
    BufferQueue, Tag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts,
};

use crate::{Attributes, HtmlParseListener, ListenerError};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Opening any of `opened` closes the nearest open element in `closes`, along
/// with everything above it, unless an element in `stop` is nearer.
struct ImpliedClose {
    opened: &'static [&'static str],
    closes: &'static [&'static str],
    stop: &'static [&'static str],
}

static IMPLIED_CLOSES: &[ImpliedClose] = &[
    ImpliedClose {
        opened: &[
            "address", "article", "aside", "blockquote", "details", "div", "dl", "fieldset",
            "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header",
            "hgroup", "hr", "main", "menu", "nav", "ol", "p", "pre", "section", "table", "ul",
        ],
        closes: &["p"],
        stop: &["button", "caption", "object", "table", "td", "template", "th"],
    },
    ImpliedClose {
        opened: &["li"],
        closes: &["li"],
        stop: &["menu", "ol", "ul"],
    },
    ImpliedClose {
        opened: &["dt", "dd"],
        closes: &["dt", "dd"],
        stop: &["dl"],
    },
    ImpliedClose {
        opened: &["tr"],
        closes: &["tr"],
        stop: &["table", "tbody", "tfoot", "thead"],
    },
    ImpliedClose {
        opened: &["td", "th"],
        closes: &["td", "th"],
        stop: &["table", "tr"],
    },
    ImpliedClose {
        opened: &["option"],
        closes: &["option"],
        stop: &["datalist", "optgroup", "select"],
    },
];

fn raw_kind(name: &str) -> Option<RawKind> {
    match name {
        "script" => Some(RawKind::ScriptData),
        "style" => Some(RawKind::Rawtext),
        "textarea" | "title" => Some(RawKind::Rcdata),
        _ => None,
    }
}

struct State<L> {
    listener: L,
    open: Vec<String>,
    strict: bool,
    /// The first listener failure, until it is taken.
    failure: Option<ListenerError>,
    /// Nothing is delivered after a failure.
    failed: bool,
}

/// The token sink: applies the markup rules and forwards events.
pub(crate) struct TreeRules<L> {
    state: RefCell<State<L>>,
}

impl<L: HtmlParseListener> TokenSink for TreeRules<L> {
    type Handle = ();

    fn process_token(&self, token: Token, _line_number: u64) -> TokenSinkResult<()> {
        let mut state = self.state.borrow_mut();
        match token {
            Token::TagToken(tag) => match tag.kind {
                TagKind::StartTag => return state.start_tag(tag),
                TagKind::EndTag => state.end_tag(&tag.name),
            },
            Token::CharacterTokens(text) => state.emit(|l| l.on_text(&text)),
            Token::EOFToken => state.finish(),
            Token::ParseError(e) => tracing::trace!("HTML parse error: {e}"),
            _ => {}
        }

        TokenSinkResult::Continue
    }
}

impl<L: HtmlParseListener> State<L> {
    fn emit(&mut self, event: impl FnOnce(&mut L) -> Result<(), ListenerError>) {
        if self.failed {
            return;
        }

        if let Err(e) = event(&mut self.listener) {
            self.failed = true;
            self.failure = Some(e);
        }
    }

    fn open(&mut self, name: &str, attributes: &Attributes) {
        self.open.push(name.to_string());
        self.emit(|l| l.on_tag_open(name, attributes));
    }

    fn close(&mut self) {
        if self.open.pop().is_some() {
            self.emit(|l| l.on_tag_close());
        }
    }

    fn close_to(&mut self, position: usize) {
        while self.open.len() > position {
            self.close();
        }
    }

    fn start_tag(&mut self, tag: Tag) -> TokenSinkResult<()> {
        let name: &str = &tag.name;
        let attributes: Attributes = tag
            .attrs
            .iter()
            .map(|attr| (attr.name.local.to_string(), attr.value.to_string()))
            .collect();

        if self.strict {
            self.open(name, &attributes);
            if tag.self_closing {
                self.close();
            }
            return TokenSinkResult::Continue;
        }

        self.implied_closes(name);
        self.open(name, &attributes);

        if tag.self_closing || VOID_ELEMENTS.contains(&name) {
            self.close();
            return TokenSinkResult::Continue;
        }

        match raw_kind(name) {
            Some(kind) => TokenSinkResult::RawData(kind),
            None => TokenSinkResult::Continue,
        }
    }

    /// Closes the nearest open element of the same name and everything
    /// opened after it.
    fn end_tag(&mut self, name: &str) {
        match self.open.iter().rposition(|open| open == name) {
            Some(position) => self.close_to(position),
            None => tracing::trace!("ignoring stray </{name}>"),
        }
    }

    fn implied_closes(&mut self, name: &str) {
        for rule in IMPLIED_CLOSES.iter().filter(|rule| rule.opened.contains(&name)) {
            let nearest = self.open.iter().rposition(|open| {
                rule.closes.contains(&open.as_str()) || rule.stop.contains(&open.as_str())
            });

            if let Some(position) =
                nearest.filter(|&position| rule.closes.contains(&self.open[position].as_str()))
            {
                tracing::trace!("<{name}> implies </{}>", self.open[position]);
                self.close_to(position);
            }
        }
    }

    fn finish(&mut self) {
        self.close_to(0);
        self.emit(|l| l.on_end());
    }
}

/// An incremental tokenizer delivering events to `L`.
pub(crate) struct HtmlTokenizer<L: HtmlParseListener> {
    tokenizer: Tokenizer<TreeRules<L>>,
    input: BufferQueue,
}

impl<L: HtmlParseListener> HtmlTokenizer<L> {
    pub fn new(listener: L, strict: bool) -> Self {
        let rules = TreeRules {
            state: RefCell::new(State {
                listener,
                open: Vec::new(),
                strict,
                failure: None,
                failed: false,
            }),
        };

        Self {
            tokenizer: Tokenizer::new(rules, TokenizerOpts::default()),
            input: BufferQueue::default(),
        }
    }

    /// Tokenizes as much of `chunk` as possible. An incomplete tag at the end
    /// is held back until more input arrives.
    pub fn feed(&self, chunk: &str) {
        self.input.push_back(StrTendril::from_slice(chunk));
        let _ = self.tokenizer.feed(&self.input);
    }

    /// Flushes held back input and closes every open element.
    pub fn end(&self) {
        let _ = self.tokenizer.feed(&self.input);
        self.tokenizer.end();
    }

    pub fn take_failure(&self) -> Option<ListenerError> {
        self.tokenizer.sink.state.borrow_mut().failure.take()
    }

    pub fn with_listener<T>(&self, f: impl FnOnce(&mut L) -> T) -> T {
        f(&mut self.tokenizer.sink.state.borrow_mut().listener)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Writes events as compact markup: `<name a=v>`, text, `</>` and a final `$`.
    #[derive(Default)]
    struct Recorder(String);

    impl HtmlParseListener for Recorder {
        fn on_tag_open(&mut self, name: &str, attributes: &Attributes) -> Result<(), ListenerError> {
            self.0.push('<');
            self.0.push_str(name);
            for (k, v) in attributes {
                self.0.push_str(&format!(" {k}={v}"));
            }
            self.0.push('>');
            Ok(())
        }

        fn on_text(&mut self, data: &str) -> Result<(), ListenerError> {
            self.0.push_str(data);
            Ok(())
        }

        fn on_tag_close(&mut self) -> Result<(), ListenerError> {
            self.0.push_str("</>");
            Ok(())
        }

        fn on_end(&mut self) -> Result<(), ListenerError> {
            self.0.push('$');
            Ok(())
        }
    }

    fn events(chunks: &[&str], strict: bool) -> String {
        let tokenizer = HtmlTokenizer::new(Recorder::default(), strict);
        for chunk in chunks {
            tokenizer.feed(chunk);
        }
        tokenizer.end();
        assert!(tokenizer.take_failure().is_none());
        tokenizer.with_listener(|r| std::mem::take(&mut r.0))
    }

    fn relaxed(html: &str) -> String {
        events(&[html], false)
    }

    #[test]
    fn void_elements_close_immediately() {
        assert_eq!(relaxed("<p>a<br>b<img src=x></p>"), "<p>a<br></>b<img src=x></></>$");
    }

    #[test]
    fn self_closing_syntax_is_honoured() {
        assert_eq!(relaxed("<div><span/>x</div>"), "<div><span></>x</>$");
    }

    #[test]
    fn sibling_paragraphs_close_each_other() {
        assert_eq!(relaxed("<p>one<p>two"), "<p>one</><p>two</>$");
        assert_eq!(relaxed("<p>one<div>two</div>"), "<p>one</><div>two</>$");
    }

    #[test]
    fn list_items_close_each_other() {
        assert_eq!(
            relaxed("<ul><li>a<li>b<ul><li>c</ul></ul>"),
            "<ul><li>a</><li>b<ul><li>c</></></></>$"
        );
        assert_eq!(
            relaxed("<dl><dt>t<dd>d<dt>u</dl>"),
            "<dl><dt>t</><dd>d</><dt>u</></>$"
        );
    }

    #[test]
    fn table_cells_close_each_other() {
        assert_eq!(
            relaxed("<table><tr><td>a<td>b<tr><th>c</table>"),
            "<table><tr><td>a</><td>b</></><tr><th>c</></></>$"
        );
    }

    #[test]
    fn paragraph_inside_cell_is_kept_by_table_boundary() {
        assert_eq!(
            relaxed("<p><table><td>x<div>y</div></table>"),
            "<p></><table><td>x<div>y</></></>$"
        );
    }

    #[test]
    fn end_tag_closes_intermediate_elements() {
        assert_eq!(relaxed("<div><span><b>x</div>y"), "<div><span><b>x</></></>y$");
    }

    #[test]
    fn stray_end_tags_are_ignored() {
        assert_eq!(relaxed("<div>a</span>b</div></p>"), "<div>ab</>$");
    }

    #[test]
    fn raw_text_elements() {
        assert_eq!(
            relaxed("<script>if (a<b) { x = '</p>'; }</script>"),
            "<script>if (a<b) { x = '</p>'; }</>$"
        );
        assert_eq!(relaxed("<title>a &amp; <b></title>"), "<title>a & <b></>$");
    }

    #[test]
    fn entities_are_decoded() {
        assert_eq!(
            relaxed(r#"<p title="a&amp;b">x &lt; y</p>"#),
            "<p title=a&b>x < y</>$"
        );
    }

    #[test]
    fn input_split_inside_a_tag() {
        assert_eq!(events(&["<di", "v class=", "x>te", "xt</d", "iv>"], false), "<div class=x>text</>$");
    }

    #[test]
    fn strict_markup_needs_explicit_closes() {
        assert_eq!(
            events(&["<p>one<p>two</p></p>"], true),
            "<p>one<p>two</></>$"
        );
        assert_eq!(events(&["<div><br>x</div>"], true), "<div><br>x</></>$");
        assert_eq!(events(&["<div><br/>x</div>"], true), "<div><br></>x</>$");
    }

    #[test]
    fn listener_failure_stops_delivery() {
        struct FailOnText(usize);

        impl HtmlParseListener for FailOnText {
            fn on_tag_open(&mut self, _: &str, _: &Attributes) -> Result<(), ListenerError> {
                self.0 += 1;
                Ok(())
            }

            fn on_text(&mut self, _: &str) -> Result<(), ListenerError> {
                Err("no text allowed".into())
            }

            fn on_tag_close(&mut self) -> Result<(), ListenerError> {
                self.0 += 1;
                Ok(())
            }

            fn on_end(&mut self) -> Result<(), ListenerError> {
                self.0 += 1;
                Ok(())
            }
        }

        let tokenizer = HtmlTokenizer::new(FailOnText(0), false);
        tokenizer.feed("<p>x</p><p></p>");
        tokenizer.end();

        let failure = tokenizer.take_failure().unwrap();
        assert_eq!(failure.to_string(), "no text allowed");
        assert_eq!(tokenizer.with_listener(|l| l.0), 1);
    }
}
