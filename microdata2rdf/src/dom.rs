use scraper::{ElementRef, Html, Node};

use crate::{Attributes, HtmlParseListener, ListenerError};

/// Delivers the elements and text of a parsed document, in document order.
pub(crate) fn walk(html: &Html, listener: &mut impl HtmlParseListener) -> Result<(), ListenerError> {
    enum Step<'a> {
        Open(ElementRef<'a>),
        Text(&'a str),
        Close,
    }

    let mut stack = vec![Step::Open(html.root_element())];

    while let Some(step) = stack.pop() {
        match step {
            Step::Open(element) => {
                let attributes: Attributes = element
                    .value()
                    .attrs()
                    .map(|(name, value)| (name.to_string(), value.to_string()))
                    .collect();

                listener.on_tag_open(element.value().name(), &attributes)?;

                stack.push(Step::Close);
                for child in element.children().rev() {
                    if let Some(child) = ElementRef::wrap(child) {
                        stack.push(Step::Open(child));
                    } else if let Node::Text(text) = child.value() {
                        stack.push(Step::Text(text));
                    }
                }
            }
            Step::Text(text) => listener.on_text(text)?,
            Step::Close => listener.on_tag_close()?,
        }
    }

    listener.on_end()
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Default)]
    struct Recorder(Vec<String>);

    impl HtmlParseListener for Recorder {
        fn on_tag_open(&mut self, name: &str, _: &Attributes) -> Result<(), ListenerError> {
            self.0.push(format!("<{name}>"));
            Ok(())
        }

        fn on_text(&mut self, data: &str) -> Result<(), ListenerError> {
            self.0.push(data.to_string());
            Ok(())
        }

        fn on_tag_close(&mut self) -> Result<(), ListenerError> {
            self.0.push("</>".to_string());
            Ok(())
        }

        fn on_end(&mut self) -> Result<(), ListenerError> {
            self.0.push("$".to_string());
            Ok(())
        }
    }

    #[test]
    fn walks_tree_in_document_order() {
        let html = Html::parse_document("<p>one<b>two</b></p>");
        let mut recorder = Recorder::default();
        walk(&html, &mut recorder).unwrap();

        assert_eq!(
            recorder.0.join(""),
            "<html><head></><body><p>one<b>two</></></></></>$"
        );
    }
}
