//! Scraping of the few HTML pages involved in authentication. None of them
//! is a documented API, so everything that reads markup lives here.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

const FORM_TOKEN_INPUT: &str = r#"input[name="authenticity_token"]"#;

lazy_static::lazy_static! {
    static ref SERIAL_REGEX: Regex = Regex::new(r"Envoy\s*Serial\s*Number:\s*([0-9]+)").unwrap();
}

fn form_token_input(document: &Html) -> Option<ElementRef<'_>> {
    let selector = Selector::parse(FORM_TOKEN_INPUT).ok()?;
    document.select(&selector).next()
}

/// Single-use anti-forgery token of the cloud login form.
pub fn extract_form_token(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    form_token_input(&document)
        .and_then(|input| input.value().attr("value"))
        .map(String::from)
}

/// `action` of the form enclosing the anti-forgery token.
pub fn extract_form_action(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    form_token_input(&document)?
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|element| element.value().name() == "form")
        .and_then(|form| form.value().attr("action"))
        .map(String::from)
}

/// Status heading of the gateway's token check page.
pub fn extract_validity_heading(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("h2").ok()?;
    document
        .select(&selector)
        .next()
        .map(|heading| heading.text().collect::<String>().trim().to_string())
}

/// Serial number from the gateway info document: the `<sn>` element when
/// present, the legacy "Envoy Serial Number" text otherwise.
pub fn extract_serial(text: &str) -> Option<String> {
    if let Some((_, rest)) = text.split_once("<sn>") {
        if let Some((serial, _)) = rest.split_once("</sn>") {
            return Some(serial.trim().to_string());
        }
    }

    SERIAL_REGEX
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|serial| serial.as_str().to_string())
}
