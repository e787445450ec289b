// src/due_diligence/extract.rs
//! Staff card extraction from a directory page.
//!
//! Pure structural extraction: the document is parsed leniently (html5ever),
//! nothing is executed and no link is followed. A card without a usable
//! name is skipped; every other gap defaults to an empty string.

use anyhow::{anyhow, Result};
use once_cell::sync::OnceCell;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;

use crate::model::StaffRecord;

pub const DEFAULT_CARD_SELECTOR: &str = ".staff-card";
pub const DEFAULT_NAME_SELECTOR: &str = "h1, h2, h3, h4, h5, h6";
pub const DEFAULT_TITLE_SELECTOR: &str = "p";
pub const DEFAULT_EMAIL_LINK_SELECTOR: &str = "a[href]";

const MAILTO: &str = "mailto:";
const NON_VISIBLE: &[&str] = &["script", "style", "noscript"];

/// Compiled selectors describing the card layout.
#[derive(Debug, Clone)]
pub struct CardSelectors {
    card: Selector,
    name: Selector,
    title: Selector,
    email_link: Selector,
}

impl CardSelectors {
    pub fn parse(card: &str, name: &str, title: &str, email_link: &str) -> Result<Self> {
        Ok(Self {
            card: compile(card)?,
            name: compile(name)?,
            title: compile(title)?,
            email_link: compile(email_link)?,
        })
    }
}

impl Default for CardSelectors {
    fn default() -> Self {
        Self::parse(
            DEFAULT_CARD_SELECTOR,
            DEFAULT_NAME_SELECTOR,
            DEFAULT_TITLE_SELECTOR,
            DEFAULT_EMAIL_LINK_SELECTOR,
        )
        .expect("default card selectors")
    }
}

fn compile(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector '{css}': {e}"))
}

/// Collapse whitespace runs to one space and trim.
pub fn normalize_ws(s: &str) -> String {
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    re.replace_all(s, " ").trim().to_string()
}

/// Extract staff cards from `html`, deduplicated by identity key (first wins)
/// and sorted by (title, full_name) case-insensitively.
pub fn extract_staff(html: &str, source_url: &str, sel: &CardSelectors) -> Vec<StaffRecord> {
    let doc = Html::parse_document(html);

    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    for card in doc.select(&sel.card) {
        let Some(rec) = read_card(card, source_url, sel) else {
            continue;
        };
        let key = rec.identity_key();
        if key.is_empty() || !seen.insert(key) {
            continue;
        }
        out.push(rec);
    }

    // stable: ties keep document order
    out.sort_by_cached_key(|r| (r.title.to_lowercase(), r.full_name.to_lowercase()));
    out
}

fn read_card(card: ElementRef<'_>, source_url: &str, sel: &CardSelectors) -> Option<StaffRecord> {
    let full_name = card
        .select(&sel.name)
        .next()
        .map(text_of)
        .unwrap_or_default();
    if full_name.is_empty() {
        return None;
    }

    let title = card
        .select(&sel.title)
        .next()
        .map(text_of)
        .unwrap_or_default();

    let email = card
        .select(&sel.email_link)
        .filter_map(|a| a.value().attr("href"))
        .map(|href| html_escape::decode_html_entities(href.trim()).into_owned())
        .find(|href| is_mailto(href))
        .map(|href| mailto_address(&href))
        .unwrap_or_default();

    Some(StaffRecord {
        full_name,
        title,
        email,
        source_url: source_url.to_string(),
    })
}

/// Visible text of `el`. Script, style and noscript bodies are raw text held
/// as direct children, so only the text node's own parent is checked.
fn text_of(el: ElementRef<'_>) -> String {
    let mut buf = String::new();
    for node in el.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(ElementRef::wrap)
            .is_some_and(|p| NON_VISIBLE.contains(&p.value().name()));
        if !hidden {
            buf.push_str(text);
        }
    }
    normalize_ws(&buf)
}

fn is_mailto(href: &str) -> bool {
    href.get(..MAILTO.len())
        .is_some_and(|p| p.eq_ignore_ascii_case(MAILTO))
}

/// `mailto:ann@x.org?subject=Hi` -> `ann@x.org`
fn mailto_address(href: &str) -> String {
    let rest = &href[MAILTO.len()..];
    rest.split('?').next().unwrap_or_default().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: &str = "https://school.example.org/about/staff/";

    fn card(name: &str, title: &str, href: &str) -> String {
        format!(
            r#"<div class="staff-card"><h3>{name}</h3><p>{title}</p><a href="{href}">Email</a></div>"#
        )
    }

    fn page(cards: &[String]) -> String {
        format!("<html><body><main>{}</main></body></html>", cards.join("\n"))
    }

    fn run(html: &str) -> Vec<StaffRecord> {
        extract_staff(html, SRC, &CardSelectors::default())
    }

    #[test]
    fn normalize_ws_collapses_runs() {
        assert_eq!(normalize_ws("  Ann \n\t  Lee\u{a0} "), "Ann Lee");
        assert_eq!(normalize_ws(" \n "), "");
    }

    #[test]
    fn extracts_name_title_and_email() {
        let html = page(&[card(
            "  Ann\n   Lee ",
            " School   Nurse ",
            "MAILTO:ann.lee@school.example.org?subject=Hello",
        )]);
        let out = run(&html);
        assert_eq!(
            out,
            vec![StaffRecord {
                full_name: "Ann Lee".into(),
                title: "School Nurse".into(),
                email: "ann.lee@school.example.org".into(),
                source_url: SRC.into(),
            }]
        );
    }

    #[test]
    fn same_email_different_whitespace_yields_one_record() {
        let html = page(&[
            card("Ann Lee", "Nurse", "mailto:Ann.Lee@school.example.org"),
            card("Ann   Lee", "Nurse", "mailto:ann.lee@SCHOOL.example.org"),
        ]);
        let out = run(&html);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].email, "Ann.Lee@school.example.org");
    }

    #[test]
    fn cards_without_heading_are_skipped() {
        let html = page(&[
            r#"<div class="staff-card"><p>Counselor</p><a href="mailto:x@school.example.org">x</a></div>"#.to_string(),
            r#"<div class="staff-card"><h4>   </h4><p>Coach</p></div>"#.to_string(),
        ]);
        assert!(run(&html).is_empty());
    }

    #[test]
    fn sorts_by_title_then_name_case_insensitively() {
        let html = page(&[
            card("Alice Grey", "Nurse", "mailto:alice@school.example.org"),
            card("Carl Dunn", "Principal", "mailto:carl@school.example.org"),
            card("Bob Hart", "nurse", "mailto:bob@school.example.org"),
        ]);
        let titles: Vec<_> = run(&html).into_iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["Nurse", "nurse", "Principal"]);
    }

    #[test]
    fn without_email_identity_is_title_and_name() {
        let html = page(&[
            r#"<div class="staff-card"><h2>Dana Ruiz</h2><p>Coach</p></div>"#.to_string(),
            r#"<div class="staff-card"><h2>dana  ruiz</h2><p>COACH</p></div>"#.to_string(),
            r#"<div class="staff-card"><h2>Dana Ruiz</h2><p>Registrar</p></div>"#.to_string(),
        ]);
        let out = run(&html);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].full_name, "Dana Ruiz");
        assert_eq!(out[0].title, "Coach");
        assert_eq!(out[1].title, "Registrar");
    }

    #[test]
    fn first_mailto_link_wins_and_entities_are_decoded() {
        let html = page(&[format!(
            r#"<div class="staff-card"><h3>Eve Moss</h3>
               <a href="https://school.example.org/eve">Profile</a>
               <a href="mailto:eve&#46;moss@school.example.org?cc=office@school.example.org">Mail</a>
               <a href="mailto:other@school.example.org">Other</a></div>"#
        )]);
        let out = run(&html);
        assert_eq!(out[0].email, "eve.moss@school.example.org");
        assert_eq!(out[0].title, "");
    }

    #[test]
    fn tolerates_broken_markup_and_ignores_scripts() {
        let html = r#"<div class="staff-card"><h3>Finn <b>Ode<p>Bursar
            <script>document.write('<div class="staff-card"><h3>Injected</h3></div>')</script>
            <div class="staff-card"><h3>Gia Park</h3><p>Librarian"#;
        let names: Vec<_> = run(html).into_iter().map(|r| r.full_name).collect();
        assert!(names.contains(&"Gia Park".to_string()));
        assert!(!names.iter().any(|n| n.contains("Injected")));
    }

    #[test]
    fn hidden_text_is_skipped_inside_nested_markup() {
        let html = r#"<div class="staff-card"><h3><span>Ivy <style>.x{}</style><em>Nash</em></span>
            <noscript>enable js</noscript></h3><p><span><b>Dean</b></span></p></div>"#;
        let out = run(html);
        assert_eq!(out[0].full_name, "Ivy Nash");
        assert_eq!(out[0].title, "Dean");
    }

    #[test]
    fn deeply_nested_heading_extracts_in_linear_time() {
        let depth = 40_000;
        let html = format!(
            r#"<div class="staff-card"><h3>{}</h3><p>Registrar</p></div>"#,
            "<span>x".repeat(depth)
        );
        let started = std::time::Instant::now();
        let out = run(&html);
        let elapsed = started.elapsed();

        assert_eq!(out.len(), 1);
        assert!(out[0].full_name.starts_with("xxx"));
        assert!(
            elapsed < std::time::Duration::from_secs(5),
            "extraction took {elapsed:?}"
        );
    }

    #[test]
    fn custom_selectors_are_honoured() {
        let sel = CardSelectors::parse("li.person", "strong", "em", "a[href]").unwrap();
        let html = r#"<ul><li class="person"><strong>Hal Ito</strong><em>Dean</em>
            <a href="mailto:hal@school.example.org">m</a></li></ul>"#;
        let out = extract_staff(html, SRC, &sel);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "Dean");
        assert_eq!(out[0].email, "hal@school.example.org");
    }

    #[test]
    fn invalid_selector_is_an_error() {
        assert!(CardSelectors::parse("div[", "h1", "p", "a").is_err());
    }
}
