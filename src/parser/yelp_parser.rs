// Yelp business-page parsing
use crate::model::{ExtractError, ListingDetails, MenuItem};
use crate::parser::PageExtractor;
use crate::utils::collapse_whitespace;
use scraper::{ElementRef, Html, Selector};

struct Selectors {
    marker: Selector,
    name: Selector,
    address: Selector,
    street_address: Selector,
    rating_label: Selector,
    rating_meta: Selector,
    review_count: Selector,
    review_count_meta: Selector,
    category: Selector,
    image: Selector,
    menu_section: Selector,
    menu_entry: Selector,
    menu_field: Selector,
    menu_description: Selector,
    price_neighbour: Selector,
}

impl Selectors {
    fn new() -> Self {
        // Static CSS; exercised by the tests below.
        let parse = |css: &str| Selector::parse(css).expect("static selector");
        Self {
            marker: parse(r#"link[rel="canonical"], meta[property="og:url"]"#),
            name: parse("h1"),
            address: parse("address"),
            street_address: parse(r#"[itemprop="streetAddress"]"#),
            rating_label: parse(
                r#"[aria-label*="star rating"], [aria-label*="estrella"], [role="img"][aria-label]"#,
            ),
            rating_meta: parse(r#"meta[itemprop="ratingValue"]"#),
            review_count: parse(r##"a[href="#reviews"], [class*="review-count"]"##),
            review_count_meta: parse(r#"meta[itemprop="reviewCount"]"#),
            category: parse(r#"a[href*="cflt="], [class*="category-str"] a"#),
            image: parse(
                r#"meta[property="og:image"], a[href*="/biz_photos/"] img, img[src*="/bphoto/"]"#,
            ),
            menu_section: parse("div[class]"),
            menu_entry: parse("div[class], li[class]"),
            menu_field: parse("h3[class], h4[class], span[class], div[class]"),
            menu_description: parse("p[class], span[class], div[class]"),
            price_neighbour: parse("h3, h4, span, div"),
        }
    }
}

/// Extractor for Yelp `/biz/...` listing pages.
pub struct YelpParser {
    selectors: Selectors,
}

impl YelpParser {
    pub fn new() -> Self {
        Self {
            selectors: Selectors::new(),
        }
    }

    fn is_listing_page(&self, document: &Html) -> bool {
        document.select(&self.selectors.marker).any(|el| {
            el.value()
                .attr("href")
                .or_else(|| el.value().attr("content"))
                .is_some_and(|u| u.contains("/biz/"))
        })
    }

    fn location(&self, document: &Html) -> String {
        document
            .select(&self.selectors.address)
            .chain(document.select(&self.selectors.street_address))
            .map(|el| collapse_whitespace(&text_of(el)))
            .find(|s| !s.is_empty())
            .unwrap_or_default()
    }

    fn rating(&self, document: &Html) -> Option<f32> {
        let in_range = |r: &f32| (0.0..=5.0).contains(r);
        document
            .select(&self.selectors.rating_label)
            .filter_map(|el| el.value().attr("aria-label"))
            .filter_map(rating_from_label)
            .find(in_range)
            .or_else(|| {
                document
                    .select(&self.selectors.rating_meta)
                    .filter_map(|el| el.value().attr("content"))
                    .filter_map(leading_number)
                    .find(in_range)
            })
    }

    fn review_count(&self, document: &Html) -> Option<u32> {
        document
            .select(&self.selectors.review_count)
            .find_map(|el| first_integer(&text_of(el)))
            .or_else(|| {
                document
                    .select(&self.selectors.review_count_meta)
                    .filter_map(|el| el.value().attr("content"))
                    .find_map(first_integer)
            })
    }

    fn categories(&self, document: &Html) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for el in document.select(&self.selectors.category) {
            let name = collapse_whitespace(&text_of(el));
            if !name.is_empty() && !out.contains(&name) {
                out.push(name);
            }
        }
        out
    }

    /// Menu entries from a structured menu section, falling back to prices found in loose text.
    fn menu_items(&self, document: &Html) -> Vec<MenuItem> {
        let structured = self.structured_menu(document);
        if structured.is_empty() {
            self.priced_text_menu(document)
        } else {
            structured
        }
    }

    fn structured_menu(&self, document: &Html) -> Vec<MenuItem> {
        let mut items = Vec::new();
        let sections = document
            .select(&self.selectors.menu_section)
            .filter(|el| class_contains(*el, "menu"));
        for section in sections {
            let entries = section
                .select(&self.selectors.menu_entry)
                .filter(|el| class_contains(*el, "item"));
            for entry in entries {
                if let Some(item) = self.menu_entry(entry) {
                    push_unique(&mut items, item);
                }
            }
        }
        items
    }

    fn menu_entry(&self, entry: ElementRef<'_>) -> Option<MenuItem> {
        let field = |selector: &Selector, needles: &[&str]| {
            entry
                .select(selector)
                .filter(|el| needles.iter().any(|n| class_contains(*el, n)))
                .map(|el| collapse_whitespace(&text_of(el)))
                .find(|s| !s.is_empty())
        };

        let name = field(&self.selectors.menu_field, &["name", "title"])?;
        let price = field(&self.selectors.menu_field, &["price"]).or_else(|| {
            entry
                .text()
                .map(str::trim)
                .find(|t| looks_like_price(t))
                .map(str::to_string)
        });
        let description = field(&self.selectors.menu_description, &["desc"]);

        Some(MenuItem { name, price, description })
    }

    /// Pairs each "$.." text with the first nearby heading or span that is not itself a price.
    fn priced_text_menu(&self, document: &Html) -> Vec<MenuItem> {
        let mut items = Vec::new();
        for node in document.root_element().descendants() {
            let Some(text) = node.value().as_text() else {
                continue;
            };
            let price = text.trim();
            if !looks_like_price(price) {
                continue;
            }
            let Some(parent) = node.parent().and_then(ElementRef::wrap) else {
                continue;
            };
            if matches!(parent.value().name(), "script" | "style") {
                continue;
            }
            let container = parent.parent().and_then(ElementRef::wrap).unwrap_or(parent);

            let name = container
                .select(&self.selectors.price_neighbour)
                .take(5)
                .map(|el| collapse_whitespace(&text_of(el)))
                .find(|t| !t.contains('$') && t.chars().count() > 3);
            if let Some(name) = name {
                push_unique(
                    &mut items,
                    MenuItem {
                        name,
                        price: Some(price.to_string()),
                        description: None,
                    },
                );
            }
        }
        items
    }

    fn image_urls(&self, document: &Html) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for el in document.select(&self.selectors.image) {
            let attrs = el.value();
            let src = if attrs.name() == "meta" {
                attrs.attr("content")
            } else {
                attrs
                    .attr("src")
                    .filter(|s| !s.starts_with("data:"))
                    .or_else(|| attrs.attr("data-src"))
            };
            if let Some(src) = src.map(str::trim) {
                if !src.is_empty() && !src.starts_with("data:") && !out.iter().any(|u| u == src) {
                    out.push(src.to_string());
                }
            }
        }
        out
    }
}

impl Default for YelpParser {
    fn default() -> Self {
        Self::new()
    }
}

impl PageExtractor for YelpParser {
    fn extract(&self, html: &str) -> Result<ListingDetails, ExtractError> {
        let document = Html::parse_document(html);

        if !self.is_listing_page(&document) {
            return Err(ExtractError::MalformedDocument);
        }

        let business_name = document
            .select(&self.selectors.name)
            .map(|el| collapse_whitespace(&text_of(el)))
            .find(|s| !s.is_empty())
            .ok_or(ExtractError::RequiredFieldMissing("business_name"))?;

        Ok(ListingDetails {
            business_name,
            location: self.location(&document),
            rating: self.rating(&document),
            review_count: self.review_count(&document),
            categories: self.categories(&document),
            menu_items: self.menu_items(&document),
            image_urls: self.image_urls(&document),
        })
    }
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>()
}

fn class_contains(el: ElementRef<'_>, needle: &str) -> bool {
    el.value()
        .attr("class")
        .is_some_and(|c| c.to_ascii_lowercase().contains(needle))
}

/// "$12.50" or "MX$120" but not the "$$" price-range badge.
fn looks_like_price(text: &str) -> bool {
    text.contains('$') && text.chars().any(|c| c.is_ascii_digit())
}

/// Nested sections yield the same entry more than once; keep the first.
fn push_unique(items: &mut Vec<MenuItem>, item: MenuItem) {
    if !items.iter().any(|i| i.name == item.name) {
        items.push(item);
    }
}

/// Accepts "4.5 star rating", "4,5 estrellas" or any label that starts with the number.
fn rating_from_label(label: &str) -> Option<f32> {
    let lower = label.to_lowercase();
    let is_rating = lower.contains("star rating")
        || lower.contains("estrella")
        || label.trim_start().starts_with(|c: char| c.is_ascii_digit());
    if is_rating { leading_number(label) } else { None }
}

/// "4.5 star rating" -> 4.5. Accepts a decimal comma ("4,5 estrellas").
fn leading_number(text: &str) -> Option<f32> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let number: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    number.trim_end_matches('.').parse().ok()
}

/// "(1,234 reviews)" -> 1234. Thousands separators are dropped.
fn first_integer(text: &str) -> Option<u32> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let digits: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .filter(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}
